//! Frame codec for length-prefixed framing with optional LZ4 compression.
//!
//! # Frame Format
//!
//! Each frame consists of:
//! - 4 bytes: magic bytes "BRRW"
//! - 4 bytes: content length (big-endian, includes flags byte)
//! - 1 byte: flags (bit 0 = compressed)
//! - N bytes: payload (possibly LZ4 compressed)
//!
//! # Compression
//!
//! Payloads larger than 1KB are compressed using LZ4 when that makes them
//! smaller. Unbounded tree snapshots are highly repetitive, so they usually
//! shrink a lot. The decompressed size is bounded by [`MAX_FRAME_SIZE`] as
//! well, checked before anything is allocated.

use crate::error::{ProtocolError, Result};

/// Magic bytes identifying a Burrow frame.
pub const FRAME_MAGIC: [u8; 4] = *b"BRRW";

/// Compression threshold in bytes. Payloads larger than this are compressed.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Maximum frame size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the fixed prefix: 4 (magic) + 4 (length).
pub const FRAME_PREFIX_SIZE: usize = 8;

/// Frame header size: prefix + 1 (flags) = 9 bytes.
pub const FRAME_HEADER_SIZE: usize = FRAME_PREFIX_SIZE + 1;

/// Flags indicating frame properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Flag indicating the payload is LZ4 compressed.
    pub const COMPRESSED: u8 = 0b0000_0001;

    /// Create a new empty flags set.
    #[inline]
    pub fn new() -> Self {
        Self(0)
    }

    /// Create flags from a raw byte value.
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value of the flags.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if the compressed flag is set.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    /// Return a copy with the compressed flag set or cleared.
    #[inline]
    pub fn with_compressed(self, compressed: bool) -> Self {
        if compressed {
            Self(self.0 | Self::COMPRESSED)
        } else {
            Self(self.0 & !Self::COMPRESSED)
        }
    }
}

/// A decoded frame. The payload is always held uncompressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame flags.
    pub flags: FrameFlags,
    /// The payload data (uncompressed form).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given payload.
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            flags: FrameFlags::new(),
            payload,
        }
    }
}

/// Encoder and decoder for frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    compression_enabled: bool,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a new frame codec with compression enabled.
    pub fn new() -> Self {
        Self {
            compression_enabled: true,
        }
    }

    /// Create a new frame codec with compression disabled.
    pub fn without_compression() -> Self {
        Self {
            compression_enabled: false,
        }
    }

    /// Whether large payloads are compressed on encode.
    pub fn compression_enabled(&self) -> bool {
        self.compression_enabled
    }

    /// Encode a frame into bytes.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let payload = &frame.payload;

        if payload.len() > MAX_FRAME_SIZE - FRAME_HEADER_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len() + FRAME_HEADER_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut flags = frame.flags.with_compressed(false);
        let mut body: Option<Vec<u8>> = None;
        if self.compression_enabled && payload.len() > COMPRESSION_THRESHOLD {
            let compressed = lz4_flex::compress_prepend_size(payload);
            if compressed.len() < payload.len() {
                flags = flags.with_compressed(true);
                body = Some(compressed);
            }
        }
        let body = body.as_deref().unwrap_or(payload.as_slice());

        let content_len = 1 + body.len();
        let mut output = Vec::with_capacity(FRAME_PREFIX_SIZE + content_len);
        output.extend_from_slice(&FRAME_MAGIC);
        output.extend_from_slice(&(content_len as u32).to_be_bytes());
        output.push(flags.as_byte());
        output.extend_from_slice(body);

        Ok(output)
    }

    /// Parse the 8-byte prefix and return the content length that follows it.
    ///
    /// Stream readers call this after reading exactly [`FRAME_PREFIX_SIZE`]
    /// bytes to learn how many more bytes belong to the frame.
    pub fn content_length(&self, prefix: &[u8]) -> Result<usize> {
        if prefix.len() < FRAME_PREFIX_SIZE {
            return Err(ProtocolError::Deserialization(format!(
                "insufficient data for frame prefix: need {} bytes, have {}",
                FRAME_PREFIX_SIZE,
                prefix.len()
            )));
        }

        let magic = [prefix[0], prefix[1], prefix[2], prefix[3]];
        if magic != FRAME_MAGIC {
            return Err(ProtocolError::InvalidFrameMagic {
                expected: u32::from_be_bytes(FRAME_MAGIC),
                got: u32::from_be_bytes(magic),
            });
        }

        let content_len =
            u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;

        if FRAME_PREFIX_SIZE + content_len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: FRAME_PREFIX_SIZE + content_len,
                max: MAX_FRAME_SIZE,
            });
        }
        if content_len < 1 {
            return Err(ProtocolError::Deserialization(
                "invalid frame: content length must be at least 1 for flags byte".to_string(),
            ));
        }

        Ok(content_len)
    }

    /// Decode the content part of a frame (flags byte + payload).
    pub fn decode_content(&self, content: &[u8]) -> Result<Frame> {
        let (flag_byte, body) = content.split_first().ok_or_else(|| {
            ProtocolError::Deserialization("frame content is missing flags byte".to_string())
        })?;
        let flags = FrameFlags::from_byte(*flag_byte);

        let payload = if flags.is_compressed() {
            let declared = decompressed_size(body)?;
            if declared > MAX_FRAME_SIZE {
                return Err(ProtocolError::FrameTooLarge {
                    size: declared,
                    max: MAX_FRAME_SIZE,
                });
            }
            lz4_flex::decompress_size_prepended(body).map_err(|e| {
                ProtocolError::Deserialization(format!("failed to decompress payload: {}", e))
            })?
        } else {
            body.to_vec()
        };

        Ok(Frame {
            flags: flags.with_compressed(false),
            payload,
        })
    }

    /// Decode a frame from bytes.
    ///
    /// Returns the decoded frame and the number of bytes consumed.
    pub fn decode(&self, data: &[u8]) -> Result<(Frame, usize)> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::Deserialization(format!(
                "insufficient data for frame header: need {} bytes, have {}",
                FRAME_HEADER_SIZE,
                data.len()
            )));
        }

        let content_len = self.content_length(&data[..FRAME_PREFIX_SIZE])?;
        let total = FRAME_PREFIX_SIZE + content_len;
        if data.len() < total {
            return Err(ProtocolError::Deserialization(format!(
                "insufficient data for frame: need {} bytes, have {}",
                total,
                data.len()
            )));
        }

        let frame = self.decode_content(&data[FRAME_PREFIX_SIZE..total])?;
        Ok((frame, total))
    }

    /// Try to decode a frame, returning `None` if the data is still partial.
    pub fn try_decode(&self, data: &[u8]) -> Result<Option<(Frame, usize)>> {
        if data.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let content_len = self.content_length(&data[..FRAME_PREFIX_SIZE])?;
        if data.len() < FRAME_PREFIX_SIZE + content_len {
            return Ok(None);
        }
        self.decode(data).map(Some)
    }
}

/// Read the little-endian size that `lz4_flex` prepends to compressed data.
fn decompressed_size(body: &[u8]) -> Result<usize> {
    match body {
        [a, b, c, d, ..] => Ok(u32::from_le_bytes([*a, *b, *c, *d]) as usize),
        _ => Err(ProtocolError::Deserialization(
            "compressed payload is missing its size prefix".to_string(),
        )),
    }
}
