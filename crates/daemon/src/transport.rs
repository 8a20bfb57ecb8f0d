//! Framed envelope I/O shared by the server and the client.

use std::io;

use protocol::{Envelope, Frame, FrameCodec, ProtocolError, FRAME_PREFIX_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors that can occur while exchanging envelopes over a stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Framing or MessagePack failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer closed the connection mid-exchange.
    #[error("connection closed by peer")]
    Closed,

    /// No response arrived in time.
    #[error("operation timed out")]
    Timeout,

    /// A response did not answer the request that was sent.
    #[error("response sequence {got} does not match request {expected}")]
    SequenceMismatch { expected: u64, got: u64 },
}

/// Read one envelope. Returns `None` on a clean end of stream before a frame
/// starts.
pub async fn read_envelope<R>(
    reader: &mut R,
    codec: &FrameCodec,
) -> Result<Option<Envelope>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::Closed);
        }
        filled += n;
    }

    let content_len = codec.content_length(&prefix)?;
    let mut content = vec![0u8; content_len];
    reader.read_exact(&mut content).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Io(e)
        }
    })?;

    let frame = codec.decode_content(&content)?;
    let envelope = Envelope::from_msgpack(&frame.payload).map_err(ProtocolError::from)?;
    Ok(Some(envelope))
}

/// Encode and write one envelope, then flush.
pub async fn write_envelope<W>(
    writer: &mut W,
    codec: &FrameCodec,
    envelope: &Envelope,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let payload = envelope.to_msgpack().map_err(ProtocolError::from)?;
    let bytes = codec.encode(&Frame::new(payload))?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
