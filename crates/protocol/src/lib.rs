//! # Burrow Protocol Library
//!
//! Wire definitions shared by the Burrow daemon and its clients.
//!
//! ## Overview
//!
//! - **File records**: [`FileStats`] and the depth-bounded [`FileTree`]
//!   snapshot a browsing client renders
//! - **Messages**: requests for tree snapshots, stats, rename, move and
//!   delete, plus their responses and error codes
//! - **Frame codec**: length-prefixed framing with optional LZ4 compression
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Application Messages           │  MessagePack-encoded
//! ├─────────────────────────────────────────┤
//! │              Framing                    │  Length-prefixed, LZ4
//! ├─────────────────────────────────────────┤
//! │                 TCP                     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Envelope, Frame, FrameCodec, Message};
//! use protocol::messages::GetFileRequest;
//!
//! let message = Message::GetFile(GetFileRequest {
//!     path: "projects".to_string(),
//!     depth: 2,
//! });
//! let envelope = Envelope::new(1, message);
//!
//! let bytes = envelope.to_msgpack().unwrap();
//! let codec = FrameCodec::new();
//! let frame_bytes = codec.encode(&Frame::new(bytes)).unwrap();
//! assert_eq!(&frame_bytes[..4], b"BRRW");
//! ```

pub mod error;
pub mod framing;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use framing::{
    Frame, FrameCodec, FrameFlags, COMPRESSION_THRESHOLD, FRAME_HEADER_SIZE, FRAME_MAGIC,
    FRAME_PREFIX_SIZE, MAX_FRAME_SIZE,
};
pub use messages::{
    Envelope, ErrorCode, ErrorMessage, FileStats, FileTree, FileType, Message, SkippedEntry,
    PROTOCOL_VERSION,
};
