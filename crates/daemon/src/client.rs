//! Client for talking to a running explorer server.
//!
//! The client sends one request at a time and waits for the matching
//! response, bounded by a timeout.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use protocol::messages::{
    DeleteRequest, GetFileRequest, GetFileStatsRequest, MoveRequest, Ping, RenameRequest,
};
use protocol::{Envelope, ErrorCode, FileStats, FileTree, FrameCodec, Message};
use tokio::io::{BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::transport::{self, TransportError};

/// Default timeout for client operations in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors returned by [`ExplorerClient`] helpers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be delivered or answered.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with an error.
    #[error("server returned {code:?}: {message}")]
    Remote {
        /// Error class.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
    },

    /// The server answered with the wrong kind of message.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

/// A client for communicating with the explorer server.
pub struct ExplorerClient {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
    codec: FrameCodec,
    timeout: Duration,
    next_sequence: u64,
}

impl ExplorerClient {
    /// Connect to the server at `addr`.
    ///
    /// Returns an error if the connection cannot be established, which
    /// typically means the server is not running.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(
            stream,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        ))
    }

    /// Connect with a custom timeout, used for the connect itself and every
    /// later request.
    pub async fn connect_with_timeout(
        addr: impl ToSocketAddrs,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(Self::from_stream(stream, timeout))
    }

    fn from_stream(stream: TcpStream, timeout: Duration) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            codec: FrameCodec::new(),
            timeout,
            next_sequence: 1,
        }
    }

    /// Set the timeout for operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a request and wait for its response.
    pub async fn send(&mut self, message: Message) -> Result<Message, TransportError> {
        tokio::time::timeout(self.timeout, self.send_internal(message))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn send_internal(&mut self, message: Message) -> Result<Message, TransportError> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let request = Envelope::new(sequence, message);
        transport::write_envelope(&mut self.writer, &self.codec, &request).await?;

        let response = transport::read_envelope(&mut self.reader, &self.codec)
            .await?
            .ok_or(TransportError::Closed)?;
        if response.sequence != sequence {
            return Err(TransportError::SequenceMismatch {
                expected: sequence,
                got: response.sequence,
            });
        }
        Ok(response.payload)
    }

    /// Check whether the server is responsive.
    pub async fn ping(&mut self) -> Result<bool, TransportError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let response = self.send(Message::Ping(Ping { timestamp })).await?;
        Ok(matches!(response, Message::Pong(pong) if pong.timestamp == timestamp))
    }

    /// Snapshot the tree at `path` down to `depth` levels.
    pub async fn get_file(&mut self, path: &str, depth: i64) -> Result<FileTree, ClientError> {
        let request = Message::GetFile(GetFileRequest {
            path: path.to_string(),
            depth,
        });
        match self.send(request).await? {
            Message::FileTree(tree) => Ok(tree),
            other => Err(unexpected(other)),
        }
    }

    /// Metadata of the entry at `path`.
    pub async fn get_file_stats(&mut self, path: &str) -> Result<FileStats, ClientError> {
        let request = Message::GetFileStats(GetFileStatsRequest {
            path: path.to_string(),
        });
        self.expect_stats(request).await
    }

    /// Rename the entry at `path` within its directory.
    pub async fn rename(&mut self, path: &str, new_name: &str) -> Result<FileStats, ClientError> {
        let request = Message::Rename(RenameRequest {
            path: path.to_string(),
            new_name: new_name.to_string(),
        });
        self.expect_stats(request).await
    }

    /// Move the entry at `path` to `destination`.
    pub async fn move_to(&mut self, path: &str, destination: &str) -> Result<FileStats, ClientError> {
        let request = Message::Move(MoveRequest {
            path: path.to_string(),
            destination: destination.to_string(),
        });
        self.expect_stats(request).await
    }

    /// Delete the entry at `path`.
    pub async fn delete(&mut self, path: &str) -> Result<(), ClientError> {
        let request = Message::Delete(DeleteRequest {
            path: path.to_string(),
        });
        match self.send(request).await? {
            Message::Deleted(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn expect_stats(&mut self, request: Message) -> Result<FileStats, ClientError> {
        match self.send(request).await? {
            Message::FileStats(stats) => Ok(stats),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(message: Message) -> ClientError {
    match message {
        Message::Error(err) => ClientError::Remote {
            code: err.code,
            message: err.message,
        },
        other => ClientError::UnexpectedResponse(other.kind()),
    }
}
