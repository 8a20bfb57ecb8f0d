//! Message routing for the explorer server.
//!
//! The router turns request messages into calls on the shared
//! [`FileExplorer`] and wraps the outcome in a reply envelope. Explorer calls
//! block on the filesystem, so each one runs on tokio's blocking pool.

use std::sync::Arc;

use protocol::messages::{
    DeleteRequest, DeletedResponse, GetFileRequest, GetFileStatsRequest, MoveRequest, Ping, Pong,
    RenameRequest,
};
use protocol::{Envelope, ErrorCode, ErrorMessage, Message, PROTOCOL_VERSION};
use tracing::{debug, info, warn};

use crate::explorer::{ExplorerError, FileExplorer};

/// Result type for message routing operations.
pub type RouterResult = Result<Option<Message>, RouterError>;

/// Errors that can occur during message routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Explorer operation failed.
    #[error(transparent)]
    Explorer(#[from] ExplorerError),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self, context: Option<String>) -> ErrorMessage {
        let code = match self {
            RouterError::Explorer(e) => match e {
                ExplorerError::PathTraversal(_) => ErrorCode::PathTraversal,
                ExplorerError::NotFound(_) => ErrorCode::NotFound,
                ExplorerError::UnsupportedFileType(_) => ErrorCode::UnsupportedFileType,
                ExplorerError::Mutation { .. } if e.is_not_found() => ErrorCode::NotFound,
                ExplorerError::Mutation { .. } => ErrorCode::MutationFailed,
                ExplorerError::Io { .. } => ErrorCode::InternalError,
            },
            RouterError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RouterError::Internal(_) => ErrorCode::InternalError,
        };

        ErrorMessage {
            code,
            message: self.to_string(),
            context,
        }
    }
}

/// Dispatches explorer requests.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    explorer: Arc<FileExplorer>,
}

impl MessageRouter {
    /// Create a router over a shared explorer.
    pub fn new(explorer: Arc<FileExplorer>) -> Self {
        Self { explorer }
    }

    /// The explorer requests are dispatched to.
    pub fn explorer(&self) -> &Arc<FileExplorer> {
        &self.explorer
    }

    /// Handle one envelope and build the reply, if the message warrants one.
    ///
    /// Failures become an [`Message::Error`] reply carrying the request path
    /// as context.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Option<Envelope> {
        if envelope.version != PROTOCOL_VERSION {
            warn!(
                expected = PROTOCOL_VERSION,
                got = envelope.version,
                "Rejecting envelope with unsupported protocol version"
            );
            let err = RouterError::InvalidRequest(format!(
                "unsupported protocol version {}, expected {}",
                envelope.version, PROTOCOL_VERSION
            ));
            return Some(envelope.reply(Message::Error(err.to_error_message(None))));
        }

        let context = request_path(&envelope.payload);
        match self.route(envelope.payload.clone()).await {
            Ok(Some(reply)) => Some(envelope.reply(reply)),
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err, "Request failed");
                Some(envelope.reply(Message::Error(err.to_error_message(context))))
            }
        }
    }

    /// Route a message to its handler.
    pub async fn route(&self, message: Message) -> RouterResult {
        debug!(kind = message.kind(), "Routing message");

        match message {
            Message::GetFile(req) => self.handle_get_file(req).await,
            Message::GetFileStats(req) => self.handle_get_file_stats(req).await,
            Message::Rename(req) => self.handle_rename(req).await,
            Message::Move(req) => self.handle_move(req).await,
            Message::Delete(req) => self.handle_delete(req).await,
            Message::Ping(ping) => Ok(Some(self.handle_ping(ping))),
            Message::FileTree(_) | Message::FileStats(_) | Message::Deleted(_) | Message::Pong(_) => {
                Err(RouterError::InvalidRequest(format!(
                    "{} is a response, not a request",
                    message.kind()
                )))
            }
            Message::Error(err) => {
                warn!(?err, "Received error from peer");
                Ok(None)
            }
        }
    }

    async fn handle_get_file(&self, req: GetFileRequest) -> RouterResult {
        let tree = self
            .blocking(move |explorer| explorer.get_file(&req.path)?.to_tree(req.depth))
            .await?;
        Ok(Some(Message::FileTree(tree)))
    }

    async fn handle_get_file_stats(&self, req: GetFileStatsRequest) -> RouterResult {
        let stats = self
            .blocking(move |explorer| explorer.get_file_stats(&req.path))
            .await?;
        Ok(Some(Message::FileStats(stats.to_protocol())))
    }

    async fn handle_rename(&self, req: RenameRequest) -> RouterResult {
        let stats = self
            .blocking(move |explorer| {
                let mut node = explorer.get_file(&req.path)?;
                node.rename(&req.new_name)?;
                Ok(node.into_stats())
            })
            .await?;
        info!(path = %stats.path.display(), "Rename completed");
        Ok(Some(Message::FileStats(stats.to_protocol())))
    }

    async fn handle_move(&self, req: MoveRequest) -> RouterResult {
        let stats = self
            .blocking(move |explorer| {
                let mut node = explorer.get_file(&req.path)?;
                node.move_to(&req.destination, explorer)?;
                Ok(node.into_stats())
            })
            .await?;
        info!(path = %stats.path.display(), "Move completed");
        Ok(Some(Message::FileStats(stats.to_protocol())))
    }

    async fn handle_delete(&self, req: DeleteRequest) -> RouterResult {
        let path = req.path.clone();
        self.blocking(move |explorer| explorer.get_file(&req.path)?.delete())
            .await?;
        Ok(Some(Message::Deleted(DeletedResponse { path })))
    }

    fn handle_ping(&self, ping: Ping) -> Message {
        Message::Pong(Pong {
            timestamp: ping.timestamp,
        })
    }

    /// Run an explorer call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, RouterError>
    where
        T: Send + 'static,
        F: FnOnce(&FileExplorer) -> Result<T, ExplorerError> + Send + 'static,
    {
        let explorer = Arc::clone(&self.explorer);
        tokio::task::spawn_blocking(move || f(&explorer))
            .await
            .map_err(|e| RouterError::Internal(format!("explorer task failed: {}", e)))?
            .map_err(RouterError::from)
    }
}

/// The client-supplied path a request refers to.
fn request_path(message: &Message) -> Option<String> {
    match message {
        Message::GetFile(req) => Some(req.path.clone()),
        Message::GetFileStats(req) => Some(req.path.clone()),
        Message::Rename(req) => Some(req.path.clone()),
        Message::Move(req) => Some(req.path.clone()),
        Message::Delete(req) => Some(req.path.clone()),
        _ => None,
    }
}
