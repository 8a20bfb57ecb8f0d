//! Protocol message definitions for Burrow.
//!
//! This module defines the records a client sees when it browses a sandboxed
//! directory tree, and the request/response messages exchanged with the
//! daemon. Messages travel inside an [`Envelope`], encoded as MessagePack on
//! the wire. The same records serialize to the JSON shape expected by web
//! front-ends.

use serde::{Deserialize, Serialize};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope wrapper for all protocol messages.
///
/// Responses carry the sequence number of the request they answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number used to pair a response with its request.
    pub sequence: u64,
    /// The actual message payload.
    pub payload: Message,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }

    /// Build the reply envelope for this request.
    pub fn reply(&self, payload: Message) -> Self {
        Self::new(self.sequence, payload)
    }
}

/// Top-level message enum containing all message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    // Requests
    /// Resolve a sandbox-relative path and return its tree snapshot.
    GetFile(GetFileRequest),
    /// Resolve a sandbox-relative path and return only its stats.
    GetFileStats(GetFileStatsRequest),
    /// Rename an entry within its parent directory.
    Rename(RenameRequest),
    /// Move an entry to another sandbox-relative location.
    Move(MoveRequest),
    /// Delete an entry (recursively for directories).
    Delete(DeleteRequest),

    // Responses
    /// Tree snapshot answering [`Message::GetFile`].
    FileTree(FileTree),
    /// Stats answering [`Message::GetFileStats`], [`Message::Rename`] and
    /// [`Message::Move`].
    FileStats(FileStats),
    /// Confirmation of a [`Message::Delete`].
    Deleted(DeletedResponse),

    // Control messages
    /// Ping for liveness checks.
    Ping(Ping),
    /// Pong response to ping.
    Pong(Pong),
    /// Error message.
    Error(ErrorMessage),
}

impl Message {
    /// Short name of the message kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::GetFile(_) => "get_file",
            Message::GetFileStats(_) => "get_file_stats",
            Message::Rename(_) => "rename",
            Message::Move(_) => "move",
            Message::Delete(_) => "delete",
            Message::FileTree(_) => "file_tree",
            Message::FileStats(_) => "file_stats",
            Message::Deleted(_) => "deleted",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::Error(_) => "error",
        }
    }
}

// ============================================================================
// File records
// ============================================================================

/// Kind of a browsable entry.
///
/// Only directories and regular files are representable. Anything else on
/// disk is rejected before a record is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Directory.
    Directory,
    /// Regular file.
    File,
}

impl FileType {
    /// Lowercase name as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Directory => "directory",
            FileType::File => "file",
        }
    }
}

/// Metadata snapshot of a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    /// Entry name (last path component).
    pub name: String,
    /// Absolute path, posix-style.
    pub path: String,
    /// Entry type.
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Numeric owner id (0 where the platform has none).
    pub uid: u32,
    /// Numeric group id (0 where the platform has none).
    pub gid: u32,
    /// Owner display name.
    pub owner: String,
    /// Group display name, absent on platforms without groups.
    pub group: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Creation timestamp in epoch seconds. On Unix this is the inode change
    /// time.
    pub created: f64,
    /// Modification timestamp in epoch seconds.
    pub modified: f64,
    /// Whether the entry itself is a symbolic link.
    pub is_link: bool,
    /// Canonical absolute target when `is_link` is set.
    pub link_target: Option<String>,
}

/// A directory entry that was listed but could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Absolute path, posix-style.
    pub path: String,
    /// `NotFound` for vanished entries and dangling links,
    /// `UnsupportedFileType` for sockets, fifos and devices.
    pub reason: ErrorCode,
}

/// A node of a depth-bounded tree snapshot.
///
/// `children` is `None` when the node was not expanded (a file, a symlinked
/// directory, or a directory at the depth limit) and `Some(vec![])` for an
/// expanded empty directory. Entries of an expanded directory that could not
/// be opened are listed in `skipped` instead of `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTree {
    /// Absolute path, posix-style.
    pub path: String,
    /// Metadata of this node.
    pub stats: FileStats,
    /// Expanded children, if any.
    pub children: Option<Vec<FileTree>>,
    /// Entries left out of `children`. Always empty when not expanded.
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
}

impl FileTree {
    /// Whether this node carries an expansion (possibly empty).
    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Number of immediate directory entries seen when expanding, opened or
    /// skipped. `None` when not expanded.
    pub fn entry_count(&self) -> Option<usize> {
        self.children
            .as_ref()
            .map(|children| children.len() + self.skipped.len())
    }

    /// Count the nodes in this snapshot, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(FileTree::node_count)
            .sum::<usize>()
    }

    /// Sort children recursively: directories first, then by case-insensitive
    /// name.
    ///
    /// Listing order is whatever the host filesystem yields; callers that
    /// need a stable order sort here, at the boundary.
    pub fn sort_children(&mut self) {
        if let Some(children) = self.children.as_mut() {
            children.sort_by(|a, b| {
                let a_is_dir = a.stats.file_type == FileType::Directory;
                let b_is_dir = b.stats.file_type == FileType::Directory;
                b_is_dir
                    .cmp(&a_is_dir)
                    .then_with(|| a.stats.name.to_lowercase().cmp(&b.stats.name.to_lowercase()))
            });
            for child in children.iter_mut() {
                child.sort_children();
            }
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Request a tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFileRequest {
    /// Sandbox-relative path.
    pub path: String,
    /// Expansion depth: negative is unbounded, 0 is the node alone.
    #[serde(default)]
    pub depth: i64,
}

/// Request the stats of a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFileStatsRequest {
    /// Sandbox-relative path.
    pub path: String,
}

/// Rename an entry in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    /// Sandbox-relative path of the entry.
    pub path: String,
    /// New name (single path component).
    pub new_name: String,
}

/// Move an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Sandbox-relative path of the entry.
    pub path: String,
    /// Sandbox-relative destination path.
    pub destination: String,
}

/// Delete an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Sandbox-relative path of the entry.
    pub path: String,
}

/// Confirmation that an entry was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedResponse {
    /// Sandbox-relative path that was deleted.
    pub path: String,
}

// ============================================================================
// Control Messages
// ============================================================================

/// Ping message for liveness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Timestamp when ping was sent (Unix epoch milliseconds).
    pub timestamp: u64,
}

/// Pong response to ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    /// Timestamp echoed from the ping.
    pub timestamp: u64,
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional context (usually the requested path).
    pub context: Option<String>,
}

/// Error codes for explorer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The path escapes the sandbox or is absolute.
    PathTraversal,
    /// Nothing exists at the resolved path.
    NotFound,
    /// The path is neither a regular file nor a directory.
    UnsupportedFileType,
    /// The filesystem refused a rename, move or delete.
    MutationFailed,
    /// The request itself was malformed.
    InvalidRequest,
    /// Server-side error.
    InternalError,
}

impl ErrorCode {
    /// HTTP-style status class for front-ends that speak HTTP.
    ///
    /// Missing files map to 409 (conflict), which is what browsing clients
    /// already expect from this service.
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::PathTraversal
            | ErrorCode::UnsupportedFileType
            | ErrorCode::InvalidRequest => 400,
            ErrorCode::NotFound => 409,
            ErrorCode::MutationFailed | ErrorCode::InternalError => 500,
        }
    }
}

// ============================================================================
// Serialization helpers
// ============================================================================

impl Envelope {
    /// Serialize the envelope to MessagePack bytes (named fields).
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Deserialize an envelope from MessagePack bytes.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    /// Serialize the envelope to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize an envelope from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stats(name: &str, file_type: FileType) -> FileStats {
        FileStats {
            name: name.to_string(),
            path: format!("/sandbox/{}", name),
            file_type,
            uid: 1000,
            gid: 1000,
            owner: "alice".to_string(),
            group: Some("staff".to_string()),
            size: 12,
            created: 1_704_067_200.5,
            modified: 1_704_067_260.25,
            is_link: false,
            link_target: None,
        }
    }

    fn leaf(name: &str, file_type: FileType) -> FileTree {
        let stats = sample_stats(name, file_type);
        FileTree {
            path: stats.path.clone(),
            stats,
            children: None,
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_envelope_version() {
        let envelope = Envelope::new(1, Message::Ping(Ping { timestamp: 12345 }));
        assert_eq!(envelope.version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_envelope_reply_keeps_sequence() {
        let request = Envelope::new(
            77,
            Message::GetFileStats(GetFileStatsRequest {
                path: "sub/file.txt".to_string(),
            }),
        );
        let reply = request.reply(Message::Pong(Pong { timestamp: 1 }));
        assert_eq!(reply.sequence, 77);
        assert_eq!(reply.version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_file_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FileType::File).unwrap(), r#""file""#);
        assert_eq!(
            serde_json::to_string(&FileType::Directory).unwrap(),
            r#""directory""#
        );
        assert_eq!(FileType::Directory.as_str(), "directory");
    }

    #[test]
    fn test_file_tree_json_shape() {
        let tree = leaf("file.txt", FileType::File);
        let value = serde_json::to_value(&tree).unwrap();

        assert_eq!(value["path"], "/sandbox/file.txt");
        assert!(value["children"].is_null());

        let stats = &value["stats"];
        assert_eq!(stats["type"], "file");
        assert_eq!(stats["name"], "file.txt");
        assert_eq!(stats["uid"], 1000);
        assert_eq!(stats["owner"], "alice");
        assert_eq!(stats["group"], "staff");
        assert_eq!(stats["size"], 12);
        assert_eq!(stats["is_link"], false);
        assert!(stats["link_target"].is_null());
        assert!(stats.get("file_type").is_none());
    }

    #[test]
    fn test_unexpanded_and_empty_children_are_distinct() {
        let unexpanded = leaf("dir", FileType::Directory);
        let mut empty = leaf("dir", FileType::Directory);
        empty.children = Some(Vec::new());

        let unexpanded_json = serde_json::to_value(&unexpanded).unwrap();
        let empty_json = serde_json::to_value(&empty).unwrap();

        assert!(unexpanded_json["children"].is_null());
        assert_eq!(empty_json["children"], serde_json::json!([]));
        assert!(!unexpanded.is_expanded());
        assert!(empty.is_expanded());
    }

    #[test]
    fn test_msgpack_roundtrip_nested_tree() {
        let mut root = leaf("a", FileType::Directory);
        let mut b = leaf("b", FileType::Directory);
        b.children = Some(vec![leaf("c.txt", FileType::File)]);
        root.children = Some(vec![b, leaf("empty", FileType::Directory)]);

        let envelope = Envelope::new(9, Message::FileTree(root));
        let bytes = envelope.to_msgpack().unwrap();
        let decoded = Envelope::from_msgpack(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_json_envelope_tagging() {
        let envelope = Envelope::new(
            3,
            Message::GetFile(GetFileRequest {
                path: "a".to_string(),
                depth: -1,
            }),
        );
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""type":"GetFile""#));
        assert!(json.contains(r#""depth":-1"#));

        let decoded = Envelope::from_json(&json).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_get_file_depth_defaults_to_zero() {
        let json = r#"{"version":1,"sequence":1,"payload":{"type":"GetFile","data":{"path":"."}}}"#;
        let envelope = Envelope::from_json(json).unwrap();
        match envelope.payload {
            Message::GetFile(req) => assert_eq!(req.depth, 0),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_node_count() {
        let mut root = leaf("a", FileType::Directory);
        let mut b = leaf("b", FileType::Directory);
        b.children = Some(vec![leaf("c.txt", FileType::File)]);
        root.children = Some(vec![b, leaf("d.txt", FileType::File)]);
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn test_entry_count_includes_skipped() {
        let mut dir = leaf("a", FileType::Directory);
        assert_eq!(dir.entry_count(), None);

        dir.children = Some(vec![leaf("b", FileType::Directory)]);
        dir.skipped.push(SkippedEntry {
            path: "/srv/a/pipe".to_string(),
            reason: ErrorCode::UnsupportedFileType,
        });
        assert_eq!(dir.entry_count(), Some(2));
        assert_eq!(dir.node_count(), 2);
    }

    #[test]
    fn test_skipped_defaults_when_absent() {
        let tree = leaf("a.txt", FileType::File);
        let mut value = serde_json::to_value(&tree).unwrap();
        value.as_object_mut().unwrap().remove("skipped");

        let decoded: FileTree = serde_json::from_value(value).unwrap();
        assert!(decoded.skipped.is_empty());
    }

    #[test]
    fn test_sort_children_directories_first() {
        let mut root = leaf("root", FileType::Directory);
        root.children = Some(vec![
            leaf("zebra.txt", FileType::File),
            leaf("Beta", FileType::Directory),
            leaf("apple.txt", FileType::File),
            leaf("alpha", FileType::Directory),
        ]);

        root.sort_children();

        let names: Vec<&str> = root
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.stats.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "Beta", "apple.txt", "zebra.txt"]);
    }

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::PathTraversal.status(), 400);
        assert_eq!(ErrorCode::UnsupportedFileType.status(), 400);
        assert_eq!(ErrorCode::InvalidRequest.status(), 400);
        assert_eq!(ErrorCode::NotFound.status(), 409);
        assert_eq!(ErrorCode::MutationFailed.status(), 500);
        assert_eq!(ErrorCode::InternalError.status(), 500);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedFileType).unwrap();
        assert_eq!(json, r#""unsupported_file_type""#);
    }

    #[test]
    fn test_message_kind() {
        let msg = Message::Delete(DeleteRequest {
            path: "x".to_string(),
        });
        assert_eq!(msg.kind(), "delete");
        assert_eq!(Message::Pong(Pong { timestamp: 0 }).kind(), "pong");
    }
}
