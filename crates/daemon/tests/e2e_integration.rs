//! End-to-end integration tests for Burrow.
//!
//! These tests verify complete flows work correctly:
//! - Server startup and shutdown
//! - Tree snapshots at each depth regime
//! - Rename, move and delete through the wire protocol
//! - Error codes for traversal and missing paths

use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use daemon::config::Config;
use daemon::{ClientError, ExplorerClient, ExplorerServer, FileExplorer, MessageRouter};
use protocol::{ErrorCode, FileTree, FileType};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running server over a temporary root laid out as
/// `a/b/c.txt`, `a/d/` and `top.txt`.
struct TestServer {
    root: TempDir,
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("a").join("b")).unwrap();
        fs::create_dir_all(root.path().join("a").join("d")).unwrap();
        fs::write(root.path().join("a").join("b").join("c.txt"), "hello world\n").unwrap();
        fs::write(root.path().join("top.txt"), "top").unwrap();

        let explorer = FileExplorer::new(root.path()).unwrap();
        let router = MessageRouter::new(Arc::new(explorer));
        let server = ExplorerServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(router, async move {
            let _ = stop_rx.await;
        }));

        Self {
            root,
            addr,
            stop: Some(stop_tx),
            handle,
        }
    }

    async fn client(&self) -> ExplorerClient {
        ExplorerClient::connect(self.addr).await.unwrap()
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn child_names(tree: &FileTree) -> BTreeSet<String> {
    tree.children
        .as_ref()
        .expect("tree should be expanded")
        .iter()
        .map(|c| c.stats.name.clone())
        .collect()
}

fn remote_code(err: ClientError) -> ErrorCode {
    match err {
        ClientError::Remote { code, .. } => code,
        other => panic!("expected remote error, got {:?}", other),
    }
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[tokio::test]
async fn test_ping() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert!(client.ping().await.unwrap());

    server.shutdown().await;
}

#[tokio::test]
async fn test_tree_depth_zero_has_no_children() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let tree = client.get_file("a", 0).await.unwrap();
    assert_eq!(tree.stats.name, "a");
    assert_eq!(tree.stats.file_type, FileType::Directory);
    assert!(tree.children.is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn test_tree_depth_one_lists_unexpanded_children() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let tree = client.get_file("a", 1).await.unwrap();
    assert_eq!(
        child_names(&tree),
        BTreeSet::from(["b".to_string(), "d".to_string()])
    );
    assert!(tree
        .children
        .unwrap()
        .iter()
        .all(|child| child.children.is_none()));

    server.shutdown().await;
}

#[tokio::test]
async fn test_tree_unbounded_from_root() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let mut tree = client.get_file("", -1).await.unwrap();
    assert_eq!(tree.node_count(), 6);

    tree.sort_children();
    let names: Vec<_> = tree
        .children
        .as_ref()
        .unwrap()
        .iter()
        .map(|c| c.stats.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "top.txt"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_stat_leaf_file() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let stats = client.get_file_stats("a/b/c.txt").await.unwrap();
    assert_eq!(stats.name, "c.txt");
    assert_eq!(stats.file_type, FileType::File);
    assert_eq!(stats.size, 12);
    assert!(stats.path.ends_with("a/b/c.txt"));
    assert!(!stats.is_link);
    assert!(stats.link_target.is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn test_large_tree_survives_compression() {
    let server = TestServer::start().await;
    for i in 0..200 {
        fs::write(
            server.root.path().join("a").join("d").join(format!("entry_{i:03}.log")),
            "x",
        )
        .unwrap();
    }
    let mut client = server.client().await;

    let tree = client.get_file("a/d", 1).await.unwrap();
    assert_eq!(tree.children.as_ref().map(|c| c.len()), Some(200));

    server.shutdown().await;
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[tokio::test]
async fn test_rename_then_stat() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let stats = client.rename("a/b/c.txt", "z.txt").await.unwrap();
    assert_eq!(stats.name, "z.txt");
    assert!(server.root.path().join("a").join("b").join("z.txt").exists());
    assert!(!server.root.path().join("a").join("b").join("c.txt").exists());

    let again = client.get_file_stats("a/b/z.txt").await.unwrap();
    assert_eq!(again.size, 12);

    server.shutdown().await;
}

#[tokio::test]
async fn test_rename_onto_existing_fails() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let err = client.rename("top.txt", "a").await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::MutationFailed);
    assert!(server.root.path().join("top.txt").exists());

    server.shutdown().await;
}

#[tokio::test]
async fn test_move_directory() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let stats = client.move_to("a/b", "moved").await.unwrap();
    assert_eq!(stats.name, "moved");
    assert!(server.root.path().join("moved").join("c.txt").exists());

    let tree = client.get_file("a", 1).await.unwrap();
    assert_eq!(child_names(&tree), BTreeSet::from(["d".to_string()]));

    server.shutdown().await;
}

#[tokio::test]
async fn test_move_outside_root_is_rejected() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let err = client.move_to("top.txt", "../stolen.txt").await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::PathTraversal);
    assert!(server.root.path().join("top.txt").exists());

    server.shutdown().await;
}

#[tokio::test]
async fn test_delete_then_missing() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client.delete("a").await.unwrap();
    assert!(!server.root.path().join("a").exists());

    let err = client.get_file("a", 0).await.unwrap_err();
    let code = remote_code(err);
    assert_eq!(code, ErrorCode::NotFound);
    assert_eq!(code.status(), 409);

    server.shutdown().await;
}

#[tokio::test]
async fn test_delete_root_is_rejected() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let err = client.delete("").await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::PathTraversal);
    assert!(server.root.path().join("top.txt").exists());

    server.shutdown().await;
}

// =============================================================================
// Sandbox Tests
// =============================================================================

#[tokio::test]
async fn test_traversal_and_absolute_paths_are_rejected() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    for bad in ["../etc/passwd", "a/../../b", "/etc/passwd"] {
        let err = client.get_file(bad, 0).await.unwrap_err();
        let code = remote_code(err);
        assert_eq!(code, ErrorCode::PathTraversal, "for {}", bad);
        assert_eq!(code.status(), 400);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_connection_survives_errors() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert!(client.get_file("missing", 0).await.is_err());
    assert!(client.get_file("..", 0).await.is_err());
    assert!(client.get_file("top.txt", 0).await.is_ok());

    server.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_directory_is_a_leaf() {
    let server = TestServer::start().await;
    std::os::unix::fs::symlink(server.root.path(), server.root.path().join("a").join("up"))
        .unwrap();
    let mut client = server.client().await;

    let tree = client.get_file("", -1).await.unwrap();
    assert_eq!(tree.node_count(), 7);

    let stats = client.get_file_stats("a/up").await.unwrap();
    assert!(stats.is_link);
    assert_eq!(stats.file_type, FileType::Directory);
    assert!(stats.link_target.is_some());

    server.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_link_is_reported_as_skipped() {
    let server = TestServer::start().await;
    std::os::unix::fs::symlink(
        server.root.path().join("nowhere"),
        server.root.path().join("a").join("broken"),
    )
    .unwrap();
    let mut client = server.client().await;

    let tree = client.get_file("a", 1).await.unwrap();
    assert_eq!(
        child_names(&tree),
        BTreeSet::from(["b".to_string(), "d".to_string()])
    );
    assert_eq!(tree.entry_count(), Some(3));
    assert_eq!(tree.skipped.len(), 1);
    assert!(tree.skipped[0].path.ends_with("a/broken"));
    assert_eq!(tree.skipped[0].reason, ErrorCode::NotFound);

    server.shutdown().await;
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[tokio::test]
async fn test_server_from_config() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("readme.md"), "# hi").unwrap();

    let mut config = Config::default();
    config.explorer.root = root.path().to_path_buf();
    config.server.listen_addr = "127.0.0.1:0".to_string();
    config.server.compression = false;
    config.validate().unwrap();

    let explorer = FileExplorer::new(&config.explorer.root).unwrap();
    let server = ExplorerServer::bind(config.listen_addr().unwrap())
        .await
        .unwrap()
        .with_compression(config.server.compression);
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve(
        MessageRouter::new(Arc::new(explorer)),
        async move {
            let _ = stop_rx.await;
        },
    ));

    let mut client = ExplorerClient::connect(addr).await.unwrap();
    let tree = client.get_file(".", 1).await.unwrap();
    assert_eq!(child_names(&tree), BTreeSet::from(["readme.md".to_string()]));

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
