//! # Burrow Daemon Library
//!
//! This crate provides a sandboxed file explorer and the network service
//! that exposes it to remote file-browser clients.
//!
//! ## Overview
//!
//! - **Path Sandbox**: Every client path is resolved against one root and
//!   rejected if it contains `..` or is absolute
//! - **File Nodes**: Metadata snapshots, depth-bounded tree listings, and
//!   rename, move and delete
//! - **Server**: A TCP service speaking the framed MessagePack protocol from
//!   the `protocol` crate
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                 ExplorerServer (TCP)               │
//! ├────────────────────────────────────────────────────┤
//! │                   Message Router                   │
//! │            (tokio blocking pool per call)          │
//! ├────────────────────────────────────────────────────┤
//! │                    FileExplorer                    │
//! │  ┌─────────────┐  ┌──────────┐  ┌───────────────┐  │
//! │  │ PathSandbox │  │ FileNode │  │   Metadata    │  │
//! │  │             │  │          │  │   Extractor   │  │
//! │  └─────────────┘  └──────────┘  └───────────────┘  │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::FileExplorer;
//!
//! fn main() -> Result<(), daemon::ExplorerError> {
//!     let explorer = FileExplorer::new("/srv/share")?;
//!     let tree = explorer.get_file("projects")?.to_tree(2)?;
//!     println!("{} entries", tree.node_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`explorer`]: Sandboxed filesystem access
//! - [`router`]: Message routing to the explorer
//! - [`server`]: TCP listener and per-connection loop
//! - [`client`]: Request/response client
//! - [`transport`]: Framed envelope I/O

pub mod client;
pub mod config;
pub mod explorer;
pub mod router;
pub mod server;
pub mod transport;

// Re-export protocol for convenience
pub use protocol;

pub use client::{ClientError, ExplorerClient};
pub use config::{Config, ConfigError};
pub use explorer::{
    ExplorerError, FileExplorer, FileNode, FileStats, Listing, MetadataExtractor,
    OwnershipResolver, PathSandbox, ResolvedPath,
};
pub use router::{MessageRouter, RouterError, RouterResult};
pub use server::{ExplorerConnection, ExplorerServer};
pub use transport::TransportError;
