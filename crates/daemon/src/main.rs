//! Burrow
//!
//! Sandboxed file explorer service and its command-line client.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::{ExplorerClient, ExplorerServer, FileExplorer, MessageRouter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Burrow - browse and manage a sandboxed directory over the network.
#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server address for client commands (defaults to server.listen_addr)
    #[arg(long, global = true, value_name = "ADDR")]
    pub addr: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve a directory to remote clients
    Serve {
        /// Directory to expose (overrides explorer.root)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Address to listen on (overrides server.listen_addr)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Print the tree below a path as JSON
    Tree {
        /// Path relative to the served root
        #[arg(default_value = ".")]
        path: String,

        /// Levels to expand; negative expands everything
        #[arg(long, short, default_value_t = 0, allow_negative_numbers = true)]
        depth: i64,

        /// Sort children, directories first
        #[arg(long)]
        sort: bool,
    },

    /// Print metadata of one entry as JSON
    Stat {
        /// Path relative to the served root
        path: String,
    },

    /// Rename an entry within its directory
    Rename {
        /// Path relative to the served root
        path: String,

        /// New file name
        new_name: String,
    },

    /// Move an entry to another path under the root
    Mv {
        /// Path relative to the served root
        path: String,

        /// Destination relative to the served root
        destination: String,
    },

    /// Delete an entry (directories recursively)
    Rm {
        /// Path relative to the served root
        path: String,
    },

    /// Check that the server is responsive
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.to_lowercase()
    };
    let _log_guard = init_tracing(&level, config.daemon.log_file.as_deref())?;

    match cli.command {
        Commands::Serve { root, listen } => {
            if let Some(root) = root {
                config.explorer.root = root;
            }
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            run_server(config).await
        }
        command => {
            let addr = cli
                .addr
                .clone()
                .unwrap_or_else(|| config.server.listen_addr.clone());
            let timeout = Duration::from_secs(config.server.request_timeout_secs.max(1));
            let mut client = ExplorerClient::connect_with_timeout(addr.as_str(), timeout)
                .await
                .with_context(|| format!("Failed to connect to burrow server at {}", addr))?;
            run_client_command(&mut client, command).await
        }
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let listen_addr = config.listen_addr()?;

    let explorer = FileExplorer::new(&config.explorer.root).with_context(|| {
        format!(
            "Failed to open explorer root {}",
            config.explorer.root.display()
        )
    })?;
    tracing::info!("Serving {}", explorer.root().display());

    let router = MessageRouter::new(Arc::new(explorer));
    let server = ExplorerServer::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?
        .with_compression(config.server.compression);
    tracing::info!("Listening on {}", server.local_addr()?);

    server.serve(router, wait_for_shutdown_signal()).await?;
    tracing::info!("Burrow stopped");
    Ok(())
}

async fn run_client_command(client: &mut ExplorerClient, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Tree { path, depth, sort } => {
            let mut tree = client.get_file(&path, depth).await?;
            if sort {
                tree.sort_children();
            }
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Commands::Stat { path } => {
            let stats = client.get_file_stats(&path).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Rename { path, new_name } => {
            let stats = client.rename(&path, &new_name).await?;
            println!("{}", stats.path);
        }
        Commands::Mv { path, destination } => {
            let stats = client.move_to(&path, &destination).await?;
            println!("{}", stats.path);
        }
        Commands::Rm { path } => {
            client.delete(&path).await?;
            println!("Deleted {}", path);
        }
        Commands::Ping => {
            let started = Instant::now();
            if client.ping().await? {
                println!("pong ({} ms)", started.elapsed().as_millis());
            } else {
                anyhow::bail!("server answered ping with an unexpected message");
            }
        }
        Commands::Serve { .. } => unreachable!("serve is handled before connecting"),
    }
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// With a log file, output goes through a non-blocking daily-rotated
/// appender whose guard must live until exit.
fn init_tracing(level: &str, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(log_file) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let directory = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("log_file has no file name: {}", log_file.display()))?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("Failed to register SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl-C");
    }
}
