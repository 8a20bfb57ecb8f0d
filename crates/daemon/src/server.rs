//! TCP server exposing the explorer to remote clients.
//!
//! Each connection carries a sequence of framed request envelopes; every
//! request is answered on the same connection before the next is read.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use protocol::{Envelope, FrameCodec};
use tokio::io::{BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use crate::router::MessageRouter;
use crate::transport::{self, TransportError};

/// A server that listens for explorer clients on a TCP socket.
pub struct ExplorerServer {
    listener: TcpListener,
    codec: FrameCodec,
}

impl ExplorerServer {
    /// Bind the server to `addr`.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            codec: FrameCodec::new(),
        })
    }

    /// Choose whether large responses are LZ4-compressed.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.codec = if enabled {
            FrameCodec::new()
        } else {
            FrameCodec::without_compression()
        };
        self
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    /// Accept a new incoming connection.
    pub async fn accept(&self) -> Result<ExplorerConnection, io::Error> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok(ExplorerConnection::new(stream, peer, self.codec.clone()))
    }

    /// Accept and serve connections until `shutdown` completes.
    ///
    /// Each connection runs on its own task. Connections still open at
    /// shutdown are dropped with the runtime.
    pub async fn serve<F>(self, router: MessageRouter, shutdown: F) -> Result<(), io::Error>
    where
        F: Future<Output = ()>,
    {
        let router = Arc::new(router);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down explorer server");
                    return Ok(());
                }
                accepted = self.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let router = Arc::clone(&router);
                            tokio::spawn(async move {
                                let peer = conn.peer_addr();
                                if let Err(e) = conn.run(&router).await {
                                    warn!(%peer, error = %e, "Connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}

/// A connection to an explorer client.
pub struct ExplorerConnection {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
    peer: SocketAddr,
    codec: FrameCodec,
}

impl ExplorerConnection {
    fn new(stream: TcpStream, peer: SocketAddr, codec: FrameCodec) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            codec,
        }
    }

    /// Address of the connected client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Read the next request from the client.
    ///
    /// Returns `None` if the client has disconnected.
    pub async fn read_request(&mut self) -> Result<Option<Envelope>, TransportError> {
        transport::read_envelope(&mut self.reader, &self.codec).await
    }

    /// Send a response to the client.
    pub async fn send_response(&mut self, response: &Envelope) -> Result<(), TransportError> {
        transport::write_envelope(&mut self.writer, &self.codec, response).await
    }

    /// Answer requests until the client disconnects.
    pub async fn run(mut self, router: &MessageRouter) -> Result<(), TransportError> {
        debug!(peer = %self.peer, "Client connected");

        while let Some(request) = self.read_request().await? {
            if let Some(response) = router.handle_envelope(request).await {
                self.send_response(&response).await?;
            }
        }

        debug!(peer = %self.peer, "Client disconnected");
        Ok(())
    }
}
