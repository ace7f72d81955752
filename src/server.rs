//! Accept loop for the server role.
//!
//! One task accepts connections and spawns a dispatch loop per accepted
//! connection. Accept-level errors are logged and the loop continues;
//! handshake and frame errors only ever kill their own connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::ToSocketAddrs;
use tokio_rustls::TlsAcceptor;

use crate::connection::{serve_connection, ConnectionConfig};
use crate::error::Result;
use crate::handler::Handler;
use crate::transport;

/// A bound server, ready to accept connections.
pub struct Server {
    listener: tokio::net::TcpListener,
    config: ConnectionConfig,
}

impl Server {
    /// Bind the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self {
            listener: transport::tcp::bind(addr).await?,
            config: ConnectionConfig::default(),
        })
    }

    /// Replace the per-connection configuration.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// The bound local address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept cleartext connections forever.
    pub async fn run(self, handler: Arc<dyn Handler>) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("accept failed: {}", e);
                    continue;
                }
            };

            tracing::debug!(%peer, "accepted connection");
            let _ = stream.set_nodelay(true);

            let handler = handler.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, handler, config).await {
                    tracing::warn!(%peer, "connection error: {}", e);
                }
            });
        }
    }

    /// Accept TLS connections forever.
    ///
    /// Each accepted socket goes through the TLS handshake (with ALPN)
    /// before the protocol handshake; a failed TLS handshake only costs
    /// that connection.
    pub async fn run_tls(self, handler: Arc<dyn Handler>, acceptor: TlsAcceptor) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("accept failed: {}", e);
                    continue;
                }
            };

            tracing::debug!(%peer, "accepted connection");
            let _ = stream.set_nodelay(true);

            let handler = handler.clone();
            let config = self.config.clone();
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let tls_stream = match acceptor.accept(stream).await {
                    Ok(tls_stream) => tls_stream,
                    Err(e) => {
                        tracing::warn!(%peer, "TLS handshake failed: {}", e);
                        return;
                    }
                };

                if let Some(proto) = tls_stream.get_ref().1.alpn_protocol() {
                    tracing::debug!(
                        %peer,
                        protocol = %String::from_utf8_lossy(proto),
                        "negotiated application protocol"
                    );
                }

                if let Err(e) = serve_connection(tls_stream, handler, config).await {
                    tracing::warn!(%peer, "connection error: {}", e);
                }
            });
        }
    }
}
