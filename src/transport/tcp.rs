//! Cleartext TCP binding.

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::Result;

/// Bind a listening socket.
pub async fn bind(addr: impl ToSocketAddrs) -> Result<TcpListener> {
    Ok(TcpListener::bind(addr).await?)
}

/// Open a connection.
///
/// Nagle's algorithm is disabled; frames are small and latency-bound.
pub async fn connect(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}
