//! TLS server demo with ALPN.
//!
//! Expects `server.crt` and `server.key` in the working directory, e.g.:
//! ```bash
//! openssl req -x509 -newkey rsa:2048 -nodes \
//!     -keyout server.key -out server.crt -days 1 -subj "/CN=localhost"
//! cargo run --example tls_server
//! ```

use std::path::Path;
use std::sync::Arc;

use framewire::transport::tls;
use framewire::{Server, StaticResponse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framewire=debug".into()),
        )
        .init();

    let acceptor = tls::acceptor(Path::new("server.crt"), Path::new("server.key"))?;

    let server = Server::bind("127.0.0.1:8443").await?;
    tracing::info!("listening on {} (TLS)", server.local_addr()?);

    server
        .run_tls(Arc::new(StaticResponse::default()), acceptor)
        .await?;
    Ok(())
}
