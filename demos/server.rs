//! Cleartext server demo.
//!
//! Run with:
//! ```bash
//! cargo run --example server
//! ```
//!
//! Then exercise it with the client demo, or with curl:
//! ```bash
//! curl --http2-prior-knowledge -v http://localhost:8080
//! ```
//! (curl will send a real HPACK header block; the handler treats it as an
//! opaque blob and answers the same way regardless.)

use std::sync::Arc;

use framewire::{Server, StaticResponse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framewire=debug".into()),
        )
        .init();

    let server = Server::bind("127.0.0.1:8080").await?;
    tracing::info!("listening on {}", server.local_addr()?);

    server.run(Arc::new(StaticResponse::default())).await?;
    Ok(())
}
