//! Cleartext client demo: five concurrent requests over one connection.
//!
//! Run the server demo first, then:
//! ```bash
//! cargo run --example client
//! ```

use std::sync::Arc;

use framewire::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framewire=debug".into()),
        )
        .init();

    let client = Arc::new(Client::connect("127.0.0.1:8080").await?);

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .request(&[(":method", "GET"), (":path", "/")])
                .await
        }));
    }

    for task in tasks {
        let response = task.await??;
        println!(
            "stream {}: {}",
            response.stream_id,
            String::from_utf8_lossy(&response.body)
        );
    }

    Ok(())
}
