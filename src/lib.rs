//! # framewire
//!
//! Minimal HTTP/2-style framed transport engine.
//!
//! framewire implements the handshake and message-framing layer of a
//! simplified multiplexed transport: a 9-byte binary frame header, a
//! fixed connection preface, a SETTINGS exchange with an ACK convention,
//! and correlated request/response exchanges multiplexed over one TCP or
//! TLS connection.
//!
//! ## Architecture
//!
//! - **Frame codec** ([`protocol`]): byte-exact header encode/decode plus
//!   an incremental buffer for fragmented reads
//! - **Handshake** ([`handshake`], [`settings`]): preface gate, then the
//!   SETTINGS/ACK exchange
//! - **Server role** ([`server`], [`connection`], [`handler`]): one
//!   dispatch loop per connection, bounded handler tasks, one serialized
//!   writer
//! - **Client role** ([`client`]): concurrent requests demultiplexed by
//!   stream id through a single reader task
//! - **Transports** ([`transport`]): cleartext TCP or TLS with ALPN
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use framewire::{Client, Server, StaticResponse};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     tokio::spawn(server.run(Arc::new(StaticResponse::default())));
//!
//!     let client = Client::connect("127.0.0.1:8080").await?;
//!     let response = client.request(&[(":method", "GET"), (":path", "/")]).await?;
//!     println!("{}", String::from_utf8_lossy(&response.body));
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod protocol;
pub mod settings;
pub mod transport;
pub mod writer;

mod client;
mod server;

pub use client::{Client, ClientConfig, StreamResponse};
pub use connection::{serve_connection, ConnectionConfig};
pub use error::{FramewireError, Result};
pub use handler::{Handler, Request, Response, StaticResponse};
pub use protocol::{Frame, FrameHeader};
pub use server::Server;
