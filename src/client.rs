//! Client role: concurrent exchanges over one connection.
//!
//! The client performs the preface handshake, consumes the server's
//! initial SETTINGS frame, and may then issue any number of logical
//! requests concurrently over the single connection. Each request gets a
//! distinct odd stream id and awaits the frames correlated to it.
//!
//! Reads from one socket are not partitioned per stream, so concurrent
//! requesters must never touch the transport's read side directly:
//! exactly one demultiplexing task owns the [`FrameReader`] and fans
//! decoded frames out to per-stream waiters through channels keyed by
//! stream id.
//!
//! # Example
//!
//! ```ignore
//! use framewire::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("127.0.0.1:8080").await?;
//!
//!     let response = client.request(&[(":method", "GET"), (":path", "/")]).await?;
//!     println!("stream {}: {:?}", response.stream_id, response.body);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::ToSocketAddrs;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{FramewireError, Result};
use crate::handshake::send_preface;
use crate::protocol::{
    decode_header_block, encode_header_block, flags, frame_type, Frame, FrameReader,
    DEFAULT_MAX_FRAME_SIZE, STREAM_ID_MASK,
};
use crate::settings::decode_settings;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Configuration for the client role.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Largest payload accepted from the peer (0 = default).
    pub max_frame_size: u32,
    /// Writer task configuration.
    pub writer: WriterConfig,
}

impl ClientConfig {
    fn max_frame_size(&self) -> u32 {
        if self.max_frame_size == 0 {
            DEFAULT_MAX_FRAME_SIZE
        } else {
            self.max_frame_size
        }
    }
}

/// A completed exchange, matched back to the request that issued it.
#[derive(Debug, Clone)]
pub struct StreamResponse {
    /// The stream id the request was issued on.
    pub stream_id: u32,
    /// Response header pairs accumulated from HEADERS frames.
    pub headers: Vec<(String, String)>,
    /// Response body accumulated from DATA frames.
    pub body: Bytes,
}

/// Per-stream waiters, keyed by stream id.
type PendingMap = Arc<Mutex<HashMap<u32, mpsc::UnboundedSender<Frame>>>>;

/// A connected client.
///
/// Cheap to share behind an `Arc`; every method takes `&self`, so any
/// number of tasks can issue requests concurrently.
pub struct Client {
    writer: WriterHandle,
    pending: PendingMap,
    next_stream_id: AtomicU32,
    /// Set by the demultiplexer when the connection is gone.
    closed: Arc<AtomicBool>,
    read_task: JoinHandle<()>,
}

impl Client {
    /// Connect over cleartext TCP and perform the handshake.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = crate::transport::tcp::connect(addr).await?;
        Self::handshake(stream, ClientConfig::default()).await
    }

    /// Connect over TLS (with ALPN) and perform the handshake.
    ///
    /// `domain` is the server name presented for certificate validation.
    pub async fn connect_tls(
        addr: impl ToSocketAddrs,
        domain: &str,
        connector: tokio_rustls::TlsConnector,
    ) -> Result<Self> {
        let stream = crate::transport::tls::connect(addr, domain, connector).await?;
        Self::handshake(stream, ClientConfig::default()).await
    }

    /// Perform the handshake over an already-established transport.
    ///
    /// Sends the preface, spawns the writer and demultiplexer tasks, and
    /// waits until the server's initial SETTINGS frame has been consumed
    /// (validated only insofar as it decodes) and acknowledged.
    pub async fn handshake<S>(stream: S, config: ClientConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);

        // Preface goes out before any frame traffic
        send_preface(&mut write_half).await?;

        let (writer, _writer_task) = spawn_writer_task(write_half, config.writer.clone());

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let reader = FrameReader::with_max_frame_size(read_half, config.max_frame_size());
        let read_task = tokio::spawn(demux_loop(
            reader,
            pending.clone(),
            closed.clone(),
            writer.clone(),
            ready_tx,
        ));

        // Wait for the server's initial SETTINGS
        ready_rx
            .await
            .map_err(|_| FramewireError::ConnectionClosed)?;

        Ok(Self {
            writer,
            pending,
            next_stream_id: AtomicU32::new(1),
            closed,
            read_task,
        })
    }

    /// Issue a request on the next free stream id.
    ///
    /// Sends one `HEADERS{END_HEADERS|END_STREAM}` frame and resolves once
    /// the `END_STREAM` frame for the same stream id arrives. Any number
    /// of requests may be in flight concurrently.
    pub async fn request(&self, headers: &[(&str, &str)]) -> Result<StreamResponse> {
        let stream_id = self.allocate_stream_id()?;
        self.request_with_stream_id(stream_id, headers).await
    }

    /// Issue a request on an explicit stream id.
    ///
    /// Fails with [`FramewireError::DuplicateStream`] if the id already
    /// has an exchange in flight.
    pub async fn request_with_stream_id(
        &self,
        stream_id: u32,
        headers: &[(&str, &str)],
    ) -> Result<StreamResponse> {
        if stream_id == 0 || stream_id > STREAM_ID_MASK {
            return Err(FramewireError::Protocol(format!(
                "stream id {} outside the 31-bit non-zero range",
                stream_id
            )));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut pending = self.pending.lock().expect("pending lock");
            if pending.contains_key(&stream_id) {
                return Err(FramewireError::DuplicateStream(stream_id));
            }
            pending.insert(stream_id, tx);
        }
        // Slot is removed even if this future is dropped mid-exchange
        let _slot = PendingSlot {
            pending: self.pending.clone(),
            stream_id,
        };

        // The demultiplexer sets `closed` before sweeping the pending map;
        // a slot registered after the sweep would otherwise wait forever.
        if self.closed.load(Ordering::Acquire) {
            return Err(FramewireError::ConnectionClosed);
        }

        let request = Frame::headers(
            stream_id,
            encode_header_block(headers),
            flags::END_HEADERS | flags::END_STREAM,
        );
        self.writer.send_frame(&request).await?;

        let mut response_headers = Vec::new();
        let mut body = BytesMut::new();

        loop {
            let frame = rx.recv().await.ok_or(FramewireError::ConnectionClosed)?;

            match frame.frame_type() {
                frame_type::HEADERS => {
                    response_headers.extend(decode_header_block(frame.payload()));
                }
                frame_type::DATA => {
                    body.extend_from_slice(frame.payload());
                }
                other => {
                    tracing::debug!(stream_id, frame_type = other, "ignoring frame on stream");
                }
            }

            if frame.is_end_stream() {
                break;
            }
        }

        Ok(StreamResponse {
            stream_id,
            headers: response_headers,
            body: body.freeze(),
        })
    }

    /// Allocate the next client-initiated (odd) stream id.
    fn allocate_stream_id(&self) -> Result<u32> {
        let id = self.next_stream_id.fetch_add(2, Ordering::Relaxed);
        if id > STREAM_ID_MASK {
            return Err(FramewireError::Protocol(
                "stream id space exhausted".to_string(),
            ));
        }
        Ok(id)
    }

    /// Check if backpressure is currently active on the write side.
    pub fn is_backpressure_active(&self) -> bool {
        self.writer.is_backpressure_active()
    }

    /// Close the connection, failing all in-flight exchanges.
    pub fn close(&self) {
        self.read_task.abort();
        self.closed.store(true, Ordering::Release);
        self.pending.lock().expect("pending lock").clear();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

/// Removes a pending entry when the issuing caller goes away.
struct PendingSlot {
    pending: PendingMap,
    stream_id: u32,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending
            .lock()
            .expect("pending lock")
            .remove(&self.stream_id);
    }
}

/// The single reader: pulls frames off the wire and fans them out.
async fn demux_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    writer: WriterHandle,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);

    loop {
        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("server closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!("read loop ended: {}", e);
                break;
            }
        };

        if frame.header.is_connection_level() {
            if route_connection_frame(&frame, &writer, &mut ready).await.is_err() {
                break;
            }
        } else {
            route_stream_frame(frame, &pending);
        }
    }

    // Flag first, then sweep: requests observe one or the other
    closed.store(true, Ordering::Release);
    // Dropping the senders fails every in-flight exchange
    pending.lock().expect("pending lock").clear();
}

/// Handle a frame on the connection-level stream.
async fn route_connection_frame(
    frame: &Frame,
    writer: &WriterHandle,
    ready: &mut Option<oneshot::Sender<()>>,
) -> Result<()> {
    match frame.frame_type() {
        frame_type::SETTINGS if !frame.is_ack() => {
            let params = decode_settings(frame.payload());
            tracing::debug!(params = params.len(), "server settings received");

            if let Some(ready) = ready.take() {
                let _ = ready.send(());
            }

            writer.send_frame(&Frame::settings_ack()).await
        }
        frame_type::SETTINGS => Ok(()),
        frame_type::WINDOW_UPDATE => {
            tracing::debug!("window update on connection stream, no credit accounting");
            Ok(())
        }
        other => {
            tracing::debug!(frame_type = other, "unsupported connection-level frame");
            Ok(())
        }
    }
}

/// Route a stream frame to its waiting requester.
fn route_stream_frame(frame: Frame, pending: &PendingMap) {
    let stream_id = frame.stream_id();
    let end_stream = frame.is_end_stream();

    let mut pending = pending.lock().expect("pending lock");
    match pending.get(&stream_id) {
        Some(tx) => {
            let _ = tx.send(frame);
            // The exchange is over once END_STREAM is observed
            if end_stream {
                pending.remove(&stream_id);
            }
        }
        None => {
            tracing::warn!(stream_id, "frame for unknown stream, dropping");
        }
    }
}
