//! Per-connection dispatch loop (server role).
//!
//! One task exclusively owns the read side of each connection and drives
//! the lifecycle:
//!
//! ```text
//! PrefacePending → SettingsPending → Active → Closed
//! ```
//!
//! Frames are dispatched by type; HEADERS frames spawn bounded handler
//! tasks whose responses funnel through the connection's single writer
//! task. The loop ends on the first decode error, write failure, or clean
//! close; a failed connection is never reused.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::handler::{request_from_block, Handler};
use crate::handshake::expect_preface;
use crate::protocol::{flags, frame_type, Frame, FrameReader, DEFAULT_MAX_FRAME_SIZE};
use crate::settings::{decode_settings, initial_settings_frame};
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Default maximum concurrent handler tasks per connection.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Configuration for a single connection's dispatch loop.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Largest payload accepted from the peer.
    pub max_frame_size: u32,
    /// Cap on concurrently running handler tasks.
    pub max_concurrent_handlers: usize,
    /// Writer task configuration.
    pub writer: WriterConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            writer: WriterConfig::default(),
        }
    }
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Nothing has been exchanged; the preface gate is still closed.
    PrefacePending,
    /// The server's initial SETTINGS is out; the peer's frames are already
    /// dispatched while its acknowledgment is pending.
    SettingsPending,
    /// Steady-state frame routing.
    Active,
    /// Terminal: decode error, write error, or peer close.
    Closed,
}

/// Dispatch state shared by a connection's read loop and handler tasks.
struct Connection {
    state: ConnectionState,
    handler: Arc<dyn Handler>,
    writer: WriterHandle,
    semaphore: Arc<Semaphore>,
    /// Stream ids with a response still being produced.
    in_flight: Arc<Mutex<HashSet<u32>>>,
}

/// Run the dispatch loop for one accepted connection.
///
/// Validates the preface, sends the initial SETTINGS frame, then decodes
/// and dispatches frames until the peer closes the connection or a fatal
/// error occurs. Fatal errors tear the connection down without a
/// protocol-level response.
pub async fn serve_connection<S>(
    stream: S,
    handler: Arc<dyn Handler>,
    config: ConnectionConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (writer, _writer_task) = spawn_writer_task(write_half, config.writer.clone());

    let mut connection = Connection {
        state: ConnectionState::PrefacePending,
        handler,
        writer,
        semaphore: Arc::new(Semaphore::new(config.max_concurrent_handlers)),
        in_flight: Arc::new(Mutex::new(HashSet::new())),
    };

    let result = connection.run(read_half, config.max_frame_size).await;
    connection.transition(ConnectionState::Closed);

    if let Err(ref e) = result {
        tracing::debug!("connection closed: {}", e);
    }
    result
}

impl Connection {
    /// Drive the connection from preface to close.
    async fn run<R>(&mut self, mut read_half: R, max_frame_size: u32) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        // Gate: no frame traffic before a valid preface
        expect_preface(&mut read_half).await?;
        tracing::debug!("valid connection preface");

        self.writer.send_frame(&initial_settings_frame()).await?;
        self.transition(ConnectionState::SettingsPending);

        let mut reader = FrameReader::with_max_frame_size(read_half, max_frame_size);

        while let Some(frame) = reader.next_frame().await? {
            self.dispatch(frame).await?;
        }

        tracing::debug!("peer closed connection");
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::trace!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }

    /// Route one decoded frame by type.
    async fn dispatch(&mut self, frame: Frame) -> Result<()> {
        match frame.frame_type() {
            frame_type::HEADERS => self.dispatch_headers(frame),
            frame_type::SETTINGS => self.dispatch_settings(frame).await?,
            frame_type::WINDOW_UPDATE => {
                let increment = frame
                    .payload()
                    .get(..4)
                    .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) & 0x7FFF_FFFF);
                tracing::debug!(
                    stream_id = frame.stream_id(),
                    ?increment,
                    "window update received, no credit accounting"
                );
            }
            other => {
                tracing::debug!(frame_type = other, "unsupported frame type, skipping");
            }
        }
        Ok(())
    }

    /// SETTINGS handling: ACK inbound parameter frames, absorb ACKs.
    async fn dispatch_settings(&mut self, frame: Frame) -> Result<()> {
        if frame.is_ack() {
            if self.state == ConnectionState::SettingsPending {
                self.transition(ConnectionState::Active);
                tracing::debug!("settings acknowledged, connection active");
            }
            return Ok(());
        }

        let params = decode_settings(frame.payload());
        tracing::debug!(params = params.len(), "settings received");

        self.writer.send_frame(&Frame::settings_ack()).await
    }

    /// HEADERS handling: spawn a handler task for the exchange.
    fn dispatch_headers(&self, frame: Frame) {
        let stream_id = frame.stream_id();

        if stream_id == 0 {
            tracing::warn!("HEADERS frame on the connection-level stream, dropping");
            return;
        }

        {
            let mut in_flight = self.in_flight.lock().expect("in_flight lock");
            if !in_flight.insert(stream_id) {
                tracing::warn!(stream_id, "duplicate stream id in flight, dropping frame");
                return;
            }
        }

        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(stream_id, "handler capacity reached, dropping request");
                self.in_flight.lock().expect("in_flight lock").remove(&stream_id);
                return;
            }
        };

        let request = request_from_block(stream_id, frame.payload_bytes());
        let handler = self.handler.clone();
        let writer = self.writer.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            // Permit is held until this task completes
            let _permit = permit;

            let response = handler.handle(request);

            // Per-stream ordering: HEADERS always precedes DATA
            let headers = Frame::headers(stream_id, response.header_block(), flags::END_HEADERS);
            let data = Frame::data(stream_id, response.body.clone(), flags::END_STREAM);

            let written = async {
                writer.send_frame(&headers).await?;
                writer.send_frame(&data).await
            }
            .await;

            if let Err(e) = written {
                tracing::error!(stream_id, "failed to write response: {}", e);
            }

            in_flight.lock().expect("in_flight lock").remove(&stream_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FramewireError;
    use crate::handler::StaticResponse;
    use crate::handshake::send_preface;
    use crate::protocol::{encode_header_block, FrameHeader};
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWriteExt};

    fn spawn_server(
        peer: tokio::io::DuplexStream,
    ) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(serve_connection(
            peer,
            Arc::new(StaticResponse::default()),
            ConnectionConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_invalid_preface_tears_down() {
        let (mut client, server) = duplex(4096);
        let task = spawn_server(server);

        client.write_all(&[0u8; 24]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(FramewireError::InvalidPreface)));
    }

    #[tokio::test]
    async fn test_sends_initial_settings_after_preface() {
        let (mut client, server) = duplex(4096);
        let _task = spawn_server(server);

        send_preface(&mut client).await.unwrap();

        let mut reader = FrameReader::new(client);
        let frame = reader.next_frame().await.unwrap().unwrap();
        assert!(frame.is_settings());
        assert!(!frame.is_ack());
        assert_eq!(frame.stream_id(), 0);
    }

    #[tokio::test]
    async fn test_clean_close_is_ok() {
        let (mut client, server) = duplex(4096);
        let task = spawn_server(server);

        send_preface(&mut client).await.unwrap();
        drop(client);

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_truncated_payload_closes_connection() {
        let (mut client, server) = duplex(4096);
        let task = spawn_server(server);

        send_preface(&mut client).await.unwrap();

        let header = FrameHeader::new(100, frame_type::DATA, 0, 1);
        client.write_all(&header.encode()).await.unwrap();
        client.write_all(&[0u8; 10]).await.unwrap();
        drop(client);

        let result = task.await.unwrap();
        assert!(matches!(result, Err(FramewireError::TruncatedPayload)));
    }

    #[tokio::test]
    async fn test_oversize_frame_closes_connection() {
        let (mut client, server) = duplex(4096);
        let task = spawn_server(server);

        send_preface(&mut client).await.unwrap();

        let header = FrameHeader::new(DEFAULT_MAX_FRAME_SIZE + 1, frame_type::DATA, 0, 1);
        client.write_all(&header.encode()).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(FramewireError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_headers_produces_response_pair() {
        let (mut client, server) = duplex(4096);
        let _task = spawn_server(server);

        send_preface(&mut client).await.unwrap();

        let request = Frame::headers(
            7,
            encode_header_block(&[(":path", "/")]),
            flags::END_HEADERS | flags::END_STREAM,
        );
        client.write_all(&request.encode()).await.unwrap();

        let mut reader = FrameReader::new(client);

        // initial SETTINGS first
        let settings = reader.next_frame().await.unwrap().unwrap();
        assert!(settings.is_settings());

        let headers = reader.next_frame().await.unwrap().unwrap();
        assert!(headers.is_headers());
        assert!(headers.is_end_headers());
        assert_eq!(headers.stream_id(), 7);

        let data = reader.next_frame().await.unwrap().unwrap();
        assert!(data.is_data());
        assert!(data.is_end_stream());
        assert_eq!(data.stream_id(), 7);
        assert_eq!(data.payload(), b"Hello, H2!");
    }

    #[tokio::test]
    async fn test_settings_ack_rule() {
        let (mut client, server) = duplex(4096);
        let _task = spawn_server(server);

        send_preface(&mut client).await.unwrap();
        let (read_half, mut write_half) = tokio::io::split(client);
        let mut reader = FrameReader::new(read_half);

        // consume the server's initial SETTINGS
        reader.next_frame().await.unwrap().unwrap();

        // a non-ACK SETTINGS gets exactly one empty ACK on stream 0
        write_half
            .write_all(&Frame::settings(Bytes::new()).encode())
            .await
            .unwrap();

        let reply = reader.next_frame().await.unwrap().unwrap();
        assert!(reply.is_settings());
        assert!(reply.is_ack());
        assert_eq!(reply.stream_id(), 0);
        assert!(reply.payload().is_empty());

        // an ACK produces no further reply
        write_half
            .write_all(&Frame::settings_ack().encode())
            .await
            .unwrap();

        let silence =
            tokio::time::timeout(Duration::from_millis(100), reader.next_frame()).await;
        assert!(silence.is_err(), "SETTINGS ACK must not be answered");
    }

    #[tokio::test]
    async fn test_unknown_frame_type_skipped() {
        let (mut client, server) = duplex(4096);
        let _task = spawn_server(server);

        send_preface(&mut client).await.unwrap();

        // unknown type 0x7, then a real request; the connection survives
        let unknown = Frame::new(0x7, 0, 3, Bytes::from_static(b"mystery"));
        client.write_all(&unknown.encode()).await.unwrap();

        let request = Frame::headers(
            9,
            Bytes::new(),
            flags::END_HEADERS | flags::END_STREAM,
        );
        client.write_all(&request.encode()).await.unwrap();

        let mut reader = FrameReader::new(client);
        reader.next_frame().await.unwrap().unwrap(); // SETTINGS

        let headers = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(headers.stream_id(), 9);
    }

    #[tokio::test]
    async fn test_window_update_accepted() {
        let (mut client, server) = duplex(4096);
        let task = spawn_server(server);

        send_preface(&mut client).await.unwrap();

        client
            .write_all(&Frame::window_update(1, 65_535).encode())
            .await
            .unwrap();
        drop(client);

        // accepted and logged, not fatal
        assert!(task.await.unwrap().is_ok());
    }
}
