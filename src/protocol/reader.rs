//! Single-reader frame source.
//!
//! Wraps the read half of a connection together with a [`FrameBuffer`] and
//! yields complete frames one at a time. Both roles build their loops on
//! this type: the server's dispatch loop and the client's demultiplexer
//! each own exactly one `FrameReader`, so the socket never has more than
//! one reader.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::frame_buffer::FrameBuffer;
use super::Frame;
use crate::error::Result;

/// Read buffer size for each socket read.
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Pulls complete frames off an async reader.
pub struct FrameReader<R> {
    reader: R,
    buffer: FrameBuffer,
    chunk: Vec<u8>,
    /// Frames decoded but not yet handed out.
    ready: std::collections::VecDeque<Frame>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a frame reader with the default maximum frame size.
    pub fn new(reader: R) -> Self {
        Self::with_buffer(reader, FrameBuffer::new())
    }

    /// Create a frame reader with a custom maximum frame size.
    pub fn with_max_frame_size(reader: R, max_frame_size: u32) -> Self {
        Self::with_buffer(reader, FrameBuffer::with_max_frame_size(max_frame_size))
    }

    fn with_buffer(reader: R, buffer: FrameBuffer) -> Self {
        Self {
            reader,
            buffer,
            chunk: vec![0u8; READ_CHUNK_SIZE],
            ready: std::collections::VecDeque::new(),
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` when the peer closes the connection at a frame
    /// boundary. An EOF inside a header yields
    /// [`FramewireError::TruncatedHeader`](crate::FramewireError::TruncatedHeader);
    /// an EOF inside a promised payload yields
    /// [`FramewireError::TruncatedPayload`](crate::FramewireError::TruncatedPayload).
    /// No frame is ever returned partially.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                return match self.buffer.eof_error() {
                    None => Ok(None),
                    Some(err) => Err(err),
                };
            }

            self.ready.extend(self.buffer.push(&self.chunk[..n])?);
        }
    }

    /// Consume the reader, returning the underlying read half.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
