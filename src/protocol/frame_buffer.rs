//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 9 bytes
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//!
//! Decoding is all-or-nothing: a frame is surfaced only once every byte
//! its header promised has arrived.

use bytes::{Bytes, BytesMut};

use super::wire_format::{FrameHeader, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
use super::Frame;
use crate::error::{FramewireError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 9 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: FrameHeader },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Uses a state machine to handle partial reads efficiently.
/// All data is stored in a single `BytesMut` buffer to minimize allocations.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 16KB, max payload: 16KB.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom max payload size.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// This is the main API for processing incoming data from the socket.
    /// Returns a vector of complete frames. If data is fragmented,
    /// partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns [`FramewireError::FrameTooLarge`] if a header claims a
    /// payload beyond `max_frame_size`; the oversize payload is never
    /// buffered.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < FRAME_HEADER_SIZE {
                    return Ok(None);
                }

                let header = FrameHeader::decode(&self.buffer[..FRAME_HEADER_SIZE])
                    .expect("buffer has enough bytes");

                header.validate(self.max_frame_size)?;

                let _ = self.buffer.split_to(FRAME_HEADER_SIZE);

                if header.length == 0 {
                    return Ok(Some(Frame::from_wire(header, Bytes::new())));
                }

                self.state = State::WaitingForPayload { header };

                // The payload may already be buffered
                self.try_extract_one()
            }

            State::WaitingForPayload { header } => {
                let needed = header.length as usize;

                if self.buffer.len() < needed {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(needed).freeze();
                let header = *header;

                self.state = State::WaitingForHeader;

                Ok(Some(Frame::from_wire(header, payload)))
            }
        }
    }

    /// Classify an EOF observed while this buffer is mid-frame.
    ///
    /// Returns `None` when the buffer sits at a frame boundary (a clean
    /// close), [`FramewireError::TruncatedHeader`] when the peer stopped
    /// inside the 9-byte header, and [`FramewireError::TruncatedPayload`]
    /// when a header promised payload bytes that never arrived.
    pub fn eof_error(&self) -> Option<FramewireError> {
        match &self.state {
            State::WaitingForHeader if self.buffer.is_empty() => None,
            State::WaitingForHeader => Some(FramewireError::TruncatedHeader),
            State::WaitingForPayload { .. } => Some(FramewireError::TruncatedPayload),
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{flags, frame_type};

    /// Helper to create a valid frame as bytes.
    fn make_frame_bytes(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
        Frame::new(frame_type, flags, stream_id, Bytes::copy_from_slice(payload)).encode()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(frame_type::DATA, flags::END_STREAM, 42, b"hello");

        let frames = buffer.push(&frame_bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].stream_id(), 42);
        assert!(frames[0].is_end_stream());
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&make_frame_bytes(frame_type::HEADERS, 0, 1, b"first"));
        combined.extend_from_slice(&make_frame_bytes(frame_type::DATA, 0, 3, b"second"));
        combined.extend_from_slice(&make_frame_bytes(frame_type::SETTINGS, 0, 0, b""));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].stream_id(), 1);
        assert_eq!(frames[1].stream_id(), 3);
        assert!(frames[2].is_settings());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(frame_type::DATA, 0, 42, b"test");

        // Push first 5 bytes of header
        let frames = buffer.push(&frame_bytes[..5]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        // Push rest of header and payload
        let frames = buffer.push(&frame_bytes[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"test");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let frame_bytes = make_frame_bytes(frame_type::DATA, 0, 42, payload);

        let partial_len = FRAME_HEADER_SIZE + 10;
        let frames = buffer.push(&frame_bytes[..partial_len]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&frame_bytes[partial_len..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(frame_type::SETTINGS, flags::ACK, 0, b"");

        let frames = buffer.push(&frame_bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload().is_empty());
        assert!(frames[0].is_ack());
    }

    #[test]
    fn test_max_frame_size_validation() {
        let mut buffer = FrameBuffer::with_max_frame_size(100);

        // Header claiming a 1000 byte payload, no payload attached
        let header = FrameHeader::new(1000, frame_type::DATA, 0, 1);
        let result = buffer.push(&header.encode());

        assert!(matches!(
            result,
            Err(FramewireError::FrameTooLarge { length: 1000, max: 100 })
        ));
    }

    #[test]
    fn test_eof_classification() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.eof_error().is_none(), "fresh buffer is a clean boundary");

        let frame_bytes = make_frame_bytes(frame_type::DATA, 0, 1, b"payload");

        buffer.push(&frame_bytes[..4]).unwrap();
        assert!(matches!(
            buffer.eof_error(),
            Some(FramewireError::TruncatedHeader)
        ));

        buffer.push(&frame_bytes[4..FRAME_HEADER_SIZE + 2]).unwrap();
        assert!(matches!(
            buffer.eof_error(),
            Some(FramewireError::TruncatedPayload)
        ));

        buffer.push(&frame_bytes[FRAME_HEADER_SIZE + 2..]).unwrap();
        assert!(buffer.eof_error().is_none());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(frame_type::DATA, 0, 42, b"test");

        buffer.push(&frame_bytes[..FRAME_HEADER_SIZE]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = make_frame_bytes(frame_type::HEADERS, 0, 1, b"first");
        let frame2 = make_frame_bytes(frame_type::DATA, 0, 3, b"second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].stream_id(), 1);

        let frames = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].stream_id(), 3);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(frame_type::DATA, 0, 42, b"hi");

        let mut all_frames = Vec::new();
        for byte in &frame_bytes {
            let frames = buffer.push(&[*byte]).unwrap();
            all_frames.extend(frames);
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].stream_id(), 42);
        assert_eq!(all_frames[0].payload(), b"hi");
    }
}
