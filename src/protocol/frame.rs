//! Frame struct with typed accessors and constructors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use framewire::protocol::{flags, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::data(42, Bytes::from_static(b"hello"), flags::END_STREAM);
//!
//! assert_eq!(frame.stream_id(), 42);
//! assert!(frame.is_end_stream());
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{flags, frame_type, FrameHeader, CONNECTION_STREAM_ID, FRAME_HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: FrameHeader,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    ///
    /// The header's length field is derived from the payload here, never
    /// taken from the caller; a frame with a mismatched length cannot be
    /// constructed.
    pub fn new(frame_type: u8, flags: u8, stream_id: u32, payload: Bytes) -> Self {
        Self {
            header: FrameHeader::new(payload.len() as u32, frame_type, flags, stream_id),
            payload,
        }
    }

    /// Reassemble a frame from a header read off the wire and its payload.
    ///
    /// Used by the decode path, which has already read exactly
    /// `header.length` payload bytes.
    pub(crate) fn from_wire(header: FrameHeader, payload: Bytes) -> Self {
        debug_assert_eq!(header.length as usize, payload.len());
        Self { header, payload }
    }

    /// Construct a HEADERS frame.
    pub fn headers(stream_id: u32, payload: Bytes, flags: u8) -> Self {
        Self::new(frame_type::HEADERS, flags, stream_id, payload)
    }

    /// Construct a DATA frame.
    pub fn data(stream_id: u32, payload: Bytes, flags: u8) -> Self {
        Self::new(frame_type::DATA, flags, stream_id, payload)
    }

    /// Construct a SETTINGS frame on the connection-level stream.
    pub fn settings(payload: Bytes) -> Self {
        Self::new(frame_type::SETTINGS, 0, CONNECTION_STREAM_ID, payload)
    }

    /// Construct the empty SETTINGS acknowledgment frame.
    pub fn settings_ack() -> Self {
        Self::new(
            frame_type::SETTINGS,
            flags::ACK,
            CONNECTION_STREAM_ID,
            Bytes::new(),
        )
    }

    /// Construct a WINDOW_UPDATE frame carrying a credit increment.
    pub fn window_update(stream_id: u32, increment: u32) -> Self {
        Self::new(
            frame_type::WINDOW_UPDATE,
            0,
            stream_id,
            Bytes::copy_from_slice(&increment.to_be_bytes()),
        )
    }

    /// Encode the whole frame as a single byte vector.
    ///
    /// Produces exactly `9 + payload.len()` bytes; the length field is
    /// re-derived from the payload so it cannot drift.
    pub fn encode(&self) -> Vec<u8> {
        let mut header = self.header;
        header.length = self.payload.len() as u32;

        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Get the stream identifier.
    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.header.stream_id
    }

    /// Get the frame type code.
    #[inline]
    pub fn frame_type(&self) -> u8 {
        self.header.frame_type
    }

    /// Get the flags byte.
    #[inline]
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// Check if this is a DATA frame.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.header.frame_type == frame_type::DATA
    }

    /// Check if this is a HEADERS frame.
    #[inline]
    pub fn is_headers(&self) -> bool {
        self.header.frame_type == frame_type::HEADERS
    }

    /// Check if this is a SETTINGS frame.
    #[inline]
    pub fn is_settings(&self) -> bool {
        self.header.frame_type == frame_type::SETTINGS
    }

    /// Check if this is a WINDOW_UPDATE frame.
    #[inline]
    pub fn is_window_update(&self) -> bool {
        self.header.frame_type == frame_type::WINDOW_UPDATE
    }

    /// Check if the ACK flag is set (meaningful on SETTINGS).
    #[inline]
    pub fn is_ack(&self) -> bool {
        flags::has_flag(self.header.flags, flags::ACK)
    }

    /// Check if the END_STREAM flag is set.
    #[inline]
    pub fn is_end_stream(&self) -> bool {
        flags::has_flag(self.header.flags, flags::END_STREAM)
    }

    /// Check if the END_HEADERS flag is set.
    #[inline]
    pub fn is_end_headers(&self) -> bool {
        flags::has_flag(self.header.flags, flags::END_HEADERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;

    #[test]
    fn test_frame_length_derived_from_payload() {
        let frame = Frame::data(1, Bytes::from_static(b"hello"), 0);
        assert_eq!(frame.header.length, 5);
        assert_eq!(frame.payload(), b"hello");
    }

    #[test]
    fn test_frame_empty_payload() {
        let frame = Frame::settings_ack();
        assert_eq!(frame.header.length, 0);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_frame_accessors() {
        let headers = Frame::headers(
            7,
            Bytes::from_static(b"block"),
            flags::END_HEADERS | flags::END_STREAM,
        );
        assert!(headers.is_headers());
        assert!(headers.is_end_headers());
        assert!(headers.is_end_stream());
        assert!(!headers.is_data());
        assert_eq!(headers.stream_id(), 7);

        let ack = Frame::settings_ack();
        assert!(ack.is_settings());
        assert!(ack.is_ack());
        assert_eq!(ack.stream_id(), CONNECTION_STREAM_ID);
    }

    #[test]
    fn test_window_update_payload() {
        let frame = Frame::window_update(3, 0x0001_0000);
        assert!(frame.is_window_update());
        assert_eq!(frame.payload(), &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_layout() {
        let frame = Frame::data(1, Bytes::from_static(b"Hello, H2!"), flags::END_STREAM);
        let bytes = frame.encode();

        assert_eq!(bytes.len(), FRAME_HEADER_SIZE + 10);
        assert_eq!(&bytes[..3], &[0x00, 0x00, 0x0A]); // length 10
        assert_eq!(bytes[3], frame_type::DATA);
        assert_eq!(bytes[4], flags::END_STREAM);
        assert_eq!(&bytes[5..9], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&bytes[9..], b"Hello, H2!");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = Frame::headers(
            0x7FFF_FFFF,
            Bytes::from_static(b"k\0v\0"),
            flags::END_HEADERS,
        );
        let bytes = original.encode();

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], original);
    }

    #[test]
    fn test_payload_bytes_zero_copy() {
        let original = Bytes::from_static(b"test data");
        let frame = Frame::data(1, original.clone(), 0);

        let cloned = frame.payload_bytes();
        assert_eq!(cloned, original);
        assert_eq!(cloned.as_ptr(), original.as_ptr());
    }
}
