//! Settings exchange.
//!
//! The first protocol-level exchange after the preface. The server
//! proactively sends one SETTINGS frame; whenever either side receives a
//! SETTINGS frame without the ACK flag, it replies with an empty
//! `SETTINGS{ACK}` on stream 0. A frame that already carries ACK needs no
//! reply.
//!
//! Parameters are 6-byte pairs: a 16-bit Big Endian identifier followed by
//! a 32-bit Big Endian value. Parameters beyond the base set decode fine
//! and are ignored - nothing here is negotiated, only acknowledged.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::Frame;

/// Wire size of one parameter pair.
pub const SETTING_SIZE: usize = 6;

/// Maximum concurrent streams the sender is willing to handle.
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;

/// Initial flow-control window size (advertised, never accounted).
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;

/// A single settings parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    /// Parameter identifier.
    pub id: u16,
    /// Parameter value.
    pub value: u32,
}

impl Setting {
    /// Create a new parameter.
    pub fn new(id: u16, value: u32) -> Self {
        Self { id, value }
    }
}

/// Encode parameters as a SETTINGS payload.
pub fn encode_settings(settings: &[Setting]) -> Bytes {
    let mut buf = BytesMut::with_capacity(settings.len() * SETTING_SIZE);
    for setting in settings {
        buf.put_u16(setting.id);
        buf.put_u32(setting.value);
    }
    buf.freeze()
}

/// Decode a SETTINGS payload into parameters.
///
/// A payload whose length is not a multiple of six is decoded up to the
/// last complete pair; the trailing fragment is logged and dropped.
/// Parameters are accepted but never acted upon, so leniency here cannot
/// change behavior.
pub fn decode_settings(payload: &[u8]) -> Vec<Setting> {
    let trailing = payload.len() % SETTING_SIZE;
    if trailing != 0 {
        tracing::warn!(
            trailing,
            "settings payload not a multiple of {} bytes, ignoring fragment",
            SETTING_SIZE
        );
    }

    payload
        .chunks_exact(SETTING_SIZE)
        .map(|chunk| Setting {
            id: u16::from_be_bytes([chunk[0], chunk[1]]),
            value: u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]),
        })
        .collect()
}

/// The parameter set a server advertises in its initial SETTINGS frame.
pub fn initial_settings() -> Vec<Setting> {
    vec![
        Setting::new(SETTINGS_MAX_CONCURRENT_STREAMS, 100),
        Setting::new(SETTINGS_INITIAL_WINDOW_SIZE, 65_535),
    ]
}

/// Build the server's initial SETTINGS frame.
pub fn initial_settings_frame() -> Frame {
    Frame::settings(encode_settings(&initial_settings()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let payload = encode_settings(&[Setting::new(0x3, 100)]);
        assert_eq!(&payload[..], &[0x00, 0x03, 0x00, 0x00, 0x00, 0x64]);
    }

    #[test]
    fn test_roundtrip() {
        let settings = vec![
            Setting::new(SETTINGS_MAX_CONCURRENT_STREAMS, 100),
            Setting::new(SETTINGS_INITIAL_WINDOW_SIZE, 65_535),
        ];
        let payload = encode_settings(&settings);
        assert_eq!(payload.len(), 2 * SETTING_SIZE);
        assert_eq!(decode_settings(&payload), settings);
    }

    #[test]
    fn test_empty_payload() {
        assert!(decode_settings(b"").is_empty());
    }

    #[test]
    fn test_unknown_parameter_decodes() {
        let payload = encode_settings(&[Setting::new(0x7F00, 1)]);
        let decoded = decode_settings(&payload);
        assert_eq!(decoded, vec![Setting::new(0x7F00, 1)]);
    }

    #[test]
    fn test_trailing_fragment_dropped() {
        let mut payload = encode_settings(&[Setting::new(0x3, 100)]).to_vec();
        payload.extend_from_slice(&[0x00, 0x04, 0x00]); // partial pair

        let decoded = decode_settings(&payload);
        assert_eq!(decoded, vec![Setting::new(0x3, 100)]);
    }

    #[test]
    fn test_initial_settings_frame() {
        let frame = initial_settings_frame();
        assert!(frame.is_settings());
        assert!(!frame.is_ack());
        assert_eq!(frame.stream_id(), 0);
        assert_eq!(frame.payload().len(), 2 * SETTING_SIZE);
    }

    #[test]
    fn test_ack_frame_shape() {
        let ack = Frame::settings_ack();
        assert!(ack.is_settings());
        assert!(ack.is_ack());
        assert_eq!(ack.stream_id(), 0);
        assert!(ack.payload().is_empty());
    }
}
