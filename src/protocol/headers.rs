//! Header block encoding.
//!
//! Header payloads are not HPACK-compressed: a block is a flat sequence of
//! NUL-terminated name/value strings. This keeps header frames opaque to
//! everything except the code that chooses to look inside them.

use bytes::{BufMut, Bytes, BytesMut};

/// Encode name/value pairs as a NUL-delimited header block.
pub fn encode_header_block(pairs: &[(&str, &str)]) -> Bytes {
    let mut buf = BytesMut::new();
    for (name, value) in pairs {
        buf.put_slice(name.as_bytes());
        buf.put_u8(0);
        buf.put_slice(value.as_bytes());
        buf.put_u8(0);
    }
    buf.freeze()
}

/// Decode a NUL-delimited header block into name/value pairs.
///
/// Decoding is lossy by design: a trailing name without a value is
/// dropped, and invalid UTF-8 fields are replaced rather than rejected.
pub fn decode_header_block(payload: &[u8]) -> Vec<(String, String)> {
    let mut fields = payload
        .split(|&b| b == 0)
        .map(|f| String::from_utf8_lossy(f).into_owned());

    let mut pairs = Vec::new();
    while let Some(name) = fields.next() {
        if name.is_empty() {
            continue;
        }
        match fields.next() {
            Some(value) => pairs.push((name, value)),
            None => break,
        }
    }
    pairs
}
