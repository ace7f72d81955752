//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary framing layer:
//! - 9-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Single-reader frame source with truncation classification
//! - Frame struct with typed accessors
//! - NUL-delimited header blocks

mod frame;
mod frame_buffer;
mod headers;
mod reader;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use headers::{decode_header_block, encode_header_block};
pub use reader::FrameReader;
pub use wire_format::{
    flags, frame_type, FrameHeader, ABSOLUTE_MAX_FRAME_SIZE, CONNECTION_STREAM_ID,
    DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, STREAM_ID_MASK,
};
