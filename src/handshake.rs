//! Connection preface handshake.
//!
//! Every connection opens with a fixed 24-byte magic sequence, written by
//! the client and read by the server before any frame traffic. A peer
//! that sends anything else does not speak this protocol: the connection
//! is torn down without a response.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FramewireError, Result};

/// The connection preface, sent verbatim by the client.
pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Server side: read and verify the preface.
///
/// Reads exactly `PREFACE.len()` bytes. A short read or a byte mismatch
/// fails with [`FramewireError::InvalidPreface`]; no frames may be
/// processed after a failure.
pub async fn expect_preface<R: AsyncRead + Unpin>(reader: &mut R) -> Result<()> {
    let mut buf = [0u8; PREFACE.len()];

    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(FramewireError::InvalidPreface);
        }
        filled += n;
    }

    if &buf != PREFACE {
        return Err(FramewireError::InvalidPreface);
    }

    Ok(())
}

/// Client side: write the preface verbatim before the first frame.
pub async fn send_preface<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    writer.write_all(PREFACE).await?;
    writer.flush().await?;
    Ok(())
}
