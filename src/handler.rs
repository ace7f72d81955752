//! Request handling seam for the server role.
//!
//! A connection's dispatch loop turns every inbound HEADERS frame into a
//! [`Request`] and asks its [`Handler`] for a [`Response`]; the loop then
//! writes the response back as one HEADERS frame followed by one DATA
//! frame on the request's stream id.

use bytes::Bytes;

use crate::protocol::{decode_header_block, encode_header_block};

/// A decoded inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Stream id of the exchange; the response is tagged with the same id.
    pub stream_id: u32,
    /// Name/value pairs decoded from the header block (may be empty when
    /// the peer sent an opaque block).
    pub headers: Vec<(String, String)>,
    /// The raw header block, for handlers that treat it opaquely.
    pub header_block: Bytes,
}

/// A response produced by a handler.
#[derive(Debug, Clone)]
pub struct Response {
    /// Response header pairs, encoded into the HEADERS frame.
    pub headers: Vec<(String, String)>,
    /// Response body, carried by the DATA frame.
    pub body: Bytes,
}

impl Response {
    /// A `200` response with the default content type and the given body.
    pub fn with_body(body: impl Into<Bytes>) -> Self {
        Self {
            headers: vec![
                (":status".to_string(), "200".to_string()),
                (
                    "content-type".to_string(),
                    "text/plain; charset=utf-8".to_string(),
                ),
            ],
            body: body.into(),
        }
    }

    /// Encode the response headers as a header block payload.
    pub fn header_block(&self) -> Bytes {
        let pairs: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        encode_header_block(&pairs)
    }
}

/// Produces a response for each inbound request.
///
/// Handlers run on their own tasks; a slow handler never blocks the
/// connection's read loop.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    fn handle(&self, request: Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: Request) -> Response {
        self(request)
    }
}

/// Handler answering every request with the same fixed body.
pub struct StaticResponse {
    body: Bytes,
}

impl StaticResponse {
    /// Respond with the given body.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }
}

impl Default for StaticResponse {
    fn default() -> Self {
        Self::new(&b"Hello, H2!"[..])
    }
}

impl Handler for StaticResponse {
    fn handle(&self, _request: Request) -> Response {
        Response::with_body(self.body.clone())
    }
}

/// Build a [`Request`] from an inbound header block.
pub(crate) fn request_from_block(stream_id: u32, header_block: Bytes) -> Request {
    Request {
        stream_id,
        headers: decode_header_block(&header_block),
        header_block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_response_headers() {
        let response = Response::with_body("hi");
        assert_eq!(response.headers[0].0, ":status");
        assert_eq!(response.headers[0].1, "200");
        assert_eq!(response.headers[1].0, "content-type");
    }

    #[test]
    fn test_static_response_default_body() {
        let handler = StaticResponse::default();
        let request = request_from_block(1, Bytes::new());
        let response = handler.handle(request);
        assert_eq!(&response.body[..], b"Hello, H2!");
    }

    #[test]
    fn test_closure_handler() {
        let handler = |request: Request| Response::with_body(format!("stream {}", request.stream_id));
        let response = handler.handle(request_from_block(9, Bytes::new()));
        assert_eq!(&response.body[..], b"stream 9");
    }

    #[test]
    fn test_request_decodes_headers() {
        let block = encode_header_block(&[(":path", "/"), (":method", "GET")]);
        let request = request_from_block(5, block.clone());

        assert_eq!(request.stream_id, 5);
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.header_block, block);
    }

    #[test]
    fn test_response_header_block_roundtrip() {
        let response = Response::with_body("x");
        let decoded = decode_header_block(&response.header_block());
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0, ":status");
    }
}
