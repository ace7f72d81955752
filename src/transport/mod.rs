//! Transport bindings.
//!
//! Two interchangeable variants wrap the dispatch loop:
//! - cleartext TCP
//! - TLS with application-protocol negotiation
//!
//! Both yield plain `AsyncRead + AsyncWrite` streams; everything above
//! this module is transport-agnostic.

pub mod tcp;
pub mod tls;
