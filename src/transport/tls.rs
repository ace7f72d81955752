//! TLS binding with application-protocol negotiation.
//!
//! Certificate and key material is loaded from PEM files supplied by the
//! caller; both sides advertise a single ALPN identifier during the TLS
//! handshake. A peer that negotiated nothing still speaks the same
//! framing, so ALPN is logged rather than enforced - the connection
//! preface remains the real gate.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::{client, TlsAcceptor, TlsConnector};

use crate::error::{FramewireError, Result};

/// The application-protocol identifier advertised during negotiation.
pub const ALPN_PROTOCOL: &[u8] = b"h2";

/// Load a PEM certificate chain.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(FramewireError::Protocol(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Load a PEM private key.
fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)?;
    rustls_pemfile::private_key(&mut BufReader::new(file))?.ok_or_else(|| {
        FramewireError::Protocol(format!("no private key found in {}", path.display()))
    })
}

/// Build the server-side TLS configuration from PEM files.
pub fn server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<rustls::ServerConfig>> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    Ok(Arc::new(config))
}

/// Build a [`TlsAcceptor`] from PEM files.
pub fn acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    Ok(TlsAcceptor::from(server_config(cert_path, key_path)?))
}

/// Build the client-side TLS configuration, trusting the given PEM roots.
pub fn client_config(ca_path: &Path) -> Result<Arc<rustls::ClientConfig>> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in load_certs(ca_path)? {
        roots.add(cert)?;
    }

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    Ok(Arc::new(config))
}

/// Build a [`TlsConnector`] trusting the given PEM roots.
pub fn connector(ca_path: &Path) -> Result<TlsConnector> {
    Ok(TlsConnector::from(client_config(ca_path)?))
}

/// Open a TLS connection and complete the handshake.
pub async fn connect(
    addr: impl ToSocketAddrs,
    domain: &str,
    connector: TlsConnector,
) -> Result<client::TlsStream<TcpStream>> {
    let tcp = super::tcp::connect(addr).await?;

    let server_name = ServerName::try_from(domain.to_string())
        .map_err(|_| FramewireError::Protocol(format!("invalid server name: {domain}")))?;

    let stream = connector.connect(server_name, tcp).await?;

    if let Some(proto) = stream.get_ref().1.alpn_protocol() {
        tracing::debug!(
            protocol = %String::from_utf8_lossy(proto),
            "negotiated application protocol"
        );
    }

    Ok(stream)
}
