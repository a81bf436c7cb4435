//! TCP + TLS transport for the console connection.
//!
//! GMP has no length framing: the client writes one XML command and the
//! console answers with one XML document. The transport therefore reads
//! until the response's root element closes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::{GmpError, GmpResult};
use crate::types::{GmpConfig, GmpSecurity};

/// One request/response exchange with the console.
///
/// The trait seams the wire away from [`crate::client::GmpClient`] so the
/// operations can be driven against a scripted transport in tests.
#[async_trait]
pub trait GmpTransport: Send {
    async fn exchange(&mut self, request: &str) -> GmpResult<String>;
}

// ─── Stream abstraction ─────────────────────────────────────────────

enum GmpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl GmpStream {
    async fn write_all(&mut self, data: &[u8]) -> GmpResult<()> {
        match self {
            Self::Plain(s) => s.write_all(data).await.map_err(|e| GmpError::Io(e.to_string())),
            Self::Tls(s) => s.write_all(data).await.map_err(|e| GmpError::Io(e.to_string())),
        }
    }

    async fn flush(&mut self) -> GmpResult<()> {
        match self {
            Self::Plain(s) => s.flush().await.map_err(|e| GmpError::Io(e.to_string())),
            Self::Tls(s) => s.flush().await.map_err(|e| GmpError::Io(e.to_string())),
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> GmpResult<usize> {
        match self {
            Self::Plain(s) => s.read(buf).await.map_err(|e| GmpError::Io(e.to_string())),
            Self::Tls(s) => s.read(buf).await.map_err(|e| GmpError::Io(e.to_string())),
        }
    }
}

// ─── TlsTransport ───────────────────────────────────────────────────

/// The production transport: a connected socket, optionally TLS-wrapped.
pub struct TlsTransport {
    stream: GmpStream,
    io_timeout: Duration,
}

impl TlsTransport {
    /// Connect to the console per the configuration.
    pub async fn connect(config: &GmpConfig) -> GmpResult<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!("connecting to console at {}", addr);

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let tcp = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| GmpError::Connection(format!("connect to {} timed out", addr)))?
            .map_err(|e| GmpError::Connection(format!("connect to {} failed: {}", addr, e)))?;
        tcp.set_nodelay(true).ok();

        let stream = match config.security {
            GmpSecurity::Plain => GmpStream::Plain(tcp),
            GmpSecurity::Tls => {
                let connector = build_tls_connector(config.verify_certificates)?;
                let server_name =
                    rustls::pki_types::ServerName::try_from(config.host.clone())
                        .map_err(|e| GmpError::Tls(format!("invalid server name: {}", e)))?;
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| GmpError::Tls(format!("TLS handshake failed: {}", e)))?;
                GmpStream::Tls(Box::new(tls))
            }
        };

        Ok(Self {
            stream,
            io_timeout: Duration::from_secs(config.io_timeout_secs),
        })
    }
}

#[async_trait]
impl GmpTransport for TlsTransport {
    async fn exchange(&mut self, request: &str) -> GmpResult<String> {
        self.stream.write_all(request.as_bytes()).await?;
        self.stream.flush().await?;

        let mut response = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = timeout(self.io_timeout, self.stream.read(&mut chunk))
                .await
                .map_err(|_| GmpError::Io("read timed out".into()))??;
            if n == 0 {
                return Err(GmpError::Io("connection closed by console".into()));
            }
            response.extend_from_slice(&chunk[..n]);
            if document_complete(&response) {
                break;
            }
        }

        String::from_utf8(response)
            .map_err(|_| GmpError::XmlParse("response is not valid UTF-8".into()))
    }
}

// ─── Document framing ───────────────────────────────────────────────

/// Whether `buf` holds at least one complete XML document: the depth of
/// open elements returned to zero after the root element.
///
/// Scans tags with a small state machine (quote-aware inside tags,
/// skipping `<?...?>`, `<!--...-->` and other `<!...>` constructs) so a
/// response split across TCP segments is detected without re-parsing.
pub(crate) fn document_complete(buf: &[u8]) -> bool {
    let mut depth: i32 = 0;
    let mut seen_element = false;
    let mut i = 0;

    while i < buf.len() {
        if buf[i] != b'<' {
            i += 1;
            continue;
        }

        // Comments, declarations, processing instructions.
        if buf[i..].starts_with(b"<!--") {
            match find_sub(&buf[i..], b"-->") {
                Some(end) => {
                    i += end + 3;
                    continue;
                }
                None => return false,
            }
        }
        if i + 1 < buf.len() && (buf[i + 1] == b'?' || buf[i + 1] == b'!') {
            match scan_tag_end(buf, i) {
                Some(end) => {
                    i = end + 1;
                    continue;
                }
                None => return false,
            }
        }

        let closing = i + 1 < buf.len() && buf[i + 1] == b'/';
        let end = match scan_tag_end(buf, i) {
            Some(end) => end,
            None => return false,
        };

        if closing {
            depth -= 1;
        } else if buf[end - 1] == b'/' {
            // self-closing: depth unchanged
            seen_element = true;
        } else {
            depth += 1;
            seen_element = true;
        }

        if seen_element && depth <= 0 {
            return true;
        }
        i = end + 1;
    }
    false
}

/// Index of the `>` closing the tag that starts at `start`, honouring
/// quoted attribute values.
fn scan_tag_end(buf: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (off, &b) in buf[start..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(start + off),
                _ => {}
            },
        }
    }
    None
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ─── TLS setup ──────────────────────────────────────────────────────

fn build_tls_connector(verify_certificates: bool) -> GmpResult<TlsConnector> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if !verify_certificates {
        warn!("TLS certificate verification disabled for the console connection");
        tls_config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerifier));
    }

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

#[derive(Debug)]
struct NoCertVerifier;

impl rustls::client::danger::ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
        ]
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
