//! Error types for the GMP crate.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GmpError {
    /// TCP connect or TLS handshake failure
    Connection(String),
    /// TLS configuration error
    Tls(String),
    /// Socket read/write failure or premature close
    Io(String),
    /// Response was not well-formed XML
    XmlParse(String),
    /// Response parsed but an expected element or attribute is missing
    MissingField(String),
    /// The console rejected the command (non-2xx status envelope)
    Status { status: String, message: String },
    /// Authentication rejected
    AuthFailed(String),
    /// Invalid parameter passed to a command builder
    InvalidParameter(String),
}

impl fmt::Display for GmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Tls(msg) => write!(f, "TLS error: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::XmlParse(msg) => write!(f, "XML parse error: {}", msg),
            Self::MissingField(msg) => write!(f, "missing field: {}", msg),
            Self::Status { status, message } => {
                write!(f, "console returned status {}: {}", status, message)
            }
            Self::AuthFailed(msg) => write!(f, "authentication failed: {}", msg),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for GmpError {}

pub type GmpResult<T> = Result<T, GmpError>;

impl From<std::io::Error> for GmpError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<quick_xml::Error> for GmpError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for GmpError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(e.to_string())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_status_error() {
        let e = GmpError::Status {
            status: "400".into(),
            message: "Bogus command name".into(),
        };
        assert_eq!(
            e.to_string(),
            "console returned status 400: Bogus command name"
        );
    }

    #[test]
    fn display_connection_error() {
        let e = GmpError::Connection("refused".into());
        assert!(e.to_string().contains("refused"));
    }

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let e: GmpError = io.into();
        assert!(matches!(e, GmpError::Io(_)));
    }

    #[test]
    fn std_error_trait() {
        let e: Box<dyn std::error::Error> = Box::new(GmpError::AuthFailed("nope".into()));
        assert!(e.to_string().contains("nope"));
    }
}
