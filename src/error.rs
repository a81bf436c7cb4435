//! Error type for the gvmops tools.

use gvmops_gmp::GmpError;
use gvmops_smtp::SmtpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Gmp(#[from] GmpError),

    #[error(transparent)]
    Smtp(#[from] SmtpError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let e = ToolError::Config("SMTP_PORT is not set".into());
        assert_eq!(e.to_string(), "configuration error: SMTP_PORT is not set");
    }

    #[test]
    fn gmp_error_is_transparent() {
        let e: ToolError = GmpError::AuthFailed("denied".into()).into();
        assert_eq!(e.to_string(), "authentication failed: denied");
    }

    #[test]
    fn smtp_error_is_transparent() {
        let e: ToolError = SmtpError::connection("refused").into();
        assert!(e.to_string().contains("refused"));
    }
}
