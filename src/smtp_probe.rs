//! One-shot SMTP connectivity probe.
//!
//! Logs in to the configured relay, sends one fixed test message, and
//! reports exactly one of four outcomes. The process exits normally
//! whatever happens.

use gvmops_smtp::types::{EmailAddress, SmtpError, SmtpErrorKind};
use gvmops_smtp::{MessageBuilder, SmtpClient};

use crate::config::SmtpSettings;

const PROBE_SENDER: &str = "from@example.com";
const PROBE_RECEIVER: &str = "mailtrap@example.com";

/// The four mutually exclusive probe outcomes.
#[derive(Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Sent,
    BadConnection,
    BadCredentials,
    Error(String),
}

impl ProbeOutcome {
    /// The single line printed for this outcome.
    pub fn message(&self) -> String {
        match self {
            Self::Sent => "Sent".into(),
            Self::BadConnection => {
                "Failed to connect to the server. Bad connection settings?".into()
            }
            Self::BadCredentials => {
                "Failed to connect to the server. Wrong user/password?".into()
            }
            Self::Error(detail) => format!("SMTP error occurred: {}", detail),
        }
    }
}

/// Map an SMTP error to its probe outcome.
pub fn classify(err: &SmtpError) -> ProbeOutcome {
    match err.kind {
        SmtpErrorKind::ConnectionError | SmtpErrorKind::TlsError => ProbeOutcome::BadConnection,
        // A server that drops the connection mid-login reads the same as
        // a rejected login.
        SmtpErrorKind::AuthFailure | SmtpErrorKind::IoError => ProbeOutcome::BadCredentials,
        _ => ProbeOutcome::Error(err.to_string()),
    }
}

/// Run the probe against the configured relay.
pub async fn run(settings: &SmtpSettings) -> ProbeOutcome {
    match try_send(settings).await {
        Ok(()) => ProbeOutcome::Sent,
        Err(e) => classify(&e),
    }
}

async fn try_send(settings: &SmtpSettings) -> Result<(), SmtpError> {
    let message = MessageBuilder::new()
        .from(EmailAddress::new(PROBE_SENDER))
        .to(EmailAddress::new(PROBE_RECEIVER))
        .subject("SMTP connectivity test")
        .text("Testing SMTP mail server.")
        .build()?;

    let mut client = SmtpClient::new(settings.smtp_config());
    client.establish(&settings.credentials()).await?;
    client.send_message(&message).await?;
    client.quit().await?;
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failures_map_to_bad_connection() {
        assert_eq!(
            classify(&SmtpError::connection("refused")),
            ProbeOutcome::BadConnection
        );
        assert_eq!(
            classify(&SmtpError::tls("handshake failed")),
            ProbeOutcome::BadConnection
        );
    }

    #[test]
    fn auth_failures_map_to_bad_credentials() {
        assert_eq!(
            classify(&SmtpError::auth("535 rejected")),
            ProbeOutcome::BadCredentials
        );
        assert_eq!(
            classify(&SmtpError::io("Connection closed by server")),
            ProbeOutcome::BadCredentials
        );
    }

    #[test]
    fn other_smtp_errors_carry_detail() {
        let outcome = classify(&SmtpError::server(552, "quota exceeded"));
        match &outcome {
            ProbeOutcome::Error(detail) => assert!(detail.contains("quota exceeded")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(outcome.message().starts_with("SMTP error occurred: "));
    }

    #[test]
    fn outcome_messages_are_fixed() {
        assert_eq!(ProbeOutcome::Sent.message(), "Sent");
        assert_eq!(
            ProbeOutcome::BadConnection.message(),
            "Failed to connect to the server. Bad connection settings?"
        );
        assert_eq!(
            ProbeOutcome::BadCredentials.message(),
            "Failed to connect to the server. Wrong user/password?"
        );
    }

    #[test]
    fn every_error_kind_has_exactly_one_outcome() {
        use SmtpErrorKind::*;
        for kind in [
            ServerReply,
            AuthFailure,
            TlsError,
            ConnectionError,
            IoError,
            MessageError,
            ConfigError,
            Unknown,
        ] {
            let outcome = classify(&SmtpError::new(kind, "x"));
            // message() is total; each kind lands in one bucket.
            assert!(!outcome.message().is_empty());
        }
    }
}
