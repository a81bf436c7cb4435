//! Environment-driven settings for the mailer and probe tools.
//!
//! All SMTP/interval/tag settings are required at startup; a missing or
//! malformed variable is a fatal configuration error. Mail envelope
//! settings are optional and defaulted.

use std::env;

use gvmops_smtp::types::{EmailAddress, SmtpConfig, SmtpCredentials};

use crate::error::ToolError;

const DEFAULT_EMAIL_FROM: &str = "admin@example.com";
const DEFAULT_EMAIL_TO: &str = "user1@example.com,user2@example.com";
const DEFAULT_EMAIL_SUBJECT: &str = "Delta Report";

/// SMTP relay settings (`SMTP_DOMAIN`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASS`).
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SmtpSettings {
    pub fn from_env() -> Result<Self, ToolError> {
        Ok(Self {
            host: required_env("SMTP_DOMAIN")?,
            port: parse_port("SMTP_PORT", &required_env("SMTP_PORT")?)?,
            username: required_env("SMTP_USER")?,
            password: required_env("SMTP_PASS")?,
        })
    }

    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            host: self.host.clone(),
            port: self.port,
            ..Default::default()
        }
    }

    pub fn credentials(&self) -> SmtpCredentials {
        SmtpCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
            method: None,
        }
    }
}

/// Delta-mailer settings: loop interval, tag names, relay and envelope.
#[derive(Debug, Clone)]
pub struct MailerSettings {
    /// Minutes between cycles (`DELTA_MAIL_INT`).
    pub interval_minutes: u64,
    /// Tag selecting the tasks to report on (`REPORT_TAG`).
    pub task_tag: String,
    /// Tag marking a report as already mailed (`SENT_TAG`).
    pub sent_tag: String,
    pub smtp: SmtpSettings,
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
}

impl MailerSettings {
    pub fn from_env() -> Result<Self, ToolError> {
        let interval_raw = required_env("DELTA_MAIL_INT")?;
        let interval_minutes: u64 = interval_raw.parse().map_err(|_| {
            ToolError::Config(format!(
                "DELTA_MAIL_INT must be a number of minutes, got {:?}",
                interval_raw
            ))
        })?;
        if interval_minutes == 0 {
            return Err(ToolError::Config("DELTA_MAIL_INT must be at least 1".into()));
        }

        Ok(Self {
            interval_minutes,
            task_tag: required_env("REPORT_TAG")?,
            sent_tag: required_env("SENT_TAG")?,
            smtp: SmtpSettings::from_env()?,
            from: parse_address("EMAIL_FROM", &optional_env("EMAIL_FROM", DEFAULT_EMAIL_FROM))?,
            to: parse_recipients(&optional_env("EMAIL_TO", DEFAULT_EMAIL_TO))?,
            subject: optional_env("EMAIL_SUBJECT", DEFAULT_EMAIL_SUBJECT),
        })
    }

    /// Log the effective settings the way operators expect to see them.
    pub fn log_startup(&self) {
        tracing::info!("delta mailer starting up with the following settings:");
        tracing::info!("  interval:      {} minutes", self.interval_minutes);
        tracing::info!("  task tag:      {}", self.task_tag);
        tracing::info!("  sent tag:      {}", self.sent_tag);
        tracing::info!("  email subject: {}", self.subject);
        tracing::info!("  from address:  {}", self.from);
        tracing::info!(
            "  to addresses:  {}",
            self.to.iter().map(|a| a.address.clone()).collect::<Vec<_>>().join(", ")
        );
        tracing::info!("  mta address:   {}", self.smtp.host);
        tracing::info!("  mta port:      {}", self.smtp.port);
        tracing::info!("  mta user:      {}", self.smtp.username);
        tracing::info!("  mta password:  <will not be printed here>");
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn required_env(name: &str) -> Result<String, ToolError> {
    env::var(name).map_err(|_| ToolError::Config(format!("{} is not set", name)))
}

fn optional_env(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_port(name: &str, raw: &str) -> Result<u16, ToolError> {
    raw.parse()
        .map_err(|_| ToolError::Config(format!("{} must be a port number, got {:?}", name, raw)))
}

fn parse_address(name: &str, raw: &str) -> Result<EmailAddress, ToolError> {
    EmailAddress::parse(raw)
        .map_err(|e| ToolError::Config(format!("{}: {}", name, e)))
}

/// Parse a comma-separated recipient list.
pub fn parse_recipients(raw: &str) -> Result<Vec<EmailAddress>, ToolError> {
    let mut recipients = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        recipients.push(
            EmailAddress::parse(part)
                .map_err(|e| ToolError::Config(format!("EMAIL_TO: {}", e)))?,
        );
    }
    if recipients.is_empty() {
        return Err(ToolError::Config("EMAIL_TO contains no addresses".into()));
    }
    Ok(recipients)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recipients_splits_and_trims() {
        let to = parse_recipients("a@example.com, b@example.com").unwrap();
        assert_eq!(to.len(), 2);
        assert_eq!(to[0].address, "a@example.com");
        assert_eq!(to[1].address, "b@example.com");
    }

    #[test]
    fn parse_recipients_rejects_garbage() {
        assert!(parse_recipients("not an address").is_err());
        assert!(parse_recipients("").is_err());
        assert!(parse_recipients(" , ,").is_err());
    }

    #[test]
    fn parse_port_rejects_non_numeric() {
        assert!(parse_port("SMTP_PORT", "2525").is_ok());
        assert!(parse_port("SMTP_PORT", "smtp").is_err());
        assert!(parse_port("SMTP_PORT", "99999").is_err());
    }

    #[test]
    fn required_env_reports_the_variable_name() {
        // Variable name chosen to never exist in a test environment.
        let err = required_env("GVMOPS_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("GVMOPS_TEST_UNSET_VARIABLE"));
    }

    #[test]
    fn optional_env_falls_back() {
        assert_eq!(
            optional_env("GVMOPS_TEST_UNSET_VARIABLE", "fallback"),
            "fallback"
        );
    }

    #[test]
    fn smtp_settings_produce_starttls_config() {
        let settings = SmtpSettings {
            host: "mail.example.com".into(),
            port: 2525,
            username: "ops".into(),
            password: "pw".into(),
        };
        let cfg = settings.smtp_config();
        assert_eq!(cfg.host, "mail.example.com");
        assert_eq!(cfg.port, 2525);
        assert_eq!(
            cfg.security,
            gvmops_smtp::types::SmtpSecurity::StartTls
        );
    }
}
