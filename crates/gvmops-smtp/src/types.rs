//! All data types, error handling and configuration for the SMTP crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Error ──────────────────────────────────────────────────────────

/// Kinds of SMTP errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpErrorKind {
    /// Server returned an error reply (4xx / 5xx).
    ServerReply,
    /// Authentication failed.
    AuthFailure,
    /// TLS negotiation failed.
    TlsError,
    /// Connection refused or timed out.
    ConnectionError,
    /// I/O error during socket read/write.
    IoError,
    /// The message itself is malformed.
    MessageError,
    /// Configuration / credential error.
    ConfigError,
    /// Catch-all.
    Unknown,
}

impl fmt::Display for SmtpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Top-level error type for the SMTP crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpError {
    pub kind: SmtpErrorKind,
    pub message: String,
    /// The SMTP reply code (e.g. 550) if available.
    pub code: Option<u16>,
}

impl SmtpError {
    pub fn new(kind: SmtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::ConnectionError, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::AuthFailure, msg)
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::TlsError, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::IoError, msg)
    }

    pub fn server(code: u16, msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::ServerReply, msg).with_code(code)
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::MessageError, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::ConfigError, msg)
    }
}

impl fmt::Display for SmtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[SMTP {}] {}: {}", code, self.kind, self.message)
        } else {
            write!(f, "[SMTP] {}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for SmtpError {}

pub type SmtpResult<T> = Result<T, SmtpError>;

// ─── Enums ──────────────────────────────────────────────────────────

/// SMTP security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmtpSecurity {
    /// Unencrypted (port 25 / 587 without STARTTLS).
    None,
    /// STARTTLS upgrade on port 587.
    StartTls,
    /// Implicit TLS (SMTPS) on port 465.
    ImplicitTls,
}

impl Default for SmtpSecurity {
    fn default() -> Self {
        Self::StartTls
    }
}

/// Supported authentication mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmtpAuthMethod {
    Plain,
    Login,
}

impl fmt::Display for SmtpAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "PLAIN"),
            Self::Login => write!(f, "LOGIN"),
        }
    }
}

// ─── Configuration ──────────────────────────────────────────────────

/// SMTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Hostname or IP of the SMTP server.
    pub host: String,
    /// Port (25 / 465 / 587 / 2525).
    pub port: u16,
    /// Security mode.
    pub security: SmtpSecurity,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read/write timeout in seconds.
    pub io_timeout_secs: u64,
    /// Domain to use in EHLO/HELO command.
    pub ehlo_domain: String,
    /// Whether to verify the server's TLS certificate.
    pub verify_certificates: bool,
    /// Optional path to a custom CA certificate PEM file.
    pub ca_cert_path: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            security: SmtpSecurity::StartTls,
            connect_timeout_secs: 30,
            io_timeout_secs: 60,
            ehlo_domain: "localhost".into(),
            verify_certificates: true,
            ca_cert_path: None,
        }
    }
}

/// Credentials for SMTP authentication.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
    /// The auth mechanism to use; selected from EHLO capabilities if unset.
    pub method: Option<SmtpAuthMethod>,
}

// ─── Email Address ──────────────────────────────────────────────────

/// An email address with an optional display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name (e.g. "Security Ops").
    pub name: Option<String>,
    /// The email address (e.g. "secops@example.com").
    pub address: String,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn with_name(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Format as RFC 5322 mailbox (e.g. `"Security Ops" <secops@example.com>`).
    pub fn to_mailbox(&self) -> String {
        match &self.name {
            Some(n) => format!("\"{}\" <{}>", n.replace('"', "\\\""), self.address),
            None => self.address.clone(),
        }
    }

    /// Extract just `<address>` for the SMTP envelope.
    pub fn to_angle_addr(&self) -> String {
        format!("<{}>", self.address)
    }

    /// Parse a mailbox string like `"Name" <addr>` or `addr`.
    pub fn parse(input: &str) -> SmtpResult<Self> {
        let input = input.trim();
        if let Some(lt) = input.find('<') {
            if let Some(gt) = input.find('>') {
                let addr = input[lt + 1..gt].trim().to_string();
                let name_part = input[..lt].trim();
                let name = if name_part.is_empty() {
                    None
                } else {
                    let n = name_part.trim_matches('"').trim().to_string();
                    if n.is_empty() { None } else { Some(n) }
                };
                if addr.contains('@') {
                    return Ok(Self { name, address: addr });
                }
            }
        }
        if input.contains('@') && !input.contains(' ') {
            return Ok(Self {
                name: None,
                address: input.to_string(),
            });
        }
        Err(SmtpError::message(format!("Invalid email address: {}", input)))
    }

    /// Validate the address format (basic check).
    pub fn is_valid(&self) -> bool {
        let a = &self.address;
        if let Some(at) = a.find('@') {
            let local = &a[..at];
            let domain = &a[at + 1..];
            !local.is_empty() && !domain.is_empty() && domain.contains('.')
        } else {
            false
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_mailbox())
    }
}

// ─── Attachment ─────────────────────────────────────────────────────

/// An email attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// File name (e.g. "delta_report.csv").
    pub filename: String,
    /// MIME type (e.g. "application/octet-stream").
    pub content_type: String,
    /// Base64-encoded content.
    pub data_base64: String,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: &[u8]) -> Self {
        use base64::Engine;
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    /// Decode the attachment data from base64.
    pub fn decode_data(&self) -> SmtpResult<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.data_base64)
            .map_err(|e| SmtpError::message(format!("Base64 decode error: {}", e)))
    }
}

// ─── Email Message ──────────────────────────────────────────────────

/// A complete email message ready to be sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Unique message identifier.
    pub id: String,
    /// From address.
    pub from: EmailAddress,
    /// To recipients.
    pub to: Vec<EmailAddress>,
    /// CC recipients.
    pub cc: Vec<EmailAddress>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text_body: Option<String>,
    /// Attachments.
    pub attachments: Vec<Attachment>,
    /// Date header override (defaults to send time).
    pub date: Option<DateTime<Utc>>,
    /// Character set (defaults to UTF-8).
    pub charset: String,
}

impl Default for EmailMessage {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: EmailAddress::new(""),
            to: Vec::new(),
            cc: Vec::new(),
            subject: String::new(),
            text_body: None,
            attachments: Vec::new(),
            date: None,
            charset: "UTF-8".into(),
        }
    }
}

impl EmailMessage {
    /// All envelope recipients (to + cc).
    pub fn all_recipients(&self) -> Vec<&EmailAddress> {
        self.to.iter().chain(self.cc.iter()).collect()
    }

    /// Validate the message before sending.
    pub fn validate(&self) -> SmtpResult<()> {
        if self.from.address.is_empty() {
            return Err(SmtpError::message("From address is required"));
        }
        if !self.from.is_valid() {
            return Err(SmtpError::message(format!(
                "Invalid From address: {}",
                self.from.address
            )));
        }
        if self.to.is_empty() && self.cc.is_empty() {
            return Err(SmtpError::message("At least one recipient is required"));
        }
        for r in self.all_recipients() {
            if !r.is_valid() {
                return Err(SmtpError::message(format!(
                    "Invalid recipient address: {}",
                    r.address
                )));
            }
        }
        if self.text_body.is_none() && self.attachments.is_empty() {
            return Err(SmtpError::message(
                "Message must have a body or at least one attachment",
            ));
        }
        Ok(())
    }
}

// ─── SMTP Reply ─────────────────────────────────────────────────────

/// A parsed SMTP reply (possibly multi-line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpReply {
    /// The 3-digit reply code.
    pub code: u16,
    /// Reply text lines.
    pub lines: Vec<String>,
    /// Whether this is a multi-line reply.
    pub is_multiline: bool,
}

impl SmtpReply {
    /// Whether this is a positive completion (2xx).
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Whether this is a positive intermediate (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Whether this reply indicates an error.
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }

    /// The full reply text.
    pub fn text(&self) -> String {
        self.lines.join("\r\n")
    }

    /// Parse an SMTP reply from raw lines.
    pub fn parse(raw: &str) -> SmtpResult<Self> {
        let mut code: Option<u16> = None;
        let mut lines = Vec::new();
        let mut multiline = false;

        for line in raw.lines() {
            if line.len() < 3 {
                continue;
            }
            let c: u16 = line[..3]
                .parse()
                .map_err(|_| SmtpError::io(format!("Invalid reply code in: {}", line)))?;
            if code.is_none() {
                code = Some(c);
            }
            let separator = line.as_bytes().get(3).copied().unwrap_or(b' ');
            if separator == b'-' {
                multiline = true;
            }
            let text = if line.len() > 4 { &line[4..] } else { "" };
            lines.push(text.to_string());
        }

        match code {
            Some(c) => Ok(SmtpReply {
                code: c,
                lines,
                is_multiline: multiline,
            }),
            None => Err(SmtpError::io("Empty SMTP reply")),
        }
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

// ─── EHLO Capabilities ─────────────────────────────────────────────

/// Parsed EHLO capability set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EhloCapabilities {
    /// The server greeting name.
    pub server_name: String,
    /// Maximum message size (SIZE extension).
    pub max_size: Option<u64>,
    /// Supported auth mechanisms.
    pub auth_mechanisms: Vec<String>,
    /// STARTTLS supported.
    pub starttls: bool,
    /// All raw capability lines.
    pub raw_capabilities: Vec<String>,
}

impl EhloCapabilities {
    /// Parse EHLO response lines into capabilities.
    pub fn parse(reply: &SmtpReply) -> Self {
        let mut caps = Self::default();
        for (i, line) in reply.lines.iter().enumerate() {
            if i == 0 {
                caps.server_name = line.clone();
                continue;
            }
            let upper = line.to_uppercase();
            let parts: Vec<&str> = upper.splitn(2, ' ').collect();
            let keyword = parts[0];
            let param = parts.get(1).copied().unwrap_or("");

            match keyword {
                "SIZE" => {
                    caps.max_size = param.parse().ok();
                }
                "AUTH" => {
                    caps.auth_mechanisms =
                        param.split_whitespace().map(|s| s.to_string()).collect();
                }
                "STARTTLS" => caps.starttls = true,
                _ => {}
            }
            caps.raw_capabilities.push(line.clone());
        }
        caps
    }

    /// Check if a specific auth mechanism is supported.
    pub fn supports_auth(&self, method: &str) -> bool {
        let upper = method.to_uppercase();
        self.auth_mechanisms.iter().any(|m| m == &upper)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
