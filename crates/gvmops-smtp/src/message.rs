//! MIME message builder.
//!
//! Converts an `EmailMessage` into an RFC 5322 / MIME document suitable
//! for the SMTP DATA command: plain text, or multipart/mixed with
//! base64 attachments.

use base64::Engine;
use chrono::Utc;

use crate::types::*;

/// Build the full MIME message string from an `EmailMessage`.
pub fn build_message(msg: &EmailMessage) -> SmtpResult<String> {
    msg.validate()?;

    let mut out = String::new();
    let boundary = format!("----=_Part_{}", uuid::Uuid::new_v4().simple());

    // ── Headers ────────────────────────────────────────────
    write_header(&mut out, "Message-ID", &format!("<{}>", msg.id));
    write_header(
        &mut out,
        "Date",
        &msg.date
            .unwrap_or_else(Utc::now)
            .format("%a, %d %b %Y %H:%M:%S %z")
            .to_string(),
    );
    write_header(&mut out, "From", &msg.from.to_mailbox());
    write_header(
        &mut out,
        "To",
        &msg.to.iter().map(|a| a.to_mailbox()).collect::<Vec<_>>().join(", "),
    );
    if !msg.cc.is_empty() {
        write_header(
            &mut out,
            "Cc",
            &msg.cc.iter().map(|a| a.to_mailbox()).collect::<Vec<_>>().join(", "),
        );
    }
    write_header(&mut out, "Subject", &encode_header_value(&msg.subject));
    write_header(&mut out, "MIME-Version", "1.0");

    // ── Body ───────────────────────────────────────────────
    if msg.attachments.is_empty() {
        write_header(
            &mut out,
            "Content-Type",
            &format!("text/plain; charset=\"{}\"", msg.charset),
        );
        write_header(&mut out, "Content-Transfer-Encoding", "7bit");
        out.push_str("\r\n");
        out.push_str(msg.text_body.as_deref().unwrap_or(""));
    } else {
        write_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{}\"", boundary),
        );
        out.push_str("\r\n");
        out.push_str("This is a multi-part message in MIME format.\r\n");

        if let Some(ref text) = msg.text_body {
            out.push_str(&format!("\r\n--{}\r\n", boundary));
            write_header(
                &mut out,
                "Content-Type",
                &format!("text/plain; charset=\"{}\"", msg.charset),
            );
            write_header(&mut out, "Content-Transfer-Encoding", "7bit");
            out.push_str("\r\n");
            out.push_str(text);
            out.push_str("\r\n");
        }

        for att in &msg.attachments {
            out.push_str(&format!("\r\n--{}\r\n", boundary));
            write_attachment(&mut out, att);
        }
        out.push_str(&format!("\r\n--{}--\r\n", boundary));
    }

    Ok(out)
}

fn write_attachment(out: &mut String, att: &Attachment) {
    write_header(
        out,
        "Content-Type",
        &format!("{}; name=\"{}\"", att.content_type, att.filename),
    );
    write_header(
        out,
        "Content-Disposition",
        &format!("attachment; filename=\"{}\"", att.filename),
    );
    write_header(out, "Content-Transfer-Encoding", "base64");
    out.push_str("\r\n");
    // Wrap base64 at 76 chars per line
    for chunk in att.data_base64.as_bytes().chunks(76) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or(""));
        out.push_str("\r\n");
    }
}

// ── Header helpers ──────────────────────────────────────────────────

fn write_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// RFC 2047 encode a header value if it contains non-ASCII characters.
pub fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(value.as_bytes());
    format!("=?UTF-8?B?{}?=", encoded)
}

// ─── MessageBuilder ─────────────────────────────────────────────────

/// Fluent builder for [`EmailMessage`].
pub struct MessageBuilder {
    msg: EmailMessage,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            msg: EmailMessage::default(),
        }
    }

    pub fn from(mut self, addr: EmailAddress) -> Self {
        self.msg.from = addr;
        self
    }

    pub fn to(mut self, addr: EmailAddress) -> Self {
        self.msg.to.push(addr);
        self
    }

    pub fn cc(mut self, addr: EmailAddress) -> Self {
        self.msg.cc.push(addr);
        self
    }

    pub fn subject(mut self, s: impl Into<String>) -> Self {
        self.msg.subject = s.into();
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.msg.text_body = Some(body.into());
        self
    }

    pub fn attachment(mut self, att: Attachment) -> Self {
        self.msg.attachments.push(att);
        self
    }

    pub fn build(self) -> SmtpResult<EmailMessage> {
        self.msg.validate()?;
        Ok(self.msg)
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
