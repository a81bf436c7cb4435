//! **gvmops-smtp** — SMTP submission client.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data types, error handling, configuration |
//! | [`client`] | SMTP protocol engine (EHLO, STARTTLS, DATA) |
//! | [`auth`] | Authentication mechanisms (PLAIN, LOGIN) |
//! | [`message`] | MIME message builder (text, attachments) |

pub mod auth;
pub mod client;
pub mod message;
pub mod types;

pub use client::SmtpClient;
pub use message::MessageBuilder;
pub use types::{
    Attachment, EmailAddress, EmailMessage, SmtpConfig, SmtpCredentials, SmtpError,
    SmtpErrorKind, SmtpResult, SmtpSecurity,
};
