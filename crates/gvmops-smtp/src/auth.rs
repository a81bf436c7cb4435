//! SMTP authentication mechanisms.
//!
//! Supports PLAIN and LOGIN.

use base64::Engine;
use tracing::debug;

use crate::client::SmtpClient;
use crate::types::*;

/// Authenticate with the SMTP server using the given credentials.
/// Selects the mechanism from the server capabilities unless
/// `creds.method` is explicitly set.
pub async fn authenticate(
    client: &mut SmtpClient,
    creds: &SmtpCredentials,
) -> SmtpResult<()> {
    let method = select_auth_method(client, creds);
    debug!("authenticating with {}", method);

    match method {
        SmtpAuthMethod::Plain => auth_plain(client, creds).await,
        SmtpAuthMethod::Login => auth_login(client, creds).await,
    }
}

/// Select the authentication mechanism to use.
fn select_auth_method(client: &SmtpClient, creds: &SmtpCredentials) -> SmtpAuthMethod {
    // If explicitly set, honour it
    if let Some(m) = creds.method {
        return m;
    }

    if let Some(caps) = client.capabilities() {
        if caps.supports_auth("PLAIN") {
            return SmtpAuthMethod::Plain;
        }
        if caps.supports_auth("LOGIN") {
            return SmtpAuthMethod::Login;
        }
    }

    // Default to PLAIN if no capabilities available
    SmtpAuthMethod::Plain
}

// ── AUTH PLAIN ──────────────────────────────────────────────────────

/// AUTH PLAIN: sends `\0username\0password` base64-encoded in one shot.
async fn auth_plain(client: &mut SmtpClient, creds: &SmtpCredentials) -> SmtpResult<()> {
    let encoded = build_plain_payload(&creds.username, &creds.password);
    let reply = client.command(&format!("AUTH PLAIN {}", encoded)).await?;

    if reply.is_positive() {
        client.set_authenticated(true);
        Ok(())
    } else {
        Err(SmtpError::auth(format!(
            "AUTH PLAIN failed: {} {}",
            reply.code,
            reply.text()
        )))
    }
}

// ── AUTH LOGIN ──────────────────────────────────────────────────────

/// AUTH LOGIN: challenge-response with base64 username then password.
async fn auth_login(client: &mut SmtpClient, creds: &SmtpCredentials) -> SmtpResult<()> {
    let reply = client.command("AUTH LOGIN").await?;
    if !reply.is_intermediate() && !reply.is_positive() {
        return Err(SmtpError::auth(format!(
            "AUTH LOGIN rejected: {} {}",
            reply.code,
            reply.text()
        )));
    }

    // Server sends 334 VXNlcm5hbWU6 (base64 "Username:")
    let user_b64 = base64::engine::general_purpose::STANDARD.encode(creds.username.as_bytes());
    let reply = client.command(&user_b64).await?;
    if !reply.is_intermediate() && !reply.is_positive() {
        return Err(SmtpError::auth(format!(
            "AUTH LOGIN username rejected: {} {}",
            reply.code,
            reply.text()
        )));
    }

    // Server sends 334 UGFzc3dvcmQ6 (base64 "Password:")
    let pass_b64 = base64::engine::general_purpose::STANDARD.encode(creds.password.as_bytes());
    let reply = client.command(&pass_b64).await?;

    if reply.is_positive() {
        client.set_authenticated(true);
        Ok(())
    } else {
        Err(SmtpError::auth(format!(
            "AUTH LOGIN password rejected: {} {}",
            reply.code,
            reply.text()
        )))
    }
}

/// Build the AUTH PLAIN payload (useful for testing).
pub fn build_plain_payload(username: &str, password: &str) -> String {
    let payload = format!("\0{}\0{}", username, password);
    base64::engine::general_purpose::STANDARD.encode(payload.as_bytes())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_payload_format() {
        let payload = build_plain_payload("user@example.com", "secret");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload.as_bytes())
            .unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert_eq!(text, "\0user@example.com\0secret");
    }

    #[test]
    fn plain_payload_null_separators() {
        let payload = build_plain_payload("admin", "pass");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload.as_bytes())
            .unwrap();
        assert_eq!(decoded[0], 0);
        assert_eq!(decoded[6], 0);
    }

    #[test]
    fn select_method_explicit() {
        let client = SmtpClient::new(SmtpConfig::default());
        let creds = SmtpCredentials {
            method: Some(SmtpAuthMethod::Login),
            ..Default::default()
        };
        assert_eq!(select_auth_method(&client, &creds), SmtpAuthMethod::Login);
    }

    #[test]
    fn select_method_defaults_to_plain() {
        let client = SmtpClient::new(SmtpConfig::default());
        let creds = SmtpCredentials::default();
        assert_eq!(select_auth_method(&client, &creds), SmtpAuthMethod::Plain);
    }
}
