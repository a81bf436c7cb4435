//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gvmops_gmp::types::{GmpConfig, GmpSecurity};

use crate::error::ToolError;

#[derive(Parser, Debug)]
#[command(
    name = "gvmops",
    version,
    about = "Operator tooling for a GMP vulnerability-management console"
)]
pub struct Cli {
    /// Console host
    #[arg(long, global = true, env = "GVMD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Console manager port
    #[arg(long, global = true, env = "GVMD_PORT", default_value_t = 9390)]
    pub port: u16,

    /// GMP username
    #[arg(long, global = true, env = "GMP_USERNAME")]
    pub username: Option<String>,

    /// GMP password
    #[arg(long, global = true, env = "GMP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate verification for the console connection
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Use a plain TCP connection to the console (socket-forwarded setups)
    #[arg(long, global = true)]
    pub plain: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync a CSV host list into the console's asset inventory
    SyncAssets {
        /// Two-column CSV file (ip, comment); '|' is the quote character
        csv_file: PathBuf,
    },
    /// Continuously email delta reports for tagged scan tasks
    DeltaMailer,
    /// Verify SMTP relay reachability with one test message
    SmtpProbe,
}

impl Cli {
    pub fn gmp_config(&self) -> GmpConfig {
        GmpConfig {
            host: self.host.clone(),
            port: self.port,
            security: if self.plain {
                GmpSecurity::Plain
            } else {
                GmpSecurity::Tls
            },
            verify_certificates: !self.insecure,
            ..Default::default()
        }
    }

    /// Console credentials; both parts are required for GMP subcommands.
    pub fn gmp_credentials(&self) -> Result<(String, String), ToolError> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| ToolError::Config("GMP username is not set (--username / GMP_USERNAME)".into()))?;
        let password = self
            .password
            .clone()
            .ok_or_else(|| ToolError::Config("GMP password is not set (--password / GMP_PASSWORD)".into()))?;
        Ok((username, password))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sync_assets() {
        let cli = Cli::try_parse_from(["gvmops", "sync-assets", "hosts.csv"]).unwrap();
        match cli.command {
            Commands::SyncAssets { csv_file } => {
                assert_eq!(csv_file, PathBuf::from("hosts.csv"));
            }
            other => panic!("unexpected subcommand: {other:?}"),
        }
    }

    #[test]
    fn sync_assets_requires_csv_argument() {
        assert!(Cli::try_parse_from(["gvmops", "sync-assets"]).is_err());
    }

    #[test]
    fn connection_defaults() {
        let cli = Cli::try_parse_from(["gvmops", "smtp-probe"]).unwrap();
        assert_eq!(cli.port, 9390);
        assert!(!cli.insecure);
        let cfg = cli.gmp_config();
        assert_eq!(cfg.security, GmpSecurity::Tls);
        assert!(cfg.verify_certificates);
    }

    #[test]
    fn insecure_and_plain_flags() {
        let cli = Cli::try_parse_from([
            "gvmops",
            "--insecure",
            "--plain",
            "--host",
            "gsm.internal",
            "delta-mailer",
        ])
        .unwrap();
        let cfg = cli.gmp_config();
        assert_eq!(cfg.host, "gsm.internal");
        assert_eq!(cfg.security, GmpSecurity::Plain);
        assert!(!cfg.verify_certificates);
    }

    #[test]
    fn credentials_required_for_gmp_commands() {
        let cli = Cli::try_parse_from(["gvmops", "sync-assets", "hosts.csv"]).unwrap();
        assert!(cli.gmp_credentials().is_err());

        let cli = Cli::try_parse_from([
            "gvmops",
            "--username",
            "admin",
            "--password",
            "pw",
            "sync-assets",
            "hosts.csv",
        ])
        .unwrap();
        let (user, pass) = cli.gmp_credentials().unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "pw");
    }
}
