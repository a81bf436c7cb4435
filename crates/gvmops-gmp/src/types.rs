//! Configuration and the handle types parsed out of GMP responses.

use serde::{Deserialize, Serialize};

/// The console's built-in "CSV Results" report format.
pub const CSV_RESULTS_FORMAT_ID: &str = "c1645568-627a-11e3-a660-406186ea4fc5";

/// The console's built-in "XML" report format.
pub const XML_REPORT_FORMAT_ID: &str = "a994b278-1f62-11e1-96ac-406186ea4fc5";

/// Transport security for the console connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GmpSecurity {
    /// Plain TCP (socket-forwarded or local test setups).
    Plain,
    /// TLS on the manager port.
    Tls,
}

impl Default for GmpSecurity {
    fn default() -> Self {
        Self::Tls
    }
}

/// Connection configuration for the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmpConfig {
    /// Hostname or IP of the console.
    pub host: String,
    /// Manager port (9390 on a default install).
    pub port: u16,
    /// Transport security.
    pub security: GmpSecurity,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read/write timeout in seconds.
    pub io_timeout_secs: u64,
    /// Whether to verify the console's TLS certificate.
    /// These consoles commonly ship self-signed certificates.
    pub verify_certificates: bool,
}

impl Default for GmpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 9390,
            security: GmpSecurity::Tls,
            connect_timeout_secs: 30,
            io_timeout_secs: 120,
            verify_certificates: true,
        }
    }
}

/// A host asset row from `get_assets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
}

/// A scan task row from `get_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
}

/// A report row from `get_reports`, with the names of its user tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub tag_names: Vec<String>,
}

impl ReportSummary {
    /// Whether the report carries a user tag with the given name.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tag_names.iter().any(|t| t == name)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
