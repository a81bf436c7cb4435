//! Sync a CSV host list into the console's asset inventory.
//!
//! Each row is (ip, comment). An asset whose IP already exists is left
//! alone; anything else is created as a host asset named by its IP.
//! API failures are not caught here — the first one aborts the run.

use std::path::Path;

use gvmops_gmp::transport::GmpTransport;
use gvmops_gmp::GmpClient;
use tracing::info;

use crate::error::ToolError;

/// Counters for one sync run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub existing: usize,
    pub skipped_rows: usize,
}

pub async fn run<T: GmpTransport>(
    gmp: &mut GmpClient<T>,
    csv_path: &Path,
) -> Result<SyncSummary, ToolError> {
    let content = std::fs::read_to_string(csv_path)?;
    sync_from_csv(gmp, &content).await
}

pub async fn sync_from_csv<T: GmpTransport>(
    gmp: &mut GmpClient<T>,
    content: &str,
) -> Result<SyncSummary, ToolError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .quote(b'|')
        .flexible(true)
        .has_headers(false)
        .from_reader(content.as_bytes());

    let mut summary = SyncSummary::default();

    for result in reader.records() {
        let record = result?;
        if record.len() != 2 {
            summary.skipped_rows += 1;
            continue;
        }
        let ip = record.get(0).unwrap_or("");
        let comment = record.get(1).unwrap_or("");

        let existing = gmp.get_assets(&format!("ip={}", ip)).await?;
        if !existing.is_empty() {
            info!("asset with IP {} exists", ip);
            summary.existing += 1;
            continue;
        }

        info!("asset with IP {} does not exist, syncing", ip);
        gmp.create_host(ip, comment).await?;
        summary.created += 1;
    }

    Ok(summary)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gvmops_gmp::{GmpError, GmpResult};
    use std::collections::VecDeque;

    struct MockTransport {
        responses: VecDeque<String>,
        requests: Vec<String>,
    }

    impl MockTransport {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                requests: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl GmpTransport for MockTransport {
        async fn exchange(&mut self, request: &str) -> GmpResult<String> {
            self.requests.push(request.to_string());
            self.responses
                .pop_front()
                .ok_or_else(|| GmpError::Io("mock: no response scripted".into()))
        }
    }

    const EMPTY_ASSETS: &str = r#"<get_assets_response status="200" status_text="OK"/>"#;
    const ONE_ASSET: &str = r#"<get_assets_response status="200" status_text="OK">
        <asset id="a1"><name>10.0.0.5</name></asset>
    </get_assets_response>"#;
    const CREATED: &str =
        r#"<create_asset_response status="201" status_text="OK, resource created" id="new-1"/>"#;

    #[tokio::test]
    async fn existing_ip_issues_no_create() {
        let mut gmp = GmpClient::new(MockTransport::new(&[ONE_ASSET]));
        let summary = sync_from_csv(&mut gmp, "10.0.0.5,db server\n").await.unwrap();
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.created, 0);

        let requests = &gmp.transport().requests;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains(r#"filter="ip=10.0.0.5""#));
        assert!(!requests.iter().any(|r| r.contains("create_asset")));
    }

    #[tokio::test]
    async fn missing_ip_creates_one_host_with_comment() {
        let mut gmp = GmpClient::new(MockTransport::new(&[EMPTY_ASSETS, CREATED]));
        let summary = sync_from_csv(&mut gmp, "10.0.0.9,staging box\n").await.unwrap();
        assert_eq!(summary.created, 1);

        let requests = &gmp.transport().requests;
        assert_eq!(requests.len(), 2);
        assert!(requests[1].contains("<name>10.0.0.9</name>"));
        assert!(requests[1].contains("<comment>staging box</comment>"));
    }

    #[tokio::test]
    async fn short_and_long_rows_are_skipped() {
        let csv = "only-one-column\n10.0.0.9,ok,extra\n10.0.0.5,db server\n";
        let mut gmp = GmpClient::new(MockTransport::new(&[ONE_ASSET]));
        let summary = sync_from_csv(&mut gmp, csv).await.unwrap();
        assert_eq!(summary.skipped_rows, 2);
        assert_eq!(summary.existing, 1);
        assert_eq!(gmp.transport().requests.len(), 1);
    }

    #[tokio::test]
    async fn pipe_quoted_fields_are_unquoted() {
        let csv = "10.0.0.9,|a comment, with a comma|\n";
        let mut gmp = GmpClient::new(MockTransport::new(&[EMPTY_ASSETS, CREATED]));
        sync_from_csv(&mut gmp, csv).await.unwrap();
        let requests = &gmp.transport().requests;
        assert!(requests[1].contains("<comment>a comment, with a comma</comment>"));
    }

    #[tokio::test]
    async fn api_failure_aborts_the_run() {
        let mut gmp = GmpClient::new(MockTransport::new(&[
            r#"<get_assets_response status="400" status_text="Permission denied"/>"#,
        ]));
        let err = sync_from_csv(&mut gmp, "10.0.0.5,x\n").await.unwrap_err();
        assert!(matches!(err, ToolError::Gmp(GmpError::Status { .. })));
    }

    #[tokio::test]
    async fn reads_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.5,db server").unwrap();

        let mut gmp = GmpClient::new(MockTransport::new(&[ONE_ASSET]));
        let summary = run(&mut gmp, file.path()).await.unwrap();
        assert_eq!(summary.existing, 1);
    }
}
