//! Typed GMP operations over a transport.

use base64::Engine;
use tracing::debug;

use crate::error::{GmpError, GmpResult};
use crate::protocol;
use crate::transport::{GmpTransport, TlsTransport};
use crate::types::{Asset, GmpConfig, ReportSummary, Task};
use crate::xml::XmlElement;

/// A session with the console: one transport, authenticated once,
/// commands exchanged sequentially.
pub struct GmpClient<T: GmpTransport> {
    transport: T,
    authenticated: bool,
}

/// Connect to the console and return an unauthenticated client.
pub async fn connect(config: &GmpConfig) -> GmpResult<GmpClient<TlsTransport>> {
    let transport = TlsTransport::connect(config).await?;
    Ok(GmpClient::new(transport))
}

impl<T: GmpTransport> GmpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the client, returning its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Log in. Must be the first command of a session.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> GmpResult<()> {
        let request = protocol::authenticate(username, password)?;
        match self.exchange(&request).await {
            Ok(_) => {
                self.authenticated = true;
                debug!("authenticated as {}", username);
                Ok(())
            }
            Err(GmpError::Status { message, .. }) => Err(GmpError::AuthFailed(message)),
            Err(e) => Err(e),
        }
    }

    /// Host assets matching a filter (e.g. `ip=10.0.0.5`).
    pub async fn get_assets(&mut self, filter: &str) -> GmpResult<Vec<Asset>> {
        let request = protocol::get_assets(filter)?;
        let root = self.exchange(&request).await?;
        let assets = root
            .children_named("asset")
            .map(|a| Asset {
                id: a.attr("id").unwrap_or_default().to_string(),
                name: a.find_text("name").unwrap_or_default().to_string(),
            })
            .collect();
        Ok(assets)
    }

    /// Create a host asset named by its IP. Returns the new asset id.
    pub async fn create_host(&mut self, name: &str, comment: &str) -> GmpResult<String> {
        let request = protocol::create_host(name, comment)?;
        let root = self.exchange(&request).await?;
        root.attr("id")
            .map(str::to_string)
            .ok_or_else(|| GmpError::MissingField(format!("{}: id", root.name)))
    }

    /// Tasks matching a filter (e.g. `tag=alertable`).
    pub async fn get_tasks(&mut self, filter: &str) -> GmpResult<Vec<Task>> {
        let request = protocol::get_tasks(filter)?;
        let root = self.exchange(&request).await?;
        let tasks = root
            .children_named("task")
            .map(|t| Task {
                id: t.attr("id").unwrap_or_default().to_string(),
                name: t.find_text("name").unwrap_or_default().to_string(),
            })
            .collect();
        Ok(tasks)
    }

    /// Report summaries matching a filter, in the order the console
    /// returns them (`sort-reverse=date` puts the newest first).
    pub async fn get_reports(&mut self, filter: &str) -> GmpResult<Vec<ReportSummary>> {
        let request = protocol::get_reports(filter)?;
        let root = self.exchange(&request).await?;
        let reports = root
            .children_named("report")
            .map(|r| ReportSummary {
                id: r.attr("id").unwrap_or_default().to_string(),
                tag_names: r
                    .find_all("report/user_tags/tag/name")
                    .iter()
                    .map(|n| n.text().to_string())
                    .collect(),
            })
            .collect();
        Ok(reports)
    }

    /// Render `report_id` as a delta against `delta_report_id` in the
    /// given report format and return the decoded content.
    ///
    /// Formats like CSV arrive base64-encoded in the report element text.
    pub async fn get_delta_report(
        &mut self,
        report_id: &str,
        delta_report_id: &str,
        filter: &str,
        format_id: &str,
    ) -> GmpResult<Vec<u8>> {
        let request =
            protocol::get_delta_report(report_id, delta_report_id, filter, format_id)?;
        let root = self.exchange(&request).await?;
        let report = root
            .find("report")
            .ok_or_else(|| GmpError::MissingField(format!("{}: report", root.name)))?;

        let encoded: String = report
            .text()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if encoded.is_empty() {
            return Err(GmpError::MissingField("report: content".into()));
        }
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| GmpError::XmlParse(format!("report content is not base64: {}", e)))
    }

    /// Attach a named tag with a value to a resource. Returns the tag id.
    pub async fn create_tag(
        &mut self,
        name: &str,
        resource_type: &str,
        resource_id: &str,
        value: &str,
    ) -> GmpResult<String> {
        let request = protocol::create_tag(name, resource_type, resource_id, value)?;
        let root = self.exchange(&request).await?;
        root.attr("id")
            .map(str::to_string)
            .ok_or_else(|| GmpError::MissingField(format!("{}: id", root.name)))
    }

    async fn exchange(&mut self, request: &str) -> GmpResult<XmlElement> {
        debug!("GMP → {}", request);
        let response = self.transport.exchange(request).await?;
        debug!("GMP ← {} bytes", response.len());
        protocol::parse_response(&response)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Scripted transport: pops canned responses, records requests.
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

    #[tokio::test]
    async fn authenticate_success() {
        let mock = MockTransport::new(&[r#"<authenticate_response status="200" status_text="OK"/>"#]);
        let mut client = GmpClient::new(mock);
        client.authenticate("admin", "pw").await.unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn authenticate_rejection_maps_to_auth_failed() {
        let mock = MockTransport::new(&[
            r#"<authenticate_response status="400" status_text="Authentication failed"/>"#,
        ]);
        let mut client = GmpClient::new(mock);
        let err = client.authenticate("admin", "wrong").await.unwrap_err();
        assert!(matches!(err, GmpError::AuthFailed(_)));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn get_assets_parses_rows() {
        let mock = MockTransport::new(&[r#"<get_assets_response status="200" status_text="OK">
                <asset id="a1"><name>10.0.0.5</name></asset>
            </get_assets_response>"#]);
        let mut client = GmpClient::new(mock);
        let assets = client.get_assets("ip=10.0.0.5").await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "a1");
        assert_eq!(assets[0].name, "10.0.0.5");
    }

    #[tokio::test]
    async fn get_assets_empty_inventory() {
        let mock = MockTransport::new(&[r#"<get_assets_response status="200" status_text="OK"/>"#]);
        let mut client = GmpClient::new(mock);
        let assets = client.get_assets("ip=10.0.0.9").await.unwrap();
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn create_host_returns_id() {
        let mock = MockTransport::new(&[
            r#"<create_asset_response status="201" status_text="OK, resource created" id="new-1"/>"#,
        ]);
        let mut client = GmpClient::new(mock);
        let id = client.create_host("10.0.0.9", "staging").await.unwrap();
        assert_eq!(id, "new-1");
    }

    #[tokio::test]
    async fn get_tasks_parses_rows() {
        let mock = MockTransport::new(&[r#"<get_tasks_response status="200" status_text="OK">
                <task id="t1"><name>weekly full scan</name></task>
                <task id="t2"><name>dmz scan</name></task>
            </get_tasks_response>"#]);
        let mut client = GmpClient::new(mock);
        let tasks = client.get_tasks("tag=alertable").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].name, "dmz scan");
    }

    #[tokio::test]
    async fn get_reports_collects_tag_names() {
        let mock = MockTransport::new(&[r#"<get_reports_response status="200" status_text="OK">
                <report id="r-new">
                    <report><user_tags><tag id="x"><name>delta_alert_sent</name></tag></user_tags></report>
                </report>
                <report id="r-old"><report/></report>
            </get_reports_response>"#]);
        let mut client = GmpClient::new(mock);
        let reports = client.get_reports("task_id=t1").await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].has_tag("delta_alert_sent"));
        assert!(!reports[1].has_tag("delta_alert_sent"));
    }

    #[tokio::test]
    async fn delta_report_decodes_base64() {
        // "IP,Severity\n" base64-encoded
        let mock = MockTransport::new(&[r#"<get_reports_response status="200" status_text="OK">
                <report id="r-new">SVAsU2V2ZXJpdHkK</report>
            </get_reports_response>"#]);
        let mut client = GmpClient::new(mock);
        let csv = client
            .get_delta_report("r-new", "r-old", "delta_states=n", "fmt")
            .await
            .unwrap();
        assert_eq!(csv, b"IP,Severity\n");
    }

    #[tokio::test]
    async fn delta_report_missing_content_is_error() {
        let mock = MockTransport::new(&[r#"<get_reports_response status="200" status_text="OK">
                <report id="r-new"></report>
            </get_reports_response>"#]);
        let mut client = GmpClient::new(mock);
        let err = client
            .get_delta_report("r-new", "r-old", "delta_states=n", "fmt")
            .await
            .unwrap_err();
        assert!(matches!(err, GmpError::MissingField(_)));
    }

    #[tokio::test]
    async fn create_tag_sends_resource_id() {
        let mock = MockTransport::new(&[
            r#"<create_tag_response status="201" status_text="OK, resource created" id="tag-1"/>"#,
        ]);
        let mut client = GmpClient::new(mock);
        let id = client
            .create_tag("delta_alert_sent", "report", "r-new", "2026-08-06T10:00:00Z")
            .await
            .unwrap();
        assert_eq!(id, "tag-1");
        let mock = client.transport;
        assert!(mock.requests[0].contains(r#"<resource id="r-new"/>"#));
        assert!(mock.requests[0].contains("<type>report</type>"));
    }

    #[tokio::test]
    async fn status_error_carries_status_text() {
        let mock = MockTransport::new(&[
            r#"<get_tasks_response status="400" status_text="Bogus filter"/>"#,
        ]);
        let mut client = GmpClient::new(mock);
        let err = client.get_tasks("nonsense").await.unwrap_err();
        match err {
            GmpError::Status { status, message } => {
                assert_eq!(status, "400");
                assert_eq!(message, "Bogus filter");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
