//! GMP command serialisation and the response status envelope.
//!
//! Commands are single XML elements written with quick-xml; the console
//! answers each with a `<command>_response` element carrying `status`
//! and `status_text` attributes. Status codes follow HTTP conventions:
//! anything outside 2xx is a rejection.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::error::{GmpError, GmpResult};
use crate::xml::XmlElement;

// ─── Command builders ───────────────────────────────────────────────

/// `<authenticate>` with the given credentials.
pub fn authenticate(username: &str, password: &str) -> GmpResult<String> {
    let mut w = writer();
    w.write_event(Event::Start(BytesStart::new("authenticate")))?;
    w.write_event(Event::Start(BytesStart::new("credentials")))?;
    write_text_element(&mut w, "username", username)?;
    write_text_element(&mut w, "password", password)?;
    w.write_event(Event::End(quick_xml::events::BytesEnd::new("credentials")))?;
    w.write_event(Event::End(quick_xml::events::BytesEnd::new("authenticate")))?;
    finish(w)
}

/// `<get_assets>` for host assets matching a filter.
pub fn get_assets(filter: &str) -> GmpResult<String> {
    let mut e = BytesStart::new("get_assets");
    e.push_attribute(("type", "host"));
    e.push_attribute(("filter", filter));
    empty(e)
}

/// `<create_asset>` for a host asset named by its IP.
pub fn create_host(name: &str, comment: &str) -> GmpResult<String> {
    if name.is_empty() {
        return Err(GmpError::InvalidParameter("host name must not be empty".into()));
    }
    let mut w = writer();
    w.write_event(Event::Start(BytesStart::new("create_asset")))?;
    w.write_event(Event::Start(BytesStart::new("asset")))?;
    write_text_element(&mut w, "type", "host")?;
    write_text_element(&mut w, "name", name)?;
    if !comment.is_empty() {
        write_text_element(&mut w, "comment", comment)?;
    }
    w.write_event(Event::End(quick_xml::events::BytesEnd::new("asset")))?;
    w.write_event(Event::End(quick_xml::events::BytesEnd::new("create_asset")))?;
    finish(w)
}

/// `<get_tasks>` matching a filter.
pub fn get_tasks(filter: &str) -> GmpResult<String> {
    let mut e = BytesStart::new("get_tasks");
    e.push_attribute(("filter", filter));
    empty(e)
}

/// `<get_reports>` matching a filter.
pub fn get_reports(filter: &str) -> GmpResult<String> {
    let mut e = BytesStart::new("get_reports");
    e.push_attribute(("filter", filter));
    empty(e)
}

/// `<get_reports>` for a single report rendered as a delta against
/// `delta_report_id` in the given report format.
pub fn get_delta_report(
    report_id: &str,
    delta_report_id: &str,
    filter: &str,
    format_id: &str,
) -> GmpResult<String> {
    let mut e = BytesStart::new("get_reports");
    e.push_attribute(("report_id", report_id));
    e.push_attribute(("delta_report_id", delta_report_id));
    e.push_attribute(("format_id", format_id));
    e.push_attribute(("filter", filter));
    e.push_attribute(("details", "1"));
    empty(e)
}

/// `<create_tag>` attaching a named tag with a value to one resource.
pub fn create_tag(
    name: &str,
    resource_type: &str,
    resource_id: &str,
    value: &str,
) -> GmpResult<String> {
    let mut w = writer();
    w.write_event(Event::Start(BytesStart::new("create_tag")))?;
    write_text_element(&mut w, "name", name)?;
    w.write_event(Event::Start(BytesStart::new("resources")))?;
    let mut resource = BytesStart::new("resource");
    resource.push_attribute(("id", resource_id));
    w.write_event(Event::Empty(resource))?;
    write_text_element(&mut w, "type", resource_type)?;
    w.write_event(Event::End(quick_xml::events::BytesEnd::new("resources")))?;
    write_text_element(&mut w, "value", value)?;
    w.write_event(Event::End(quick_xml::events::BytesEnd::new("create_tag")))?;
    finish(w)
}

// ─── Response envelope ──────────────────────────────────────────────

/// Parse a response document and enforce the status envelope.
///
/// Returns the response root for further querying; a missing `status`
/// attribute or a non-2xx status becomes an error carrying the
/// console's `status_text`.
pub fn parse_response(xml: &str) -> GmpResult<XmlElement> {
    let root = XmlElement::parse(xml)?;
    let status = root
        .attr("status")
        .ok_or_else(|| GmpError::MissingField(format!("{}: status", root.name)))?;

    if status.starts_with('2') {
        Ok(root)
    } else {
        Err(GmpError::Status {
            status: status.to_string(),
            message: root.attr("status_text").unwrap_or_default().to_string(),
        })
    }
}

// ─── Writer helpers ─────────────────────────────────────────────────

fn writer() -> Writer<Cursor<Vec<u8>>> {
    Writer::new(Cursor::new(Vec::new()))
}

fn write_text_element(
    w: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> GmpResult<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(quick_xml::events::BytesEnd::new(name)))?;
    Ok(())
}

fn empty(e: BytesStart<'_>) -> GmpResult<String> {
    let mut w = writer();
    w.write_event(Event::Empty(e))?;
    finish(w)
}

fn finish(w: Writer<Cursor<Vec<u8>>>) -> GmpResult<String> {
    String::from_utf8(w.into_inner().into_inner())
        .map_err(|_| GmpError::XmlParse("command is not valid UTF-8".into()))
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_command() {
        let xml = authenticate("admin", "secret").unwrap();
        assert_eq!(
            xml,
            "<authenticate><credentials><username>admin</username>\
             <password>secret</password></credentials></authenticate>"
        );
    }

    #[test]
    fn authenticate_escapes_credentials() {
        let xml = authenticate("ad<min", "p&ss").unwrap();
        assert!(xml.contains("<username>ad&lt;min</username>"));
        assert!(xml.contains("<password>p&amp;ss</password>"));
    }

    #[test]
    fn get_assets_command() {
        let xml = get_assets("ip=10.0.0.5").unwrap();
        assert_eq!(xml, r#"<get_assets type="host" filter="ip=10.0.0.5"/>"#);
    }

    #[test]
    fn create_host_command() {
        let xml = create_host("10.0.0.5", "db server").unwrap();
        assert_eq!(
            xml,
            "<create_asset><asset><type>host</type><name>10.0.0.5</name>\
             <comment>db server</comment></asset></create_asset>"
        );
    }

    #[test]
    fn create_host_without_comment() {
        let xml = create_host("10.0.0.5", "").unwrap();
        assert!(!xml.contains("comment"));
    }

    #[test]
    fn create_host_empty_name_rejected() {
        assert!(matches!(
            create_host("", "x"),
            Err(GmpError::InvalidParameter(_))
        ));
    }

    #[test]
    fn get_tasks_command() {
        let xml = get_tasks("tag=alertable").unwrap();
        assert_eq!(xml, r#"<get_tasks filter="tag=alertable"/>"#);
    }

    #[test]
    fn get_reports_command() {
        let xml = get_reports("task_id=t1 and status=Done sort-reverse=date").unwrap();
        assert_eq!(
            xml,
            r#"<get_reports filter="task_id=t1 and status=Done sort-reverse=date"/>"#
        );
    }

    #[test]
    fn delta_report_command() {
        let xml = get_delta_report("r-new", "r-old", "delta_states=n", "fmt-1").unwrap();
        assert!(xml.contains(r#"report_id="r-new""#));
        assert!(xml.contains(r#"delta_report_id="r-old""#));
        assert!(xml.contains(r#"format_id="fmt-1""#));
        assert!(xml.contains(r#"filter="delta_states=n""#));
        assert!(xml.contains(r#"details="1""#));
    }

    #[test]
    fn create_tag_command() {
        let xml = create_tag("delta_alert_sent", "report", "r-new", "2026-08-06").unwrap();
        assert_eq!(
            xml,
            "<create_tag><name>delta_alert_sent</name><resources>\
             <resource id=\"r-new\"/><type>report</type></resources>\
             <value>2026-08-06</value></create_tag>"
        );
    }

    #[test]
    fn envelope_accepts_2xx() {
        let root = parse_response(r#"<create_asset_response status="201" status_text="OK, resource created" id="a1"/>"#).unwrap();
        assert_eq!(root.attr("id"), Some("a1"));
    }

    #[test]
    fn envelope_rejects_4xx_with_status_text() {
        let err = parse_response(
            r#"<authenticate_response status="400" status_text="Authentication failed"/>"#,
        )
        .unwrap_err();
        match err {
            GmpError::Status { status, message } => {
                assert_eq!(status, "400");
                assert_eq!(message, "Authentication failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn envelope_requires_status() {
        assert!(matches!(
            parse_response("<surprise/>"),
            Err(GmpError::MissingField(_))
        ));
    }
}
