//! Generic XML element tree with slash-path queries.
//!
//! GMP responses are ad-hoc XML documents; rather than one serde struct
//! per command the tools walk a small element tree with path expressions
//! like `report/user_tags/tag/name`, mirroring how operators query these
//! responses.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::str;

use crate::error::{GmpError, GmpResult};

/// A parsed XML element: name, attributes, direct text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parse a complete XML document and return its root element.
    pub fn parse(xml: &str) -> GmpResult<XmlElement> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let elem = element_from_start(e)?;
                    stack.push(elem);
                }
                Ok(Event::Empty(ref e)) => {
                    let elem = element_from_start(e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(elem),
                        None if root.is_none() => root = Some(elem),
                        None => {
                            return Err(GmpError::XmlParse(
                                "multiple root elements".into(),
                            ))
                        }
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| GmpError::XmlParse(e.to_string()))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::End(_)) => {
                    let elem = stack
                        .pop()
                        .ok_or_else(|| GmpError::XmlParse("unbalanced end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(elem),
                        None if root.is_none() => root = Some(elem),
                        None => {
                            return Err(GmpError::XmlParse(
                                "multiple root elements".into(),
                            ))
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(GmpError::XmlParse(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(GmpError::XmlParse("truncated document".into()));
        }
        root.ok_or_else(|| GmpError::XmlParse("empty document".into()))
    }

    /// An attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The first direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// The first element matching a slash-separated path, e.g.
    /// `report/user_tags/tag`.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        self.find_all(path).into_iter().next()
    }

    /// All elements matching a slash-separated path.
    pub fn find_all(&self, path: &str) -> Vec<&XmlElement> {
        let mut current: Vec<&XmlElement> = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let mut next = Vec::new();
            for elem in current {
                next.extend(elem.children.iter().filter(|c| c.name == segment));
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Trimmed text content of the first element matching the path.
    pub fn find_text(&self, path: &str) -> Option<&str> {
        self.find(path).map(|e| e.text.trim())
    }

    /// Trimmed direct text content of this element.
    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>) -> GmpResult<XmlElement> {
    let name = str::from_utf8(e.name().as_ref())
        .map_err(|_| GmpError::XmlParse("invalid UTF-8 in tag name".into()))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())
            .map_err(|_| GmpError::XmlParse("invalid UTF-8 in attribute name".into()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| GmpError::XmlParse(e.to_string()))?
            .to_string();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

// ─── Tests ──────────────────────────────────────────────────────────
