//! Minimal XML node tree.
//!
//! Tags, text and attribute values are kept exactly as written in the
//! source, so writing a parsed tree reproduces the original markup minus the
//! parts the canonical form drops: declaration, comments, processing
//! instructions, doctype and whitespace-only text between tags.

use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;

use crate::core::CpeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Escaped character data.
    Text(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written (`prefix:local`).
    pub name: String,
    /// Attributes in document order, values escaped.
    pub attributes: Vec<(String, String)>,
    /// Attribute section of a parsed start tag, verbatim (quotes and
    /// spacing included).
    pub raw_attributes: Option<String>,
    /// Parsed from `<name/>`. Written back that way while childless.
    pub self_closing: bool,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            raw_attributes: None,
            self_closing: false,
            children: Vec::new(),
        }
    }

    /// Add an attribute, escaping the value.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        let value = escape(value).into_owned();
        if let Some(raw) = &mut self.raw_attributes {
            raw.push_str(&format!(" {key}=\"{value}\""));
        }
        self.attributes.push((key.to_string(), value));
        self
    }

    /// Append a text node, escaping the content.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(escape(text).into_owned()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.local_name() == local => Some(e),
            _ => None,
        })
    }

    /// Follow a chain of local names from this element.
    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |el, name| el.child(name))
    }

    /// Remove and return the first child element with the given local name.
    pub fn remove_child(&mut self, local: &str) -> Option<Element> {
        let idx = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.local_name() == local))?;
        match self.children.remove(idx) {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Unescaped concatenation of the direct text children.
    pub fn text(&self) -> String {
        let raw: String = self
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        match unescape(&raw) {
            Ok(s) => s.into_owned(),
            Err(_) => raw,
        }
    }

    /// Serialize without declaration or indentation.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(b'<');
        out.extend_from_slice(self.name.as_bytes());
        match &self.raw_attributes {
            Some(raw) => out.extend_from_slice(raw.as_bytes()),
            None => {
                for (k, v) in &self.attributes {
                    out.push(b' ');
                    out.extend_from_slice(k.as_bytes());
                    out.extend_from_slice(b"=\"");
                    out.extend_from_slice(v.as_bytes());
                    out.push(b'"');
                }
            }
        }
        if self.self_closing && self.children.is_empty() {
            out.extend_from_slice(b"/>");
            return;
        }
        out.push(b'>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_to(out),
                Node::Text(t) => out.extend_from_slice(t.as_bytes()),
                Node::CData(t) => {
                    out.extend_from_slice(b"<![CDATA[");
                    out.extend_from_slice(t.as_bytes());
                    out.extend_from_slice(b"]]>");
                }
            }
        }
        out.extend_from_slice(b"</");
        out.extend_from_slice(self.name.as_bytes());
        out.push(b'>');
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

fn c14n_err(msg: impl std::fmt::Display) -> CpeError {
    CpeError::Canonicalization(msg.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String, CpeError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| c14n_err(format!("invalid UTF-8: {e}")))
}

fn start_element(
    e: &quick_xml::events::BytesStart<'_>,
    self_closing: bool,
) -> Result<Element, CpeError> {
    let mut el = Element::new(utf8(e.name().as_ref())?);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| c14n_err(format!("bad attribute: {e}")))?;
        el.attributes
            .push((utf8(attr.key.as_ref())?, utf8(&attr.value)?));
    }
    el.raw_attributes = Some(utf8(e.attributes_raw())?);
    el.self_closing = self_closing;
    Ok(el)
}

/// Parse a document into its root element.
pub fn parse(xml: &[u8]) -> Result<Element, CpeError> {
    let xml = xml.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml);
    let mut reader = Reader::from_reader(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    let mut attach = |stack: &mut Vec<Element>, el: Element| -> Result<(), CpeError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(el)),
            None if root.is_none() => root = Some(el),
            None => return Err(c14n_err("more than one root element")),
        }
        Ok(())
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(start_element(&e, false)?),
            Ok(Event::Empty(e)) => attach(&mut stack, start_element(&e, true)?)?,
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| c14n_err("unexpected closing tag"))?;
                attach(&mut stack, el)?;
            }
            Ok(Event::Text(e)) => {
                let text = utf8(&e)?;
                if !text.trim().is_empty() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None => return Err(c14n_err("text outside the root element")),
                    }
                }
            }
            Ok(Event::CData(e)) => match stack.last_mut() {
                Some(parent) => parent.children.push(Node::CData(utf8(&e)?)),
                None => return Err(c14n_err("CDATA outside the root element")),
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(c14n_err(format!("XML parse error: {e}"))),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(c14n_err("unclosed element at end of input"));
    }
    root.ok_or_else(|| c14n_err("document has no root element"))
}
