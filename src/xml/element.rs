//! Owned XML element tree.

use bytes::Bytes;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::XmlWriter;
use crate::error::{OpwireError, Result};

/// A node inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Child element.
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
}

/// An element with its resolved namespace, attributes and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name.
    pub name: String,
    /// Resolved namespace URI (empty when unqualified).
    pub namespace: String,
    /// Attributes as `(qualified name, value)`, namespace declarations excluded.
    pub attributes: Vec<(String, String)>,
    /// Prefixed namespace declarations made on this element, as `(prefix, uri)`.
    pub namespaces: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a text child.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Append an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add the declarations in `scope` whose prefix this element does not
    /// already declare. Used when the element is detached from its ancestors.
    pub fn inherit_namespaces(&mut self, scope: &[(String, String)]) {
        for (prefix, uri) in scope {
            if !self.namespaces.iter().any(|(p, _)| p == prefix) {
                self.namespaces.push((prefix.clone(), uri.clone()));
            }
        }
    }

    /// Whether this element has the given local name and namespace.
    #[inline]
    pub fn is(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace == namespace
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Look up an attribute by qualified name or by its local part.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find_map(|(key, value)| {
            let local = key.rsplit(':').next().unwrap_or(key);
            (key == name || local == name).then_some(value.as_str())
        })
    }

    /// Iterate over child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Take the child elements, dropping text.
    pub fn into_child_elements(self) -> Vec<XmlElement> {
        self.children
            .into_iter()
            .filter_map(|node| match node {
                XmlNode::Element(e) => Some(e),
                XmlNode::Text(_) => None,
            })
            .collect()
    }

    /// Write this element where the in-scope default namespace is `scope`.
    pub fn write_to(&self, writer: &mut XmlWriter, scope: &str) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        if self.namespace != scope {
            start.push_attribute(("xmlns", self.namespace.as_str()));
        }
        for (prefix, uri) in &self.namespaces {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer.empty(start);
        }

        writer.start(start)?;
        self.write_children(writer, &self.namespace)?;
        writer.end_element()
    }

    /// Write only the children, with `scope` as the in-scope default namespace.
    pub fn write_children(&self, writer: &mut XmlWriter, scope: &str) -> Result<()> {
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(writer, scope)?,
                XmlNode::Text(t) => writer.text(t)?,
            }
        }
        Ok(())
    }

    /// Serialize as a standalone fragment.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = XmlWriter::new();
        self.write_to(&mut writer, "")?;
        Ok(writer.into_bytes())
    }
}

/// Parse a fragment that may contain several top-level nodes.
pub fn parse_fragment(bytes: &[u8]) -> Result<Vec<XmlNode>> {
    let mut reader = NsReader::from_reader(bytes);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut roots: Vec<XmlNode> = Vec::new();

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(start) => {
                let element = open_element(ns, &start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(ns, &start)?;
                attach(&mut stack, &mut roots, XmlNode::Element(element));
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| OpwireError::MalformedXml("unexpected end tag".to_string()))?;
                attach(&mut stack, &mut roots, XmlNode::Element(element));
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                if !text.is_empty() {
                    attach(&mut stack, &mut roots, XmlNode::Text(text));
                }
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data)?.to_string();
                attach(&mut stack, &mut roots, XmlNode::Text(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(OpwireError::MalformedXml(format!(
            "element '{}' is not closed",
            open.name
        )));
    }

    Ok(roots)
}

/// Parse a fragment that must consist of elements only (whitespace allowed
/// between them).
pub fn parse_elements(bytes: &[u8]) -> Result<Vec<XmlElement>> {
    let mut elements = Vec::new();
    for node in parse_fragment(bytes)? {
        match node {
            XmlNode::Element(e) => elements.push(e),
            XmlNode::Text(t) if t.trim().is_empty() => {}
            XmlNode::Text(t) => {
                return Err(OpwireError::MalformedXml(format!(
                    "unexpected text '{}' outside of an element",
                    t.trim()
                )))
            }
        }
    }
    Ok(elements)
}

fn open_element(ns: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<XmlElement> {
    let namespace = match ns {
        ResolveResult::Bound(ns) => std::str::from_utf8(ns.as_ref())?.to_string(),
        ResolveResult::Unbound => String::new(),
        ResolveResult::Unknown(prefix) => {
            return Err(OpwireError::MalformedXml(format!(
                "unknown namespace prefix '{}'",
                String::from_utf8_lossy(&prefix)
            )))
        }
    };
    let name = std::str::from_utf8(start.local_name().as_ref())?.to_string();

    let mut attributes = Vec::new();
    let mut namespaces = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?.into_owned();
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.push((prefix.to_string(), value));
        } else if key != "xmlns" {
            attributes.push((key.to_string(), value));
        }
    }

    Ok(XmlElement {
        name,
        namespace,
        attributes,
        namespaces,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], roots: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}
