//! Message headers.
//!
//! Every header has a fixed [`HeaderIdentity`] decided when it is created.
//! Content comes from one of two places:
//!
//! - [`XmlElementHeader`] - preformed XML, written verbatim (also used for
//!   headers read off the wire)
//! - [`TypedValueHeader`] - a slot value rendered with its part type
//!
//! Headers with a namespace are written with the `h` prefix.

use std::fmt;
use std::sync::Arc;

use quick_xml::events::BytesStart;

use super::MessageVersion;
use crate::description::HeaderDescription;
use crate::error::{OpwireError, Result};
use crate::value::{HeaderValue, PartType, Value};
use crate::xml::{parse_elements, XmlElement, XmlNode, XmlWriter};

/// Prefix bound to a header's namespace.
pub const HEADER_PREFIX: &str = "h";

/// Prefix bound to the envelope namespace.
pub const ENVELOPE_PREFIX: &str = "s";

/// Wire identity of one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIdentity {
    pub name: String,
    pub namespace: String,
    pub must_understand: bool,
    /// Targeted actor/role, empty for the ultimate receiver.
    pub actor: String,
    pub relay: bool,
}

impl HeaderIdentity {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        must_understand: bool,
        actor: Option<String>,
        relay: bool,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            must_understand,
            actor: actor.unwrap_or_default(),
            relay,
        }
    }
}

/// A header that can be written into an envelope.
pub trait MessageHeader: Send + Sync + fmt::Debug {
    fn identity(&self) -> &HeaderIdentity;

    /// Write the content between the header's start and end tags.
    fn write_header_contents(&self, writer: &mut XmlWriter, version: MessageVersion)
        -> Result<()>;

    fn name(&self) -> &str {
        &self.identity().name
    }

    fn namespace(&self) -> &str {
        &self.identity().namespace
    }

    fn must_understand(&self) -> bool {
        self.identity().must_understand
    }

    fn actor(&self) -> &str {
        &self.identity().actor
    }

    fn relay(&self) -> bool {
        self.identity().relay
    }

    /// Extra attributes for the header start tag, after the identity ones.
    fn write_header_attributes(&self, _start: &mut BytesStart<'_>) {}

    /// Write the whole header element.
    fn write_header(&self, writer: &mut XmlWriter, version: MessageVersion) -> Result<()> {
        let mut start = header_start(self.identity(), version);
        self.write_header_attributes(&mut start);
        writer.start(start)?;
        self.write_header_contents(writer, version)?;
        writer.end_element()
    }

    /// The header as an element tree.
    fn to_element(&self, version: MessageVersion) -> Result<XmlElement> {
        let mut writer = XmlWriter::new();
        self.write_header(&mut writer, version)?;
        parse_elements(writer.as_bytes())?
            .into_iter()
            .next()
            .ok_or_else(|| OpwireError::MalformedXml(format!("header '{}' is empty", self.name())))
    }
}

fn header_start(identity: &HeaderIdentity, version: MessageVersion) -> BytesStart<'static> {
    let mut start = if identity.namespace.is_empty() {
        BytesStart::new(identity.name.clone())
    } else {
        let mut start = BytesStart::new(format!("{}:{}", HEADER_PREFIX, identity.name));
        start.push_attribute((
            format!("xmlns:{}", HEADER_PREFIX).as_str(),
            identity.namespace.as_str(),
        ));
        start
    };

    if identity.must_understand {
        start.push_attribute((
            format!("{}:mustUnderstand", ENVELOPE_PREFIX).as_str(),
            version.true_value(),
        ));
    }
    if !identity.actor.is_empty() {
        start.push_attribute((
            format!("{}:{}", ENVELOPE_PREFIX, version.actor_attribute()).as_str(),
            identity.actor.as_str(),
        ));
    }
    if identity.relay && version.supports_relay() {
        start.push_attribute((format!("{}:relay", ENVELOPE_PREFIX).as_str(), "true"));
    }
    start
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true"))
}

/// Local names of the attributes that make up a [`HeaderIdentity`].
const IDENTITY_ATTRIBUTES: [&str; 4] = ["mustUnderstand", "actor", "role", "relay"];

/// Header with preformed XML content.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElementHeader {
    identity: HeaderIdentity,
    content: Vec<XmlNode>,
    /// Attributes other than the identity ones, as `(qualified name, value)`.
    attributes: Vec<(String, String)>,
    /// Prefix declarations the content and attributes rely on.
    namespaces: Vec<(String, String)>,
}

impl XmlElementHeader {
    pub fn new(identity: HeaderIdentity, content: Vec<XmlNode>) -> Self {
        Self {
            identity,
            content,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// Wrap a header element read from an envelope.
    ///
    /// Attributes outside the identity and prefix declarations are kept and
    /// written back. Declarations of the `h` and `s` prefixes are dropped
    /// since the writer binds those itself.
    pub fn from_element(element: XmlElement) -> Self {
        let actor = element
            .attribute("actor")
            .or_else(|| element.attribute("role"))
            .map(str::to_string);
        let identity = HeaderIdentity::new(
            element.name.as_str(),
            element.namespace.as_str(),
            is_true(element.attribute("mustUnderstand")),
            actor,
            is_true(element.attribute("relay")),
        );
        let attributes = element
            .attributes
            .into_iter()
            .filter(|(key, _)| {
                let local = key.rsplit(':').next().unwrap_or(key);
                !IDENTITY_ATTRIBUTES.contains(&local)
            })
            .collect();
        let namespaces = element
            .namespaces
            .into_iter()
            .filter(|(prefix, _)| prefix != HEADER_PREFIX && prefix != ENVELOPE_PREFIX)
            .collect();
        Self {
            identity,
            content: element.children,
            attributes,
            namespaces,
        }
    }

    pub fn content(&self) -> &[XmlNode] {
        &self.content
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }
}

impl MessageHeader for XmlElementHeader {
    fn identity(&self) -> &HeaderIdentity {
        &self.identity
    }

    fn write_header_attributes(&self, start: &mut BytesStart<'_>) {
        for (prefix, uri) in &self.namespaces {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
    }

    fn write_header_contents(&self, writer: &mut XmlWriter, _version: MessageVersion) -> Result<()> {
        for node in &self.content {
            match node {
                XmlNode::Element(e) => e.write_to(writer, "")?,
                XmlNode::Text(t) => writer.text(t)?,
            }
        }
        Ok(())
    }
}

/// Header whose content is a slot value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValueHeader {
    identity: HeaderIdentity,
    ty: PartType,
    content: Option<Value>,
}

impl TypedValueHeader {
    pub fn new(identity: HeaderIdentity, ty: PartType, content: Option<Value>) -> Self {
        Self {
            identity,
            ty,
            content,
        }
    }

    /// Build from a header description and the value in its slot.
    pub fn from_description(description: &HeaderDescription, value: Option<Value>) -> Self {
        let (content, identity) = header_content(description, value);
        Self::new(identity, description.part.ty, content)
    }

    pub fn content(&self) -> Option<&Value> {
        self.content.as_ref()
    }
}

impl MessageHeader for TypedValueHeader {
    fn identity(&self) -> &HeaderIdentity {
        &self.identity
    }

    fn write_header_contents(&self, writer: &mut XmlWriter, _version: MessageVersion) -> Result<()> {
        match &self.content {
            None => Ok(()),
            Some(Value::Xml(e)) => e.write_to(writer, ""),
            Some(v) => writer.text(&self.ty.to_text(v)?),
        }
    }
}

/// Split a slot value into header content and header identity.
///
/// For typed headers a [`HeaderValue`] slot overrides the described
/// must-understand, relay and actor; any other value uses the description
/// as is.
pub fn header_content(
    description: &HeaderDescription,
    value: Option<Value>,
) -> (Option<Value>, HeaderIdentity) {
    let mut must_understand = description.must_understand;
    let mut relay = description.relay;
    let mut actor = description.actor.clone();

    let content = match value {
        Some(Value::Header(header)) if description.typed_header => {
            let header = *header;
            if let Some(m) = header.must_understand {
                must_understand = m;
            }
            if let Some(r) = header.relay {
                relay = r;
            }
            if header.actor.is_some() {
                actor = header.actor;
            }
            header.content
        }
        other => other,
    };

    let identity = HeaderIdentity::new(
        description.part.name.as_str(),
        description.part.namespace.as_str(),
        must_understand,
        actor,
        relay,
    );
    (content, identity)
}

/// Read a slot value back out of a header.
///
/// Typed headers come back as a [`HeaderValue`] whose overrides are set only
/// where the header differs from its description.
pub fn header_value(
    description: &HeaderDescription,
    header: &dyn MessageHeader,
    version: MessageVersion,
) -> Result<Option<Value>> {
    let element = header.to_element(version)?;
    let content = description.part.ty.from_element(element)?;
    if !description.typed_header {
        return Ok(content);
    }

    let described_actor = description.actor.as_deref().unwrap_or("");
    let value = HeaderValue {
        content,
        must_understand: (header.must_understand() != description.must_understand)
            .then_some(header.must_understand()),
        relay: (header.relay() != description.relay).then_some(header.relay()),
        actor: (header.actor() != described_actor).then(|| header.actor().to_string()),
    };
    Ok(Some(Value::Header(Box::new(value))))
}

/// Action plus the ordered header list of a message.
#[derive(Debug, Clone, Default)]
pub struct MessageHeaders {
    action: Option<String>,
    headers: Vec<Arc<dyn MessageHeader>>,
}

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn set_action(&mut self, action: Option<String>) {
        self.action = action;
    }

    pub fn add<H: MessageHeader + 'static>(&mut self, header: H) {
        self.headers.push(Arc::new(header));
    }

    /// First header with the given name and namespace.
    pub fn find(&self, name: &str, namespace: &str) -> Option<&dyn MessageHeader> {
        self.headers
            .iter()
            .find(|h| h.name() == name && h.namespace() == namespace)
            .map(|h| h.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn MessageHeader> {
        self.headers.iter().map(|h| h.as_ref())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
