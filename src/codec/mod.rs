//! Body encodings.
//!
//! The formatter decides *what* goes into a message; a [`BodyEncoding`]
//! decides how body parts look as XML:
//!
//! - [`DocumentEncoding`] - one element per part, optionally wrapped
//! - [`RpcEncoding`] - parts inside an operation wrapper element, literal or
//!   SOAP-encoded (`xsi:type` annotations)
//!
//! Raw-stream bodies bypass encodings entirely and go through a
//! [`StreamCodec`] instead.
//!
//! # Example
//!
//! ```
//! use opwire::codec::{BodyEncoding, RpcEncoding};
//! use opwire::MessageVersion;
//! use quick_xml::events::BytesStart;
//!
//! let encoding = RpcEncoding::encoded();
//! let mut body = BytesStart::new("s:Body");
//! encoding.write_body_attributes(&mut body, MessageVersion::Soap11);
//! assert_eq!(body.attributes().count(), 2);
//! ```

mod document;
mod rpc;
mod stream;

pub use document::DocumentEncoding;
pub use rpc::RpcEncoding;
pub use stream::{Base64StreamCodec, StreamCodec, STREAM_ELEMENT};

use std::fmt;

use quick_xml::events::BytesStart;

use crate::description::MessageDescription;
use crate::error::{OpwireError, Result};
use crate::formatter::{BodyLayout, PartLayout};
use crate::message::headers::header_value;
use crate::message::{Message, MessageVersion, TypedValueHeader};
use crate::value::{PartType, Value};
use crate::xml::{BodyReader, XmlElement, XmlWriter};

/// Everything an encoding needs to know about the body being processed.
#[derive(Debug, Clone, Copy)]
pub struct BodyContext<'a> {
    pub version: MessageVersion,
    /// Resolved action, `None` when unconstrained.
    pub action: Option<&'a str>,
    pub operation: &'a str,
    pub layout: &'a BodyLayout,
    pub is_request: bool,
}

/// Encoding-specific shaping of headers and body content.
pub trait BodyEncoding: Send + Sync + fmt::Debug {
    /// Attributes for the body start element.
    fn write_body_attributes(&self, _start: &mut BytesStart<'_>, _version: MessageVersion) {}

    /// Turn header slots into message headers.
    fn add_headers_to_message(
        &self,
        message: &mut Message,
        description: &MessageDescription,
        parameters: &[Option<Value>],
    ) -> Result<()> {
        add_headers(message, description, parameters);
        Ok(())
    }

    /// Fill header slots from message headers.
    fn get_headers_from_message(
        &self,
        message: &Message,
        description: &MessageDescription,
        parameters: &mut [Option<Value>],
    ) -> Result<()> {
        get_headers(message, description, parameters)
    }

    /// Write body parts (and the return value, if any).
    fn serialize_body(
        &self,
        writer: &mut XmlWriter,
        ctx: &BodyContext<'_>,
        return_value: Option<&Value>,
        parameters: &[Option<Value>],
    ) -> Result<()>;

    /// Read body parts into `parameters`, returning the return value.
    fn deserialize_body(
        &self,
        reader: &mut BodyReader,
        ctx: &BodyContext<'_>,
        parameters: &mut [Option<Value>],
    ) -> Result<Option<Value>>;
}

/// Add one header per non-empty header slot.
pub fn add_headers(
    message: &mut Message,
    description: &MessageDescription,
    parameters: &[Option<Value>],
) {
    for header in &description.headers {
        let value = parameters.get(header.index()).cloned().flatten();
        let header = TypedValueHeader::from_description(header, value);
        if header.content().is_some() {
            message.headers_mut().add(header);
        }
    }
}

/// Fill header slots from matching message headers. Missing headers leave
/// their slot untouched.
pub fn get_headers(
    message: &Message,
    description: &MessageDescription,
    parameters: &mut [Option<Value>],
) -> Result<()> {
    for header in &description.headers {
        let Some(found) = message
            .headers()
            .find(&header.part.name, &header.part.namespace)
        else {
            continue;
        };
        if let Some(slot) = parameters.get_mut(header.index()) {
            *slot = header_value(header, found, message.version())?;
        }
    }
    Ok(())
}

/// Write one part element. `scope` is the in-scope default namespace.
///
/// An empty slot is omitted, or written as `xsi:nil` when `encoded`.
pub fn write_part(
    writer: &mut XmlWriter,
    part: &PartLayout,
    value: Option<&Value>,
    scope: &str,
    encoded: bool,
) -> Result<()> {
    let mut start = BytesStart::new(part.name.as_str());
    if part.namespace.as_str() != scope {
        start.push_attribute(("xmlns", part.namespace.as_str()));
    }

    let Some(value) = value else {
        if encoded {
            start.push_attribute(("xsi:nil", "true"));
            writer.empty(start)?;
        }
        return Ok(());
    };

    if encoded {
        if let Some(xsd) = part.ty.xsd_name() {
            start.push_attribute(("xsi:type", xsd));
        }
    }

    writer.start(start)?;
    match (part.ty, value) {
        (PartType::Xml, Value::Xml(element)) => element.write_to(writer, &part.namespace)?,
        (PartType::Xml, other) => {
            return Err(OpwireError::Format(format!(
                "part '{}' expects xml, found {}",
                part.name,
                other.kind()
            )))
        }
        (ty, value) => writer.text(&ty.to_text(value)?)?,
    }
    writer.end_element()
}

/// Decode one part element.
pub fn read_part(element: XmlElement, part: &PartLayout, encoded: bool) -> Result<Option<Value>> {
    if encoded {
        if matches!(element.attribute("nil"), Some("true") | Some("1")) {
            return Ok(None);
        }
        if let (Some(found), Some(expected)) = (element.attribute("type"), part.ty.xsd_name()) {
            if local_name(found) != local_name(expected) {
                return Err(OpwireError::Format(format!(
                    "part '{}' is typed '{}', expected '{}'",
                    part.name, found, expected
                )));
            }
        }
    }
    part.ty.from_element(element)
}

/// Write the return value, then every part in declared order.
pub fn write_parts(
    writer: &mut XmlWriter,
    layout: &BodyLayout,
    return_value: Option<&Value>,
    parameters: &[Option<Value>],
    scope: &str,
    encoded: bool,
) -> Result<()> {
    if let Some(part) = &layout.return_value {
        write_part(writer, part, return_value, scope, encoded)?;
    }
    for part in &layout.parts {
        let value = parameters.get(part.index).and_then(Option::as_ref);
        write_part(writer, part, value, scope, encoded)?;
    }
    Ok(())
}

/// Read the return value, then every part in declared order. Absent parts
/// leave their slot untouched.
pub fn read_parts(
    reader: &mut BodyReader,
    layout: &BodyLayout,
    parameters: &mut [Option<Value>],
    encoded: bool,
) -> Result<Option<Value>> {
    let mut return_value = None;
    if let Some(part) = &layout.return_value {
        if let Some(element) = next_part(reader, part) {
            return_value = read_part(element, part, encoded)?;
        }
    }
    for part in &layout.parts {
        if let Some(element) = next_part(reader, part) {
            let value = read_part(element, part, encoded)?;
            if let Some(slot) = parameters.get_mut(part.index) {
                *slot = value;
            }
        }
    }
    Ok(return_value)
}

fn next_part(reader: &mut BodyReader, part: &PartLayout) -> Option<XmlElement> {
    if reader.is_start_element(&part.name, &part.namespace) {
        reader.read_element()
    } else {
        None
    }
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}
