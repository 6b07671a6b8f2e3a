//! XML surface used by the formatter.
//!
//! A deliberately small layer over `quick-xml`:
//!
//! - [`XmlWriter`] - event writer with an open-element stack
//! - [`XmlElement`] - owned element tree for preformed content and parsed bodies
//! - [`BodyReader`] - cursor over the top-level elements of a message body
//!
//! Elements are written without prefixes, declaring the default namespace
//! whenever it changes. Attribute names are kept as written (`xsi:type`),
//! their prefixes are not resolved.

mod element;
mod reader;
mod writer;

pub use element::{parse_elements, parse_fragment, XmlElement, XmlNode};
pub use reader::BodyReader;
pub use writer::XmlWriter;

/// XML Schema instance namespace.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML Schema namespace.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
