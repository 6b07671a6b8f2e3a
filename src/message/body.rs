//! Body producers and their write state.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use quick_xml::events::BytesStart;

use super::MessageVersion;
use crate::error::Result;
use crate::xml::XmlWriter;

/// Boxed future returned by the async write paths.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Write state of a message body.
///
/// `Unwritten -> Writing -> Written`, or `Buffered` once the message has been
/// turned into a [`MessageBuffer`](super::MessageBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyState {
    Unwritten = 0,
    Writing = 1,
    Written = 2,
    Buffered = 3,
}

impl BodyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => BodyState::Unwritten,
            1 => BodyState::Writing,
            2 => BodyState::Written,
            _ => BodyState::Buffered,
        }
    }
}

/// Produces the contents of a message body on demand.
///
/// Nothing is serialized until the message is written. A producer that can
/// run more than once reports [`is_buffered`](Self::is_buffered).
pub trait BodyWriter: Send + Sync + fmt::Debug {
    /// Whether the contents can be produced more than once.
    fn is_buffered(&self) -> bool;

    /// Add attributes to the body start element before contents are written.
    fn write_body_attributes(&self, _start: &mut BytesStart<'_>, _version: MessageVersion) {}

    fn write_body_contents(&self, writer: &mut XmlWriter, version: MessageVersion) -> Result<()>;

    /// Async counterpart of [`write_body_contents`](Self::write_body_contents).
    /// Must produce the same bytes.
    fn write_body_contents_async<'a>(
        &'a self,
        writer: &'a mut XmlWriter,
        version: MessageVersion,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.write_body_contents(writer, version) })
    }

    /// Serialized contents, when the producer already holds them.
    fn contents(&self) -> Option<&Bytes> {
        None
    }
}

/// Body held as serialized bytes: inbound bodies and drained buffers.
#[derive(Debug)]
pub struct BufferedBodyWriter {
    contents: Bytes,
    attributes: Vec<(String, String)>,
    attributes_from: Option<Arc<dyn BodyWriter>>,
}

impl BufferedBodyWriter {
    pub fn new(contents: Bytes) -> Self {
        Self {
            contents,
            attributes: Vec::new(),
            attributes_from: None,
        }
    }

    /// Contents read off the wire together with the body element's own
    /// attributes and prefix declarations.
    pub fn with_attributes(contents: Bytes, attributes: Vec<(String, String)>) -> Self {
        Self {
            contents,
            attributes,
            attributes_from: None,
        }
    }

    /// Keep `source` around for its body attributes only.
    pub fn with_attributes_from(contents: Bytes, source: Arc<dyn BodyWriter>) -> Self {
        Self {
            contents,
            attributes: Vec::new(),
            attributes_from: Some(source),
        }
    }
}

impl BodyWriter for BufferedBodyWriter {
    fn is_buffered(&self) -> bool {
        true
    }

    fn write_body_attributes(&self, start: &mut BytesStart<'_>, version: MessageVersion) {
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if let Some(source) = &self.attributes_from {
            source.write_body_attributes(start, version);
        }
    }

    fn write_body_contents(&self, writer: &mut XmlWriter, _version: MessageVersion) -> Result<()> {
        writer.raw(&self.contents);
        Ok(())
    }

    fn contents(&self) -> Option<&Bytes> {
        Some(&self.contents)
    }
}
