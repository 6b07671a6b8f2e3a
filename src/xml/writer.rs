//! Buffered XML writer.

use bytes::Bytes;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{OpwireError, Result};

/// Writes XML events into an in-memory buffer.
///
/// Keeps a stack of open element names so callers close elements with
/// [`end_element`](Self::end_element) without repeating the name.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
    open: Vec<String>,
}

impl XmlWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create an empty writer with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Writer::new(Vec::with_capacity(capacity)),
            open: Vec::new(),
        }
    }

    /// Write a start tag built by the caller.
    pub fn start(&mut self, start: BytesStart<'_>) -> Result<()> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_string();
        self.inner.write_event(Event::Start(start))?;
        self.open.push(name);
        Ok(())
    }

    /// Write `<name xmlns="namespace">`. An empty namespace writes no declaration.
    pub fn start_element(&mut self, name: &str, namespace: &str) -> Result<()> {
        let mut start = BytesStart::new(name);
        if !namespace.is_empty() {
            start.push_attribute(("xmlns", namespace));
        }
        self.start(start)
    }

    /// Write a self-closing element.
    pub fn empty(&mut self, start: BytesStart<'_>) -> Result<()> {
        self.inner.write_event(Event::Empty(start))?;
        Ok(())
    }

    /// Close the innermost open element.
    pub fn end_element(&mut self) -> Result<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| OpwireError::InvalidState("no open element to close".to_string()))?;
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Write escaped character data.
    pub fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// Append bytes verbatim. The caller guarantees they are well-formed.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.inner.get_mut().extend_from_slice(bytes);
    }

    /// Number of currently open elements.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    /// Whether nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View the written bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }

    /// Finish writing and take the buffer.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.inner.into_inner())
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}
