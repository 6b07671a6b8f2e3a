//! The wire message and its buffered form.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use quick_xml::events::BytesStart;

use super::body::{BodyState, BodyWriter, BufferedBodyWriter};
use super::{MessageHeaders, MessageVersion};
use crate::error::{OpwireError, Result};
use crate::value::Value;
use crate::xml::{BodyReader, XmlWriter};

/// Out-of-band values attached to a message. Never written to the wire.
pub type MessageProperties = HashMap<String, Value>;

/// A message: headers, properties and a lazily produced body.
///
/// The body can be written once. To send the same message more than once,
/// turn it into a [`MessageBuffer`] with
/// [`create_buffered_copy`](Self::create_buffered_copy).
#[derive(Debug)]
pub struct Message {
    version: MessageVersion,
    headers: MessageHeaders,
    properties: MessageProperties,
    body: Option<Arc<dyn BodyWriter>>,
    state: AtomicU8,
    buffer: OnceLock<Arc<dyn BodyWriter>>,
}

impl Message {
    /// Message whose body is produced by `body` when written.
    pub fn new(version: MessageVersion, body: Arc<dyn BodyWriter>) -> Self {
        Self::from_parts(
            version,
            MessageHeaders::new(),
            MessageProperties::new(),
            Some(body),
        )
    }

    /// Message without a body.
    pub fn empty(version: MessageVersion) -> Self {
        Self::from_parts(version, MessageHeaders::new(), MessageProperties::new(), None)
    }

    /// Message whose body contents are already serialized.
    pub fn from_body_bytes(version: MessageVersion, contents: Bytes) -> Self {
        Self::new(version, Arc::new(BufferedBodyWriter::new(contents)))
    }

    pub(crate) fn from_parts(
        version: MessageVersion,
        headers: MessageHeaders,
        properties: MessageProperties,
        body: Option<Arc<dyn BodyWriter>>,
    ) -> Self {
        Self {
            version,
            headers,
            properties,
            body,
            state: AtomicU8::new(BodyState::Unwritten as u8),
            buffer: OnceLock::new(),
        }
    }

    pub fn with_headers(mut self, headers: MessageHeaders) -> Self {
        self.headers = headers;
        self
    }

    #[inline]
    pub fn version(&self) -> MessageVersion {
        self.version
    }

    #[inline]
    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut MessageHeaders {
        &mut self.headers
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.headers.action()
    }

    #[inline]
    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    /// Current body state.
    #[inline]
    pub fn state(&self) -> BodyState {
        BodyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the body is known to have no content.
    pub fn is_empty(&self) -> bool {
        match &self.body {
            None => true,
            Some(body) => body
                .contents()
                .is_some_and(|c| c.iter().all(u8::is_ascii_whitespace)),
        }
    }

    /// Whether the body can be produced more than once.
    pub fn is_body_buffered(&self) -> bool {
        self.body.as_ref().map_or(true, |b| b.is_buffered())
    }

    /// Let the body producer add attributes to the body start element.
    pub fn write_body_attributes(&self, start: &mut BytesStart<'_>) {
        if let Some(body) = &self.body {
            body.write_body_attributes(start, self.version);
        }
    }

    fn begin_write(&self) -> Result<()> {
        match self.state.compare_exchange(
            BodyState::Unwritten as u8,
            BodyState::Writing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => Err(OpwireError::InvalidState(
                match BodyState::from_u8(current) {
                    BodyState::Writing => "message body is already being written",
                    BodyState::Written => "message body has already been written",
                    _ => "message has been buffered; create copies from its buffer",
                }
                .to_string(),
            )),
        }
    }

    fn end_write(&self, ok: bool) {
        let next = if ok {
            BodyState::Written
        } else {
            BodyState::Unwritten
        };
        // Only the writer that moved the body to Writing may leave it.
        let _ = self.state.compare_exchange(
            BodyState::Writing as u8,
            next as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Write the body contents. Allowed once per message.
    pub fn write_body_contents(&self, writer: &mut XmlWriter) -> Result<()> {
        let Some(body) = &self.body else {
            return Ok(());
        };
        self.begin_write()?;
        let result = body.write_body_contents(writer, self.version);
        self.end_write(result.is_ok());
        result
    }

    /// Async counterpart of [`write_body_contents`](Self::write_body_contents).
    pub async fn write_body_contents_async(&self, writer: &mut XmlWriter) -> Result<()> {
        let Some(body) = &self.body else {
            return Ok(());
        };
        self.begin_write()?;
        let result = body.write_body_contents_async(writer, self.version).await;
        self.end_write(result.is_ok());
        result
    }

    /// Write the body and open a reader over it.
    pub fn body_reader(&self) -> Result<BodyReader> {
        let mut writer = XmlWriter::new();
        self.write_body_contents(&mut writer)?;
        BodyReader::from_bytes(writer.as_bytes())
    }

    /// Snapshot headers and properties and buffer the body.
    ///
    /// An already buffered message hands out its existing buffer again. A
    /// replayable producer is wrapped without running it. A single-read
    /// producer is drained once into bytes, bounded by `max_buffer_size`.
    pub fn create_buffered_copy(&self, max_buffer_size: usize) -> Result<MessageBuffer> {
        let body = match &self.body {
            None => None,
            Some(body) => Some(self.buffer_body(body, max_buffer_size)?),
        };
        Ok(MessageBuffer {
            version: self.version,
            headers: self.headers.clone(),
            properties: self.properties.clone(),
            body,
            closed: AtomicBool::new(false),
        })
    }

    fn buffer_body(
        &self,
        body: &Arc<dyn BodyWriter>,
        max_buffer_size: usize,
    ) -> Result<Arc<dyn BodyWriter>> {
        match self.state() {
            BodyState::Buffered => self.buffer.get().cloned().ok_or_else(|| {
                OpwireError::InvalidState("buffered message has lost its body".to_string())
            }),
            BodyState::Writing => Err(OpwireError::InvalidState(
                "cannot buffer a message while its body is being written".to_string(),
            )),
            BodyState::Written if !body.is_buffered() => Err(OpwireError::InvalidState(
                "message body has been consumed and cannot be buffered".to_string(),
            )),
            _ if body.is_buffered() => self.mark_buffered(Arc::clone(body)),
            _ => {
                self.begin_write()?;
                let mut writer = XmlWriter::new();
                let result = body.write_body_contents(&mut writer, self.version);
                // A single-read producer is spent even when it fails.
                self.end_write(true);
                result?;

                if writer.len() > max_buffer_size {
                    return Err(OpwireError::QuotaExceeded {
                        size: writer.len(),
                        max: max_buffer_size,
                    });
                }
                tracing::debug!("Buffered {} byte message body", writer.len());

                let buffered: Arc<dyn BodyWriter> = Arc::new(
                    BufferedBodyWriter::with_attributes_from(writer.into_bytes(), Arc::clone(body)),
                );
                self.mark_buffered(buffered)
            }
        }
    }

    /// Move to `Buffered` from `Unwritten` or `Written`. Fails if a writer
    /// got in first.
    fn mark_buffered(&self, buffered: Arc<dyn BodyWriter>) -> Result<Arc<dyn BodyWriter>> {
        let stored = Arc::clone(self.buffer.get_or_init(|| buffered));
        for from in [BodyState::Unwritten, BodyState::Written] {
            if self
                .state
                .compare_exchange(
                    from as u8,
                    BodyState::Buffered as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Ok(stored);
            }
        }
        match self.state() {
            BodyState::Buffered => Ok(stored),
            _ => Err(OpwireError::InvalidState(
                "cannot buffer a message while its body is being written".to_string(),
            )),
        }
    }
}

/// Replayable snapshot of a message.
#[derive(Debug)]
pub struct MessageBuffer {
    version: MessageVersion,
    headers: MessageHeaders,
    properties: MessageProperties,
    body: Option<Arc<dyn BodyWriter>>,
    closed: AtomicBool,
}

impl MessageBuffer {
    /// Create a fresh, unwritten copy of the buffered message.
    pub fn create_message(&self) -> Result<Message> {
        if self.is_closed() {
            return Err(OpwireError::BufferDisposed);
        }
        Ok(Message::from_parts(
            self.version,
            self.headers.clone(),
            self.properties.clone(),
            self.body.clone(),
        ))
    }

    /// Release the buffer. Later [`create_message`](Self::create_message)
    /// calls fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn version(&self) -> MessageVersion {
        self.version
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.headers.action()
    }

    /// Size of the buffered body, when it was drained into bytes.
    pub fn buffer_size(&self) -> Option<usize> {
        self.body.as_ref().and_then(|b| b.contents()).map(Bytes::len)
    }
}
