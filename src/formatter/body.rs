//! Lazy body producer for formatter-built messages.

use std::sync::Arc;

use bytes::Bytes;
use quick_xml::events::BytesStart;

use super::layout::StreamSlot;
use super::FormatterInner;
use crate::error::{OpwireError, Result};
use crate::message::{BodyWriter, BoxFuture, MessageVersion};
use crate::value::Value;
use crate::xml::XmlWriter;

/// Holds the slot values of one outbound message until its body is written.
#[derive(Debug)]
pub(super) struct OperationBodyWriter {
    formatter: Arc<FormatterInner>,
    is_request: bool,
    pub(super) values: Vec<Option<Value>>,
    return_value: Option<Value>,
}

impl OperationBodyWriter {
    pub(super) fn new(
        formatter: Arc<FormatterInner>,
        is_request: bool,
        values: Vec<Option<Value>>,
        return_value: Option<Value>,
    ) -> Self {
        Self {
            formatter,
            is_request,
            values,
            return_value,
        }
    }

    fn stream_slot(&self) -> Option<StreamSlot> {
        self.formatter
            .format(self.is_request)
            .ok()
            .and_then(|f| f.layout.stream)
    }

    fn stream_payload(&self, slot: StreamSlot) -> Result<Bytes> {
        let value = match slot {
            StreamSlot::Return => self.return_value.as_ref(),
            StreamSlot::Parameter(index) => self.values.get(index).and_then(Option::as_ref),
        };
        match value {
            None => Ok(Bytes::new()),
            Some(Value::Bytes(data)) => Ok(data.clone()),
            Some(other) => Err(OpwireError::Format(format!(
                "stream body requires bytes, found {}",
                other.kind()
            ))),
        }
    }
}

impl BodyWriter for OperationBodyWriter {
    fn is_buffered(&self) -> bool {
        self.stream_slot().is_none()
    }

    fn write_body_attributes(&self, start: &mut BytesStart<'_>, version: MessageVersion) {
        if self.stream_slot().is_none() {
            self.formatter.encoding.write_body_attributes(start, version);
        }
    }

    fn write_body_contents(&self, writer: &mut XmlWriter, version: MessageVersion) -> Result<()> {
        let format = self.formatter.format(self.is_request)?;
        if let Some(slot) = format.layout.stream {
            let data = self.stream_payload(slot)?;
            return self.formatter.stream_codec.serialize(writer, &data);
        }

        let ctx = self.formatter.context(version, format, self.is_request);
        self.formatter.encoding.serialize_body(
            writer,
            &ctx,
            self.return_value.as_ref(),
            &self.values,
        )
    }

    fn write_body_contents_async<'a>(
        &'a self,
        writer: &'a mut XmlWriter,
        version: MessageVersion,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.stream_slot() {
                Some(slot) => {
                    let data = self.stream_payload(slot)?;
                    self.formatter
                        .stream_codec
                        .serialize_async(writer, &data)
                        .await
                }
                None => self.write_body_contents(writer, version),
            }
        })
    }
}
