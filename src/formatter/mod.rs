//! Operation formatter.
//!
//! An [`OperationFormatter`] is built once per operation and turns
//! positional call values into [`Message`]s and back:
//!
//! ```text
//! OperationDescription ─► FormatterBuilder::build ─► OperationFormatter
//!                                                      │
//!            [Option<Value>] ─► serialize_request ─────┤──► Message (lazy body)
//!            [Option<Value>] ◄─ deserialize_request ◄──┘◄── Message
//! ```
//!
//! Within a message, properties are handled first, then headers, then the
//! body. Request decode failures become a sender-side [`ProtocolFault`];
//! reply decode failures become [`OpwireError::Communication`].
//!
//! # Example
//!
//! ```
//! use opwire::description::{Direction, MessageDescription, OperationDescription, PartDescription};
//! use opwire::{MessageVersion, OperationFormatter, PartType, Value};
//!
//! let op = OperationDescription::new("Echo").with_message(
//!     MessageDescription::new("urn:echo", Direction::Input)
//!         .with_part(PartDescription::new("text", "urn:echo", 0, PartType::Text)),
//! );
//! let formatter = OperationFormatter::builder(op).build().unwrap();
//!
//! let message = formatter
//!     .serialize_request(MessageVersion::default(), &[Some(Value::from("hi"))])
//!     .unwrap();
//! assert_eq!(message.action(), Some("urn:echo"));
//!
//! let mut values = vec![None];
//! formatter.deserialize_request(&message, &mut values).unwrap();
//! assert_eq!(values, vec![Some(Value::from("hi"))]);
//! ```

mod accessor;
mod body;
mod layout;
mod validate;

pub use accessor::AccessorTable;
pub use layout::{BodyLayout, PartLayout, StreamSlot, WrapperLayout};

use std::sync::Arc;

use body::OperationBodyWriter;
use validate::validate;

use crate::codec::{
    Base64StreamCodec, BodyContext, BodyEncoding, DocumentEncoding, RpcEncoding, StreamCodec,
};
use crate::config::FormatterConfig;
use crate::description::{MessageDescription, OperationDescription, WILDCARD_ACTION};
use crate::error::{OpwireError, Result};
use crate::fault::ProtocolFault;
use crate::message::{BodyWriter, Message, MessageHeaders, MessageProperties, MessageVersion};
use crate::strings::{InternedString, StringTable, StringTableBuilder};
use crate::value::Value;
use crate::xml::BodyReader;

/// One direction of an operation, resolved at construction.
#[derive(Debug)]
struct MessageFormat {
    description: MessageDescription,
    action: Option<InternedString>,
    layout: BodyLayout,
    accessors: Option<AccessorTable>,
}

impl MessageFormat {
    fn build(
        strings: &mut StringTableBuilder,
        operation: &str,
        description: MessageDescription,
        is_request: bool,
        is_rpc: bool,
    ) -> Result<Self> {
        let action = (description.action != WILDCARD_ACTION).then(|| strings.add(&description.action));
        let layout = BodyLayout::build(strings, operation, &description, is_request, is_rpc)?;
        let accessors = if description.is_typed() {
            Some(AccessorTable::build(operation, &description)?)
        } else {
            None
        };
        Ok(Self {
            description,
            action,
            layout,
            accessors,
        })
    }
}

#[derive(Debug)]
struct FormatterInner {
    name: String,
    config: FormatterConfig,
    strings: StringTable,
    request: MessageFormat,
    reply: Option<MessageFormat>,
    encoding: Arc<dyn BodyEncoding>,
    stream_codec: Arc<dyn StreamCodec>,
}

impl FormatterInner {
    fn format(&self, is_request: bool) -> Result<&MessageFormat> {
        if is_request {
            return Ok(&self.request);
        }
        self.reply.as_ref().ok_or_else(|| {
            OpwireError::InvalidState(format!(
                "operation '{}' is one-way and has no reply",
                self.name
            ))
        })
    }

    fn context<'a>(
        &'a self,
        version: MessageVersion,
        format: &'a MessageFormat,
        is_request: bool,
    ) -> BodyContext<'a> {
        BodyContext {
            version,
            action: format.action.as_deref(),
            operation: &self.name,
            layout: &format.layout,
            is_request,
        }
    }
}

/// Builder for [`OperationFormatter`].
pub struct FormatterBuilder {
    description: OperationDescription,
    config: FormatterConfig,
    encoding: Option<Arc<dyn BodyEncoding>>,
    stream_codec: Option<Arc<dyn StreamCodec>>,
}

impl FormatterBuilder {
    pub fn new(description: OperationDescription) -> Self {
        Self {
            description,
            config: FormatterConfig::default(),
            encoding: None,
            stream_codec: None,
        }
    }

    /// Wrap body parts in an operation element.
    ///
    /// Default: false
    pub fn rpc(mut self, is_rpc: bool) -> Self {
        self.config.is_rpc = is_rpc;
        self
    }

    /// Use SOAP encoding. Only valid together with `rpc(true)`.
    ///
    /// Default: false
    pub fn encoded(mut self, is_encoded: bool) -> Self {
        self.config.is_encoded = is_encoded;
        self
    }

    /// Limit for buffering single-read bodies.
    ///
    /// Default: 64 KB
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.config.max_buffer_size = size;
        self
    }

    /// Chunk size of the default stream codec.
    ///
    /// Default: 12 KB
    pub fn stream_chunk_size(mut self, size: usize) -> Self {
        self.config.stream_chunk_size = size;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: FormatterConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom body encoding instead of the one implied by the config.
    pub fn encoding(mut self, encoding: Arc<dyn BodyEncoding>) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Use a custom codec for raw-stream bodies.
    pub fn stream_codec(mut self, codec: Arc<dyn StreamCodec>) -> Self {
        self.stream_codec = Some(codec);
        self
    }

    /// Validate the operation and build the formatter.
    pub fn build(self) -> Result<OperationFormatter> {
        let Self {
            description,
            config,
            encoding,
            stream_codec,
        } = self;

        // 1. Reject invalid shapes before any call path exists
        validate(&description, config.is_rpc, config.is_encoded)?;

        let OperationDescription { name, messages, .. } = description;
        let mut messages = messages.into_iter();
        let request = messages.next().ok_or_else(|| {
            OpwireError::configuration(name.as_str(), "operation has no request message")
        })?;
        let reply = messages.next();

        // 2. Size the interning table
        let mut count = 3 + request.body.parts.len();
        if let Some(reply) = &reply {
            count += 2 + reply.body.parts.len();
        }
        let mut strings = StringTableBuilder::with_capacity(count * 2);

        // 3. Resolve actions, layouts and accessor tables per direction
        let request = MessageFormat::build(&mut strings, &name, request, true, config.is_rpc)?;
        let reply = reply
            .map(|r| MessageFormat::build(&mut strings, &name, r, false, config.is_rpc))
            .transpose()?;

        // 4. Pick the body strategies
        let encoding: Arc<dyn BodyEncoding> = match encoding {
            Some(encoding) => encoding,
            None if config.is_rpc => Arc::new(RpcEncoding::new(config.is_encoded)),
            None => Arc::new(DocumentEncoding::new()),
        };
        let stream_codec: Arc<dyn StreamCodec> = match stream_codec {
            Some(codec) => codec,
            None => Arc::new(Base64StreamCodec::new(config.effective_chunk_size())),
        };

        tracing::debug!(
            "Built formatter for operation '{}' (rpc: {}, encoded: {}, one-way: {})",
            name,
            config.is_rpc,
            config.is_encoded,
            reply.is_none()
        );

        Ok(OperationFormatter {
            inner: Arc::new(FormatterInner {
                name,
                config,
                strings: strings.build(),
                request,
                reply,
                encoding,
                stream_codec,
            }),
        })
    }
}

/// Translates between positional call values and messages for one operation.
///
/// Cheap to clone; clones share the same immutable state and can be used
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct OperationFormatter {
    inner: Arc<FormatterInner>,
}

impl OperationFormatter {
    pub fn builder(description: OperationDescription) -> FormatterBuilder {
        FormatterBuilder::new(description)
    }

    /// Build with the default encoding for `config`.
    pub fn new(description: OperationDescription, config: FormatterConfig) -> Result<Self> {
        Self::builder(description).config(config).build()
    }

    #[inline]
    pub fn operation_name(&self) -> &str {
        &self.inner.name
    }

    /// Request action, `None` when it is the wildcard.
    #[inline]
    pub fn request_action(&self) -> Option<&str> {
        self.inner.request.action.as_deref()
    }

    /// Reply action, `None` for one-way operations or the wildcard.
    #[inline]
    pub fn reply_action(&self) -> Option<&str> {
        self.inner.reply.as_ref().and_then(|r| r.action.as_deref())
    }

    #[inline]
    pub fn is_one_way(&self) -> bool {
        self.inner.reply.is_none()
    }

    #[inline]
    pub fn config(&self) -> &FormatterConfig {
        &self.inner.config
    }

    /// The formatter's interning table.
    #[inline]
    pub fn strings(&self) -> &StringTable {
        &self.inner.strings
    }

    pub fn request_layout(&self) -> &BodyLayout {
        &self.inner.request.layout
    }

    pub fn reply_layout(&self) -> Option<&BodyLayout> {
        self.inner.reply.as_ref().map(|r| &r.layout)
    }

    /// Accessor table of a typed request.
    pub fn request_accessors(&self) -> Option<&AccessorTable> {
        self.inner.request.accessors.as_ref()
    }

    /// Accessor table of a typed reply.
    pub fn reply_accessors(&self) -> Option<&AccessorTable> {
        self.inner.reply.as_ref().and_then(|r| r.accessors.as_ref())
    }

    /// Build a request message. For a typed request, `parameters[0]` holds
    /// the aggregate instance.
    pub fn serialize_request(
        &self,
        version: MessageVersion,
        parameters: &[Option<Value>],
    ) -> Result<Message> {
        let values = self.positional_values(&self.inner.request, parameters)?;
        self.serialize_message(version, true, values, None)
    }

    /// Build a reply message. For a typed reply, `result` is the aggregate
    /// instance and `parameters` is ignored.
    pub fn serialize_reply(
        &self,
        version: MessageVersion,
        parameters: &[Option<Value>],
        result: Option<Value>,
    ) -> Result<Message> {
        let format = self.inner.format(false)?;
        if format.accessors.is_some() {
            let values = self.positional_values(format, std::slice::from_ref(&result))?;
            self.serialize_message(version, false, values, None)
        } else {
            let values = self.positional_values(format, parameters)?;
            self.serialize_message(version, false, values, result)
        }
    }

    /// Decode a request into `parameters`. A typed request is written to
    /// `parameters[0]`.
    pub fn deserialize_request(
        &self,
        message: &Message,
        parameters: &mut [Option<Value>],
    ) -> Result<()> {
        let format = &self.inner.request;
        self.check_parameters(format, parameters.len(), true)?;

        match self.deserialize_message(message, format, true, parameters) {
            Ok(_) => Ok(()),
            Err(e) if e.is_decode_failure() => {
                let reason = format!(
                    "Error in deserializing body of request message for operation '{}'. {}",
                    self.inner.name, e
                );
                tracing::warn!("{}", reason);
                Err(ProtocolFault::deserialization_failed(reason, e).into())
            }
            Err(e) => Err(e),
        }
    }

    /// Decode a reply, filling out-parameters and returning the return
    /// value (or the aggregate instance for a typed reply).
    pub fn deserialize_reply(
        &self,
        message: &Message,
        parameters: &mut [Option<Value>],
    ) -> Result<Option<Value>> {
        let format = self.inner.format(false)?;
        self.check_parameters(format, parameters.len(), false)?;

        match self.deserialize_message(message, format, false, parameters) {
            Err(e) if e.is_decode_failure() => {
                let text = format!(
                    "Error in deserializing body of reply message for operation '{}'. {}",
                    self.inner.name, e
                );
                tracing::warn!("{}", text);
                Err(OpwireError::Communication {
                    operation: self.inner.name.clone(),
                    action: self.reply_action().map(str::to_string),
                    message: text,
                    source: Box::new(e),
                })
            }
            other => other,
        }
    }

    fn check_parameters(&self, format: &MessageFormat, len: usize, is_request: bool) -> Result<()> {
        let needed = match format.accessors {
            Some(_) if is_request => 1,
            Some(_) => 0,
            None => format.description.slot_count(),
        };
        if len < needed {
            return Err(OpwireError::argument(
                "parameters",
                format!("expected {} values, got {}", needed, len),
            ));
        }
        Ok(())
    }

    /// Flatten call values into a fresh positional array.
    fn positional_values(
        &self,
        format: &MessageFormat,
        parameters: &[Option<Value>],
    ) -> Result<Vec<Option<Value>>> {
        let Some(table) = &format.accessors else {
            let needed = format.description.slot_count();
            if parameters.len() < needed {
                return Err(OpwireError::argument(
                    "parameters",
                    format!("expected {} values, got {}", needed, parameters.len()),
                ));
            }
            return Ok(parameters[..needed].to_vec());
        };

        let slot = parameters.first().ok_or_else(|| {
            OpwireError::argument("parameters", "expected the typed message instance")
        })?;
        let instance = match slot {
            None => {
                return Err(OpwireError::configuration(
                    self.inner.name.as_str(),
                    format!(
                        "typed message for action '{}' cannot be null",
                        format.description.action
                    ),
                ))
            }
            Some(Value::Contract(instance)) => instance,
            Some(other) => {
                return Err(OpwireError::argument(
                    "parameters",
                    format!("expected a typed message instance, found {}", other.kind()),
                ))
            }
        };

        let mut values = vec![None; table.len()];
        table.read_all(instance.as_contract(), &mut values)?;
        Ok(values)
    }

    fn serialize_message(
        &self,
        version: MessageVersion,
        is_request: bool,
        values: Vec<Option<Value>>,
        return_value: Option<Value>,
    ) -> Result<Message> {
        let format = self.inner.format(is_request)?;

        // 1. Properties
        let mut properties = MessageProperties::new();
        for property in &format.description.properties {
            if let Some(value) = values.get(property.index).cloned().flatten() {
                properties.insert(property.name.clone(), value);
            }
        }

        let mut headers = MessageHeaders::new();
        headers.set_action(format.action.as_ref().map(|a| a.to_string()));

        // 2. Body producer, run only when the message is written
        let body = Arc::new(OperationBodyWriter::new(
            Arc::clone(&self.inner),
            is_request,
            values,
            return_value,
        ));
        let producer: Arc<dyn BodyWriter> = body.clone();
        let mut message = Message::from_parts(version, headers, properties, Some(producer));

        // 3. Headers
        self.inner
            .encoding
            .add_headers_to_message(&mut message, &format.description, &body.values)?;
        Ok(message)
    }

    fn deserialize_message(
        &self,
        message: &Message,
        format: &MessageFormat,
        is_request: bool,
        parameters: &mut [Option<Value>],
    ) -> Result<Option<Value>> {
        let (Some(table), Some(contract)) = (&format.accessors, format.description.contract) else {
            return self.read_message_contents(message, format, is_request, parameters);
        };

        let mut instance = contract.create(&self.inner.name)?;
        let mut parts = vec![None; table.len()];
        self.read_message_contents(message, format, is_request, &mut parts)?;
        table.write_all(instance.as_contract_mut(), parts)?;

        let value = Value::Contract(instance);
        if !is_request {
            return Ok(Some(value));
        }
        if let Some(first) = parameters.first_mut() {
            *first = Some(value);
        }
        Ok(None)
    }

    fn read_message_contents(
        &self,
        message: &Message,
        format: &MessageFormat,
        is_request: bool,
        parameters: &mut [Option<Value>],
    ) -> Result<Option<Value>> {
        // 1. Properties
        for property in &format.description.properties {
            if let (Some(value), Some(slot)) = (
                message.properties().get(&property.name),
                parameters.get_mut(property.index),
            ) {
                *slot = Some(value.clone());
            }
        }

        // 2. Headers
        self.inner
            .encoding
            .get_headers_from_message(message, &format.description, parameters)?;

        // 3. Body. Stream bodies go to the stream codec even when empty.
        if let Some(slot) = format.layout.stream {
            let mut reader = if message.is_empty() {
                BodyReader::from_elements(Vec::new())
            } else {
                message.body_reader()?
            };
            let data = Value::Bytes(self.inner.stream_codec.deserialize(&mut reader)?);
            self.skip_unread(&mut reader);
            return Ok(match slot {
                StreamSlot::Return => Some(data),
                StreamSlot::Parameter(index) => {
                    if let Some(target) = parameters.get_mut(index) {
                        *target = Some(data);
                    }
                    None
                }
            });
        }

        if message.is_empty() {
            return Ok(None);
        }
        let mut reader = message.body_reader()?;
        if reader.is_empty() {
            return Ok(None);
        }
        let ctx = self.inner.context(message.version(), format, is_request);
        let result = self
            .inner
            .encoding
            .deserialize_body(&mut reader, &ctx, parameters)?;
        self.skip_unread(&mut reader);
        Ok(result)
    }

    fn skip_unread(&self, reader: &mut BodyReader) {
        let skipped = reader.skip_to_end();
        if skipped > 0 {
            tracing::debug!(
                "Skipped {} unread body elements for operation '{}'",
                skipped,
                self.inner.name
            );
        }
    }
}
