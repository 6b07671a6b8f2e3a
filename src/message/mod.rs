//! Wire messages.
//!
//! A [`Message`] carries an action, headers, out-of-band properties and a
//! body producer. The body is not serialized until the message is written:
//!
//! ```text
//! serialize_request ─► Message { body: Unwritten }
//!                          │ write_message / write_body_contents
//!                          ▼
//!                      Written
//!                          │ create_buffered_copy
//!                          ▼
//!                      Buffered ─► MessageBuffer::create_message (any number of times)
//! ```

mod body;
mod envelope;
pub mod headers;
mod version;
mod wire;

pub use body::{BodyState, BodyWriter, BoxFuture, BufferedBodyWriter};
pub use headers::{
    HeaderIdentity, MessageHeader, MessageHeaders, TypedValueHeader, XmlElementHeader,
};
pub use version::{MessageVersion, ADDRESSING10_NAMESPACE, SOAP11_NAMESPACE, SOAP12_NAMESPACE};
pub use wire::{Message, MessageBuffer, MessageProperties};
