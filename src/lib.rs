//! # opwire
//!
//! Operation formatter core for SOAP-style messaging.
//!
//! An [`OperationFormatter`] is built from an [`OperationDescription`] and
//! maps the positional values of a call onto a [`Message`] and back, in RPC
//! or document style, literal or encoded.
//!
//! ## Architecture
//!
//! - **Descriptions** ([`description`]): operation and message shapes
//! - **Formatter** ([`formatter`]): validation, interning, call mapping
//! - **Encodings** ([`codec`]): how body parts look as XML
//! - **Messages** ([`message`]): lazily written bodies, headers, buffering
//!
//! ## Example
//!
//! ```
//! use opwire::description::{Direction, MessageDescription, OperationDescription, PartDescription};
//! use opwire::{MessageVersion, OperationFormatter, PartType, Value};
//!
//! let op = OperationDescription::new("Add")
//!     .with_message(
//!         MessageDescription::new("urn:calc/Add", Direction::Input)
//!             .with_part(PartDescription::new("a", "", 0, PartType::Int))
//!             .with_part(PartDescription::new("b", "", 1, PartType::Int)),
//!     )
//!     .with_message(
//!         MessageDescription::new("urn:calc/AddReply", Direction::Output)
//!             .with_return_value(PartDescription::new("", "", 0, PartType::Int)),
//!     );
//!
//! let formatter = OperationFormatter::builder(op).rpc(true).build().unwrap();
//!
//! let reply = formatter
//!     .serialize_reply(MessageVersion::Soap11, &[], Some(Value::Int(5)))
//!     .unwrap();
//! let bytes = reply.write_message().unwrap();
//! assert!(std::str::from_utf8(&bytes).unwrap().contains("<AddResult>5</AddResult>"));
//! ```

pub mod codec;
pub mod config;
pub mod contract;
pub mod description;
pub mod error;
pub mod fault;
pub mod formatter;
pub mod message;
pub mod strings;
pub mod value;
pub mod xml;

pub use config::FormatterConfig;
pub use description::OperationDescription;
pub use error::{OpwireError, Result};
pub use fault::ProtocolFault;
pub use formatter::{FormatterBuilder, OperationFormatter};
pub use message::{Message, MessageBuffer, MessageVersion};
pub use value::{HeaderValue, PartType, Value};
