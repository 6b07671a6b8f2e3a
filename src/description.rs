//! Read-only operation descriptors.
//!
//! Descriptors are supplied by whoever knows the service contract and are
//! never mutated once a formatter has been built from them. Every header,
//! property and body part carries a positional index; together they form
//! one dense, 0-based index space per message.
//!
//! # Example
//!
//! ```
//! use opwire::description::{
//!     Direction, MessageDescription, OperationDescription, PartDescription,
//! };
//! use opwire::PartType;
//!
//! let op = OperationDescription::new("Add")
//!     .with_message(
//!         MessageDescription::new("urn:calc/Add", Direction::Input)
//!             .with_part(PartDescription::new("a", "", 0, PartType::Int))
//!             .with_part(PartDescription::new("b", "", 1, PartType::Int)),
//!     )
//!     .with_message(
//!         MessageDescription::new("urn:calc/AddResponse", Direction::Output)
//!             .with_return_value(PartDescription::new("sum", "", 0, PartType::Int)),
//!     );
//!
//! assert!(!op.is_one_way());
//! assert_eq!(op.request().unwrap().slot_count(), 2);
//! ```

use crate::contract::{ContractType, Member};
use crate::value::PartType;

/// Action value meaning "match any action". Never written to the wire.
pub const WILDCARD_ACTION: &str = "*";

/// Which way a message travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Request (client to service).
    Input,
    /// Reply (service to client).
    Output,
}

/// A named, typed value at a fixed positional index.
#[derive(Debug, Clone)]
pub struct PartDescription {
    pub name: String,
    pub namespace: String,
    pub index: usize,
    pub ty: PartType,
    /// Accessor on the aggregate type, for typed messages.
    pub member: Option<Member>,
}

impl PartDescription {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        index: usize,
        ty: PartType,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            index,
            ty,
            member: None,
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.member = Some(member);
        self
    }
}

/// A part carried as an envelope header.
#[derive(Debug, Clone)]
pub struct HeaderDescription {
    pub part: PartDescription,
    pub must_understand: bool,
    pub relay: bool,
    pub actor: Option<String>,
    /// Slot values are [`HeaderValue`](crate::value::HeaderValue)s that may
    /// override the attributes above.
    pub typed_header: bool,
}

impl HeaderDescription {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        index: usize,
        ty: PartType,
    ) -> Self {
        Self {
            part: PartDescription::new(name, namespace, index, ty),
            must_understand: false,
            relay: false,
            actor: None,
            typed_header: false,
        }
    }

    pub fn with_must_understand(mut self, must_understand: bool) -> Self {
        self.must_understand = must_understand;
        self
    }

    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn typed(mut self) -> Self {
        self.typed_header = true;
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.part.member = Some(member);
        self
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.part.index
    }
}

/// An out-of-band value kept in the message's property bag, never written.
#[derive(Debug, Clone)]
pub struct PropertyDescription {
    pub name: String,
    pub index: usize,
    pub member: Option<Member>,
}

impl PropertyDescription {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            member: None,
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.member = Some(member);
        self
    }
}

/// Body shape: optional wrapper element, ordered parts, optional return value.
#[derive(Debug, Clone, Default)]
pub struct MessageBodyDescription {
    pub wrapper_name: Option<String>,
    pub wrapper_namespace: Option<String>,
    pub parts: Vec<PartDescription>,
    /// Distinguished return slot. Its `index` is not part of the positional
    /// index space.
    pub return_value: Option<PartDescription>,
}

/// Shape of one message of an operation.
#[derive(Debug, Clone)]
pub struct MessageDescription {
    pub action: String,
    pub direction: Direction,
    pub body: MessageBodyDescription,
    pub headers: Vec<HeaderDescription>,
    pub properties: Vec<PropertyDescription>,
    /// Set when the message is an aggregate (typed message).
    pub contract: Option<ContractType>,
}

impl MessageDescription {
    pub fn new(action: impl Into<String>, direction: Direction) -> Self {
        Self {
            action: action.into(),
            direction,
            body: MessageBodyDescription::default(),
            headers: Vec::new(),
            properties: Vec::new(),
            contract: None,
        }
    }

    pub fn with_wrapper(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.body.wrapper_name = Some(name.into());
        self.body.wrapper_namespace = Some(namespace.into());
        self
    }

    pub fn with_part(mut self, part: PartDescription) -> Self {
        self.body.parts.push(part);
        self
    }

    pub fn with_return_value(mut self, part: PartDescription) -> Self {
        self.body.return_value = Some(part);
        self
    }

    pub fn with_header(mut self, header: HeaderDescription) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_property(mut self, property: PropertyDescription) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_contract(mut self, contract: ContractType) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Whether the message is a single aggregate object.
    #[inline]
    pub fn is_typed(&self) -> bool {
        self.contract.is_some()
    }

    /// A non-aggregate message with no body parts and no return value.
    pub fn is_void(&self) -> bool {
        !self.is_typed() && self.body.parts.is_empty() && self.body.return_value.is_none()
    }

    /// Headers + properties + body parts.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.headers.len() + self.properties.len() + self.body.parts.len()
    }

    /// Whether the body is a raw stream rather than structured XML.
    pub fn has_stream_body(&self) -> bool {
        self.body
            .parts
            .iter()
            .chain(self.body.return_value.iter())
            .any(|p| p.ty.is_stream())
    }
}

/// One named operation: a request and an optional reply.
#[derive(Debug, Clone)]
pub struct OperationDescription {
    pub name: String,
    pub messages: Vec<MessageDescription>,
    /// Enforce the RPC-literal restriction on aggregate messages.
    pub validate_rpc_wrapper_name: bool,
}

impl OperationDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
            validate_rpc_wrapper_name: false,
        }
    }

    pub fn with_message(mut self, message: MessageDescription) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_rpc_wrapper_validation(mut self, validate: bool) -> Self {
        self.validate_rpc_wrapper_name = validate;
        self
    }

    pub fn request(&self) -> Option<&MessageDescription> {
        self.messages.first()
    }

    pub fn reply(&self) -> Option<&MessageDescription> {
        self.messages.get(1)
    }

    /// An operation with no reply message.
    #[inline]
    pub fn is_one_way(&self) -> bool {
        self.messages.len() == 1
    }
}
