//! Error types for opwire.

use thiserror::Error;

use crate::fault::ProtocolFault;

/// Main error type for all formatter operations.
#[derive(Debug, Error)]
pub enum OpwireError {
    /// Invalid operation shape or contract type. Raised at construction and never retried.
    #[error("Configuration error in operation '{operation}': {reason}")]
    Configuration {
        /// Operation the configuration belongs to.
        operation: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A caller passed an argument the formatter cannot work with.
    #[error("Invalid argument '{name}': {reason}")]
    Argument {
        /// Argument name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Failure decoding a reply, surfaced to the calling code.
    #[error("{message}")]
    Communication {
        /// Operation whose reply failed to decode.
        operation: String,
        /// Reply action of that operation, when constrained.
        action: Option<String>,
        /// Human-readable description.
        message: String,
        /// The underlying decode failure.
        #[source]
        source: Box<OpwireError>,
    },

    /// Failure decoding a request, to be reflected back to the remote caller.
    #[error(transparent)]
    Fault(#[from] ProtocolFault),

    /// XML reader/writer error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML that parsed but is not well-formed as a document fragment.
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// A value could not be converted to or from its wire text.
    #[error("Format error: {0}")]
    Format(String),

    /// Body content did not match the shape the descriptor declares.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error while producing message bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration loading only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not allowed in the message's current state.
    #[error("Invalid message state: {0}")]
    InvalidState(String),

    /// A message buffer was used after being closed.
    #[error("Message buffer has been closed")]
    BufferDisposed,

    /// Buffering a body would exceed the configured limit.
    #[error("Buffered body size {size} exceeds maximum {max}")]
    QuotaExceeded {
        /// Bytes the body needed.
        size: usize,
        /// Configured limit.
        max: usize,
    },
}

impl OpwireError {
    /// Shorthand for a configuration error.
    pub fn configuration(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        OpwireError::Configuration {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an argument error.
    pub fn argument(name: &'static str, reason: impl Into<String>) -> Self {
        OpwireError::Argument {
            name,
            reason: reason.into(),
        }
    }

    /// Whether this error is a well-formedness, format or serialization
    /// failure, i.e. the class of errors the formatter wraps on decode.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            OpwireError::Xml(_)
                | OpwireError::MalformedXml(_)
                | OpwireError::Format(_)
                | OpwireError::Serialization(_)
        )
    }
}

impl From<quick_xml::events::attributes::AttrError> for OpwireError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        OpwireError::Xml(quick_xml::Error::InvalidAttr(e))
    }
}

impl From<std::str::Utf8Error> for OpwireError {
    fn from(e: std::str::Utf8Error) -> Self {
        OpwireError::MalformedXml(format!("invalid UTF-8: {}", e))
    }
}

impl From<base64::DecodeError> for OpwireError {
    fn from(e: base64::DecodeError) -> Self {
        OpwireError::Format(format!("invalid base64 content: {}", e))
    }
}

/// Result type alias using OpwireError.
pub type Result<T> = std::result::Result<T, OpwireError>;
