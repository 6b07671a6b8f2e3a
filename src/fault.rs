//! Protocol faults reflected back to a remote caller.
//!
//! A request that cannot be decoded never aborts the process; the formatter
//! turns the decode failure into a sender-side [`ProtocolFault`] with a fixed
//! code so the dispatch layer can send it back as a well-formed fault.

use std::fmt;

use thiserror::Error;

use crate::error::OpwireError;

/// Namespace of the dispatcher fault codes.
pub const NET_DISPATCH_NAMESPACE: &str =
    "http://schemas.microsoft.com/net/2005/12/windowscommunicationfoundation/dispatcher";

/// Sub-code for "the formatter could not decode the request".
pub const DESERIALIZATION_FAILED: &str = "DeserializationFailed";

/// Top-level code for faults caused by the sender.
pub const SENDER_CODE: &str = "Sender";

/// A fault code with an optional, more specific sub-code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCode {
    /// Local name of the code.
    pub name: String,
    /// Namespace of the code (empty for the envelope-defined codes).
    pub namespace: String,
    /// More specific code, if any.
    pub sub_code: Option<Box<FaultCode>>,
}

impl FaultCode {
    /// Create a code without a sub-code.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            sub_code: None,
        }
    }

    /// Wrap `sub_code` in the envelope-level `Sender` code.
    pub fn sender(sub_code: FaultCode) -> Self {
        Self {
            name: SENDER_CODE.to_string(),
            namespace: String::new(),
            sub_code: Some(Box::new(sub_code)),
        }
    }

    /// Whether this is a sender-side code.
    #[inline]
    pub fn is_sender_fault(&self) -> bool {
        self.name == SENDER_CODE && self.namespace.is_empty()
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)?;
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)?;
        }
        if let Some(sub) = &self.sub_code {
            write!(f, "/{}", sub)?;
        }
        Ok(())
    }
}

/// Structured fault destined for the remote caller.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ProtocolFault {
    /// Fault code.
    pub code: FaultCode,
    /// Human-readable reason.
    pub reason: String,
    /// Local cause; never sent on the wire.
    #[source]
    pub source: Option<Box<OpwireError>>,
}

impl ProtocolFault {
    /// Build the fixed "deserialization failed" sender fault.
    pub fn deserialization_failed(reason: impl fmt::Display, source: OpwireError) -> Self {
        let code = FaultCode::sender(FaultCode::new(
            DESERIALIZATION_FAILED,
            NET_DISPATCH_NAMESPACE,
        ));
        Self {
            code,
            reason: format!(
                "The formatter threw an exception while trying to deserialize the message: {}",
                reason
            ),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this fault carries the "deserialization failed" sub-code.
    pub fn is_deserialization_failed(&self) -> bool {
        self.code.is_sender_fault()
            && self.code.sub_code.as_deref().is_some_and(|sub| {
                sub.name == DESERIALIZATION_FAILED && sub.namespace == NET_DISPATCH_NAMESPACE
            })
    }
}
