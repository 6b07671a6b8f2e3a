//! Cursor over the top-level elements of a message body.

use std::collections::VecDeque;

use super::{parse_elements, XmlElement};
use crate::error::{OpwireError, Result};

/// Reads body content element by element.
///
/// Encoding hooks consume the elements they understand; whatever they leave
/// behind is drained with [`skip_to_end`](Self::skip_to_end).
#[derive(Debug, Default)]
pub struct BodyReader {
    elements: VecDeque<XmlElement>,
}

impl BodyReader {
    /// Parse body content bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_elements(parse_elements(bytes)?))
    }

    /// Read over already-parsed elements, e.g. the children of a wrapper.
    pub fn from_elements(elements: Vec<XmlElement>) -> Self {
        Self {
            elements: elements.into(),
        }
    }

    /// Whether no elements remain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of elements not yet read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.elements.len()
    }

    /// Look at the next element without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<&XmlElement> {
        self.elements.front()
    }

    /// Whether the next element has the given name and namespace.
    pub fn is_start_element(&self, name: &str, namespace: &str) -> bool {
        self.peek().is_some_and(|e| e.is(name, namespace))
    }

    /// Consume the next element.
    pub fn read_element(&mut self) -> Option<XmlElement> {
        self.elements.pop_front()
    }

    /// Consume the next element, which must match `name` and `namespace`.
    pub fn read_expected(&mut self, name: &str, namespace: &str) -> Result<XmlElement> {
        match self.peek() {
            Some(e) if e.is(name, namespace) => Ok(self.elements.pop_front().unwrap_or_default()),
            Some(e) => Err(OpwireError::Serialization(format!(
                "Expecting element '{}' from namespace '{}'. Encountered '{}' from namespace '{}'",
                name, namespace, e.name, e.namespace
            ))),
            None => Err(OpwireError::Serialization(format!(
                "Expecting element '{}' from namespace '{}'. Encountered end of body",
                name, namespace
            ))),
        }
    }

    /// Drop every remaining element. Returns how many were skipped.
    pub fn skip_to_end(&mut self) -> usize {
        let skipped = self.elements.len();
        for element in self.elements.drain(..) {
            tracing::trace!(
                "Skipping unread body element {{{}}}{}",
                element.namespace,
                element.name
            );
        }
        skipped
    }
}
