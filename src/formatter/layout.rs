//! Per-direction body layouts with interned names.

use crate::description::MessageDescription;
use crate::error::{OpwireError, Result};
use crate::strings::{InternedString, StringTableBuilder};
use crate::value::PartType;

/// Wrapper element around body parts.
#[derive(Debug, Clone)]
pub struct WrapperLayout {
    pub name: InternedString,
    pub namespace: InternedString,
}

/// One body part as the encodings see it.
#[derive(Debug, Clone)]
pub struct PartLayout {
    pub name: InternedString,
    pub namespace: InternedString,
    pub index: usize,
    pub ty: PartType,
}

/// Where a raw-stream body's payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSlot {
    /// The distinguished return value.
    Return,
    /// A positional slot.
    Parameter(usize),
}

/// Body shape of one direction of an operation.
#[derive(Debug, Clone)]
pub struct BodyLayout {
    pub wrapper: Option<WrapperLayout>,
    pub parts: Vec<PartLayout>,
    pub return_value: Option<PartLayout>,
    /// Set when the body is a raw stream.
    pub stream: Option<StreamSlot>,
}

impl BodyLayout {
    /// Lay out `message`, interning every name into `strings`.
    ///
    /// RPC bodies always get a wrapper, named after the operation unless the
    /// message declares one.
    pub fn build(
        strings: &mut StringTableBuilder,
        operation: &str,
        message: &MessageDescription,
        is_request: bool,
        is_rpc: bool,
    ) -> Result<Self> {
        let stream = stream_slot(operation, message)?;

        let body = &message.body;
        let wrapper = match (&body.wrapper_name, is_rpc) {
            (Some(name), _) => Some(WrapperLayout {
                name: strings.add(name),
                namespace: strings.add(body.wrapper_namespace.as_deref().unwrap_or("")),
            }),
            (None, true) => {
                let name = if is_request {
                    operation.to_string()
                } else {
                    format!("{}Response", operation)
                };
                Some(WrapperLayout {
                    name: strings.add(&name),
                    namespace: strings.add(body.wrapper_namespace.as_deref().unwrap_or("")),
                })
            }
            (None, false) => None,
        };

        let mut part = |name: &str, namespace: &str, index: usize, ty: PartType| PartLayout {
            name: strings.add(name),
            namespace: strings.add(namespace),
            index,
            ty,
        };

        let return_value = body.return_value.as_ref().map(|p| {
            let name = if p.name.is_empty() {
                format!("{}Result", operation)
            } else {
                p.name.clone()
            };
            part(&name, &p.namespace, p.index, p.ty)
        });
        let parts = body
            .parts
            .iter()
            .map(|p| part(&p.name, &p.namespace, p.index, p.ty))
            .collect();

        Ok(Self {
            wrapper,
            parts,
            return_value,
            stream,
        })
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        self.stream.is_some()
    }
}

fn stream_slot(operation: &str, message: &MessageDescription) -> Result<Option<StreamSlot>> {
    let body = &message.body;
    if !message.has_stream_body() {
        return Ok(None);
    }

    let members = body.parts.len() + usize::from(body.return_value.is_some());
    if members != 1 {
        return Err(OpwireError::configuration(
            operation,
            format!(
                "a stream part must be the only body part of message '{}'",
                message.action
            ),
        ));
    }

    Ok(match body.parts.first() {
        Some(p) => Some(StreamSlot::Parameter(p.index)),
        None => Some(StreamSlot::Return),
    })
}
