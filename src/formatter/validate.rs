//! Operation shape checks run before a formatter exists.

use crate::description::{MessageDescription, OperationDescription};
use crate::error::{OpwireError, Result};

/// Reject operation shapes no formatter can handle.
pub(crate) fn validate(operation: &OperationDescription, is_rpc: bool, is_encoded: bool) -> Result<()> {
    let name = operation.name.as_str();

    if operation.messages.is_empty() || operation.messages.len() > 2 {
        return Err(OpwireError::configuration(
            name,
            format!(
                "an operation needs a request and at most one reply, found {} messages",
                operation.messages.len()
            ),
        ));
    }

    if is_encoded && !is_rpc {
        return Err(OpwireError::configuration(
            name,
            "document-style operations cannot use encoded bodies",
        ));
    }

    let mut has_void = false;
    let mut has_typed = false;
    let mut has_parameters = false;
    for message in &operation.messages {
        if message.is_typed() {
            if is_rpc && operation.validate_rpc_wrapper_name && !is_encoded {
                return Err(OpwireError::configuration(
                    name,
                    "typed messages cannot be used with rpc/literal",
                ));
            }
            has_typed = true;
        } else if message.is_void() {
            has_void = true;
        } else {
            has_parameters = true;
        }
        check_indices(name, message)?;
    }

    if has_parameters && has_typed {
        return Err(OpwireError::configuration(
            name,
            "typed messages cannot be mixed with parameters",
        ));
    }
    if is_rpc && has_typed && has_void {
        return Err(OpwireError::configuration(
            name,
            "typed messages cannot be mixed with void messages in rpc operations",
        ));
    }
    Ok(())
}

/// Positional indices must be exactly `0..slot_count` across headers,
/// properties and body parts.
fn check_indices(operation: &str, message: &MessageDescription) -> Result<()> {
    let count = message.slot_count();
    let mut seen = vec![false; count];

    let indices = message
        .headers
        .iter()
        .map(|h| h.index())
        .chain(message.properties.iter().map(|p| p.index))
        .chain(message.body.parts.iter().map(|p| p.index));

    for index in indices {
        match seen.get_mut(index) {
            None => {
                return Err(OpwireError::configuration(
                    operation,
                    format!(
                        "message '{}' uses index {} but has only {} slots",
                        message.action, index, count
                    ),
                ))
            }
            Some(true) => {
                return Err(OpwireError::configuration(
                    operation,
                    format!("message '{}' uses index {} twice", message.action, index),
                ))
            }
            Some(slot) => *slot = true,
        }
    }
    Ok(())
}
