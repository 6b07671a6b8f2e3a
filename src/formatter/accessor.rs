//! Member-accessor table for aggregate messages.

use crate::contract::{Member, MessageContract};
use crate::description::MessageDescription;
use crate::error::{OpwireError, Result};
use crate::value::Value;

/// Maps an aggregate's members onto positional slots.
///
/// Built once from the message description; slot `i` holds the member whose
/// part, header or property has index `i`.
#[derive(Debug, Clone)]
pub struct AccessorTable {
    members: Vec<Member>,
}

impl AccessorTable {
    pub fn build(operation: &str, description: &MessageDescription) -> Result<Self> {
        if !description.is_typed() {
            return Err(OpwireError::configuration(
                operation,
                format!("message '{}' is not a typed message", description.action),
            ));
        }

        let count = description.slot_count();
        let mut slots: Vec<Option<Member>> = vec![None; count];

        let entries = description
            .headers
            .iter()
            .map(|h| (h.index(), h.part.name.as_str(), h.part.member.as_ref()))
            .chain(
                description
                    .properties
                    .iter()
                    .map(|p| (p.index, p.name.as_str(), p.member.as_ref())),
            )
            .chain(
                description
                    .body
                    .parts
                    .iter()
                    .map(|p| (p.index, p.name.as_str(), p.member.as_ref())),
            );

        for (index, name, member) in entries {
            let member = member.ok_or_else(|| {
                OpwireError::configuration(
                    operation,
                    format!("part '{}' has no member accessor", name),
                )
            })?;
            let slot = slots.get_mut(index).ok_or_else(|| {
                OpwireError::configuration(
                    operation,
                    format!("part '{}' has index {} outside 0..{}", name, index, count),
                )
            })?;
            if slot.is_some() {
                return Err(OpwireError::configuration(
                    operation,
                    format!("part '{}' reuses index {}", name, index),
                ));
            }
            *slot = Some(member.clone());
        }

        // count entries, all in range and unique, so every slot is filled
        let members = slots.into_iter().flatten().collect();
        Ok(Self { members })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member at `index`.
    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Read every member into `values`, in index order.
    pub fn read_all(
        &self,
        instance: &dyn MessageContract,
        values: &mut [Option<Value>],
    ) -> Result<()> {
        self.check_len(values.len())?;
        for (slot, member) in values.iter_mut().zip(&self.members) {
            *slot = member.get(instance)?;
        }
        Ok(())
    }

    /// Write `values` into the members, in index order.
    pub fn write_all(
        &self,
        instance: &mut dyn MessageContract,
        values: Vec<Option<Value>>,
    ) -> Result<()> {
        self.check_len(values.len())?;
        for (value, member) in values.into_iter().zip(&self.members) {
            member.set(instance, value)?;
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len < self.members.len() {
            return Err(OpwireError::argument(
                "values",
                format!("expected {} slots, got {}", self.members.len(), len),
            ));
        }
        Ok(())
    }
}
