//! Aggregate (typed message) support.
//!
//! A message contract is a plain struct standing in for a whole positional
//! array. The descriptor names its [`ContractType`] and gives every part a
//! [`Member`]: a get/set function pair resolved once, when the formatter is
//! built, and never looked up by name afterwards.
//!
//! # Example
//!
//! ```
//! use opwire::contract::{ContractInstance, Member};
//! use opwire::value::{slot_or_default, Value};
//!
//! #[derive(Debug, Clone, PartialEq, Default)]
//! struct Ping {
//!     seq: i64,
//! }
//!
//! let seq = Member::field::<Ping>(
//!     "seq",
//!     |p| Some(Value::Int(p.seq)),
//!     |p, v| {
//!         p.seq = slot_or_default(v)?;
//!         Ok(())
//!     },
//! );
//!
//! let mut instance = ContractInstance::new(Ping { seq: 1 });
//! seq.set(instance.as_contract_mut(), Some(Value::Int(9))).unwrap();
//! assert_eq!(instance.downcast_ref::<Ping>().unwrap().seq, 9);
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{OpwireError, Result};
use crate::value::Value;

/// An object usable as an aggregate message.
///
/// Implemented for every `Clone + PartialEq + Debug + Send + Sync + 'static`
/// type.
pub trait MessageContract: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_contract(&self) -> Box<dyn MessageContract>;
    fn eq_contract(&self, other: &dyn MessageContract) -> bool;
    fn contract_type_name(&self) -> &'static str;
}

impl<T> MessageContract for T
where
    T: Any + Send + Sync + fmt::Debug + Clone + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_contract(&self) -> Box<dyn MessageContract> {
        Box::new(self.clone())
    }

    fn eq_contract(&self, other: &dyn MessageContract) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn contract_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Owned aggregate instance carried in a [`Value::Contract`] slot.
pub struct ContractInstance(Box<dyn MessageContract>);

impl ContractInstance {
    pub fn new<T: MessageContract>(instance: T) -> Self {
        Self(Box::new(instance))
    }

    /// Type name of the wrapped instance.
    pub fn type_name(&self) -> &'static str {
        self.0.contract_type_name()
    }

    pub fn as_contract(&self) -> &dyn MessageContract {
        self.0.as_ref()
    }

    pub fn as_contract_mut(&mut self) -> &mut dyn MessageContract {
        self.0.as_mut()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.as_any_mut().downcast_mut::<T>()
    }

    /// Unwrap into the concrete type. Returns `None` on a type mismatch.
    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.0.into_any().downcast::<T>().ok().map(|b| *b)
    }
}

impl Clone for ContractInstance {
    fn clone(&self) -> Self {
        Self(self.0.clone_contract())
    }
}

impl PartialEq for ContractInstance {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_contract(other.0.as_ref())
    }
}

impl fmt::Debug for ContractInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Descriptor-side handle on an aggregate type.
#[derive(Clone, Copy)]
pub struct ContractType {
    name: &'static str,
    type_id: TypeId,
    construct: Option<fn() -> Box<dyn MessageContract>>,
}

fn construct_default<T: MessageContract + Default>() -> Box<dyn MessageContract> {
    Box::new(T::default())
}

impl ContractType {
    /// A contract type that can be default-constructed for inbound messages.
    pub fn of<T: MessageContract + Default>() -> Self {
        Self {
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            construct: Some(construct_default::<T>),
        }
    }

    /// A contract type without a default constructor. It can be sent but
    /// not received.
    pub fn without_default<T: MessageContract>() -> Self {
        Self {
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            construct: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn has_default_constructor(&self) -> bool {
        self.construct.is_some()
    }

    /// Default-construct an instance for decoding into.
    pub fn create(&self, operation: &str) -> Result<ContractInstance> {
        let construct = self.construct.ok_or_else(|| {
            OpwireError::configuration(
                operation,
                format!(
                    "message contract type '{}' requires a default constructor",
                    self.name
                ),
            )
        })?;
        Ok(ContractInstance(construct()))
    }
}

impl fmt::Debug for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractType")
            .field("name", &self.name)
            .field("has_default_constructor", &self.construct.is_some())
            .finish()
    }
}

/// Whether a member is a bare field or an accessor pair on the model side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
}

type Getter = dyn Fn(&dyn MessageContract) -> Result<Option<Value>> + Send + Sync;
type Setter = dyn Fn(&mut dyn MessageContract, Option<Value>) -> Result<()> + Send + Sync;

/// Readable and writable named slot on an aggregate instance.
#[derive(Clone)]
pub struct Member {
    name: &'static str,
    owner: &'static str,
    kind: MemberKind,
    get: Arc<Getter>,
    set: Arc<Setter>,
}

impl Member {
    /// Accessor for a bare field.
    pub fn field<T: MessageContract>(
        name: &'static str,
        get: fn(&T) -> Option<Value>,
        set: fn(&mut T, Option<Value>) -> Result<()>,
    ) -> Self {
        Self::with_kind(MemberKind::Field, name, get, set)
    }

    /// Accessor for a getter/setter pair.
    pub fn property<T: MessageContract>(
        name: &'static str,
        get: fn(&T) -> Option<Value>,
        set: fn(&mut T, Option<Value>) -> Result<()>,
    ) -> Self {
        Self::with_kind(MemberKind::Property, name, get, set)
    }

    fn with_kind<T: MessageContract>(
        kind: MemberKind,
        name: &'static str,
        get: fn(&T) -> Option<Value>,
        set: fn(&mut T, Option<Value>) -> Result<()>,
    ) -> Self {
        let owner = type_name::<T>();

        let getter: Arc<Getter> = Arc::new(move |instance: &dyn MessageContract| {
            let typed = instance
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| wrong_owner(name, owner, instance.contract_type_name()))?;
            Ok(get(typed))
        });

        let setter: Arc<Setter> =
            Arc::new(move |instance: &mut dyn MessageContract, value: Option<Value>| {
                let found = instance.contract_type_name();
                let typed = instance
                    .as_any_mut()
                    .downcast_mut::<T>()
                    .ok_or_else(|| wrong_owner(name, owner, found))?;
                set(typed, value)
            });

        Self {
            name,
            owner,
            kind,
            get: getter,
            set: setter,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name of the contract this member belongs to.
    #[inline]
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Read the member from `instance`.
    pub fn get(&self, instance: &dyn MessageContract) -> Result<Option<Value>> {
        (self.get)(instance)
    }

    /// Write `value` into the member on `instance`.
    pub fn set(&self, instance: &mut dyn MessageContract, value: Option<Value>) -> Result<()> {
        (self.set)(instance, value)
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .finish()
    }
}

fn wrong_owner(member: &str, owner: &str, found: &str) -> OpwireError {
    OpwireError::argument(
        "instance",
        format!(
            "member '{}' belongs to '{}', not '{}'",
            member, owner, found
        ),
    )
}
