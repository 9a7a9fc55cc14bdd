//! Dynamic object protocol.
//!
//! Values that want to control how operations on them resolve implement
//! [`DynamicObject`]. The binder chain offers every operation to the
//! receiver's protocol first; declining (returning `None`) hands resolution
//! on to the language binder.

use std::any::Any;
use std::fmt;

use crate::binding::{Binding, Guard};
use crate::ops::OperationKind;
use crate::value::{Name, RuntimeType, Value};

/// Key of an object member.
///
/// Only [`MemberKey::Name`] keys are identifiers; integer and symbol keys
/// are skipped by name enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    /// Textual identifier.
    Name(Name),
    /// Integer key.
    Index(i64),
    /// Opaque symbol key.
    Symbol(u64),
}

impl MemberKey {
    /// Identifier text, for textual keys.
    #[inline]
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            MemberKey::Name(name) => Some(name),
            MemberKey::Index(_) | MemberKey::Symbol(_) => None,
        }
    }
}

/// Lazy sequence of `(name, value)` data members.
pub type Members<'a> = Box<dyn Iterator<Item = (Name, Value)> + 'a>;

/// Protocol through which a value supplies its own operation bindings.
pub trait DynamicObject: Any + Send + Sync + fmt::Debug {
    /// Type name used in diagnostics.
    fn type_name(&self) -> &str;

    /// Exact runtime type, as tested by type guards.
    fn runtime_type(&self) -> RuntimeType {
        RuntimeType::Native(self.as_any().type_id())
    }

    /// Build a binding for `kind` applied to `args` (`args[0]` is `self`).
    ///
    /// Returning `None` declines. Implementations must not mutate the
    /// receiver here; mutation belongs in the returned plan.
    fn bind(&self, kind: &OperationKind, args: &[Value]) -> Option<Binding> {
        let _ = (kind, args);
        None
    }

    /// Guard under which a decline from [`bind`](Self::bind) still holds.
    ///
    /// The binding produced after a decline is narrowed by this guard. The
    /// default pins the receiver itself, since `bind` may decide from the
    /// receiver's own fields. Types whose declines depend only on their
    /// runtime type can return a type guard instead.
    fn decline_guard(&self, kind: &OperationKind, args: &[Value]) -> Guard {
        let _ = kind;
        match args.first() {
            Some(receiver) => Guard::always().identity(0, receiver.clone()),
            None => Guard::always(),
        }
    }

    /// Data members, excluding callable members of the object's type.
    ///
    /// Every call returns a fresh iterator.
    fn members(&self) -> Members<'_> {
        Box::new(std::iter::empty())
    }

    /// Raw member keys.
    fn member_keys(&self) -> Vec<MemberKey> {
        self.members().map(|(name, _)| MemberKey::Name(name)).collect()
    }

    /// Textual member names.
    fn member_names(&self) -> Vec<Name> {
        self.member_keys()
            .into_iter()
            .filter_map(|key| match key {
                MemberKey::Name(name) => Some(name),
                MemberKey::Index(_) | MemberKey::Symbol(_) => None,
            })
            .collect()
    }

    /// Whether the object can be invoked.
    fn is_callable(&self) -> bool {
        false
    }

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}
