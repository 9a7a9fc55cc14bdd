//! Core data model for Lumen's dynamic operation binding.
//!
//! This crate provides:
//! - The runtime [`Value`] representation and its coarse/exact type classification
//! - The closed operation model ([`OperationKind`], [`Operator`])
//! - Guards and bindings, the unit of cached resolution
//! - The [`DynamicObject`] protocol that values implement to supply their own binding logic
//! - Delegate signatures describing fixed external calling conventions
//! - The runtime error taxonomy

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod binding;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod signature;
pub mod value;

pub use binding::{Binding, BindingSource, Guard, GuardTest, Plan};
pub use error::{OperatorArityError, RuntimeError, RuntimeResult};
pub use ops::{Arity, ConvertTarget, LegacyOperation, OperationCategory, OperationKind, Operator};
pub use protocol::{DynamicObject, MemberKey, Members};
pub use signature::{DelegateSignature, Shape};
pub use value::{ClassId, Name, NativeFunction, RuntimeType, Value, ValueKind};
