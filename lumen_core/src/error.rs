//! Runtime error taxonomy.
//!
//! Resolution never fails: every failure is captured in a binding whose plan
//! produces one of these errors when it executes.

use thiserror::Error;

use crate::ops::{Arity, OperationKind, Operator};
use crate::signature::DelegateSignature;
use crate::value::Value;

/// Result type for dynamic operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by executing a binding's plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// No binder in the chain supports the operation for these arguments.
    #[error("'{type_name}' object does not support {operation}")]
    UnsupportedOperation {
        /// The operation that was attempted.
        operation: OperationKind,
        /// Type name of the receiver.
        type_name: String,
    },

    /// Invocation of a value without an invocation capability.
    #[error("'{type_name}' object is not callable")]
    NotCallable {
        /// Type name of the receiver.
        type_name: String,
    },

    /// A value did not have the expected type.
    #[error("expected {expected}, got '{actual}'")]
    TypeMismatch {
        /// Expected type.
        expected: String,
        /// Actual type name.
        actual: String,
    },

    /// A callable is incompatible with a requested delegate signature.
    #[error("cannot convert {actual} to delegate {expected}")]
    SignatureMismatch {
        /// Requested signature.
        expected: DelegateSignature,
        /// Description of the incompatible value or call.
        actual: String,
    },

    /// Wrong number of arguments.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// An operator used with the wrong operation arity.
    #[error("operator '{operator}' is not a {expected} operator")]
    OperatorArity {
        /// The offending operator.
        operator: Operator,
        /// The arity the operation required.
        expected: Arity,
    },

    /// Sequence index outside the sequence.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: i64,
        /// Sequence length.
        len: usize,
    },

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed.
    #[error("integer overflow in '{operator}'")]
    Overflow {
        /// The overflowing operator.
        operator: Operator,
    },

    /// A value of the right type but an unacceptable value.
    #[error("{message}")]
    InvalidValue {
        /// Description.
        message: String,
    },

    /// An error raised by a native function.
    #[error("{message}")]
    Raised {
        /// Error message.
        message: String,
    },
}

impl RuntimeError {
    /// Unsupported `operation` on `receiver`.
    pub fn unsupported(operation: &OperationKind, receiver: &Value) -> Self {
        RuntimeError::UnsupportedOperation {
            operation: operation.clone(),
            type_name: receiver.type_name().to_string(),
        }
    }

    /// `receiver` can't be called.
    pub fn not_callable(receiver: &Value) -> Self {
        RuntimeError::NotCallable {
            type_name: receiver.type_name().to_string(),
        }
    }

    /// `value` is not a `expected`.
    pub fn type_mismatch(expected: impl Into<String>, value: &Value) -> Self {
        RuntimeError::TypeMismatch {
            expected: expected.into(),
            actual: value.type_name().to_string(),
        }
    }

    /// Invalid value with a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        RuntimeError::InvalidValue {
            message: message.into(),
        }
    }

    /// Error raised by native code.
    pub fn raised(message: impl Into<String>) -> Self {
        RuntimeError::Raised {
            message: message.into(),
        }
    }
}

/// A unary or binary operation kind constructed with an operator of the
/// other arity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operator '{operator}' is not a {expected} operator")]
pub struct OperatorArityError {
    /// The offending operator.
    pub operator: Operator,
    /// The arity the operation required.
    pub expected: Arity,
}

impl From<OperatorArityError> for RuntimeError {
    fn from(err: OperatorArityError) -> Self {
        RuntimeError::OperatorArity {
            operator: err.operator,
            expected: err.expected,
        }
    }
}
