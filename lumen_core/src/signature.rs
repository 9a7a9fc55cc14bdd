//! Delegate signatures.
//!
//! A delegate signature is the fixed calling convention a host expects when
//! it converts a dynamic value into something it can call statically: the
//! shape of every parameter and of the return value.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::{Value, ValueKind};

/// Shape of a single parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Any value, passed through unchanged.
    Any,
    /// No value. As a return shape the result is discarded.
    Void,
    /// A value of the given kind.
    Kind(ValueKind),
}

impl Shape {
    /// Coerce `value` into this shape.
    ///
    /// Widening follows implicit conversion: `bool` to `int`, and `int` or
    /// `bool` to `float`. Anything else must already have the shape's kind.
    pub fn coerce(&self, value: Value) -> RuntimeResult<Value> {
        match (self, value) {
            (Shape::Any, value) => Ok(value),
            (Shape::Void, _) => Ok(Value::None),
            (Shape::Kind(ValueKind::Int), Value::Bool(b)) => Ok(Value::Int(b as i64)),
            (Shape::Kind(ValueKind::Float), Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Shape::Kind(ValueKind::Float), Value::Bool(b)) => Ok(Value::Float(b as i64 as f64)),
            (Shape::Kind(kind), value) => {
                if value.kind() == *kind {
                    Ok(value)
                } else {
                    Err(RuntimeError::type_mismatch(kind.name(), &value))
                }
            }
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => f.write_str("any"),
            Shape::Void => f.write_str("void"),
            Shape::Kind(kind) => f.write_str(kind.name()),
        }
    }
}

/// Return shape plus ordered parameter shapes.
///
/// Signatures compare structurally and are used as keys of the process-wide
/// delegate stub cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateSignature {
    ret: Shape,
    params: SmallVec<[Shape; 4]>,
}

impl DelegateSignature {
    /// Create a signature.
    pub fn new(ret: Shape, params: impl IntoIterator<Item = Shape>) -> Self {
        Self {
            ret,
            params: params.into_iter().collect(),
        }
    }

    /// Return shape.
    #[inline]
    pub fn ret(&self) -> Shape {
        self.ret
    }

    /// Parameter shapes.
    #[inline]
    pub fn params(&self) -> &[Shape] {
        &self.params
    }

    /// Number of parameters.
    #[inline]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for DelegateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_structural_equality() {
        let a = DelegateSignature::new(Shape::Kind(ValueKind::Int), [Shape::Any]);
        let b = DelegateSignature::new(Shape::Kind(ValueKind::Int), vec![Shape::Any]);
        assert_eq!(a, b);
        assert_ne!(a, DelegateSignature::new(Shape::Void, [Shape::Any]));
        assert_eq!(a.to_string(), "fn(any) -> int");
    }

    #[test]
    fn test_shapes_widen_like_implicit_conversion() {
        let float = Shape::Kind(ValueKind::Float);
        assert_eq!(float.coerce(Value::Int(2)).unwrap(), Value::Float(2.0));
        assert_eq!(float.coerce(Value::Bool(true)).unwrap(), Value::Float(1.0));
        let int = Shape::Kind(ValueKind::Int);
        assert_eq!(int.coerce(Value::Bool(false)).unwrap(), Value::Int(0));
        assert!(int.coerce(Value::Float(1.0)).is_err());
    }

    #[test]
    fn test_coerce_mismatch() {
        let err = Shape::Kind(ValueKind::Int).coerce(Value::str("x")).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_void_discards() {
        assert_eq!(Shape::Void.coerce(Value::Int(5)).unwrap(), Value::None);
    }
}
