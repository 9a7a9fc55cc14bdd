//! Runtime value representation.
//!
//! Scalars are stored inline and everything else is reference counted, so
//! call sites can hand argument slices around and guards can hold on to
//! values without copying payloads.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::error::{RuntimeError, RuntimeResult};
use crate::protocol::DynamicObject;
use crate::signature::DelegateSignature;

/// Member and function names.
pub type Name = Arc<str>;

// =============================================================================
// Classification
// =============================================================================

/// Coarse runtime classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The `None` singleton.
    None,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Immutable text.
    Str,
    /// Immutable sequence.
    Tuple,
    /// Shared mutable sequence.
    List,
    /// Native callable.
    Function,
    /// Dynamic object protocol implementer.
    Object,
}

impl ValueKind {
    /// Script-visible name of the kind.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::None => "NoneType",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Tuple => "tuple",
            ValueKind::List => "list",
            ValueKind::Function => "function",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-unique identifier of a script class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

static NEXT_CLASS_ID: AtomicU32 = AtomicU32::new(1);

impl ClassId {
    /// Allocate a fresh class id.
    pub fn allocate() -> Self {
        ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Exact runtime type of a value, as tested by type guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    /// A builtin value kind.
    Builtin(ValueKind),
    /// Instances of a script class.
    Class(ClassId),
    /// A native Rust type implementing the dynamic object protocol.
    Native(TypeId),
}

// =============================================================================
// Native Functions
// =============================================================================

/// Body of a native function.
pub type NativeFn = dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync;

/// A callable implemented in Rust.
///
/// Functions with a fixed arity check the argument count before running
/// their body. Functions produced by delegate stubs additionally carry the
/// [`DelegateSignature`] they were created for.
#[derive(Clone)]
pub struct NativeFunction {
    name: Name,
    arity: Option<usize>,
    signature: Option<DelegateSignature>,
    body: Arc<NativeFn>,
}

impl NativeFunction {
    /// Create a function taking exactly `arity` arguments.
    pub fn new<F>(name: impl Into<Name>, arity: usize, body: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity: Some(arity),
            signature: None,
            body: Arc::new(body),
        }
    }

    /// Create a function accepting any number of arguments.
    pub fn variadic<F>(name: impl Into<Name>, body: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity: None,
            signature: None,
            body: Arc::new(body),
        }
    }

    /// Attach the delegate signature this function satisfies.
    pub fn with_signature(mut self, signature: DelegateSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Function name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed argument count, `None` for variadic functions.
    #[inline]
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Delegate signature, if the function was created for one.
    #[inline]
    pub fn signature(&self) -> Option<&DelegateSignature> {
        self.signature.as_ref()
    }

    /// Call the function.
    pub fn call(&self, args: &[Value]) -> RuntimeResult<Value> {
        if let Some(expected) = self.arity {
            if args.len() != expected {
                return Err(RuntimeError::ArgumentCount {
                    expected,
                    actual: args.len(),
                });
            }
        }
        (self.body)(args)
    }

    /// Bind `receiver` as the first argument, producing a bound method.
    pub fn bind_receiver(self: &Arc<Self>, receiver: Value) -> NativeFunction {
        let method = Arc::clone(self);
        let body = move |args: &[Value]| {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(receiver.clone());
            full.extend_from_slice(args);
            method.call(&full)
        };
        NativeFunction {
            name: Arc::clone(&self.name),
            arity: self.arity.map(|n| n.saturating_sub(1)),
            signature: None,
            body: Arc::new(body),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Value
// =============================================================================

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// The `None` singleton.
    None,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Immutable text.
    Str(Arc<str>),
    /// Immutable sequence.
    Tuple(Arc<[Value]>),
    /// Shared mutable sequence.
    List(Arc<RwLock<Vec<Value>>>),
    /// Native callable.
    Function(Arc<NativeFunction>),
    /// Value implementing the dynamic object protocol.
    Object(Arc<dyn DynamicObject>),
}

impl Value {
    /// Create a string value.
    #[inline]
    pub fn str(text: &str) -> Self {
        Value::Str(Arc::from(text))
    }

    /// Create a list value.
    #[inline]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    /// Create a tuple value.
    #[inline]
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::from(items))
    }

    /// Wrap a native function.
    #[inline]
    pub fn function(function: NativeFunction) -> Self {
        Value::Function(Arc::new(function))
    }

    /// Wrap a dynamic object.
    #[inline]
    pub fn object<T: DynamicObject>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Coarse classification.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::None => ValueKind::None,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Tuple(_) => ValueKind::Tuple,
            Value::List(_) => ValueKind::List,
            Value::Function(_) => ValueKind::Function,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Exact runtime type.
    #[inline]
    pub fn runtime_type(&self) -> RuntimeType {
        match self {
            Value::Object(object) => object.runtime_type(),
            other => RuntimeType::Builtin(other.kind()),
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Object(object) => object.type_name(),
            other => other.kind().name(),
        }
    }

    /// Whether the value has an invocation capability.
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Function(_) => true,
            Value::Object(object) => object.is_callable(),
            _ => false,
        }
    }

    /// Truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::List(items) => !items.read().is_empty(),
            Value::Function(_) | Value::Object(_) => true,
        }
    }

    /// Integer view, accepting booleans.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view, accepting integers and booleans.
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    /// String view.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast a protocol object to its concrete type.
    pub fn downcast_object<T: DynamicObject>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Identity comparison (`is`).
    ///
    /// Reference values compare by allocation, scalars by value.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }

    /// Structural equality (`==`).
    ///
    /// Numbers compare across int/float/bool, sequences element-wise,
    /// functions and objects by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => sequence_equals(a, b),
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || sequence_equals(&a.read(), &b.read())
            }
            (Value::Function(_), Value::Function(_)) | (Value::Object(_), Value::Object(_)) => {
                self.is_identical(other)
            }
            _ => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }

    /// Script-level representation (strings quoted).
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

fn sequence_equals(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&item.repr())?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, &items.read())?;
                f.write_str("]")
            }
            Value::Function(function) => write!(f, "<function {}>", function.name()),
            Value::Object(object) => write!(f, "<{} object>", object.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Value::List(items) => f.debug_tuple("List").field(&*items.read()).finish(),
            Value::Function(function) => f.debug_tuple("Function").field(&function.name()).finish(),
            Value::Object(object) => f.debug_tuple("Object").field(object).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_runtime_type() {
        assert_eq!(Value::Int(1).kind(), ValueKind::Int);
        assert_eq!(Value::str("a").kind(), ValueKind::Str);
        assert_eq!(
            Value::Float(1.5).runtime_type(),
            RuntimeType::Builtin(ValueKind::Float)
        );
        assert_eq!(Value::None.type_name(), "NoneType");
    }

    #[test]
    fn test_numeric_equality_crosses_kinds() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_ne!(Value::None, Value::Int(0));
    }

    #[test]
    fn test_sequence_equality() {
        let a = Value::list(vec![Value::Int(1), Value::str("x")]);
        let b = Value::list(vec![Value::Int(1), Value::str("x")]);
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));
        assert!(a.is_identical(&a.clone()));

        let t = Value::tuple(vec![Value::Int(1)]);
        assert_ne!(t, Value::tuple(vec![Value::Int(2)]));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::Float(0.1).is_truthy());
        assert!(Value::tuple(vec![Value::None]).is_truthy());
    }

    #[test]
    fn test_display_and_repr() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::str("hi").repr(), "'hi'");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::str("a")]).to_string(),
            "[1, 'a']"
        );
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_string(), "(1,)");
    }

    #[test]
    fn test_native_function_arity_check() {
        let f = NativeFunction::new("inc", 1, |args| match args {
            [Value::Int(i)] => Ok(Value::Int(i + 1)),
            _ => Err(RuntimeError::raised("expected int")),
        });
        assert_eq!(f.call(&[Value::Int(1)]).unwrap(), Value::Int(2));
        assert_eq!(
            f.call(&[]).unwrap_err(),
            RuntimeError::ArgumentCount {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_bound_receiver_prepends_argument() {
        let f = Arc::new(NativeFunction::new("sub", 2, |args| match args {
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a - b)),
            _ => Err(RuntimeError::raised("expected ints")),
        }));
        let bound = f.bind_receiver(Value::Int(10));
        assert_eq!(bound.arity(), Some(1));
        assert_eq!(bound.call(&[Value::Int(3)]).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_class_ids_are_unique() {
        let a = ClassId::allocate();
        let b = ClassId::allocate();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }
}
