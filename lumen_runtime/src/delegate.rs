//! Delegate stubs.
//!
//! Converting a dynamic value to a fixed-signature delegate wraps it in a
//! native function whose body is a [`DelegateStub`]: a thunk compiled once
//! per [`DelegateSignature`] that checks the argument count, coerces each
//! argument to its parameter shape, calls the target through a shared invoke
//! call site, and coerces the result to the return shape.
//!
//! Stubs live in a process-wide [`Publisher`], so each signature is compiled
//! exactly once. Shared invoke sites live in a second publisher keyed by
//! [`Binder`], so every delegate of one language and argument count shares
//! one site and its cached bindings.

use std::fmt;
use std::sync::{Arc, OnceLock};

use lumen_core::{
    DelegateSignature, NativeFunction, OperationKind, RuntimeError, RuntimeResult, Shape, Value,
};
use tracing::{debug, trace};

use crate::binder::Binder;
use crate::language::LanguageContext;
use crate::publisher::Publisher;
use crate::site::CallSite;

type Coercion = Box<dyn Fn(Value) -> RuntimeResult<Value> + Send + Sync>;

fn coercion(shape: Shape) -> Coercion {
    Box::new(move |value| shape.coerce(value))
}

/// Compiled invocation thunk for one delegate signature.
pub struct DelegateStub {
    signature: DelegateSignature,
    params: Vec<Coercion>,
    ret: Coercion,
}

impl DelegateStub {
    /// Compile the stub for `signature`.
    pub fn compile(signature: &DelegateSignature) -> Self {
        Self {
            signature: signature.clone(),
            params: signature.params().iter().map(|&shape| coercion(shape)).collect(),
            ret: coercion(signature.ret()),
        }
    }

    /// Signature this stub was compiled for.
    #[inline]
    pub fn signature(&self) -> &DelegateSignature {
        &self.signature
    }

    /// Call `target` with `args` through `site`.
    pub fn invoke(&self, site: &CallSite, target: &Value, args: &[Value]) -> RuntimeResult<Value> {
        if args.len() != self.params.len() {
            return Err(RuntimeError::SignatureMismatch {
                expected: self.signature.clone(),
                actual: format!("call with {} arguments", args.len()),
            });
        }

        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(target.clone());
        for (coerce, arg) in self.params.iter().zip(args) {
            full.push(coerce(arg.clone())?);
        }
        (self.ret)(site.invoke(&full)?)
    }

    /// Wrap `target` in a native function carrying this stub's signature.
    pub fn create_delegate(self: &Arc<Self>, target: Value, site: Arc<CallSite>) -> NativeFunction {
        let name = match &target {
            Value::Function(function) => format!("delegate {}", function.name()),
            other => format!("delegate {}", other.type_name()),
        };
        let stub = Arc::clone(self);
        NativeFunction::variadic(name, move |args| stub.invoke(&site, &target, args))
            .with_signature(self.signature.clone())
    }
}

impl fmt::Debug for DelegateStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateStub")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Process-wide Caches
// =============================================================================

/// The process-wide stub cache.
pub fn delegate_stubs() -> &'static Publisher<DelegateSignature, Arc<DelegateStub>> {
    static STUBS: OnceLock<Publisher<DelegateSignature, Arc<DelegateStub>>> = OnceLock::new();
    STUBS.get_or_init(Publisher::new)
}

/// Stub for `signature`, compiled on first request.
pub fn stub_for(signature: &DelegateSignature) -> Arc<DelegateStub> {
    delegate_stubs().get_or_create(signature, || {
        debug!(%signature, "compiling delegate stub");
        Arc::new(DelegateStub::compile(signature))
    })
}

/// The call site shared by every user of `binder`.
pub fn shared_site(binder: Binder) -> Arc<CallSite> {
    static SITES: OnceLock<Publisher<Binder, Arc<CallSite>>> = OnceLock::new();
    SITES.get_or_init(Publisher::new).get_or_create(&binder, || {
        trace!(operation = %binder.kind(), language = binder.context().name(), "creating shared call site");
        Arc::new(CallSite::new(binder.clone()))
    })
}

/// Convert `value` into a delegate with `signature`.
///
/// A function already carrying an equal signature is returned unchanged.
/// Functions with another signature, or with a fixed arity different from
/// the parameter count, can't satisfy the signature. Other values the
/// language considers callable are wrapped.
pub fn get_delegate(
    context: &Arc<dyn LanguageContext>,
    value: &Value,
    signature: &DelegateSignature,
) -> RuntimeResult<Value> {
    if let Value::Function(function) = value {
        match function.signature() {
            Some(existing) if existing == signature => return Ok(value.clone()),
            Some(existing) => {
                return Err(RuntimeError::SignatureMismatch {
                    expected: signature.clone(),
                    actual: format!("delegate {}", existing),
                });
            }
            None => {}
        }
        if let Some(arity) = function.arity() {
            if arity != signature.param_count() {
                return Err(RuntimeError::SignatureMismatch {
                    expected: signature.clone(),
                    actual: format!("function '{}' taking {} arguments", function.name(), arity),
                });
            }
        }
    } else if !context.is_callable(value) {
        return Err(RuntimeError::not_callable(value));
    }

    let stub = stub_for(signature);
    let site = shared_site(Binder::new(
        OperationKind::invoke(signature.param_count()),
        Arc::clone(context),
    ));
    Ok(Value::function(stub.create_delegate(value.clone(), site)))
}

#[cfg(test)]
mod tests {
    use lumen_core::ValueKind;

    use super::*;
    use crate::script::ScriptLanguage;

    fn int_to_int() -> DelegateSignature {
        DelegateSignature::new(Shape::Kind(ValueKind::Int), [Shape::Kind(ValueKind::Int)])
    }

    fn double() -> Value {
        Value::function(NativeFunction::new("double", 1, |args| match args {
            [Value::Int(i)] => Ok(Value::Int(i * 2)),
            _ => Err(RuntimeError::raised("expected int")),
        }))
    }

    #[test]
    fn test_stub_coerces_arguments() {
        let sig = DelegateSignature::new(
            Shape::Kind(ValueKind::Float),
            [Shape::Kind(ValueKind::Float)],
        );
        let stub = DelegateStub::compile(&sig);
        let lang = ScriptLanguage::shared();
        let site = CallSite::for_language(&lang, OperationKind::invoke(1));
        let identity = Value::function(NativeFunction::new("id", 1, |args| Ok(args[0].clone())));

        assert_eq!(
            stub.invoke(&site, &identity, &[Value::Int(3)]).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            stub.invoke(&site, &identity, &[Value::Bool(true)]).unwrap(),
            Value::Float(1.0)
        );
        assert!(matches!(
            stub.invoke(&site, &identity, &[Value::str("x")]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            stub.invoke(&site, &identity, &[]),
            Err(RuntimeError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_get_delegate_wraps_function() {
        let lang = ScriptLanguage::shared();
        let sig = int_to_int();
        let delegate = get_delegate(&lang, &double(), &sig).unwrap();
        let Value::Function(function) = &delegate else {
            panic!("expected function");
        };
        assert_eq!(function.signature(), Some(&sig));
        assert_eq!(function.call(&[Value::Int(21)]).unwrap(), Value::Int(42));

        // Converting again is a no-op.
        let again = get_delegate(&lang, &delegate, &sig).unwrap();
        assert!(again.is_identical(&delegate));
    }

    #[test]
    fn test_get_delegate_rejects_incompatible_values() {
        let lang = ScriptLanguage::shared();
        let sig = int_to_int();
        assert!(matches!(
            get_delegate(&lang, &Value::Int(1), &sig),
            Err(RuntimeError::NotCallable { .. })
        ));

        let two = DelegateSignature::new(Shape::Any, [Shape::Any, Shape::Any]);
        assert!(matches!(
            get_delegate(&lang, &double(), &two),
            Err(RuntimeError::SignatureMismatch { .. })
        ));

        let delegate = get_delegate(&lang, &double(), &sig).unwrap();
        let other = DelegateSignature::new(Shape::Any, [Shape::Any]);
        assert!(matches!(
            get_delegate(&lang, &delegate, &other),
            Err(RuntimeError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_stub_is_shared_per_signature() {
        let sig = DelegateSignature::new(Shape::Void, [Shape::Kind(ValueKind::Str)]);
        let a = stub_for(&sig);
        let b = stub_for(&sig);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_shared_site_per_binder() {
        let lang = ScriptLanguage::shared();
        let a = shared_site(Binder::new(OperationKind::invoke(2), Arc::clone(&lang)));
        let b = shared_site(Binder::new(OperationKind::invoke(2), Arc::clone(&lang)));
        let c = shared_site(Binder::new(OperationKind::invoke(3), lang));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
