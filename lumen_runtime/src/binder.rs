//! The binder chain.
//!
//! A [`Binder`] turns one operation kind plus concrete arguments into a
//! [`Binding`]. Resolution is total: when nothing supports the operation the
//! result is a binding whose plan fails, so errors surface when the plan
//! runs and the failure itself is cacheable.
//!
//! # Resolution Order
//!
//! 1. **Legacy redirect** - `GetItem`/`SetItem` named operations become
//!    `GetIndex`/`SetIndex` with the same arguments
//! 2. **Receiver protocol** - [`DynamicObject::bind`] on `args[0]`
//! 3. **Language** - [`LanguageContext::bind`]
//! 4. **Fallback** - the process-wide default binder for the kind's category
//!
//! A binding from step 3 or 4 is narrowed so that it never passes for a
//! receiver whose protocol would bind: builtin receivers are pinned as
//! builtins, and a declining object contributes its
//! [`DynamicObject::decline_guard`].
//!
//! [`DynamicObject::bind`]: lumen_core::DynamicObject::bind
//! [`DynamicObject::decline_guard`]: lumen_core::DynamicObject::decline_guard

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use lumen_core::{Binding, BindingSource, Guard, OperationKind, RuntimeError, Value};

use crate::fallback::default_binder;
use crate::language::{LanguageContext, LanguageId};

/// An operation kind bound to a language context.
///
/// Two binders are equal when their kinds are equal (member name and case
/// flag included) and they belong to the same language.
#[derive(Clone)]
pub struct Binder {
    kind: OperationKind,
    context: Arc<dyn LanguageContext>,
}

impl Binder {
    /// Create a binder.
    pub fn new(kind: OperationKind, context: Arc<dyn LanguageContext>) -> Self {
        Self { kind, context }
    }

    /// Operation kind.
    #[inline]
    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    /// Owning language context.
    #[inline]
    pub fn context(&self) -> &Arc<dyn LanguageContext> {
        &self.context
    }

    /// Identity of the owning language.
    #[inline]
    pub fn language(&self) -> LanguageId {
        self.context.id()
    }

    /// A binder for another kind in the same language.
    pub fn rebind(&self, kind: OperationKind) -> Binder {
        Binder {
            kind,
            context: Arc::clone(&self.context),
        }
    }

    /// Resolve the operation for `args`.
    pub fn resolve(&self, args: &[Value]) -> Binding {
        if let Err(err) = self.kind.check_operator() {
            return Binding::failure(Guard::arity(args.len()), RuntimeError::from(err))
                .with_source(BindingSource::Fallback);
        }

        if let OperationKind::Named(operation) = &self.kind {
            if let Some(kind) = operation.redirect(args.len()) {
                return self.rebind(kind).resolve(args);
            }
        }

        let mut declined = None;
        if let Some(Value::Object(receiver)) = args.first() {
            match receiver.bind(&self.kind, args) {
                Some(binding) => return binding.with_source(BindingSource::Protocol),
                None => declined = Some(receiver.decline_guard(&self.kind, args)),
            }
        }

        let binding = match self.context.bind(self, args) {
            Some(binding) => binding.with_source(BindingSource::Language),
            None => default_binder(self.kind.category())
                .fallback(&self.kind, args)
                .with_source(BindingSource::Fallback),
        };
        Self::past_protocol(binding, declined, args)
    }

    /// Narrow a binding from a later chain step so it only applies where the
    /// receiver protocol would again be skipped or decline.
    fn past_protocol(binding: Binding, declined: Option<Guard>, args: &[Value]) -> Binding {
        match declined {
            Some(guard) => binding.guarded_by(guard),
            None if args.is_empty() || binding.guard().excludes_objects(0) => binding,
            None => binding.guarded_by(Guard::always().plain(0)),
        }
    }
}

impl PartialEq for Binder {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.language() == other.language()
    }
}

impl Eq for Binder {}

impl Hash for Binder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.language().hash(state);
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("kind", &self.kind)
            .field("language", &self.context.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use lumen_core::{DynamicObject, Operator, Plan};
    use rustc_hash::FxHashSet;

    use super::*;
    use crate::language::LanguageId;

    struct Silent(LanguageId);

    impl LanguageContext for Silent {
        fn id(&self) -> LanguageId {
            self.0
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn silent() -> Arc<dyn LanguageContext> {
        Arc::new(Silent(LanguageId::allocate()))
    }

    #[derive(Debug)]
    struct Answer;

    impl DynamicObject for Answer {
        fn type_name(&self) -> &str {
            "Answer"
        }

        fn bind(&self, kind: &OperationKind, args: &[Value]) -> Option<Binding> {
            match kind {
                OperationKind::GetMember { name, .. } if &**name == "x" => Some(Binding::new(
                    Guard::for_arguments(args),
                    Plan::constant(Value::Int(42)),
                )),
                _ => None,
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_binder_equality_includes_language() {
        let lang = silent();
        let a = Binder::new(OperationKind::get_member("x"), Arc::clone(&lang));
        let b = Binder::new(OperationKind::get_member("x"), Arc::clone(&lang));
        let c = Binder::new(OperationKind::get_member("x"), silent());
        let d = Binder::new(OperationKind::get_member("y"), lang);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let set: FxHashSet<Binder> = [a, b, c, d].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_protocol_step_wins() {
        let binder = Binder::new(OperationKind::get_member("x"), silent());
        let args = [Value::object(Answer)];
        let binding = binder.resolve(&args);
        assert_eq!(binding.source(), BindingSource::Protocol);
        assert_eq!(binding.execute(&args).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_declined_protocol_falls_back() {
        let binder = Binder::new(OperationKind::get_member("y"), silent());
        let args = [Value::object(Answer)];
        let binding = binder.resolve(&args);
        assert_eq!(binding.source(), BindingSource::Fallback);
        assert!(matches!(
            binding.execute(&args),
            Err(RuntimeError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_builtin_receivers_are_pinned_as_builtins() {
        let binder = Binder::new(OperationKind::get_member("x"), silent());
        let binding = binder.resolve(&[Value::Int(1)]);
        assert!(binding.guard().excludes_objects(0));
        assert!(!binding.matches(&[Value::object(Answer)]));
    }

    #[test]
    fn test_decline_guard_narrows_fallback() {
        let binder = Binder::new(OperationKind::get_member("y"), silent());
        let answer = Value::object(Answer);
        let binding = binder.resolve(std::slice::from_ref(&answer));
        assert!(binding.matches(&[answer]));
        assert!(!binding.matches(&[Value::object(Answer)]));
    }

    #[test]
    fn test_mismatched_operator_fails_lazily() {
        let binder = Binder::new(OperationKind::UnaryOperation(Operator::Add), silent());
        let binding = binder.resolve(&[Value::Int(1)]);
        assert!(matches!(
            binding.execute(&[Value::Int(1)]),
            Err(RuntimeError::OperatorArity { .. })
        ));
    }

    #[test]
    fn test_get_item_redirects_to_get_index() {
        let binder = Binder::new(OperationKind::named("GetItem"), silent());
        let args = [Value::Int(1), Value::Int(0)];
        let binding = binder.resolve(&args);
        let Err(RuntimeError::UnsupportedOperation { operation, .. }) = binding.execute(&args)
        else {
            panic!("expected unsupported operation");
        };
        assert_eq!(operation, OperationKind::get_index(1));
    }
}
