//! Default fallback binders.
//!
//! The last step of the binder chain. There is one process-wide default
//! binder per operation category; each produces a failure binding (or, for
//! conversions the value already satisfies, an identity binding) whose guard
//! classifies the arguments coarsely enough that one binding serves every
//! argument list of the same shape.

use lumen_core::{
    Binding, BindingSource, ConvertTarget, Guard, OperationCategory, OperationKind, Plan,
    RuntimeError, Value,
};

/// Fallback policy for one operation category.
#[derive(Debug)]
pub struct DefaultBinder {
    category: OperationCategory,
}

static DEFAULT_BINDERS: [DefaultBinder; OperationCategory::COUNT] = [
    DefaultBinder::new(OperationCategory::GetMember),
    DefaultBinder::new(OperationCategory::SetMember),
    DefaultBinder::new(OperationCategory::DeleteMember),
    DefaultBinder::new(OperationCategory::Invoke),
    DefaultBinder::new(OperationCategory::InvokeMember),
    DefaultBinder::new(OperationCategory::CreateInstance),
    DefaultBinder::new(OperationCategory::Convert),
    DefaultBinder::new(OperationCategory::UnaryOperation),
    DefaultBinder::new(OperationCategory::BinaryOperation),
    DefaultBinder::new(OperationCategory::GetIndex),
    DefaultBinder::new(OperationCategory::SetIndex),
    DefaultBinder::new(OperationCategory::Named),
];

/// The process-wide default binder for `category`.
#[inline]
pub fn default_binder(category: OperationCategory) -> &'static DefaultBinder {
    &DEFAULT_BINDERS[category.index()]
}

impl DefaultBinder {
    const fn new(category: OperationCategory) -> Self {
        Self { category }
    }

    /// Category this binder serves.
    #[inline]
    pub fn category(&self) -> OperationCategory {
        self.category
    }

    /// Fallback binding for `kind` applied to `args`.
    pub fn fallback(&self, kind: &OperationKind, args: &[Value]) -> Binding {
        debug_assert_eq!(kind.category(), self.category);

        let binding = match kind {
            OperationKind::Invoke { .. } => Self::not_callable(args),
            OperationKind::Convert { target, .. } => Self::convert(target, args),
            OperationKind::GetMember { .. }
            | OperationKind::SetMember { .. }
            | OperationKind::DeleteMember { .. }
            | OperationKind::InvokeMember { .. }
            | OperationKind::CreateInstance { .. }
            | OperationKind::UnaryOperation(_)
            | OperationKind::BinaryOperation(_)
            | OperationKind::GetIndex { .. }
            | OperationKind::SetIndex { .. }
            | OperationKind::Named(_) => {
                Binding::failure(Guard::for_arguments(args), unsupported(kind, args))
            }
        };
        binding.with_source(BindingSource::Fallback)
    }

    fn not_callable(args: &[Value]) -> Binding {
        let guard = Guard::arity(args.len());
        let Some(receiver) = args.first() else {
            return Binding::failure(
                guard,
                RuntimeError::NotCallable {
                    type_name: "NoneType".to_string(),
                },
            );
        };
        // Every non-callable builtin resolves to this failure, so one binding
        // serves them all; the message names the receiver actually passed.
        let guard = match receiver {
            Value::Object(_) => guard.classified(0, receiver),
            _ if receiver.is_callable() => guard.classified(0, receiver),
            _ => guard.plain(0).not_callable(0),
        };
        Binding::new(
            guard,
            Plan::new(|args| {
                Err(match args.first() {
                    Some(receiver) => RuntimeError::not_callable(receiver),
                    None => RuntimeError::NotCallable {
                        type_name: "NoneType".to_string(),
                    },
                })
            }),
        )
    }

    fn convert(target: &ConvertTarget, args: &[Value]) -> Binding {
        let Some(value) = args.first() else {
            return Binding::failure(
                Guard::arity(0),
                RuntimeError::TypeMismatch {
                    expected: target.to_string(),
                    actual: "nothing".to_string(),
                },
            );
        };

        // Delegate acceptance depends on the function's signature, not its kind.
        let guard = match (target, value) {
            (ConvertTarget::Delegate(_), Value::Function(_)) => {
                Guard::arity(args.len()).identity(0, value.clone())
            }
            _ => Guard::for_arguments(args),
        };

        if target.accepts(value) {
            Binding::new(
                guard,
                Plan::new(|args| Ok(args.first().cloned().unwrap_or(Value::None))),
            )
        } else {
            Binding::failure(guard, RuntimeError::type_mismatch(target.to_string(), value))
        }
    }
}

fn unsupported(kind: &OperationKind, args: &[Value]) -> RuntimeError {
    match args.first() {
        Some(receiver) => RuntimeError::unsupported(kind, receiver),
        None => RuntimeError::UnsupportedOperation {
            operation: kind.clone(),
            type_name: "NoneType".to_string(),
        },
    }
}
