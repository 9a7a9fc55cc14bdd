//! Guards and bindings.
//!
//! A [`Binding`] pairs a [`Guard`] (a conjunction of pure tests over the
//! runtime arguments) with a [`Plan`] (the executable behavior). A call site
//! only runs a plan after its guard passes on the current arguments, and a
//! passing guard implies the plan behaves exactly as a fresh resolution for
//! those arguments would.
//!
//! Bindings are immutable and reference counted, so a call site can clone one
//! out of its cache and execute it after releasing the cache lock.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::{RuntimeType, Value, ValueKind};

// =============================================================================
// Guard Tests
// =============================================================================

/// One pure predicate over the argument list.
#[derive(Debug, Clone)]
pub enum GuardTest {
    /// Exactly this many arguments.
    ArgumentCount(usize),
    /// Argument `index` has coarse kind `kind`.
    KindIs {
        /// Argument position.
        index: usize,
        /// Required kind.
        kind: ValueKind,
    },
    /// Argument `index` has exact runtime type `ty`.
    TypeIs {
        /// Argument position.
        index: usize,
        /// Required type.
        ty: RuntimeType,
    },
    /// Argument `index` is this exact object.
    IdentityIs {
        /// Argument position.
        index: usize,
        /// Required identity.
        target: Value,
    },
    /// Argument `index` has no invocation capability.
    NotCallable {
        /// Argument position.
        index: usize,
    },
    /// Argument `index` is a builtin value, not a protocol object.
    Plain {
        /// Argument position.
        index: usize,
    },
}

impl GuardTest {
    /// Evaluate the test. Missing arguments fail the test.
    #[inline]
    pub fn test(&self, args: &[Value]) -> bool {
        match self {
            GuardTest::ArgumentCount(n) => args.len() == *n,
            GuardTest::KindIs { index, kind } => {
                args.get(*index).is_some_and(|arg| arg.kind() == *kind)
            }
            GuardTest::TypeIs { index, ty } => {
                args.get(*index).is_some_and(|arg| arg.runtime_type() == *ty)
            }
            GuardTest::IdentityIs { index, target } => {
                args.get(*index).is_some_and(|arg| arg.is_identical(target))
            }
            GuardTest::NotCallable { index } => {
                args.get(*index).is_some_and(|arg| !arg.is_callable())
            }
            GuardTest::Plain { index } => args
                .get(*index)
                .is_some_and(|arg| !matches!(arg, Value::Object(_))),
        }
    }
}

impl PartialEq for GuardTest {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GuardTest::ArgumentCount(a), GuardTest::ArgumentCount(b)) => a == b,
            (
                GuardTest::KindIs { index: i, kind: a },
                GuardTest::KindIs { index: j, kind: b },
            ) => i == j && a == b,
            (GuardTest::TypeIs { index: i, ty: a }, GuardTest::TypeIs { index: j, ty: b }) => {
                i == j && a == b
            }
            (
                GuardTest::IdentityIs { index: i, target: a },
                GuardTest::IdentityIs { index: j, target: b },
            ) => i == j && a.is_identical(b),
            (GuardTest::NotCallable { index: i }, GuardTest::NotCallable { index: j }) => i == j,
            (GuardTest::Plain { index: i }, GuardTest::Plain { index: j }) => i == j,
            _ => false,
        }
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Conjunction of guard tests. An empty guard always passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guard {
    tests: SmallVec<[GuardTest; 4]>,
}

impl Guard {
    /// A guard that always passes.
    #[inline]
    pub fn always() -> Self {
        Self::default()
    }

    /// A guard on the argument count only.
    pub fn arity(count: usize) -> Self {
        Self::always().with(GuardTest::ArgumentCount(count))
    }

    /// Add a test.
    pub fn with(mut self, test: GuardTest) -> Self {
        self.tests.push(test);
        self
    }

    /// Require argument `index` to have coarse kind `kind`.
    pub fn kind(self, index: usize, kind: ValueKind) -> Self {
        self.with(GuardTest::KindIs { index, kind })
    }

    /// Require argument `index` to have exact runtime type `ty`.
    pub fn exact_type(self, index: usize, ty: RuntimeType) -> Self {
        self.with(GuardTest::TypeIs { index, ty })
    }

    /// Require argument `index` to be `target` itself.
    pub fn identity(self, index: usize, target: Value) -> Self {
        self.with(GuardTest::IdentityIs { index, target })
    }

    /// Require argument `index` to lack an invocation capability.
    pub fn not_callable(self, index: usize) -> Self {
        self.with(GuardTest::NotCallable { index })
    }

    /// Require argument `index` to be a builtin value.
    pub fn plain(self, index: usize) -> Self {
        self.with(GuardTest::Plain { index })
    }

    /// Classify argument `index` the way `value` is classified: coarse kind
    /// for builtins, exact type for protocol objects.
    pub fn classified(self, index: usize, value: &Value) -> Self {
        match value {
            Value::Object(_) => self.exact_type(index, value.runtime_type()),
            _ => self.kind(index, value.kind()),
        }
    }

    /// Argument count plus the classification of every argument.
    pub fn for_arguments(args: &[Value]) -> Self {
        args.iter()
            .enumerate()
            .fold(Self::arity(args.len()), |guard, (i, arg)| guard.classified(i, arg))
    }

    /// Conjunction of `self` and `other`, skipping tests `self` already has.
    pub fn and(mut self, other: Guard) -> Self {
        for test in other.tests {
            if !self.tests.contains(&test) {
                self.tests.push(test);
            }
        }
        self
    }

    /// Whether a passing guard implies argument `index` is a builtin value.
    pub fn excludes_objects(&self, index: usize) -> bool {
        self.tests.iter().any(|test| match test {
            GuardTest::KindIs { index: i, kind } => *i == index && *kind != ValueKind::Object,
            GuardTest::TypeIs { index: i, ty } => {
                *i == index && matches!(ty, RuntimeType::Builtin(kind) if *kind != ValueKind::Object)
            }
            GuardTest::IdentityIs { index: i, target } => {
                *i == index && !matches!(target, Value::Object(_))
            }
            GuardTest::Plain { index: i } => *i == index,
            GuardTest::ArgumentCount(_) | GuardTest::NotCallable { .. } => false,
        })
    }

    /// Tests of this guard.
    #[inline]
    pub fn tests(&self) -> &[GuardTest] {
        &self.tests
    }

    /// Evaluate every test.
    #[inline]
    pub fn test(&self, args: &[Value]) -> bool {
        self.tests.iter().all(|t| t.test(args))
    }
}

// =============================================================================
// Plan
// =============================================================================

type PlanFn = dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync;

/// Executable behavior of a binding.
#[derive(Clone)]
pub struct Plan(Arc<PlanFn>);

impl Plan {
    /// Create a plan from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Plan(Arc::new(f))
    }

    /// A plan that always fails with `err`.
    pub fn fail(err: RuntimeError) -> Self {
        Plan::new(move |_| Err(err.clone()))
    }

    /// A plan that always produces `value`.
    pub fn constant(value: Value) -> Self {
        Plan::new(move |_| Ok(value.clone()))
    }

    /// Run the plan.
    #[inline]
    pub fn execute(&self, args: &[Value]) -> RuntimeResult<Value> {
        (self.0)(args)
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plan(..)")
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Binder chain step that produced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSource {
    /// The receiver's own dynamic object protocol.
    Protocol,
    /// The language-specific binder.
    Language,
    /// The language-default fallback binder.
    Fallback,
}

/// A guard paired with the plan it licenses.
#[derive(Debug, Clone)]
pub struct Binding {
    guard: Guard,
    plan: Plan,
    source: BindingSource,
}

impl Binding {
    /// Create a binding attributed to the language binder.
    pub fn new(guard: Guard, plan: Plan) -> Self {
        Self {
            guard,
            plan,
            source: BindingSource::Language,
        }
    }

    /// A binding whose plan fails with `err`.
    pub fn failure(guard: Guard, err: RuntimeError) -> Self {
        Self::new(guard, Plan::fail(err))
    }

    /// Narrow the guard with the tests of `extra`.
    pub fn guarded_by(mut self, extra: Guard) -> Self {
        self.guard = self.guard.and(extra);
        self
    }

    /// Re-attribute the binding.
    pub fn with_source(mut self, source: BindingSource) -> Self {
        self.source = source;
        self
    }

    /// Guard.
    #[inline]
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Plan.
    #[inline]
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Producing chain step.
    #[inline]
    pub fn source(&self) -> BindingSource {
        self.source
    }

    /// Whether the guard passes on `args`.
    #[inline]
    pub fn matches(&self, args: &[Value]) -> bool {
        self.guard.test(args)
    }

    /// Run the plan.
    #[inline]
    pub fn execute(&self, args: &[Value]) -> RuntimeResult<Value> {
        self.plan.execute(args)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_guard_passes() {
        assert!(Guard::always().test(&[]));
        assert!(Guard::always().test(&[Value::Int(1)]));
    }

    #[test]
    fn test_arity_guard() {
        let guard = Guard::arity(2);
        assert!(guard.test(&[Value::None, Value::None]));
        assert!(!guard.test(&[Value::None]));
    }

    #[test]
    fn test_kind_guard_out_of_bounds_fails() {
        let guard = Guard::always().kind(3, ValueKind::Int);
        assert!(!guard.test(&[Value::Int(1)]));
    }

    #[test]
    fn test_for_arguments_classifies_each_argument() {
        let args = [Value::Int(1), Value::str("a")];
        let guard = Guard::for_arguments(&args);
        assert!(guard.test(&[Value::Int(7), Value::str("b")]));
        assert!(!guard.test(&[Value::Float(7.0), Value::str("b")]));
        assert!(!guard.test(&[Value::Int(7)]));
        assert_eq!(guard.tests().len(), 3);
    }

    #[test]
    fn test_identity_guard() {
        let list = Value::list(vec![]);
        let guard = Guard::always().identity(0, list.clone());
        assert!(guard.test(&[list]));
        assert!(!guard.test(&[Value::list(vec![])]));
    }

    #[test]
    fn test_guard_equality_uses_identity_for_targets() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        assert_eq!(
            Guard::always().identity(0, a.clone()),
            Guard::always().identity(0, a)
        );
        assert_ne!(
            Guard::always().identity(0, Value::list(vec![])),
            Guard::always().identity(0, b)
        );
    }

    #[test]
    fn test_not_callable_guard() {
        let guard = Guard::always().not_callable(0);
        assert!(guard.test(&[Value::Int(1)]));
        let f = Value::function(crate::value::NativeFunction::variadic("f", |_| Ok(Value::None)));
        assert!(!guard.test(&[f]));
    }

    #[test]
    fn test_plain_guard_rejects_missing_argument() {
        let guard = Guard::always().plain(0);
        assert!(guard.test(&[Value::str("x")]));
        assert!(!guard.test(&[]));
    }

    #[test]
    fn test_and_merges_without_duplicates() {
        let guard = Guard::arity(1).kind(0, ValueKind::Int).and(Guard::arity(1).plain(0));
        assert_eq!(guard.tests().len(), 3);
        assert!(guard.test(&[Value::Int(1)]));
        assert!(!guard.test(&[Value::Int(1), Value::None]));
    }

    #[test]
    fn test_excludes_objects() {
        assert!(Guard::arity(1).kind(0, ValueKind::Int).excludes_objects(0));
        assert!(Guard::arity(1).plain(0).excludes_objects(0));
        assert!(!Guard::arity(2).kind(1, ValueKind::Int).excludes_objects(0));
        assert!(!Guard::arity(1).kind(0, ValueKind::Object).excludes_objects(0));
        assert!(!Guard::arity(1).not_callable(0).excludes_objects(0));
    }

    #[test]
    fn test_guarded_by_narrows() {
        let binding = Binding::new(Guard::arity(1), Plan::constant(Value::None))
            .guarded_by(Guard::always().kind(0, ValueKind::Str));
        assert!(binding.matches(&[Value::str("a")]));
        assert!(!binding.matches(&[Value::Int(1)]));
    }

    #[test]
    fn test_failure_binding() {
        let binding = Binding::failure(Guard::always(), RuntimeError::DivisionByZero);
        assert_eq!(binding.source(), BindingSource::Language);
        assert_eq!(binding.execute(&[]), Err(RuntimeError::DivisionByZero));
        let binding = binding.with_source(BindingSource::Fallback);
        assert_eq!(binding.source(), BindingSource::Fallback);
    }

    #[test]
    fn test_constant_plan() {
        let plan = Plan::constant(Value::Int(42));
        assert_eq!(plan.execute(&[]).unwrap(), Value::Int(42));
    }
}
