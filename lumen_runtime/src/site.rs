//! Call-site caches.
//!
//! A [`CallSite`] exists once per static occurrence of a dynamic operation
//! in compiled code. It keeps a small MRU-ordered list of bindings; the
//! first binding whose guard passes on the current arguments runs directly.
//! Only on a miss does the site consult its binder.
//!
//! # Concurrency
//!
//! The binding list sits behind a `parking_lot::Mutex` that is held only for
//! the guard scan and for installation. Plans execute with the lock released
//! because they may re-enter the same site. Two threads missing at once both
//! resolve; installation replaces an entry with an equal guard, so the
//! second insert is a no-op rather than a duplicate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lumen_core::{Binding, OperationKind, RuntimeError, RuntimeResult, Value};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::binder::Binder;
use crate::language::LanguageContext;

// =============================================================================
// Statistics
// =============================================================================

/// Hit, miss and eviction counters of a call site.
#[derive(Debug, Default)]
pub struct SiteStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SiteStats {
    /// Invocations served by a cached binding.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Invocations that ran the binder chain.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Bindings dropped to respect the capacity.
    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Polymorphism of a call site, judged from its cached bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteClassification {
    /// Never invoked.
    Uninitialized,
    /// One binding.
    Monomorphic,
    /// Two bindings.
    Bimorphic,
    /// More than two bindings, no eviction yet.
    Polymorphic,
    /// Has evicted bindings: more shapes than the site can hold.
    Megamorphic,
}

// =============================================================================
// Call Site
// =============================================================================

/// A per-occurrence binding cache.
#[derive(Debug)]
pub struct CallSite {
    binder: Binder,
    arity: Option<usize>,
    capacity: usize,
    trace_hits: bool,
    rules: Mutex<SmallVec<[Binding; 4]>>,
    stats: SiteStats,
}

impl CallSite {
    /// Create a site with the capacity configured by the binder's language.
    pub fn new(binder: Binder) -> Self {
        let capacity = binder.context().config().site_capacity;
        Self::with_capacity(binder, capacity)
    }

    /// Create a site retaining at most `capacity` bindings (minimum 1).
    pub fn with_capacity(binder: Binder, capacity: usize) -> Self {
        let arity = binder.kind().site_arity();
        let trace_hits = binder.context().config().trace_bindings;
        Self {
            binder,
            arity,
            capacity: capacity.max(1),
            trace_hits,
            rules: Mutex::new(SmallVec::new()),
            stats: SiteStats::default(),
        }
    }

    /// Create a site for `kind` in `context`.
    pub fn for_language(context: &Arc<dyn LanguageContext>, kind: OperationKind) -> Self {
        Self::new(Binder::new(kind, Arc::clone(context)))
    }

    /// Binder consulted on misses.
    #[inline]
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Fixed argument count, `None` for legacy named operations.
    #[inline]
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Maximum number of retained bindings.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counters.
    #[inline]
    pub fn stats(&self) -> &SiteStats {
        &self.stats
    }

    /// Number of cached bindings.
    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    /// Whether no binding is cached.
    pub fn is_empty(&self) -> bool {
        self.rules.lock().is_empty()
    }

    /// Snapshot of the cached bindings, most recently used first.
    pub fn bindings(&self) -> Vec<Binding> {
        self.rules.lock().to_vec()
    }

    /// Current polymorphism classification.
    pub fn classification(&self) -> SiteClassification {
        if self.stats.evictions() > 0 {
            return SiteClassification::Megamorphic;
        }
        match self.len() {
            0 => SiteClassification::Uninitialized,
            1 => SiteClassification::Monomorphic,
            2 => SiteClassification::Bimorphic,
            _ => SiteClassification::Polymorphic,
        }
    }

    /// Perform the operation on `args`.
    pub fn invoke(&self, args: &[Value]) -> RuntimeResult<Value> {
        if let Some(expected) = self.arity {
            if args.len() != expected {
                return Err(RuntimeError::ArgumentCount {
                    expected,
                    actual: args.len(),
                });
            }
        }

        if let Some(binding) = self.lookup(args) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            if self.trace_hits {
                trace!(operation = %self.binder.kind(), "call site hit");
            }
            return binding.execute(args);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let binding = self.binder.resolve(args);
        debug!(
            operation = %self.binder.kind(),
            language = self.binder.context().name(),
            source = ?binding.source(),
            "call site miss, rebinding"
        );
        let result = binding.execute(args);
        self.install(binding);
        result
    }

    /// Find the first binding whose guard passes, moving it to the front.
    fn lookup(&self, args: &[Value]) -> Option<Binding> {
        let mut rules = self.rules.lock();
        let index = rules.iter().position(|rule| rule.matches(args))?;
        rules[..=index].rotate_right(1);
        Some(rules[0].clone())
    }

    /// Insert `binding` at the front, replacing an entry with an equal guard
    /// and evicting from the back beyond capacity.
    fn install(&self, binding: Binding) {
        let mut rules = self.rules.lock();
        if let Some(existing) = rules.iter().position(|rule| rule.guard() == binding.guard()) {
            rules.remove(existing);
        }
        rules.insert(0, binding);
        while rules.len() > self.capacity {
            rules.pop();
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            trace!(operation = %self.binder.kind(), capacity = self.capacity, "call site eviction");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use lumen_core::{Guard, Plan, ValueKind};

    use super::*;
    use crate::config::BindingConfig;
    use crate::language::LanguageId;

    /// Binds GetMember on ints to a constant and counts resolutions.
    struct Counting {
        id: LanguageId,
        config: BindingConfig,
        resolutions: AtomicUsize,
    }

    impl Counting {
        fn new(capacity: usize) -> Arc<Self> {
            Arc::new(Self {
                id: LanguageId::allocate(),
                config: BindingConfig {
                    site_capacity: capacity,
                    ..Default::default()
                },
                resolutions: AtomicUsize::new(0),
            })
        }
    }

    impl LanguageContext for Counting {
        fn id(&self) -> LanguageId {
            self.id
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn config(&self) -> &BindingConfig {
            &self.config
        }

        fn bind(&self, _binder: &Binder, args: &[Value]) -> Option<Binding> {
            self.resolutions.fetch_add(1, Ordering::SeqCst);
            let first = args.first()?;
            let guard = Guard::arity(1).kind(0, first.kind());
            let kind = first.kind();
            Some(Binding::new(
                guard,
                Plan::new(move |_| Ok(Value::str(kind.name()))),
            ))
        }
    }

    fn site(lang: &Arc<Counting>) -> CallSite {
        let context: Arc<dyn LanguageContext> = lang.clone();
        CallSite::for_language(&context, OperationKind::get_member("kind"))
    }

    #[test]
    fn test_hit_after_first_resolution() {
        let lang = Counting::new(4);
        let site = site(&lang);
        assert_eq!(site.classification(), SiteClassification::Uninitialized);

        assert_eq!(site.invoke(&[Value::Int(1)]).unwrap(), Value::str("int"));
        assert_eq!(site.invoke(&[Value::Int(2)]).unwrap(), Value::str("int"));
        assert_eq!(lang.resolutions.load(Ordering::SeqCst), 1);
        assert_eq!(site.stats().hits(), 1);
        assert_eq!(site.stats().misses(), 1);
        assert_eq!(site.classification(), SiteClassification::Monomorphic);
        assert!((site.stats().hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let lang = Counting::new(4);
        let site = site(&lang);
        assert_eq!(
            site.invoke(&[]),
            Err(RuntimeError::ArgumentCount {
                expected: 1,
                actual: 0
            })
        );
        assert!(site.is_empty());
    }

    #[test]
    fn test_mru_order() {
        let lang = Counting::new(4);
        let site = site(&lang);
        site.invoke(&[Value::Int(1)]).unwrap();
        site.invoke(&[Value::str("a")]).unwrap();
        site.invoke(&[Value::Int(1)]).unwrap();

        let front = &site.bindings()[0];
        assert!(front.matches(&[Value::Int(5)]));
        assert_eq!(site.classification(), SiteClassification::Bimorphic);
    }

    #[test]
    fn test_eviction_bound() {
        let lang = Counting::new(2);
        let site = site(&lang);
        let values = [
            Value::Int(1),
            Value::str("a"),
            Value::Float(1.0),
            Value::None,
            Value::Bool(true),
        ];
        for value in &values {
            site.invoke(std::slice::from_ref(value)).unwrap();
            assert!(site.len() <= 2);
        }
        assert_eq!(site.len(), 2);
        assert_eq!(site.stats().evictions(), 3);
        assert_eq!(site.classification(), SiteClassification::Megamorphic);

        // The two most recent shapes survive.
        let bindings = site.bindings();
        assert!(bindings[0].matches(&[Value::Bool(false)]));
        assert!(bindings[1].matches(&[Value::None]));
    }

    #[test]
    fn test_equal_guards_are_not_duplicated() {
        let lang = Counting::new(4);
        let site = site(&lang);
        let binding = Binding::new(
            Guard::arity(1).kind(0, ValueKind::Int),
            Plan::constant(Value::None),
        );
        site.install(binding.clone());
        site.install(binding);
        assert_eq!(site.len(), 1);
    }

    #[test]
    fn test_minimum_capacity_is_one() {
        let lang = Counting::new(4);
        let context: Arc<dyn LanguageContext> = lang;
        let site = CallSite::with_capacity(
            Binder::new(OperationKind::get_member("kind"), context),
            0,
        );
        assert_eq!(site.capacity(), 1);
    }
}
