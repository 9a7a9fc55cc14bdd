//! Language contexts.
//!
//! Each hosted language supplies one [`LanguageContext`]: its identity, its
//! binding configuration, and the language-specific step of the binder
//! chain. Two languages binding the same operation kind may produce
//! different behavior; binders and shared call sites are keyed by the
//! language id so their caches never mix.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use lumen_core::{Binding, Name, Value};

use crate::binder::Binder;
use crate::config::BindingConfig;

/// Process-unique identity token of a language context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageId(u32);

static NEXT_LANGUAGE_ID: AtomicU32 = AtomicU32::new(1);

impl LanguageId {
    /// Allocate a fresh language id.
    pub fn allocate() -> Self {
        LanguageId(NEXT_LANGUAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lang#{}", self.0)
    }
}

/// Per-language binding policy.
pub trait LanguageContext: Send + Sync + 'static {
    /// Identity token. Must be stable for the lifetime of the context.
    fn id(&self) -> LanguageId;

    /// Human-readable language name.
    fn name(&self) -> &str;

    /// Binding configuration used by this language's call sites.
    fn config(&self) -> &BindingConfig {
        BindingConfig::global()
    }

    /// Language-specific binding for `binder`'s kind applied to `args`.
    ///
    /// `None` hands resolution on to the default fallback binder.
    fn bind(&self, binder: &Binder, args: &[Value]) -> Option<Binding> {
        let _ = (binder, args);
        None
    }

    /// Whether the language considers `value` invocable.
    fn is_callable(&self, value: &Value) -> bool {
        value.is_callable()
    }

    /// Member names visible on `value`.
    fn member_names(&self, value: &Value) -> Vec<Name> {
        match value {
            Value::Object(object) => object.member_names(),
            _ => Vec::new(),
        }
    }

    /// Text of `value` as produced by string conversion.
    fn format_value(&self, value: &Value) -> String {
        value.to_string()
    }
}

impl fmt::Debug for dyn LanguageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageContext")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
