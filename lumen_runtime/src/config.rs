//! Binding configuration.
//!
//! Tunables for call-site caching and member resolution, resolved from
//! defaults, presets, or `LUMEN_*` environment variables.

use std::sync::OnceLock;

use thiserror::Error;

/// Default number of bindings a call site retains.
pub const DEFAULT_SITE_CAPACITY: usize = 4;

/// Upper bound accepted for the site capacity.
pub const MAX_SITE_CAPACITY: usize = 64;

/// Configuration for binding and call-site caching.
///
/// # Example
///
/// ```
/// use lumen_runtime::BindingConfig;
///
/// let config = BindingConfig {
///     site_capacity: 8,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    // =========================================================================
    // Call Sites
    // =========================================================================
    /// Maximum number of bindings a call site keeps before evicting the
    /// least recently used one.
    ///
    /// Default: 4
    pub site_capacity: usize,

    // =========================================================================
    // Members
    // =========================================================================
    /// Whether legacy named operations, which the language dispatches as
    /// method calls, look the method up case-insensitively. Typed member
    /// operations carry their own case flag.
    ///
    /// Default: false
    pub ignore_case_members: bool,

    // =========================================================================
    // Debugging
    // =========================================================================
    /// Log every cache hit at `trace` level in addition to misses.
    ///
    /// Default: false
    pub trace_bindings: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            site_capacity: DEFAULT_SITE_CAPACITY,
            ignore_case_members: false,
            trace_bindings: false,
        }
    }
}

impl BindingConfig {
    /// Sites that keep only the most recent binding.
    pub fn monomorphic() -> Self {
        Self {
            site_capacity: 1,
            ..Default::default()
        }
    }

    /// Sites that tolerate heavily polymorphic receivers.
    pub fn megamorphic() -> Self {
        Self {
            site_capacity: 16,
            ..Default::default()
        }
    }

    /// Defaults overridden by `LUMEN_SITE_CAPACITY` and
    /// `LUMEN_TRACE_BINDINGS`.
    ///
    /// Unparseable or out-of-range capacities keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = Self::env_capacity() {
            config.site_capacity = capacity;
        }
        config.trace_bindings = Self::env_bool("LUMEN_TRACE_BINDINGS");
        config
    }

    /// Process-wide configuration, resolved from the environment on first
    /// access.
    pub fn global() -> &'static BindingConfig {
        static GLOBAL: OnceLock<BindingConfig> = OnceLock::new();
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.site_capacity > MAX_SITE_CAPACITY {
            return Err(ConfigError::CapacityTooLarge(self.site_capacity));
        }
        Ok(())
    }

    #[inline]
    fn env_bool(var: &str) -> bool {
        std::env::var(var)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false)
    }

    fn env_capacity() -> Option<usize> {
        let capacity = std::env::var("LUMEN_SITE_CAPACITY")
            .ok()?
            .trim()
            .parse::<usize>()
            .ok()?;
        (1..=MAX_SITE_CAPACITY).contains(&capacity).then_some(capacity)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Site capacity must be at least 1.
    #[error("site capacity must be at least 1")]
    ZeroCapacity,
    /// Site capacity exceeds the supported maximum.
    #[error("site capacity {0} exceeds the maximum of {max}", max = MAX_SITE_CAPACITY)]
    CapacityTooLarge(usize),
}

// =============================================================================
// Tests
// =============================================================================
