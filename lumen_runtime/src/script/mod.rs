//! The built-in script language.
//!
//! A small dynamically typed language with Python-flavored semantics, used
//! as the reference [`LanguageContext`]. Its binder covers the builtin value
//! kinds; protocol objects (script classes and instances) bind themselves
//! before this binder is consulted.

mod convert;
mod members;
mod operators;

use std::sync::{Arc, OnceLock};

use lumen_core::{Binding, OperationKind, Value};

use crate::binder::Binder;
use crate::config::{BindingConfig, ConfigError};
use crate::language::{LanguageContext, LanguageId};

/// The built-in script language.
#[derive(Debug)]
pub struct ScriptLanguage {
    id: LanguageId,
    config: BindingConfig,
}

impl ScriptLanguage {
    /// A new language instance with the process-wide configuration.
    pub fn new() -> Self {
        // The environment resolution keeps only valid capacities.
        Self::build(BindingConfig::global().clone())
    }

    /// A new language instance with `config`, after validating it.
    pub fn with_config(config: BindingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BindingConfig) -> Self {
        Self {
            id: LanguageId::allocate(),
            config,
        }
    }

    /// The process-wide shared instance.
    pub fn shared() -> Arc<dyn LanguageContext> {
        static SHARED: OnceLock<Arc<dyn LanguageContext>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(ScriptLanguage::new())))
    }
}

impl Default for ScriptLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageContext for ScriptLanguage {
    fn id(&self) -> LanguageId {
        self.id
    }

    fn name(&self) -> &str {
        "script"
    }

    fn config(&self) -> &BindingConfig {
        &self.config
    }

    fn bind(&self, binder: &Binder, args: &[Value]) -> Option<Binding> {
        match binder.kind() {
            OperationKind::Invoke { .. } => members::bind_invoke(args),
            OperationKind::InvokeMember {
                name, ignore_case, ..
            } => members::bind_builtin_method(name, *ignore_case, args),
            OperationKind::GetMember { .. }
            | OperationKind::SetMember { .. }
            | OperationKind::DeleteMember { .. }
            | OperationKind::CreateInstance { .. } => None,
            OperationKind::Convert { target, explicit } => {
                convert::bind_convert(binder, target, *explicit, args)
            }
            OperationKind::UnaryOperation(operator) => {
                operators::bind_unary(binder, *operator, args)
            }
            OperationKind::BinaryOperation(operator) => {
                operators::bind_binary(binder, *operator, args)
            }
            OperationKind::GetIndex { argc } => members::bind_get_index(*argc, args),
            OperationKind::SetIndex { argc } => members::bind_set_index(*argc, args),
            OperationKind::Named(operation) => {
                members::bind_named(binder, operation, self.config.ignore_case_members, args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_instance_is_stable() {
        let a = ScriptLanguage::shared();
        let b = ScriptLanguage::shared();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.name(), "script");
    }

    #[test]
    fn test_instances_have_distinct_ids() {
        assert_ne!(ScriptLanguage::new().id(), ScriptLanguage::new().id());
    }

    #[test]
    fn test_custom_config() {
        let lang = ScriptLanguage::with_config(BindingConfig::monomorphic()).unwrap();
        assert_eq!(lang.config().site_capacity, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let zero = BindingConfig {
            site_capacity: 0,
            ..Default::default()
        };
        assert_eq!(
            ScriptLanguage::with_config(zero).unwrap_err(),
            ConfigError::ZeroCapacity
        );
    }

    #[test]
    fn test_named_operations_follow_case_config() {
        use crate::site::CallSite;
        use lumen_core::RuntimeError;

        let loose: Arc<dyn LanguageContext> = Arc::new(
            ScriptLanguage::with_config(BindingConfig {
                ignore_case_members: true,
                ..Default::default()
            })
            .unwrap(),
        );
        let strict = ScriptLanguage::shared();
        let kind = OperationKind::named("UPPER");
        let args = [Value::str("abc")];

        let site = CallSite::for_language(&loose, kind.clone());
        assert_eq!(site.invoke(&args), Ok(Value::str("ABC")));
        let site = CallSite::for_language(&strict, kind);
        assert!(matches!(
            site.invoke(&args),
            Err(RuntimeError::UnsupportedOperation { .. })
        ));
    }
}
