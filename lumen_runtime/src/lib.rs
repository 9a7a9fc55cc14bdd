//! Dynamic operation binding runtime for Lumen.
//!
//! This crate provides:
//! - The binder chain resolving an operation against runtime arguments
//!   (protocol object, then language, then default fallback)
//! - Language contexts giving each hosted language its own semantics
//! - Call sites caching guarded bindings in most-recently-used order
//! - The create-once publisher and the delegate stubs compiled through it
//! - The built-in script language with its classes and instances
//! - Binding configuration

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod binder;
pub mod config;
pub mod delegate;
pub mod fallback;
pub mod language;
pub mod object;
pub mod publisher;
pub mod script;
pub mod site;

pub use binder::Binder;
pub use config::{BindingConfig, ConfigError};
pub use delegate::{DelegateStub, get_delegate};
pub use fallback::{DefaultBinder, default_binder};
pub use language::{LanguageContext, LanguageId};
pub use object::{ClassBuilder, ClassDef, ClassObject, Instance, call_value};
pub use publisher::Publisher;
pub use script::ScriptLanguage;
pub use site::{CallSite, SiteClassification, SiteStats};
