//! Script classes and instances.
//!
//! Classes are immutable once built: a process-unique [`ClassId`], a name
//! and a member table of methods and class data. Instances hold a class
//! reference plus insertion-ordered mutable fields.
//!
//! Both implement the dynamic object protocol. Instance bindings guard on
//! the exact runtime type `Class(id)` only; because the class can't change,
//! everything else the plan needs (field presence, argument values) is read
//! when the plan executes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use lumen_core::ops::names_match;
use lumen_core::{
    Binding, ClassId, ConvertTarget, DynamicObject, Guard, Members, Name, NativeFunction,
    OperationKind, Operator, Plan, RuntimeError, RuntimeResult, RuntimeType, Value, ValueKind,
};
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};

type Fields = IndexMap<Name, Value, FxBuildHasher>;

// =============================================================================
// Classes
// =============================================================================

/// Immutable class definition shared by a class object and its instances.
#[derive(Debug)]
pub struct ClassDef {
    id: ClassId,
    name: Name,
    members: FxHashMap<Name, Value>,
}

impl ClassDef {
    /// Class id.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a class member.
    pub fn lookup(&self, name: &str, ignore_case: bool) -> Option<&Value> {
        if !ignore_case {
            return self.members.get(name);
        }
        self.members
            .iter()
            .find(|(candidate, _)| names_match(name, candidate, true))
            .map(|(_, value)| value)
    }

    /// Whether the class defines `name`.
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }
}

/// Builder for script classes.
#[derive(Debug)]
pub struct ClassBuilder {
    name: Name,
    members: FxHashMap<Name, Value>,
}

impl ClassBuilder {
    /// Start a class named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            members: FxHashMap::default(),
        }
    }

    /// Add a method taking the instance plus `arity - 1` arguments.
    pub fn method<F>(self, name: &str, arity: usize, body: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.function(NativeFunction::new(name, arity, body))
    }

    /// Add a method from an existing function, keyed by its name.
    pub fn function(mut self, function: NativeFunction) -> Self {
        self.members
            .insert(Arc::from(function.name()), Value::function(function));
        self
    }

    /// Add class data.
    pub fn attribute(mut self, name: &str, value: Value) -> Self {
        self.members.insert(Arc::from(name), value);
        self
    }

    /// Finish the class.
    pub fn build(self) -> ClassObject {
        ClassObject {
            def: Arc::new(ClassDef {
                id: ClassId::allocate(),
                name: self.name,
                members: self.members,
            }),
        }
    }
}

/// A class as a runtime value.
#[derive(Debug, Clone)]
pub struct ClassObject {
    def: Arc<ClassDef>,
}

impl ClassObject {
    /// Class definition.
    #[inline]
    pub fn def(&self) -> &Arc<ClassDef> {
        &self.def
    }

    /// Create an instance and run `__init__` with `args`.
    pub fn instantiate(&self, args: &[Value]) -> RuntimeResult<Value> {
        instantiate(&self.def, args)
    }
}

fn instantiate(def: &Arc<ClassDef>, args: &[Value]) -> RuntimeResult<Value> {
    let instance = Value::object(Instance::new(Arc::clone(def)));
    match def.lookup("__init__", false) {
        Some(init) => {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(instance.clone());
            full.extend_from_slice(args);
            match call_value(init, &full)? {
                Value::None => Ok(instance),
                _ => Err(RuntimeError::invalid("__init__ should return None")),
            }
        }
        None if args.is_empty() => Ok(instance),
        None => Err(RuntimeError::ArgumentCount {
            expected: 0,
            actual: args.len(),
        }),
    }
}

impl DynamicObject for ClassObject {
    fn type_name(&self) -> &str {
        "type"
    }

    fn bind(&self, kind: &OperationKind, args: &[Value]) -> Option<Binding> {
        let receiver = args.first()?;
        match kind {
            OperationKind::Invoke { argc } | OperationKind::CreateInstance { argc } => {
                let def = Arc::clone(&self.def);
                Some(Binding::new(
                    Guard::arity(argc + 1).identity(0, receiver.clone()),
                    Plan::new(move |args| instantiate(&def, args.get(1..).unwrap_or_default())),
                ))
            }
            OperationKind::GetMember { name, ignore_case } => {
                let value = self.def.lookup(name, *ignore_case)?.clone();
                Some(Binding::new(
                    Guard::arity(1).identity(0, receiver.clone()),
                    Plan::constant(value),
                ))
            }
            OperationKind::SetMember { .. }
            | OperationKind::DeleteMember { .. }
            | OperationKind::InvokeMember { .. }
            | OperationKind::Convert { .. }
            | OperationKind::UnaryOperation(_)
            | OperationKind::BinaryOperation(_)
            | OperationKind::GetIndex { .. }
            | OperationKind::SetIndex { .. }
            | OperationKind::Named(_) => None,
        }
    }

    fn members(&self) -> Members<'_> {
        Box::new(
            self.def
                .members
                .iter()
                .map(|(name, value)| (Arc::clone(name), value.clone())),
        )
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Instances
// =============================================================================

/// An instance of a script class.
pub struct Instance {
    class: Arc<ClassDef>,
    fields: RwLock<Fields>,
}

impl Instance {
    /// Create an instance with no fields.
    pub fn new(class: Arc<ClassDef>) -> Self {
        Self {
            class,
            fields: RwLock::new(Fields::default()),
        }
    }

    /// Class definition.
    #[inline]
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Read a field.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Write a field.
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.write().insert(Arc::from(name), value);
    }

    fn lookup_field(&self, name: &str, ignore_case: bool) -> Option<Value> {
        let fields = self.fields.read();
        if !ignore_case {
            return fields.get(name).cloned();
        }
        fields
            .iter()
            .find(|(candidate, _)| names_match(name, candidate, true))
            .map(|(_, value)| value.clone())
    }

    /// Attribute lookup: fields first, then class members. Class functions
    /// come back bound to `receiver`.
    fn attribute(&self, receiver: &Value, name: &str, ignore_case: bool) -> Option<Value> {
        if let Some(value) = self.lookup_field(name, ignore_case) {
            return Some(value);
        }
        match self.class.lookup(name, ignore_case)? {
            Value::Function(method) => Some(Value::function(method.bind_receiver(receiver.clone()))),
            other => Some(other.clone()),
        }
    }

    fn assign(&self, name: &Name, ignore_case: bool, value: Value) {
        let mut fields = self.fields.write();
        if ignore_case {
            if let Some(slot) = fields
                .iter_mut()
                .find(|(candidate, _)| names_match(name, candidate, true))
                .map(|(_, slot)| slot)
            {
                *slot = value;
                return;
            }
        }
        fields.insert(Arc::clone(name), value);
    }

    fn remove(&self, name: &str, ignore_case: bool) -> bool {
        let mut fields = self.fields.write();
        let index = if ignore_case {
            fields
                .keys()
                .position(|candidate| names_match(name, candidate, true))
        } else {
            fields.get_index_of(name)
        };
        match index {
            Some(index) => fields.shift_remove_index(index).is_some(),
            None => false,
        }
    }

    /// Binding calling the class method `method` with the site arguments.
    fn method_binding(&self, method: &str, args: &[Value]) -> Option<Binding> {
        if !self.class.has(method) {
            return None;
        }
        let class = Arc::clone(&self.class);
        let method: Name = Arc::from(method);
        Some(Binding::new(
            self.guard(args),
            Plan::new(move |args| match class.lookup(&method, false) {
                Some(function) => call_value(function, args),
                None => Err(RuntimeError::raised(format!("missing method '{}'", method))),
            }),
        ))
    }

    fn guard(&self, args: &[Value]) -> Guard {
        Guard::arity(args.len()).exact_type(0, RuntimeType::Class(self.class.id))
    }
}

/// The instance in receiver position of an instance binding.
fn receiver_instance(args: &[Value]) -> RuntimeResult<(&Value, &Instance)> {
    let Some(receiver) = args.first() else {
        return Err(RuntimeError::ArgumentCount {
            expected: 1,
            actual: 0,
        });
    };
    match receiver.downcast_object::<Instance>() {
        Some(instance) => Ok((receiver, instance)),
        None => Err(RuntimeError::type_mismatch("instance", receiver)),
    }
}

/// Call `callee` with `args`: native functions directly, protocol objects
/// through their own invoke binding.
pub fn call_value(callee: &Value, args: &[Value]) -> RuntimeResult<Value> {
    match callee {
        Value::Function(function) => function.call(args),
        Value::Object(object) => {
            let kind = OperationKind::invoke(args.len());
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(callee.clone());
            full.extend_from_slice(args);
            match object.bind(&kind, &full) {
                Some(binding) => binding.execute(&full),
                None => Err(RuntimeError::not_callable(callee)),
            }
        }
        _ => Err(RuntimeError::not_callable(callee)),
    }
}

impl DynamicObject for Instance {
    fn type_name(&self) -> &str {
        self.class.name()
    }

    fn runtime_type(&self) -> RuntimeType {
        RuntimeType::Class(self.class.id)
    }

    fn bind(&self, kind: &OperationKind, args: &[Value]) -> Option<Binding> {
        match kind {
            OperationKind::GetMember { name, ignore_case } => {
                let (name, ignore_case, kind) = (Arc::clone(name), *ignore_case, kind.clone());
                Some(Binding::new(
                    self.guard(args),
                    Plan::new(move |args| {
                        let (receiver, instance) = receiver_instance(args)?;
                        instance
                            .attribute(receiver, &name, ignore_case)
                            .ok_or_else(|| RuntimeError::unsupported(&kind, receiver))
                    }),
                ))
            }
            OperationKind::SetMember { name, ignore_case } => {
                let (name, ignore_case) = (Arc::clone(name), *ignore_case);
                Some(Binding::new(
                    self.guard(args),
                    Plan::new(move |args| {
                        let (_, instance) = receiver_instance(args)?;
                        let value = args.get(1).cloned().unwrap_or(Value::None);
                        instance.assign(&name, ignore_case, value.clone());
                        Ok(value)
                    }),
                ))
            }
            OperationKind::DeleteMember { name, ignore_case } => {
                let (name, ignore_case, kind) = (Arc::clone(name), *ignore_case, kind.clone());
                Some(Binding::new(
                    self.guard(args),
                    Plan::new(move |args| {
                        let (receiver, instance) = receiver_instance(args)?;
                        if instance.remove(&name, ignore_case) {
                            Ok(Value::None)
                        } else {
                            Err(RuntimeError::unsupported(&kind, receiver))
                        }
                    }),
                ))
            }
            OperationKind::InvokeMember {
                name, ignore_case, ..
            } => {
                let (name, ignore_case, kind) = (Arc::clone(name), *ignore_case, kind.clone());
                Some(Binding::new(
                    self.guard(args),
                    Plan::new(move |args| {
                        let (receiver, instance) = receiver_instance(args)?;
                        let callee = instance
                            .attribute(receiver, &name, ignore_case)
                            .ok_or_else(|| RuntimeError::unsupported(&kind, receiver))?;
                        call_value(&callee, args.get(1..).unwrap_or_default())
                    }),
                ))
            }
            OperationKind::Invoke { .. } => self.method_binding("__call__", args),
            OperationKind::UnaryOperation(operator) | OperationKind::BinaryOperation(operator) => {
                // Membership is dispatched on the container, which sits on the right.
                if matches!(operator, Operator::In | Operator::NotIn) {
                    return None;
                }
                self.method_binding(operator.protocol_method()?, args)
            }
            OperationKind::Convert { target, .. } => match target {
                ConvertTarget::Str => self.method_binding("__str__", args),
                ConvertTarget::Bool => {
                    let binding = self.method_binding("__bool__", args)?;
                    Some(Binding::new(
                        binding.guard().clone(),
                        Plan::new(move |args| match binding.execute(args)? {
                            Value::Bool(b) => Ok(Value::Bool(b)),
                            other => Err(RuntimeError::type_mismatch(ValueKind::Bool.name(), &other)),
                        }),
                    ))
                }
                ConvertTarget::Int
                | ConvertTarget::Float
                | ConvertTarget::List
                | ConvertTarget::Tuple
                | ConvertTarget::Delegate(_) => None,
            },
            OperationKind::GetIndex { .. } => self.method_binding("__getitem__", args),
            OperationKind::SetIndex { .. } => {
                let binding = self.method_binding("__setitem__", args)?;
                Some(Binding::new(
                    binding.guard().clone(),
                    Plan::new(move |args| {
                        binding.execute(args)?;
                        Ok(args.last().cloned().unwrap_or(Value::None))
                    }),
                ))
            }
            OperationKind::CreateInstance { .. } | OperationKind::Named(_) => None,
        }
    }

    /// Instance declines depend only on the (immutable) class.
    fn decline_guard(&self, _kind: &OperationKind, _args: &[Value]) -> Guard {
        Guard::always().exact_type(0, RuntimeType::Class(self.class.id))
    }

    fn members(&self) -> Members<'_> {
        let snapshot: Vec<(Name, Value)> = self
            .fields
            .read()
            .iter()
            .map(|(name, value)| (Arc::clone(name), value.clone()))
            .collect();
        Box::new(snapshot.into_iter())
    }

    fn is_callable(&self) -> bool {
        self.class.has("__call__")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.read().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
