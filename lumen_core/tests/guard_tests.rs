//! Guard classification across value kinds.

use std::any::Any;

use lumen_core::{
    DynamicObject, Guard, GuardTest, NativeFunction, RuntimeType, Value, ValueKind,
};

#[derive(Debug)]
struct Left;

#[derive(Debug)]
struct Right;

impl DynamicObject for Left {
    fn type_name(&self) -> &str {
        "Left"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DynamicObject for Right {
    fn type_name(&self) -> &str {
        "Right"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn samples() -> Vec<Value> {
    vec![
        Value::None,
        Value::Bool(false),
        Value::Int(0),
        Value::Int(7),
        Value::Float(0.5),
        Value::str(""),
        Value::str("text"),
        Value::tuple(vec![Value::Int(1)]),
        Value::list(vec![]),
        Value::function(NativeFunction::variadic("f", |_| Ok(Value::None))),
        Value::object(Left),
        Value::object(Left),
        Value::object(Right),
    ]
}

#[test]
fn test_argument_guards_classify_by_type() {
    let values = samples();
    for a in &values {
        let guard = Guard::for_arguments(std::slice::from_ref(a));
        for b in &values {
            assert_eq!(
                guard.test(std::slice::from_ref(b)),
                a.runtime_type() == b.runtime_type(),
                "guard of {:?} on {:?}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_object_guards_use_exact_type() {
    let left = Value::object(Left);
    let guard = Guard::for_arguments(std::slice::from_ref(&left));
    assert!(guard.tests().iter().any(|test| matches!(
        test,
        GuardTest::TypeIs {
            index: 0,
            ty: RuntimeType::Native(_)
        }
    )));
    assert!(!guard.tests().iter().any(|test| matches!(test, GuardTest::KindIs { .. })));
}

#[test]
fn test_guards_check_argument_count() {
    let guard = Guard::arity(2).kind(0, ValueKind::Int);
    assert!(guard.test(&[Value::Int(1), Value::None]));
    assert!(!guard.test(&[Value::Int(1)]));
    assert!(!guard.test(&[Value::Int(1), Value::None, Value::None]));
}

#[test]
fn test_identity_guards() {
    let a = Value::list(vec![]);
    let b = Value::list(vec![]);
    let guard = Guard::arity(1).identity(0, a.clone());
    assert!(guard.test(&[a]));
    assert!(!guard.test(&[b]));
    assert_eq!(Guard::always().tests().len(), 0);
}
