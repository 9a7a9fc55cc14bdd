//! Invocation, builtin methods, indexing and legacy named operations.

use std::sync::Arc;

use lumen_core::ops::names_match;
use lumen_core::{
    Binding, Guard, LegacyOperation, Name, OperationKind, Plan, RuntimeError, RuntimeResult,
    Value, ValueKind,
};

use crate::binder::Binder;
use crate::site::CallSite;

// =============================================================================
// Invocation
// =============================================================================

pub(super) fn bind_invoke(args: &[Value]) -> Option<Binding> {
    let Some(Value::Function(_)) = args.first() else {
        return None;
    };
    Some(Binding::new(
        Guard::arity(args.len()).kind(0, ValueKind::Function),
        Plan::new(|args| match args.split_first() {
            Some((Value::Function(function), rest)) => function.call(rest),
            Some((other, _)) => Err(RuntimeError::not_callable(other)),
            None => Err(RuntimeError::ArgumentCount {
                expected: 1,
                actual: 0,
            }),
        }),
    ))
}

// =============================================================================
// Builtin Methods
// =============================================================================

type MethodFn = fn(&Value, &[Value]) -> RuntimeResult<Value>;

/// `(name, argument count, implementation)`
const LIST_METHODS: &[(&str, usize, MethodFn)] = &[
    ("append", 1, list_append),
    ("pop", 0, list_pop),
    ("len", 0, sequence_len),
];

const STR_METHODS: &[(&str, usize, MethodFn)] = &[
    ("upper", 0, str_upper),
    ("lower", 0, str_lower),
    ("len", 0, sequence_len),
];

pub(super) fn bind_builtin_method(name: &Name, ignore_case: bool, args: &[Value]) -> Option<Binding> {
    let receiver = args.first()?;
    let table = match receiver.kind() {
        ValueKind::List => LIST_METHODS,
        ValueKind::Str => STR_METHODS,
        _ => return None,
    };
    let &(_, expected, method) = table
        .iter()
        .find(|(candidate, _, _)| names_match(name, candidate, ignore_case))?;

    let guard = Guard::arity(args.len()).kind(0, receiver.kind());
    let actual = args.len() - 1;
    if actual != expected {
        return Some(Binding::failure(
            guard,
            RuntimeError::ArgumentCount { expected, actual },
        ));
    }
    Some(Binding::new(
        guard,
        Plan::new(move |args| match args.split_first() {
            Some((receiver, rest)) => method(receiver, rest),
            None => Err(RuntimeError::ArgumentCount {
                expected: expected + 1,
                actual: 0,
            }),
        }),
    ))
}

fn list_append(receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
    let (Value::List(items), [item]) = (receiver, args) else {
        return Err(RuntimeError::type_mismatch("list", receiver));
    };
    items.write().push(item.clone());
    Ok(Value::None)
}

fn list_pop(receiver: &Value, _args: &[Value]) -> RuntimeResult<Value> {
    let Value::List(items) = receiver else {
        return Err(RuntimeError::type_mismatch("list", receiver));
    };
    items
        .write()
        .pop()
        .ok_or(RuntimeError::IndexOutOfRange { index: -1, len: 0 })
}

fn sequence_len(receiver: &Value, _args: &[Value]) -> RuntimeResult<Value> {
    let len = match receiver {
        Value::Str(text) => text.chars().count(),
        Value::List(items) => items.read().len(),
        Value::Tuple(items) => items.len(),
        other => return Err(RuntimeError::type_mismatch("sequence", other)),
    };
    Ok(Value::Int(len as i64))
}

fn str_upper(receiver: &Value, _args: &[Value]) -> RuntimeResult<Value> {
    receiver
        .as_str()
        .map(|text| Value::str(&text.to_uppercase()))
        .ok_or_else(|| RuntimeError::type_mismatch("str", receiver))
}

fn str_lower(receiver: &Value, _args: &[Value]) -> RuntimeResult<Value> {
    receiver
        .as_str()
        .map(|text| Value::str(&text.to_lowercase()))
        .ok_or_else(|| RuntimeError::type_mismatch("str", receiver))
}

// =============================================================================
// Indexing
// =============================================================================

/// Resolve a possibly negative index against `len`.
fn normalize_index(index: i64, len: usize) -> RuntimeResult<usize> {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if index < 0 { index + signed_len } else { index };
    if (0..signed_len).contains(&adjusted) {
        Ok(adjusted as usize)
    } else {
        Err(RuntimeError::IndexOutOfRange { index, len })
    }
}

pub(super) fn bind_get_index(argc: usize, args: &[Value]) -> Option<Binding> {
    let [receiver, index] = args else {
        return None;
    };
    if argc != 1
        || !matches!(receiver.kind(), ValueKind::List | ValueKind::Tuple | ValueKind::Str)
        || index.as_int().is_none()
    {
        return None;
    }
    Some(Binding::new(
        Guard::for_arguments(args),
        Plan::new(|args| {
            let [receiver, index] = args else {
                return Err(RuntimeError::ArgumentCount {
                    expected: 2,
                    actual: args.len(),
                });
            };
            let index = index
                .as_int()
                .ok_or_else(|| RuntimeError::type_mismatch("int", index))?;
            get_item(receiver, index)
        }),
    ))
}

fn get_item(receiver: &Value, index: i64) -> RuntimeResult<Value> {
    match receiver {
        Value::List(items) => {
            let items = items.read();
            Ok(items[normalize_index(index, items.len())?].clone())
        }
        Value::Tuple(items) => Ok(items[normalize_index(index, items.len())?].clone()),
        Value::Str(text) => {
            let len = text.chars().count();
            let position = normalize_index(index, len)?;
            text.chars()
                .nth(position)
                .map(|c| Value::str(c.encode_utf8(&mut [0u8; 4])))
                .ok_or(RuntimeError::IndexOutOfRange { index, len })
        }
        other => Err(RuntimeError::type_mismatch("sequence", other)),
    }
}

pub(super) fn bind_set_index(argc: usize, args: &[Value]) -> Option<Binding> {
    let [receiver @ Value::List(_), index, _value] = args else {
        return None;
    };
    if argc != 1 || index.as_int().is_none() {
        return None;
    }
    Some(Binding::new(
        Guard::arity(3)
            .kind(0, receiver.kind())
            .kind(1, index.kind()),
        Plan::new(|args| {
            let [Value::List(items), index, value] = args else {
                return Err(RuntimeError::ArgumentCount {
                    expected: 3,
                    actual: args.len(),
                });
            };
            let index = index
                .as_int()
                .ok_or_else(|| RuntimeError::type_mismatch("int", index))?;
            let mut items = items.write();
            let position = normalize_index(index, items.len())?;
            items[position] = value.clone();
            Ok(value.clone())
        }),
    ))
}

// =============================================================================
// Legacy Named Operations
// =============================================================================

/// Unknown named operations become a call of the same-named method on the
/// receiver, resolved by a nested site.
pub(super) fn bind_named(
    binder: &Binder,
    operation: &LegacyOperation,
    ignore_case: bool,
    args: &[Value],
) -> Option<Binding> {
    let LegacyOperation::Other(name) = operation else {
        return None;
    };
    let receiver = args.first()?;
    let argc = args.len() - 1;
    let site = Arc::new(CallSite::new(binder.rebind(OperationKind::InvokeMember {
        name: name.clone(),
        ignore_case,
        argc,
    })));
    Some(Binding::new(
        Guard::arity(args.len()).classified(0, receiver),
        Plan::new(move |args| site.invoke(args)),
    ))
}
