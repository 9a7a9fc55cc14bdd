//! Conversions.
//!
//! Implicit conversions only widen (`bool` to `int`, `int` to `float`);
//! truncating and parsing conversions need the explicit flag. Anything this
//! module declines falls back to the default binder's type mismatch.

use std::sync::Arc;

use lumen_core::{
    Binding, ConvertTarget, DelegateSignature, Guard, Plan, RuntimeError, RuntimeResult, Value,
    ValueKind,
};

use crate::binder::Binder;
use crate::delegate::get_delegate;

type ConvertFn = fn(&Value) -> RuntimeResult<Value>;

pub(super) fn bind_convert(
    binder: &Binder,
    target: &ConvertTarget,
    explicit: bool,
    args: &[Value],
) -> Option<Binding> {
    let [value] = args else {
        return None;
    };

    if let ConvertTarget::Delegate(signature) = target {
        return bind_delegate(binder, signature, value);
    }

    if *target == ConvertTarget::Str && explicit && value.kind() != ValueKind::Str {
        let context = Arc::clone(binder.context());
        return Some(Binding::new(
            Guard::for_arguments(args),
            Plan::new(move |args| {
                let value = single(args)?;
                Ok(Value::str(&context.format_value(value)))
            }),
        ));
    }

    let conversion = select(target, value.kind(), explicit)?;
    Some(Binding::new(
        Guard::for_arguments(args),
        Plan::new(move |args| conversion(single(args)?)),
    ))
}

fn single(args: &[Value]) -> RuntimeResult<&Value> {
    match args {
        [value] => Ok(value),
        _ => Err(RuntimeError::ArgumentCount {
            expected: 1,
            actual: args.len(),
        }),
    }
}

fn select(target: &ConvertTarget, kind: ValueKind, explicit: bool) -> Option<ConvertFn> {
    match (target, kind) {
        (ConvertTarget::Bool, ValueKind::Object) => explicit.then_some(truth as ConvertFn),
        (ConvertTarget::Bool, _) => Some(truth),
        (ConvertTarget::Int, ValueKind::Int | ValueKind::Bool) => Some(integer),
        (ConvertTarget::Int, ValueKind::Float) => explicit.then_some(truncate as ConvertFn),
        (ConvertTarget::Int, ValueKind::Str) => explicit.then_some(parse_int as ConvertFn),
        (ConvertTarget::Float, ValueKind::Float | ValueKind::Int | ValueKind::Bool) => Some(widen),
        (ConvertTarget::Float, ValueKind::Str) => explicit.then_some(parse_float as ConvertFn),
        (ConvertTarget::Str, ValueKind::Str)
        | (ConvertTarget::List, ValueKind::List)
        | (ConvertTarget::Tuple, ValueKind::Tuple) => Some(unchanged),
        (ConvertTarget::List, ValueKind::Tuple | ValueKind::Str) => {
            explicit.then_some(to_list as ConvertFn)
        }
        (ConvertTarget::Tuple, ValueKind::List | ValueKind::Str) => {
            explicit.then_some(to_tuple as ConvertFn)
        }
        _ => None,
    }
}

fn unchanged(value: &Value) -> RuntimeResult<Value> {
    Ok(value.clone())
}

fn truth(value: &Value) -> RuntimeResult<Value> {
    Ok(Value::Bool(value.is_truthy()))
}

fn integer(value: &Value) -> RuntimeResult<Value> {
    value
        .as_int()
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::type_mismatch("int", value))
}

fn widen(value: &Value) -> RuntimeResult<Value> {
    value
        .as_float()
        .map(Value::Float)
        .ok_or_else(|| RuntimeError::type_mismatch("float", value))
}

// i64::MAX is not representable; 2^63 is the first float out of range.
const INT_RANGE: f64 = 9_223_372_036_854_775_808.0;

fn truncate(value: &Value) -> RuntimeResult<Value> {
    let Value::Float(x) = value else {
        return integer(value);
    };
    if !x.is_finite() {
        return Err(RuntimeError::invalid(format!("cannot convert {} to int", x)));
    }
    let truncated = x.trunc();
    if !(-INT_RANGE..INT_RANGE).contains(&truncated) {
        return Err(RuntimeError::invalid(format!("{} is out of int range", x)));
    }
    Ok(Value::Int(truncated as i64))
}

fn parse_int(value: &Value) -> RuntimeResult<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| RuntimeError::type_mismatch("str", value))?;
    text.trim()
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| RuntimeError::invalid(format!("invalid literal for int: '{}'", text)))
}

fn parse_float(value: &Value) -> RuntimeResult<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| RuntimeError::type_mismatch("str", value))?;
    text.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| RuntimeError::invalid(format!("invalid literal for float: '{}'", text)))
}

fn items_of(value: &Value) -> RuntimeResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.read().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Str(text) => {
            let mut buf = [0u8; 4];
            Ok(text
                .chars()
                .map(|c| Value::str(c.encode_utf8(&mut buf)))
                .collect())
        }
        other => Err(RuntimeError::type_mismatch("sequence", other)),
    }
}

fn to_list(value: &Value) -> RuntimeResult<Value> {
    items_of(value).map(Value::list)
}

fn to_tuple(value: &Value) -> RuntimeResult<Value> {
    items_of(value).map(Value::tuple)
}

/// Delegate conversion of any value the language can call.
///
/// Functions are pinned by identity since acceptance depends on their
/// signature; callable objects by exact type.
fn bind_delegate(binder: &Binder, signature: &DelegateSignature, value: &Value) -> Option<Binding> {
    if !binder.context().is_callable(value) {
        return None;
    }
    let guard = match value {
        Value::Function(_) => Guard::arity(1).identity(0, value.clone()),
        _ => Guard::for_arguments(std::slice::from_ref(value)),
    };
    let context = Arc::clone(binder.context());
    let signature = signature.clone();
    Some(Binding::new(
        guard,
        Plan::new(move |args| get_delegate(&context, single(args)?, &signature)),
    ))
}
