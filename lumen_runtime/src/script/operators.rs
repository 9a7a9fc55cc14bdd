//! Unary and binary operators on builtin values.
//!
//! Binding selects a specialized implementation from the operand kinds, and
//! the guard pins those kinds, so a cached binding never sees operands its
//! implementation was not selected for.

use std::cmp::Ordering;
use std::sync::Arc;

use lumen_core::{
    Binding, ConvertTarget, Guard, OperationKind, Operator, Plan, RuntimeError, RuntimeResult,
    Value, ValueKind,
};

use crate::binder::Binder;
use crate::site::CallSite;

type BinaryFn = fn(Operator, &Value, &Value) -> RuntimeResult<Value>;
type UnaryFn = fn(&Value) -> RuntimeResult<Value>;

#[inline]
fn is_numeric(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Bool | ValueKind::Int | ValueKind::Float)
}

#[inline]
fn is_integral(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Bool | ValueKind::Int)
}

#[inline]
fn is_sequence(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Str | ValueKind::List | ValueKind::Tuple)
}

#[inline]
fn when(condition: bool, f: BinaryFn) -> Option<BinaryFn> {
    condition.then_some(f)
}

// =============================================================================
// Binary Operators
// =============================================================================

pub(super) fn bind_binary(binder: &Binder, operator: Operator, args: &[Value]) -> Option<Binding> {
    let [lhs, rhs] = args else {
        return None;
    };

    if matches!(operator, Operator::In | Operator::NotIn) {
        if let Value::Object(_) = rhs {
            return Some(bind_contains(binder, operator, lhs, rhs));
        }
    }

    let implementation = select_binary(operator, lhs.kind(), rhs.kind())?;
    Some(Binding::new(
        Guard::for_arguments(args),
        Plan::new(move |args| match args {
            [lhs, rhs] => implementation(operator, lhs, rhs),
            _ => Err(RuntimeError::ArgumentCount {
                expected: 2,
                actual: args.len(),
            }),
        }),
    ))
}

/// Membership in a protocol object, resolved by a nested `__contains__` call
/// on the container.
fn bind_contains(binder: &Binder, operator: Operator, item: &Value, container: &Value) -> Binding {
    let negate = operator == Operator::NotIn;
    let site = Arc::new(CallSite::new(
        binder.rebind(OperationKind::invoke_member("__contains__", 1)),
    ));
    Binding::new(
        Guard::arity(2).classified(0, item).classified(1, container),
        Plan::new(move |args| {
            let [item, container] = args else {
                return Err(RuntimeError::ArgumentCount {
                    expected: 2,
                    actual: args.len(),
                });
            };
            let found = site.invoke(&[container.clone(), item.clone()])?;
            Ok(Value::Bool(found.is_truthy() != negate))
        }),
    )
}

fn select_binary(operator: Operator, l: ValueKind, r: ValueKind) -> Option<BinaryFn> {
    let numeric = is_numeric(l) && is_numeric(r);
    let integral = is_integral(l) && is_integral(r);
    match operator {
        Operator::Add => {
            if numeric {
                Some(arithmetic)
            } else {
                when(l == r && is_sequence(l), concatenate)
            }
        }
        Operator::Multiply => {
            if numeric {
                Some(arithmetic)
            } else {
                when(
                    (is_sequence(l) && is_integral(r)) || (is_integral(l) && is_sequence(r)),
                    repeat,
                )
            }
        }
        Operator::Subtract
        | Operator::Divide
        | Operator::TrueDivide
        | Operator::Modulo
        | Operator::Power
        | Operator::FloorDivide => when(numeric, arithmetic),
        Operator::BitwiseAnd
        | Operator::BitwiseOr
        | Operator::BitwiseXor
        | Operator::LeftShift
        | Operator::RightShift => when(integral, bitwise),
        Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual => when(
            numeric || (l == ValueKind::Str && r == ValueKind::Str),
            compare,
        ),
        Operator::Equal | Operator::NotEqual => Some(equality),
        Operator::Is | Operator::IsNot => Some(identity),
        Operator::In | Operator::NotIn => when(
            matches!(r, ValueKind::List | ValueKind::Tuple)
                || (l == ValueKind::Str && r == ValueKind::Str),
            membership,
        ),
        Operator::Not | Operator::Pos | Operator::Invert | Operator::Negate => None,
    }
}

fn wrong_operands(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: format!("operands supported by '{}'", operator),
        actual: format!("{}, {}", lhs.type_name(), rhs.type_name()),
    }
}

fn arithmetic(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    if let (Value::Float(_), _) | (_, Value::Float(_)) = (lhs, rhs) {
        let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) else {
            return Err(wrong_operands(operator, lhs, rhs));
        };
        return float_arithmetic(operator, a, b).map(Value::Float);
    }
    let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) else {
        return Err(wrong_operands(operator, lhs, rhs));
    };
    int_arithmetic(operator, a, b)
}

fn int_arithmetic(operator: Operator, a: i64, b: i64) -> RuntimeResult<Value> {
    let overflow = || RuntimeError::Overflow { operator };
    let value = match operator {
        Operator::Add => a.checked_add(b).ok_or_else(overflow)?,
        Operator::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
        Operator::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
        Operator::Divide | Operator::FloorDivide => floor_div(a, b).ok_or_else(overflow)??,
        Operator::TrueDivide => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        Operator::Modulo => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let r = a.wrapping_rem(b);
            if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
        }
        Operator::Power => {
            if b < 0 {
                if a == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exponent = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exponent).ok_or_else(overflow)?
        }
        Operator::Not
        | Operator::Pos
        | Operator::Invert
        | Operator::Negate
        | Operator::BitwiseAnd
        | Operator::BitwiseOr
        | Operator::BitwiseXor
        | Operator::LeftShift
        | Operator::RightShift
        | Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual
        | Operator::Equal
        | Operator::NotEqual
        | Operator::In
        | Operator::NotIn
        | Operator::Is
        | Operator::IsNot => {
            return Err(RuntimeError::invalid(format!(
                "'{}' is not an arithmetic operator",
                operator
            )));
        }
    };
    Ok(Value::Int(value))
}

/// Floor division; `None` on overflow, `Some(Err)` on division by zero.
fn floor_div(a: i64, b: i64) -> Option<RuntimeResult<i64>> {
    if b == 0 {
        return Some(Err(RuntimeError::DivisionByZero));
    }
    let q = a.checked_div(b)?;
    if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
        Some(Ok(q - 1))
    } else {
        Some(Ok(q))
    }
}

fn float_arithmetic(operator: Operator, a: f64, b: f64) -> RuntimeResult<f64> {
    match operator {
        Operator::Add => Ok(a + b),
        Operator::Subtract => Ok(a - b),
        Operator::Multiply => Ok(a * b),
        Operator::Divide | Operator::TrueDivide => {
            if b == 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(a / b)
            }
        }
        Operator::FloorDivide => {
            if b == 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok((a / b).floor())
            }
        }
        Operator::Modulo => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let r = a % b;
            Ok(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r })
        }
        Operator::Power => {
            if a == 0.0 && b < 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(a.powf(b))
            }
        }
        Operator::Not
        | Operator::Pos
        | Operator::Invert
        | Operator::Negate
        | Operator::BitwiseAnd
        | Operator::BitwiseOr
        | Operator::BitwiseXor
        | Operator::LeftShift
        | Operator::RightShift
        | Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual
        | Operator::Equal
        | Operator::NotEqual
        | Operator::In
        | Operator::NotIn
        | Operator::Is
        | Operator::IsNot => Err(RuntimeError::invalid(format!(
            "'{}' is not an arithmetic operator",
            operator
        ))),
    }
}

fn bitwise(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    if let (Value::Bool(a), Value::Bool(b)) = (lhs, rhs) {
        let logical = match operator {
            Operator::BitwiseAnd => Some(a & b),
            Operator::BitwiseOr => Some(a | b),
            Operator::BitwiseXor => Some(a ^ b),
            Operator::LeftShift | Operator::RightShift => None,
            Operator::Not
            | Operator::Pos
            | Operator::Invert
            | Operator::Negate
            | Operator::Add
            | Operator::Subtract
            | Operator::Multiply
            | Operator::Divide
            | Operator::TrueDivide
            | Operator::Modulo
            | Operator::Power
            | Operator::FloorDivide
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::Equal
            | Operator::NotEqual
            | Operator::In
            | Operator::NotIn
            | Operator::Is
            | Operator::IsNot => None,
        };
        if let Some(result) = logical {
            return Ok(Value::Bool(result));
        }
    }
    let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) else {
        return Err(wrong_operands(operator, lhs, rhs));
    };
    let value = match operator {
        Operator::BitwiseAnd => a & b,
        Operator::BitwiseOr => a | b,
        Operator::BitwiseXor => a ^ b,
        Operator::LeftShift => {
            if b < 0 {
                return Err(RuntimeError::invalid("negative shift count"));
            }
            if a == 0 {
                0
            } else if b >= 64 {
                return Err(RuntimeError::Overflow { operator });
            } else {
                i64::try_from((a as i128) << b).map_err(|_| RuntimeError::Overflow { operator })?
            }
        }
        Operator::RightShift => {
            if b < 0 {
                return Err(RuntimeError::invalid("negative shift count"));
            }
            a >> b.min(63)
        }
        Operator::Not
        | Operator::Pos
        | Operator::Invert
        | Operator::Negate
        | Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::TrueDivide
        | Operator::Modulo
        | Operator::Power
        | Operator::FloorDivide
        | Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual
        | Operator::Equal
        | Operator::NotEqual
        | Operator::In
        | Operator::NotIn
        | Operator::Is
        | Operator::IsNot => return Err(wrong_operands(operator, lhs, rhs)),
    };
    Ok(Value::Int(value))
}

fn compare(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Float(_), _) | (_, Value::Float(_)) => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(wrong_operands(operator, lhs, rhs)),
        },
        _ => match (lhs.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => return Err(wrong_operands(operator, lhs, rhs)),
        },
    };
    // Unordered operands (NaN) compare false.
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match operator {
        Operator::LessThan => ordering == Ordering::Less,
        Operator::LessThanOrEqual => ordering != Ordering::Greater,
        Operator::GreaterThan => ordering == Ordering::Greater,
        Operator::GreaterThanOrEqual => ordering != Ordering::Less,
        Operator::Not
        | Operator::Pos
        | Operator::Invert
        | Operator::Negate
        | Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::TrueDivide
        | Operator::Modulo
        | Operator::BitwiseAnd
        | Operator::BitwiseOr
        | Operator::BitwiseXor
        | Operator::LeftShift
        | Operator::RightShift
        | Operator::Power
        | Operator::FloorDivide
        | Operator::Equal
        | Operator::NotEqual
        | Operator::In
        | Operator::NotIn
        | Operator::Is
        | Operator::IsNot => return Err(wrong_operands(operator, lhs, rhs)),
    };
    Ok(Value::Bool(result))
}

fn equality(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    let equal = lhs.equals(rhs);
    Ok(Value::Bool(if operator == Operator::NotEqual { !equal } else { equal }))
}

fn identity(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    let same = lhs.is_identical(rhs);
    Ok(Value::Bool(if operator == Operator::IsNot { !same } else { same }))
}

fn membership(operator: Operator, item: &Value, container: &Value) -> RuntimeResult<Value> {
    let found = match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => haystack.contains(&**needle),
            _ => return Err(wrong_operands(operator, item, container)),
        },
        Value::List(items) => items.read().iter().any(|candidate| candidate.equals(item)),
        Value::Tuple(items) => items.iter().any(|candidate| candidate.equals(item)),
        _ => return Err(wrong_operands(operator, item, container)),
    };
    Ok(Value::Bool(if operator == Operator::NotIn { !found } else { found }))
}

fn concatenate(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => {
            let mut text = String::with_capacity(a.len() + b.len());
            text.push_str(a);
            text.push_str(b);
            Ok(Value::str(&text))
        }
        (Value::List(a), Value::List(b)) => {
            let mut items = a.read().clone();
            // `b` may alias `a`; read it after releasing the first guard.
            let tail = b.read().clone();
            items.extend(tail);
            Ok(Value::list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(wrong_operands(operator, lhs, rhs)),
    }
}

/// Largest sequence, in bytes or items, that repetition may produce.
const MAX_REPEAT_LEN: usize = 1 << 28;

fn repeat(operator: Operator, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    let (sequence, count) = match (lhs.as_int(), rhs.as_int()) {
        (None, Some(n)) => (lhs, n),
        (Some(n), None) => (rhs, n),
        _ => return Err(wrong_operands(operator, lhs, rhs)),
    };
    let count = usize::try_from(count).unwrap_or(0);
    let checked_len = |len: usize| {
        len.checked_mul(count)
            .filter(|&total| total <= MAX_REPEAT_LEN)
            .ok_or(RuntimeError::Overflow { operator })
    };
    match sequence {
        Value::Str(text) => {
            checked_len(text.len())?;
            Ok(Value::str(&text.repeat(count)))
        }
        Value::List(items) => {
            let items = items.read();
            let total = checked_len(items.len())?;
            Ok(Value::list(repeat_items(&items, total)))
        }
        Value::Tuple(items) => {
            let total = checked_len(items.len())?;
            Ok(Value::tuple(repeat_items(items, total)))
        }
        _ => Err(wrong_operands(operator, lhs, rhs)),
    }
}

fn repeat_items(items: &[Value], total: usize) -> Vec<Value> {
    items.iter().cycle().take(total).cloned().collect()
}

// =============================================================================
// Unary Operators
// =============================================================================

pub(super) fn bind_unary(binder: &Binder, operator: Operator, args: &[Value]) -> Option<Binding> {
    let [operand] = args else {
        return None;
    };

    // `not` on a protocol object asks the object for its truth value.
    if operator == Operator::Not {
        if let Value::Object(_) = operand {
            let site = Arc::new(CallSite::new(
                binder.rebind(OperationKind::convert(ConvertTarget::Bool, true)),
            ));
            return Some(Binding::new(
                Guard::for_arguments(args),
                Plan::new(move |args| {
                    let truth = site.invoke(args)?;
                    Ok(Value::Bool(!truth.is_truthy()))
                }),
            ));
        }
    }

    let implementation = select_unary(operator, operand.kind())?;
    Some(Binding::new(
        Guard::for_arguments(args),
        Plan::new(move |args| match args {
            [operand] => implementation(operand),
            _ => Err(RuntimeError::ArgumentCount {
                expected: 1,
                actual: args.len(),
            }),
        }),
    ))
}

fn select_unary(operator: Operator, kind: ValueKind) -> Option<UnaryFn> {
    match operator {
        Operator::Not => Some(logical_not as UnaryFn),
        Operator::Pos => is_numeric(kind).then_some(positive as UnaryFn),
        Operator::Negate => is_numeric(kind).then_some(negate as UnaryFn),
        Operator::Invert => is_integral(kind).then_some(invert as UnaryFn),
        Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::TrueDivide
        | Operator::Modulo
        | Operator::BitwiseAnd
        | Operator::BitwiseOr
        | Operator::BitwiseXor
        | Operator::LeftShift
        | Operator::RightShift
        | Operator::Power
        | Operator::FloorDivide
        | Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual
        | Operator::Equal
        | Operator::NotEqual
        | Operator::In
        | Operator::NotIn
        | Operator::Is
        | Operator::IsNot => None,
    }
}

fn logical_not(value: &Value) -> RuntimeResult<Value> {
    Ok(Value::Bool(!value.is_truthy()))
}

fn positive(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Float(x) => Ok(Value::Float(*x)),
        other => other
            .as_int()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::type_mismatch("number", other)),
    }
}

fn negate(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Float(x) => Ok(Value::Float(-x)),
        other => {
            let i = other
                .as_int()
                .ok_or_else(|| RuntimeError::type_mismatch("number", other))?;
            i.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow {
                operator: Operator::Negate,
            })
        }
    }
}

fn invert(value: &Value) -> RuntimeResult<Value> {
    value
        .as_int()
        .map(|i| Value::Int(!i))
        .ok_or_else(|| RuntimeError::type_mismatch("int", value))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(operator: Operator, lhs: Value, rhs: Value) -> RuntimeResult<Value> {
        let implementation =
            select_binary(operator, lhs.kind(), rhs.kind()).expect("supported operands");
        implementation(operator, &lhs, &rhs)
    }

    fn unary(operator: Operator, operand: Value) -> RuntimeResult<Value> {
        select_unary(operator, operand.kind()).expect("supported operand")(&operand)
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(binary(Operator::Add, Value::Int(2), Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(binary(Operator::Power, Value::Int(2), Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(
            binary(Operator::Power, Value::Int(2), Value::Int(-1)),
            Ok(Value::Float(0.5))
        );
        assert_eq!(
            binary(Operator::Add, Value::Int(i64::MAX), Value::Int(1)),
            Err(RuntimeError::Overflow {
                operator: Operator::Add
            })
        );
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(binary(Operator::Divide, Value::Int(-7), Value::Int(2)), Ok(Value::Int(-4)));
        assert_eq!(
            binary(Operator::FloorDivide, Value::Int(7), Value::Int(-2)),
            Ok(Value::Int(-4))
        );
        assert_eq!(binary(Operator::Modulo, Value::Int(-7), Value::Int(2)), Ok(Value::Int(1)));
        assert_eq!(binary(Operator::Modulo, Value::Int(7), Value::Int(-2)), Ok(Value::Int(-1)));
        assert_eq!(
            binary(Operator::TrueDivide, Value::Int(7), Value::Int(2)),
            Ok(Value::Float(3.5))
        );
        assert_eq!(
            binary(Operator::Divide, Value::Int(i64::MIN), Value::Int(-1)),
            Err(RuntimeError::Overflow {
                operator: Operator::Divide
            })
        );
    }

    #[test]
    fn test_division_by_zero() {
        for op in [Operator::Divide, Operator::FloorDivide, Operator::Modulo, Operator::TrueDivide] {
            assert_eq!(
                binary(op, Value::Int(1), Value::Int(0)),
                Err(RuntimeError::DivisionByZero)
            );
            assert_eq!(
                binary(op, Value::Float(1.0), Value::Int(0)),
                Err(RuntimeError::DivisionByZero)
            );
        }
    }

    #[test]
    fn test_float_promotion() {
        assert_eq!(
            binary(Operator::Multiply, Value::Int(2), Value::Float(1.5)),
            Ok(Value::Float(3.0))
        );
        assert_eq!(
            binary(Operator::Add, Value::Bool(true), Value::Int(1)),
            Ok(Value::Int(2))
        );
        assert_eq!(
            binary(Operator::Modulo, Value::Float(-1.0), Value::Float(3.0)),
            Ok(Value::Float(2.0))
        );
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(
            binary(Operator::BitwiseAnd, Value::Bool(true), Value::Bool(false)),
            Ok(Value::Bool(false))
        );
        assert_eq!(binary(Operator::BitwiseXor, Value::Int(6), Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(binary(Operator::LeftShift, Value::Int(1), Value::Int(4)), Ok(Value::Int(16)));
        assert_eq!(binary(Operator::RightShift, Value::Int(-8), Value::Int(100)), Ok(Value::Int(-1)));
        assert!(matches!(
            binary(Operator::LeftShift, Value::Int(1), Value::Int(-1)),
            Err(RuntimeError::InvalidValue { .. })
        ));
        assert_eq!(
            binary(Operator::LeftShift, Value::Int(1), Value::Int(63)),
            Err(RuntimeError::Overflow {
                operator: Operator::LeftShift
            })
        );
        assert!(select_binary(Operator::BitwiseOr, ValueKind::Float, ValueKind::Int).is_none());
    }

    #[test]
    fn test_sequences() {
        assert_eq!(
            binary(Operator::Add, Value::str("ab"), Value::str("cd")),
            Ok(Value::str("abcd"))
        );
        assert_eq!(
            binary(Operator::Multiply, Value::Int(3), Value::str("ab")),
            Ok(Value::str("ababab"))
        );
        assert_eq!(
            binary(Operator::Multiply, Value::list(vec![Value::Int(1)]), Value::Int(-2)),
            Ok(Value::list(vec![]))
        );
        let list = Value::list(vec![Value::Int(1)]);
        assert_eq!(
            binary(Operator::Add, list.clone(), list),
            Ok(Value::list(vec![Value::Int(1), Value::Int(1)]))
        );
        assert!(select_binary(Operator::Add, ValueKind::Str, ValueKind::Int).is_none());
    }

    #[test]
    fn test_oversized_repetition_overflows() {
        let overflow = Err(RuntimeError::Overflow {
            operator: Operator::Multiply,
        });
        assert_eq!(
            binary(Operator::Multiply, Value::str("ab"), Value::Int(i64::MAX)),
            overflow
        );
        assert_eq!(
            binary(Operator::Multiply, Value::Int(i64::MAX), Value::tuple(vec![Value::None])),
            overflow
        );
        assert_eq!(
            binary(Operator::Multiply, Value::list(vec![Value::Int(1)]), Value::Int(1 << 40)),
            overflow
        );
        assert_eq!(
            binary(Operator::Multiply, Value::list(vec![]), Value::Int(i64::MAX)),
            Ok(Value::list(vec![]))
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(Operator::LessThan, Value::Int(1), Value::Float(1.5)), Ok(Value::Bool(true)));
        assert_eq!(
            binary(Operator::GreaterThanOrEqual, Value::str("b"), Value::str("a")),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            binary(Operator::LessThan, Value::Float(f64::NAN), Value::Int(1)),
            Ok(Value::Bool(false))
        );
        assert_eq!(binary(Operator::Equal, Value::Int(1), Value::Float(1.0)), Ok(Value::Bool(true)));
        assert_eq!(binary(Operator::NotEqual, Value::None, Value::Int(0)), Ok(Value::Bool(true)));
        assert!(select_binary(Operator::LessThan, ValueKind::Str, ValueKind::Int).is_none());
    }

    #[test]
    fn test_identity_and_membership() {
        let list = Value::list(vec![Value::Int(1), Value::str("x")]);
        assert_eq!(binary(Operator::Is, list.clone(), list.clone()), Ok(Value::Bool(true)));
        assert_eq!(
            binary(Operator::IsNot, list.clone(), Value::list(vec![])),
            Ok(Value::Bool(true))
        );
        assert_eq!(binary(Operator::In, Value::str("x"), list.clone()), Ok(Value::Bool(true)));
        assert_eq!(binary(Operator::NotIn, Value::Int(2), list), Ok(Value::Bool(true)));
        assert_eq!(
            binary(Operator::In, Value::str("ell"), Value::str("hello")),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(Operator::Not, Value::Int(0)), Ok(Value::Bool(true)));
        assert_eq!(unary(Operator::Negate, Value::Bool(true)), Ok(Value::Int(-1)));
        assert_eq!(unary(Operator::Invert, Value::Int(0)), Ok(Value::Int(-1)));
        assert_eq!(unary(Operator::Pos, Value::Float(2.5)), Ok(Value::Float(2.5)));
        assert_eq!(
            unary(Operator::Negate, Value::Int(i64::MIN)),
            Err(RuntimeError::Overflow {
                operator: Operator::Negate
            })
        );
        assert!(select_unary(Operator::Negate, ValueKind::Str).is_none());
    }
}
