//! Evaluation of parsed conditions against a source/target document pair
//!
//! Values compare with a total order across types:
//! `null < false < true < numbers < strings < arrays < objects`.
//! Only `false` and `null` are falsy.

use super::errors::{ConditionError, ConditionResult};
use super::parser::{BinaryOp, Expr, Root, Segment};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// The two documents a condition can read
#[derive(Clone, Copy, Debug)]
pub struct Scope<'a> {
    pub source: &'a Value,
    pub target: &'a Value,
}

pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> ConditionResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path { root, segments } => {
            let start = match root {
                Root::Source => scope.source,
                Root::Target => scope.target,
            };
            Ok(lookup(start, segments).clone())
        }
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&evaluate(inner, scope)?))),
        Expr::Neg(inner) => match evaluate(inner, scope)? {
            Value::Number(n) => number_value(-as_f64(&n)),
            other => Err(type_error("negate", &other, None)),
        },
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                if !is_truthy(&evaluate(left, scope)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(is_truthy(&evaluate(right, scope)?)))
            }
            BinaryOp::Or => {
                if is_truthy(&evaluate(left, scope)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(is_truthy(&evaluate(right, scope)?)))
            }
            _ => {
                let l = evaluate(left, scope)?;
                let r = evaluate(right, scope)?;
                apply(*op, l, r)
            }
        },
    }
}

pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Total order over JSON values
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x)
            .partial_cmp(&as_f64(y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let ord = compare(ex, ey);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => compare_objects(x, y),
        _ => Ordering::Equal,
    }
}

fn compare_objects(x: &Map<String, Value>, y: &Map<String, Value>) -> Ordering {
    let mut xk: Vec<&String> = x.keys().collect();
    let mut yk: Vec<&String> = y.keys().collect();
    xk.sort();
    yk.sort();

    match xk.cmp(&yk) {
        Ordering::Equal => xk
            .iter()
            .map(|k| compare(x.get(*k).unwrap_or(&NULL), y.get(*k).unwrap_or(&NULL)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        other => other,
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn lookup<'a>(start: &'a Value, segments: &[Segment]) -> &'a Value {
    let mut current = start;
    for segment in segments {
        current = match (segment, current) {
            (Segment::Field(name), Value::Object(map)) => map.get(name).unwrap_or(&NULL),
            (Segment::Index(i), Value::Array(items)) => {
                let len = items.len() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if (0..len).contains(&idx) {
                    &items[idx as usize]
                } else {
                    &NULL
                }
            }
            _ => &NULL,
        };
    }
    current
}

fn apply(op: BinaryOp, l: Value, r: Value) -> ConditionResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(compare(&l, &r) == Ordering::Equal)),
        BinaryOp::Ne => Ok(Value::Bool(compare(&l, &r) != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r) == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&l, &r) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r) == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&l, &r) != Ordering::Less)),
        BinaryOp::Add => add(l, r),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, l, r),
        BinaryOp::And | BinaryOp::Or => Err(ConditionError::EvalError(
            "logical operators are short-circuited".into(),
        )),
    }
}

fn add(l: Value, r: Value) -> ConditionResult<Value> {
    match (l, r) {
        (Value::Null, other) | (other, Value::Null) => Ok(other),
        (Value::Number(x), Value::Number(y)) => number_value(as_f64(&x) + as_f64(&y)),
        (Value::String(x), Value::String(y)) => Ok(Value::String(x + &y)),
        (Value::Array(mut x), Value::Array(y)) => {
            x.extend(y);
            Ok(Value::Array(x))
        }
        (Value::Object(mut x), Value::Object(y)) => {
            x.extend(y);
            Ok(Value::Object(x))
        }
        (l, r) => Err(type_error("add", &l, Some(&r))),
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> ConditionResult<Value> {
    let (Value::Number(x), Value::Number(y)) = (&l, &r) else {
        let verb = match op {
            BinaryOp::Sub => "subtract",
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
            _ => "take the remainder of",
        };
        return Err(type_error(verb, &l, Some(&r)));
    };
    let (x, y) = (as_f64(x), as_f64(y));

    match op {
        BinaryOp::Sub => number_value(x - y),
        BinaryOp::Mul => number_value(x * y),
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(ConditionError::EvalError("division by zero".into()));
            }
            number_value(x / y)
        }
        _ => {
            let (xi, yi) = (as_integer(x)?, as_integer(y)?);
            if yi == 0 {
                return Err(ConditionError::EvalError("remainder by zero".into()));
            }
            xi.checked_rem(yi)
                .map(Value::from)
                .ok_or_else(|| ConditionError::EvalError("remainder overflows".into()))
        }
    }
}

/// Truncate toward zero; operands outside the i64 range are an error
fn as_integer(f: f64) -> ConditionResult<i64> {
    let t = f.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Ok(t as i64)
    } else {
        Err(ConditionError::EvalError(format!("{} is out of integer range", f)))
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn number_value(f: f64) -> ConditionResult<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Ok(Value::from(f as i64));
    }
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ConditionError::EvalError("result is not a finite number".into()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(verb: &str, l: &Value, r: Option<&Value>) -> ConditionError {
    match r {
        Some(r) => ConditionError::EvalError(format!(
            "cannot {} {} and {}",
            verb,
            type_name(l),
            type_name(r)
        )),
        None => ConditionError::EvalError(format!("cannot {} {}", verb, type_name(l))),
    }
}
