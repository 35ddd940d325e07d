//! Partial evaluation of expressions.
//!
//! [`reduce`] folds every sub-expression whose operands are known, using a
//! [`Valuer`] to resolve references, and leaves the rest symbolic. [`eval`]
//! evaluates an expression outright against a map of values. Neither one
//! fails: anything that cannot be computed is left alone or yields no value.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::query::ast::format::duration_nanos;
use crate::query::ast::{BinaryExpr, Call, Expr, Token, Value, VarRef};

/// Key under which a valuer exposes the current time to `now()`.
pub const NOW_KEY: &str = "now()";

/// Resolves names to concrete values.
pub trait Valuer {
    /// Returns the value for `key`, or `None` if it is unknown.
    fn value(&self, key: &str) -> Option<Value>;
}

impl Valuer for HashMap<String, Value> {
    fn value(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

/// Resolves only `now()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowValuer {
    pub now: DateTime<Utc>,
}

impl NowValuer {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Valuer for NowValuer {
    fn value(&self, key: &str) -> Option<Value> {
        (key == NOW_KEY).then_some(Value::Time(self.now))
    }
}

/// Evaluates `expr` against `bindings`.
///
/// Unknown names, unsupported literals and operations on mismatched
/// operands all evaluate to `None`.
pub fn eval(expr: &Expr, bindings: &HashMap<String, Value>) -> Option<Value> {
    match expr {
        Expr::Binary(binary) => eval_binary_expr(binary, bindings),
        Expr::Boolean(v) => Some(Value::Boolean(*v)),
        Expr::Number(v) => Some(Value::Number(*v)),
        Expr::String(v) => Some(Value::String(v.clone())),
        Expr::Paren(inner) => eval(inner, bindings),
        Expr::VarRef(var_ref) => bindings.get(&var_ref.name).cloned(),
        _ => None,
    }
}

fn eval_binary_expr(expr: &BinaryExpr, bindings: &HashMap<String, Value>) -> Option<Value> {
    let lhs = eval(&expr.lhs, bindings)?;
    let rhs = eval(&expr.rhs, bindings)?;

    match (lhs, rhs) {
        (Value::Boolean(l), Value::Boolean(r)) => match expr.op {
            Token::And => Some(Value::Boolean(l && r)),
            Token::Or => Some(Value::Boolean(l || r)),
            _ => None,
        },
        (Value::Number(l), Value::Number(r)) => match expr.op {
            Token::Add => Some(Value::Number(l + r)),
            Token::Sub => Some(Value::Number(l - r)),
            Token::Mul => Some(Value::Number(l * r)),
            Token::Div => Some(Value::Number(divide(l, r))),
            op => compare(op, &l, &r).map(Value::Boolean),
        },
        (Value::String(l), Value::String(r)) => match expr.op {
            Token::Eq => Some(Value::Boolean(l == r)),
            Token::Neq => Some(Value::Boolean(l != r)),
            _ => None,
        },
        _ => None,
    }
}

/// Reduces `expr` using the values available from `valuer`.
///
/// References the valuer does not know are kept as they are. A redundant
/// outer pair of parentheses is removed from the result.
pub fn reduce(expr: &Expr, valuer: Option<&dyn Valuer>) -> Expr {
    match reduce_expr(expr, valuer) {
        Expr::Paren(inner) => *inner,
        reduced => reduced,
    }
}

fn reduce_expr(expr: &Expr, valuer: Option<&dyn Valuer>) -> Expr {
    match expr {
        Expr::Binary(binary) => reduce_binary_expr(binary, valuer),
        Expr::Call(call) => reduce_call(call, valuer),
        Expr::Paren(inner) => reduce_paren_expr(inner, valuer),
        Expr::VarRef(var_ref) => reduce_var_ref(var_ref, valuer),
        other => other.clone(),
    }
}

fn reduce_binary_expr(expr: &BinaryExpr, valuer: Option<&dyn Valuer>) -> Expr {
    let op = expr.op;
    let lhs = reduce_expr(&expr.lhs, valuer);
    let rhs = reduce_expr(&expr.rhs, valuer);

    // A known boolean on either side of a logical operator settles or
    // forwards the result even when the other side is still symbolic.
    match op {
        Token::And => {
            if lhs.is_false_literal() || rhs.is_false_literal() {
                return Expr::Boolean(false);
            } else if lhs.is_true_literal() {
                return rhs;
            } else if rhs.is_true_literal() {
                return lhs;
            }
        }
        Token::Or => {
            if lhs.is_true_literal() || rhs.is_true_literal() {
                return Expr::Boolean(true);
            } else if lhs.is_false_literal() {
                return rhs;
            } else if rhs.is_false_literal() {
                return lhs;
            }
        }
        _ => {}
    }

    let reduced = match (&lhs, &rhs) {
        (Expr::Boolean(l), _) => reduce_boolean_lhs(op, *l, &rhs),
        (Expr::Duration(l), _) => reduce_duration_lhs(op, *l, &rhs),
        (Expr::Nil, _) => reduce_nil_lhs(op),
        (Expr::Number(l), _) => reduce_number_lhs(op, *l, &rhs),
        (Expr::String(l), _) => reduce_string_lhs(op, l, &rhs),
        (Expr::Time(l), _) => reduce_time_lhs(op, *l, &rhs),
        _ => None,
    };
    reduced.unwrap_or_else(|| Expr::binary(op, lhs, rhs))
}

fn reduce_boolean_lhs(op: Token, lhs: bool, rhs: &Expr) -> Option<Expr> {
    match (rhs, op) {
        (Expr::Boolean(r), Token::Eq) => Some(Expr::Boolean(lhs == *r)),
        (Expr::Boolean(r), Token::Neq) => Some(Expr::Boolean(lhs != *r)),
        (Expr::Boolean(r), Token::And) => Some(Expr::Boolean(lhs && *r)),
        (Expr::Boolean(r), Token::Or) => Some(Expr::Boolean(lhs || *r)),
        (Expr::Nil, Token::Eq | Token::Neq) => Some(Expr::Boolean(false)),
        _ => None,
    }
}

fn reduce_duration_lhs(op: Token, lhs: Duration, rhs: &Expr) -> Option<Expr> {
    match (rhs, op) {
        (Expr::Duration(r), Token::Add) => lhs.checked_add(r).map(Expr::Duration),
        (Expr::Duration(r), Token::Sub) => lhs.checked_sub(r).map(Expr::Duration),
        (Expr::Duration(r), op) => compare(op, &lhs, r).map(Expr::Boolean),
        (Expr::Number(r), Token::Mul) => duration_nanos(&lhs)
            .checked_mul(*r as i64)
            .map(|n| Expr::Duration(Duration::nanoseconds(n))),
        (Expr::Number(r), Token::Div) => {
            let divisor = *r as i64;
            if divisor == 0 {
                return Some(Expr::Duration(Duration::zero()));
            }
            duration_nanos(&lhs)
                .checked_div(divisor)
                .map(|n| Expr::Duration(Duration::nanoseconds(n)))
        }
        (Expr::Time(r), Token::Add) => r.checked_add_signed(lhs).map(Expr::Time),
        (Expr::Nil, Token::Eq | Token::Neq) => Some(Expr::Boolean(false)),
        _ => None,
    }
}

fn reduce_nil_lhs(op: Token) -> Option<Expr> {
    match op {
        Token::Eq | Token::Neq => Some(Expr::Boolean(false)),
        _ => None,
    }
}

fn reduce_number_lhs(op: Token, lhs: f64, rhs: &Expr) -> Option<Expr> {
    match (rhs, op) {
        (Expr::Number(r), Token::Add) => Some(Expr::Number(lhs + r)),
        (Expr::Number(r), Token::Sub) => Some(Expr::Number(lhs - r)),
        (Expr::Number(r), Token::Mul) => Some(Expr::Number(lhs * r)),
        (Expr::Number(r), Token::Div) => Some(Expr::Number(divide(lhs, *r))),
        (Expr::Number(r), op) => compare(op, &lhs, r).map(Expr::Boolean),
        (Expr::Nil, Token::Eq | Token::Neq) => Some(Expr::Boolean(false)),
        _ => None,
    }
}

fn reduce_string_lhs(op: Token, lhs: &str, rhs: &Expr) -> Option<Expr> {
    match (rhs, op) {
        (Expr::String(r), Token::Eq) => Some(Expr::Boolean(lhs == r)),
        (Expr::String(r), Token::Neq) => Some(Expr::Boolean(lhs != r)),
        (Expr::String(r), Token::Add) => Some(Expr::String(format!("{}{}", lhs, r))),
        (Expr::Nil, Token::Eq | Token::Neq) => Some(Expr::Boolean(false)),
        _ => None,
    }
}

fn reduce_time_lhs(op: Token, lhs: DateTime<Utc>, rhs: &Expr) -> Option<Expr> {
    match (rhs, op) {
        (Expr::Duration(r), Token::Add) => lhs.checked_add_signed(*r).map(Expr::Time),
        (Expr::Duration(r), Token::Sub) => lhs.checked_sub_signed(*r).map(Expr::Time),
        (Expr::Time(r), Token::Sub) => Some(Expr::Duration(lhs.signed_duration_since(*r))),
        (Expr::Time(r), op) => compare(op, &lhs, r).map(Expr::Boolean),
        (Expr::Nil, Token::Eq | Token::Neq) => Some(Expr::Boolean(false)),
        _ => None,
    }
}

fn reduce_call(expr: &Call, valuer: Option<&dyn Valuer>) -> Expr {
    if expr.name.eq_ignore_ascii_case("now") && expr.args.is_empty() {
        if let Some(Value::Time(now)) = valuer.and_then(|v| v.value(NOW_KEY)) {
            return Expr::Time(now);
        }
    }

    // Function application itself happens at execution time.
    Expr::Call(Call {
        name: expr.name.clone(),
        args: expr.args.iter().map(|arg| reduce_expr(arg, valuer)).collect(),
    })
}

fn reduce_paren_expr(inner: &Expr, valuer: Option<&dyn Valuer>) -> Expr {
    match reduce_expr(inner, valuer) {
        binary @ Expr::Binary(_) => Expr::paren(binary),
        other => other,
    }
}

fn reduce_var_ref(expr: &VarRef, valuer: Option<&dyn Valuer>) -> Expr {
    let Some(value) = valuer.and_then(|v| v.value(&expr.name)) else {
        return Expr::VarRef(expr.clone());
    };

    match value {
        Value::Boolean(v) => Expr::Boolean(v),
        Value::Duration(v) => Expr::Duration(v),
        Value::Number(v) => Expr::Number(v),
        Value::String(v) => Expr::String(v),
        Value::Time(v) => Expr::Time(v),
        Value::Unknown => Expr::Nil,
    }
}

/// Division where a zero divisor yields zero instead of infinity or NaN.
fn divide(lhs: f64, rhs: f64) -> f64 {
    if rhs == 0.0 {
        0.0
    } else {
        lhs / rhs
    }
}

fn compare<T: PartialOrd>(op: Token, lhs: &T, rhs: &T) -> Option<bool> {
    let ordering = lhs.partial_cmp(rhs);
    match op {
        Token::Eq => Some(ordering == Some(Ordering::Equal)),
        Token::Neq => Some(ordering != Some(Ordering::Equal)),
        Token::Lt => Some(ordering == Some(Ordering::Less)),
        Token::Lte => Some(matches!(ordering, Some(Ordering::Less | Ordering::Equal))),
        Token::Gt => Some(ordering == Some(Ordering::Greater)),
        Token::Gte => Some(matches!(ordering, Some(Ordering::Greater | Ordering::Equal))),
        _ => None,
    }
}

/// Interprets a duration as an offset from the Unix epoch.
pub(crate) fn epoch_offset(d: &Duration) -> DateTime<Utc> {
    Utc.timestamp_nanos(duration_nanos(d))
}
