use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::query::ast::{BinaryExpr, Expr, Token};
use crate::query::reduce::epoch_offset;
use crate::query::walk::{walk_fn, Node};

/// Inclusive time bounds implied by a condition. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl TimeBounds {
    /// True when no instant can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    fn raise_min(&mut self, candidate: DateTime<Utc>) {
        if self.min.map_or(true, |min| candidate > min) {
            self.min = Some(candidate);
        }
    }

    fn lower_max(&mut self, candidate: DateTime<Utc>) {
        if self.max.map_or(true, |max| candidate < max) {
            self.max = Some(candidate);
        }
    }
}

/// Extracts the time bounds from a condition.
///
/// Every comparison between `time` and a time or duration literal tightens
/// the bounds, wherever it sits in the tree. Comparisons under `OR` are
/// intersected like any other, so the result can be narrower than what the
/// condition actually matches.
pub fn time_range(expr: &Expr) -> TimeBounds {
    let mut bounds = TimeBounds::default();

    walk_fn(expr, |node| {
        if let Node::Expr(Expr::Binary(binary)) = node {
            apply_comparison(&mut bounds, binary);
        }
    });

    bounds
}

fn apply_comparison(bounds: &mut TimeBounds, expr: &BinaryExpr) {
    let (op, literal) = if is_time_ref(&expr.lhs) {
        (expr.op, &*expr.rhs)
    } else if is_time_ref(&expr.rhs) {
        (expr.op.mirror(), &*expr.lhs)
    } else {
        return;
    };

    let value = match literal {
        Expr::Time(t) => *t,
        Expr::Duration(d) => epoch_offset(d),
        _ => return,
    };

    let micro = Duration::microseconds(1);
    match op {
        Token::Gt => bounds.raise_min(value.checked_add_signed(micro).unwrap_or(value)),
        Token::Gte => bounds.raise_min(value),
        Token::Lt => bounds.lower_max(value.checked_sub_signed(micro).unwrap_or(value)),
        Token::Lte => bounds.lower_max(value),
        Token::Eq => {
            bounds.raise_min(value);
            bounds.lower_max(value);
        }
        _ => {}
    }
}

fn is_time_ref(expr: &Expr) -> bool {
    matches!(expr, Expr::VarRef(var_ref) if var_ref.name.eq_ignore_ascii_case("time"))
}
