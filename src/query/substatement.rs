//! Splitting a select over several measurements into per-field statements.

use tracing::{debug, trace, warn};

use crate::query::ast::{BinaryExpr, Expr, Field, SelectStatement, Source, Token, VarRef};
use crate::query::validator::ValidationError;

impl SelectStatement {
    /// Builds a single-source statement that selects only `var_ref`.
    ///
    /// For a join or merge, the source becomes the first measurement whose
    /// name prefixes the reference and the condition keeps only the terms
    /// that belong to that measurement.
    pub fn substatement(&self, var_ref: &VarRef) -> Result<SelectStatement, ValidationError> {
        let mut other = SelectStatement {
            fields: vec![Field::new(Expr::VarRef(var_ref.clone()))],
            target: None,
            dimensions: self.dimensions.clone(),
            source: self.source.clone(),
            condition: None,
            sort_fields: self.sort_fields.clone(),
            limit: self.limit,
            offset: 0,
        };

        if self.source.is_single() {
            other.condition = self.condition.clone();
            return Ok(other);
        }

        let Some(name) = match_source(&self.source, &var_ref.name) else {
            warn!(field = %var_ref.name, source = %self.source, "No measurement matches field");
            return Err(ValidationError::FieldSourceNotFound(var_ref.name.clone()));
        };
        debug!(field = %var_ref.name, measurement = name, "Matched field to measurement");

        other.source = Source::measurement(name);
        other.condition = self
            .condition
            .as_ref()
            .and_then(|condition| filter_expr_by_source(name, condition));
        Ok(other)
    }
}

/// Returns the first measurement of `source` whose name is a prefix of
/// `name`, in declaration order.
pub fn match_source<'a>(source: &'a Source, name: &str) -> Option<&'a str> {
    source
        .measurements()
        .iter()
        .map(|m| m.name.as_str())
        .find(|measurement| name.starts_with(measurement))
}

/// Keeps the parts of `expr` that only refer to fields of `name`.
///
/// A logical operator with one dropped side collapses to the other side, so
/// the result can match more rows than the original condition did. Any other
/// binary operator is dropped whole unless both sides survive.
pub fn filter_expr_by_source(name: &str, expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::VarRef(var_ref) => {
            let keep = var_ref.name.starts_with(name);
            if !keep {
                trace!(var = %var_ref.name, measurement = name, "Dropping reference");
            }
            keep.then(|| expr.clone())
        }
        Expr::Binary(binary) => filter_binary_expr(name, binary),
        Expr::Paren(inner) => filter_expr_by_source(name, inner).map(Expr::paren),
        _ => Some(expr.clone()),
    }
}

fn filter_binary_expr(name: &str, expr: &BinaryExpr) -> Option<Expr> {
    let lhs = filter_expr_by_source(name, &expr.lhs);
    let rhs = filter_expr_by_source(name, &expr.rhs);

    match (expr.op, lhs, rhs) {
        (Token::And | Token::Or, Some(lhs), Some(rhs)) => Some(Expr::binary(expr.op, lhs, rhs)),
        (Token::And | Token::Or, Some(side), None) | (Token::And | Token::Or, None, Some(side)) => {
            Some(side)
        }
        (_, Some(lhs), Some(rhs)) => Some(Expr::binary(expr.op, lhs, rhs)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{Dimension, SortField, Target};
    use chrono::Duration;

    fn cmp(op: Token, name: &str, value: f64) -> Expr {
        Expr::binary(op, Expr::var_ref(name), Expr::Number(value))
    }

    fn create_join_statement(condition: Expr) -> SelectStatement {
        SelectStatement::new(
            vec![
                Field::new(Expr::var_ref("aa.value")),
                Field::new(Expr::var_ref("bb.value")),
            ],
            Source::join(["aa", "bb"]),
        )
        .with_condition(condition)
    }

    #[test]
    fn test_substatement_pushes_down_condition() {
        let stmt = create_join_statement(Expr::binary(
            Token::And,
            cmp(Token::Gt, "aa.value", 1.0),
            cmp(Token::Lt, "bb.value", 2.0),
        ));

        let sub = stmt.substatement(&VarRef::new("aa.value")).unwrap();
        assert_eq!(sub.fields, vec![Field::new(Expr::var_ref("aa.value"))]);
        assert_eq!(sub.source, Source::measurement("aa"));
        assert_eq!(sub.condition, Some(cmp(Token::Gt, "aa.value", 1.0)));
        assert_eq!(sub.to_string(), "SELECT aa.value FROM aa WHERE aa.value > 1.000");

        let sub = stmt.substatement(&VarRef::new("bb.value")).unwrap();
        assert_eq!(sub.source, Source::measurement("bb"));
        assert_eq!(sub.condition, Some(cmp(Token::Lt, "bb.value", 2.0)));
    }

    #[test]
    fn test_or_is_weakened_to_surviving_side() {
        let stmt = create_join_statement(Expr::binary(
            Token::Or,
            cmp(Token::Gt, "aa.value", 1.0),
            cmp(Token::Lt, "bb.value", 2.0),
        ));
        let sub = stmt.substatement(&VarRef::new("aa.value")).unwrap();
        assert_eq!(sub.condition, Some(cmp(Token::Gt, "aa.value", 1.0)));
    }

    #[test]
    fn test_cross_source_comparison_is_dropped() {
        let stmt = create_join_statement(Expr::binary(
            Token::And,
            Expr::binary(Token::Gt, Expr::var_ref("aa.value"), Expr::var_ref("bb.value")),
            cmp(Token::Gt, "aa.value", 0.0),
        ));
        let sub = stmt.substatement(&VarRef::new("aa.value")).unwrap();
        assert_eq!(sub.condition, Some(cmp(Token::Gt, "aa.value", 0.0)));

        // Nothing survives for bb.
        let stmt = create_join_statement(Expr::binary(
            Token::Gt,
            Expr::var_ref("aa.value"),
            Expr::var_ref("bb.value"),
        ));
        let sub = stmt.substatement(&VarRef::new("bb.value")).unwrap();
        assert_eq!(sub.condition, None);
    }

    #[test]
    fn test_parens_follow_their_interior() {
        let expr = Expr::binary(
            Token::And,
            Expr::paren(cmp(Token::Eq, "aa.host", 1.0)),
            Expr::paren(cmp(Token::Eq, "bb.host", 2.0)),
        );
        assert_eq!(
            filter_expr_by_source("aa", &expr),
            Some(Expr::paren(cmp(Token::Eq, "aa.host", 1.0)))
        );
        assert_eq!(filter_expr_by_source("cc", &expr), None);
    }

    #[test]
    fn test_literals_and_time_are_kept() {
        assert_eq!(
            filter_expr_by_source("aa", &Expr::Boolean(true)),
            Some(Expr::Boolean(true))
        );
        assert_eq!(
            filter_expr_by_source("aa", &Expr::call("now", vec![])),
            Some(Expr::call("now", vec![]))
        );

        // `time` is not prefixed by the measurement, so its comparison goes.
        let expr = Expr::binary(
            Token::Gt,
            Expr::var_ref("time"),
            Expr::Duration(Duration::seconds(0)),
        );
        assert_eq!(filter_expr_by_source("aa", &expr), None);
    }

    #[test]
    fn test_single_source_is_copied() {
        let condition = Expr::binary(
            Token::And,
            cmp(Token::Gt, "value", 1.0),
            cmp(Token::Lt, "other", 2.0),
        );
        let mut stmt = SelectStatement::new(
            vec![Field::new(Expr::var_ref("value")), Field::new(Expr::var_ref("other"))],
            Source::measurement("cpu"),
        )
        .with_condition(condition.clone())
        .with_dimensions(vec![Dimension::new(Expr::var_ref("host"))]);
        stmt.sort_fields = vec![SortField { name: "time".to_string(), ascending: false }];
        stmt.limit = 10;
        stmt.offset = 5;
        stmt.target = Some(Target { measurement: "out".to_string(), database: None });

        let sub = stmt.substatement(&VarRef::new("value")).unwrap();
        assert_eq!(sub.source, Source::measurement("cpu"));
        assert_eq!(sub.condition, Some(condition));
        assert_eq!(sub.dimensions, stmt.dimensions);
        assert_eq!(sub.sort_fields, stmt.sort_fields);
        assert_eq!(sub.limit, 10);
        assert_eq!(sub.offset, 0);
        assert_eq!(sub.target, None);
    }

    #[test]
    fn test_source_not_found() {
        let stmt = create_join_statement(Expr::Boolean(true));
        let err = stmt.substatement(&VarRef::new("cc.value")).unwrap_err();
        assert_eq!(err, ValidationError::FieldSourceNotFound("cc.value".to_string()));
        assert_eq!(err.to_string(), "field source not found: cc.value");
    }

    #[test]
    fn test_first_matching_measurement_wins() {
        let source = Source::merge(["cpu", "cpu_total"]);
        assert_eq!(match_source(&source, "cpu_total.value"), Some("cpu"));

        let source = Source::merge(["cpu_total", "cpu"]);
        assert_eq!(match_source(&source, "cpu_total.value"), Some("cpu_total"));
        assert_eq!(match_source(&source, "mem.value"), None);
    }

    #[test]
    fn test_merge_without_condition() {
        let stmt = SelectStatement::new(
            vec![Field::new(Expr::var_ref("bb.value"))],
            Source::merge(["aa", "bb"]),
        );
        let sub = stmt.substatement(&VarRef::new("bb.value")).unwrap();
        assert_eq!(sub.source, Source::measurement("bb"));
        assert_eq!(sub.condition, None);
    }
}
