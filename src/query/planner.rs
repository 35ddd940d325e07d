use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::query::ast::format::serde_nanos;
use crate::query::ast::{Expr, SelectStatement, VarRef};
use crate::query::reduce::{reduce, NowValuer};
use crate::query::time_range::{time_range, TimeBounds};
use crate::query::validator::{QueryValidator, ValidationError};
use crate::query::walk::{walk_fn, Node};

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
    #[error("No field references in statement: {0}")]
    NoFieldReferences(String),
}

/// Planner settings.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    /// Value of `now()`. The wall clock is read at planning time when unset.
    pub now: Option<DateTime<Utc>>,
    /// Plan statements whose time range cannot match anything.
    pub allow_empty_time_range: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    /// `GROUP BY time(...)` interval.
    #[serde(with = "serde_nanos::option")]
    pub interval: Option<Duration>,
    /// `GROUP BY` tag keys.
    pub tags: Vec<String>,
    pub time_range: TimeBounds,
    /// The condition after `now()` and constants were folded.
    pub condition: Option<Expr>,
    /// One single-source statement per selected field.
    pub substatements: Vec<SelectStatement>,
    pub aggregated: bool,
}

#[derive(Debug, Default)]
pub struct QueryPlanner {
    validator: QueryValidator,
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PlannerConfig) -> Self {
        Self {
            validator: QueryValidator::new(),
            config,
        }
    }

    pub fn with_validator(mut self, validator: QueryValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn plan_query(&self, stmt: &SelectStatement) -> Result<QueryPlan, PlanningError> {
        let dimensions = self.validator.validate(stmt)?;

        let now = self.config.now.unwrap_or_else(Utc::now);
        let valuer = NowValuer::new(now);
        let condition = stmt
            .condition
            .as_ref()
            .map(|condition| reduce(condition, Some(&valuer)));
        if let Some(condition) = &condition {
            debug!(%condition, "Reduced condition");
        }

        let time_range = condition.as_ref().map(time_range).unwrap_or_default();
        if time_range.is_empty() {
            metrics::record_empty_time_range();
            if !self.config.allow_empty_time_range {
                warn!(?time_range, "Rejecting statement with empty time range");
                return Err(PlanningError::InvalidTimeRange(format!(
                    "lower bound {} is after upper bound {}",
                    fmt_bound(time_range.min),
                    fmt_bound(time_range.max),
                )));
            }
        }

        let reduced = SelectStatement {
            condition: condition.clone(),
            ..stmt.clone()
        };
        let substatements = self.decompose(&reduced)?;

        metrics::record_plan(substatements.len());
        info!(
            source = %stmt.source,
            substatements = substatements.len(),
            "Planned select statement"
        );

        Ok(QueryPlan {
            interval: dimensions.interval,
            tags: dimensions.tags,
            time_range,
            condition,
            substatements,
            aggregated: stmt.aggregated(),
        })
    }

    fn decompose(&self, stmt: &SelectStatement) -> Result<Vec<SelectStatement>, PlanningError> {
        if stmt.source.is_single() {
            return Ok(vec![stmt.clone()]);
        }

        let refs = field_refs(stmt);
        if refs.is_empty() {
            return Err(PlanningError::NoFieldReferences(stmt.to_string()));
        }

        refs.iter()
            .map(|var_ref| {
                stmt.substatement(var_ref).map_err(|err| {
                    metrics::record_source_miss();
                    PlanningError::from(err)
                })
            })
            .collect()
    }
}

/// Distinct variable references in the field list, in order of appearance.
fn field_refs(stmt: &SelectStatement) -> Vec<VarRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    walk_fn(stmt.fields.as_slice(), |node| {
        if let Node::Expr(Expr::VarRef(var_ref)) = node {
            if seen.insert(var_ref.name.clone()) {
                refs.push(var_ref.clone());
            }
        }
    });
    refs
}

fn fmt_bound(bound: Option<DateTime<Utc>>) -> String {
    bound.map_or_else(|| "unbounded".to_string(), |t| t.to_rfc3339())
}
