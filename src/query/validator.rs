use std::collections::HashSet;

use chrono::Duration;
use thiserror::Error;
use tracing::debug;

use crate::query::ast::{Dimension, Expr, SelectStatement};
use crate::query::substatement::match_source;
use crate::query::walk::{walk_fn, Node};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("only time() calls allowed in dimensions")]
    OnlyTimeCalls,
    #[error("time dimension expected one argument")]
    TimeDimensionArgCount,
    #[error("time dimension must have one duration argument")]
    TimeDimensionArgType,
    #[error("multiple time dimensions not allowed")]
    MultipleTimeDimensions,
    #[error("only time and tag dimensions allowed")]
    InvalidDimension,
    #[error("field source not found: {0}")]
    FieldSourceNotFound(String),
    #[error("unresolved value in {0}")]
    UnresolvedValue(String),
    #[error("unknown tag key: {0}")]
    UnknownTagKey(String),
}

/// Splits grouping dimensions into the `time()` interval and tag keys.
///
/// At most one `time()` dimension is accepted and it must carry exactly one
/// duration literal. Every other dimension has to be a tag reference.
pub fn normalize_dimensions(
    dimensions: &[Dimension],
) -> Result<(Option<Duration>, Vec<String>), ValidationError> {
    let mut interval = None;
    let mut tags = Vec::new();

    for dimension in dimensions {
        match &dimension.expr {
            Expr::Call(call) => {
                if !call.name.eq_ignore_ascii_case("time") {
                    return Err(ValidationError::OnlyTimeCalls);
                }
                let [arg] = call.args.as_slice() else {
                    return Err(ValidationError::TimeDimensionArgCount);
                };
                let Expr::Duration(duration) = arg else {
                    return Err(ValidationError::TimeDimensionArgType);
                };
                if interval.is_some() {
                    return Err(ValidationError::MultipleTimeDimensions);
                }
                interval = Some(*duration);
            }
            Expr::VarRef(var_ref) => tags.push(var_ref.name.clone()),
            _ => return Err(ValidationError::InvalidDimension),
        }
    }

    Ok((interval, tags))
}

/// Tag keys known to exist, used to check `GROUP BY` tags.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tag_keys: HashSet<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag_key(&mut self, key: impl Into<String>) {
        self.tag_keys.insert(key.into());
    }

    pub fn validate_tag_key(&self, key: &str) -> Result<(), ValidationError> {
        if !self.tag_keys.contains(key) {
            return Err(ValidationError::UnknownTagKey(key.to_string()));
        }
        Ok(())
    }
}

/// Normalized grouping of a statement that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedDimensions {
    pub interval: Option<Duration>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryValidator {
    schema: Option<Schema>,
}

impl QueryValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn validate(&self, stmt: &SelectStatement) -> Result<ValidatedDimensions, ValidationError> {
        let (interval, tags) = normalize_dimensions(&stmt.dimensions)?;

        if let Some(schema) = &self.schema {
            for tag in &tags {
                schema.validate_tag_key(tag)?;
            }
        }

        if contains_nil(stmt.fields.as_slice()) {
            return Err(ValidationError::UnresolvedValue("fields".to_string()));
        }
        if let Some(condition) = &stmt.condition {
            if contains_nil(condition) {
                return Err(ValidationError::UnresolvedValue("condition".to_string()));
            }
        }

        // Each field of a join or merge has to come from one of its measurements.
        if !stmt.source.is_single() {
            for field in &stmt.fields {
                let mut missing = None;
                walk_fn(&field.expr, |node| {
                    if let Node::Expr(Expr::VarRef(var_ref)) = node {
                        if missing.is_none() && match_source(&stmt.source, &var_ref.name).is_none() {
                            missing = Some(var_ref.name.clone());
                        }
                    }
                });
                if let Some(name) = missing {
                    return Err(ValidationError::FieldSourceNotFound(name));
                }
            }
        }

        debug!(
            interval = ?interval,
            tags = tags.len(),
            "Validated select statement"
        );
        Ok(ValidatedDimensions { interval, tags })
    }
}

fn contains_nil<'a>(node: impl Into<Node<'a>>) -> bool {
    let mut found = false;
    walk_fn(node, |node| {
        if matches!(node, Node::Expr(Expr::Nil)) {
            found = true;
        }
    });
    found
}
