use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::expr::Expr;
use super::format::{format_duration, serde_nanos};
use super::source::Source;
use crate::query::walk::{walk_fn, Node};

/// A privilege a user can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Privilege {
    NoPrivileges,
    Read,
    Write,
    All,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Privilege::NoPrivileges => "NO PRIVILEGES",
            Privilege::Read => "READ",
            Privilege::Write => "WRITE",
            Privilege::All => "ALL PRIVILEGES",
        };
        f.write_str(s)
    }
}

/// A privilege required to execute a statement on a database or resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPrivilege {
    /// Name of the database or resource. Empty means the whole cluster.
    pub name: String,
    pub privilege: Privilege,
}

impl ExecutionPrivilege {
    pub fn new(name: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            name: name.into(),
            privilege,
        }
    }

    pub fn cluster(privilege: Privilege) -> Self {
        Self::new("", privilege)
    }
}

/// A collection of ordered statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str(";\n")?;
            }
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

/// A single command in the query language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    CreateRetentionPolicy {
        name: String,
        database: String,
        #[serde(with = "serde_nanos")]
        duration: Duration,
        replication: u32,
        default: bool,
    },
    AlterRetentionPolicy {
        name: String,
        database: String,
        #[serde(default, with = "serde_nanos::option")]
        duration: Option<Duration>,
        replication: Option<u32>,
        default: bool,
    },
    DropRetentionPolicy {
        name: String,
        database: String,
    },
    CreateUser {
        name: String,
        password: String,
        privilege: Option<Privilege>,
    },
    DropUser {
        name: String,
    },
    Grant {
        privilege: Privilege,
        on: Option<String>,
        user: String,
    },
    Revoke {
        privilege: Privilege,
        on: Option<String>,
        user: String,
    },
    CreateContinuousQuery {
        name: String,
        database: String,
        source: SelectStatement,
    },
    DropContinuousQuery {
        name: String,
    },
    Select(SelectStatement),
    Delete {
        source: Source,
        condition: Option<Expr>,
    },
    DropSeries {
        name: String,
    },
    ShowContinuousQueries,
    ShowDatabases,
    ShowRetentionPolicies {
        database: String,
    },
    ShowUsers,
    ShowSeries(ShowStatement),
    ShowMeasurements(ShowStatement),
    ShowTagKeys(ShowStatement),
    ShowTagValues(ShowStatement),
    ShowFieldKeys(ShowStatement),
    ShowFieldValues(ShowStatement),
}

impl Statement {
    /// Privileges a user needs to run this statement. Only declared here;
    /// enforcement belongs to the authorization layer.
    pub fn required_privileges(&self) -> Vec<ExecutionPrivilege> {
        match self {
            Statement::CreateDatabase { .. }
            | Statement::DropDatabase { .. }
            | Statement::CreateRetentionPolicy { .. }
            | Statement::AlterRetentionPolicy { .. }
            | Statement::CreateUser { .. }
            | Statement::DropUser { .. }
            | Statement::Grant { .. }
            | Statement::Revoke { .. }
            | Statement::ShowDatabases
            | Statement::ShowUsers => vec![ExecutionPrivilege::cluster(Privilege::All)],

            Statement::DropRetentionPolicy { database, .. } => {
                vec![ExecutionPrivilege::new(database.clone(), Privilege::Write)]
            }

            Statement::CreateContinuousQuery {
                database, source, ..
            } => {
                let mut privileges = vec![ExecutionPrivilege::new(database.clone(), Privilege::Read)];
                // Writing into another database needs write access there.
                if let Some(target_db) = source
                    .target
                    .as_ref()
                    .and_then(|t| t.database.as_ref())
                    .filter(|db| !db.is_empty())
                {
                    privileges.push(ExecutionPrivilege::new(target_db.clone(), Privilege::Write));
                }
                privileges
            }

            Statement::Select(stmt) => stmt.required_privileges(),

            Statement::Delete { .. }
            | Statement::DropSeries { .. }
            | Statement::DropContinuousQuery { .. } => {
                vec![ExecutionPrivilege::cluster(Privilege::Write)]
            }

            Statement::ShowContinuousQueries
            | Statement::ShowRetentionPolicies { .. }
            | Statement::ShowSeries(_)
            | Statement::ShowMeasurements(_)
            | Statement::ShowTagKeys(_)
            | Statement::ShowTagValues(_)
            | Statement::ShowFieldKeys(_)
            | Statement::ShowFieldValues(_) => vec![ExecutionPrivilege::cluster(Privilege::Read)],
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateDatabase { name } => write!(f, "CREATE DATABASE {}", name),
            Statement::DropDatabase { name } => write!(f, "DROP DATABASE {}", name),
            Statement::CreateRetentionPolicy {
                name,
                database,
                duration,
                replication,
                default,
            } => {
                write!(
                    f,
                    "CREATE RETENTION POLICY {} ON {} DURATION {} REPLICATION {}",
                    name,
                    database,
                    format_duration(duration),
                    replication
                )?;
                if *default {
                    f.write_str(" DEFAULT")?;
                }
                Ok(())
            }
            Statement::AlterRetentionPolicy {
                name,
                database,
                duration,
                replication,
                default,
            } => {
                write!(f, "ALTER RETENTION POLICY {} ON {}", name, database)?;
                if let Some(duration) = duration {
                    write!(f, " DURATION {}", format_duration(duration))?;
                }
                if let Some(replication) = replication {
                    write!(f, " REPLICATION {}", replication)?;
                }
                if *default {
                    f.write_str(" DEFAULT")?;
                }
                Ok(())
            }
            Statement::DropRetentionPolicy { name, database } => {
                write!(f, "DROP RETENTION POLICY {} ON {}", name, database)
            }
            Statement::CreateUser {
                name,
                password,
                privilege,
            } => {
                write!(f, "CREATE USER {} WITH PASSWORD {}", name, password)?;
                if let Some(privilege) = privilege {
                    write!(f, " WITH {}", privilege)?;
                }
                Ok(())
            }
            Statement::DropUser { name } => write!(f, "DROP USER {}", name),
            Statement::Grant {
                privilege,
                on,
                user,
            } => {
                write!(f, "GRANT {}", privilege)?;
                if let Some(on) = on {
                    write!(f, " ON {}", on)?;
                }
                write!(f, " TO {}", user)
            }
            Statement::Revoke {
                privilege,
                on,
                user,
            } => {
                write!(f, "REVOKE {}", privilege)?;
                if let Some(on) = on {
                    write!(f, " ON {}", on)?;
                }
                write!(f, " FROM {}", user)
            }
            Statement::CreateContinuousQuery {
                name,
                database,
                source,
            } => write!(
                f,
                "CREATE CONTINUOUS QUERY {} ON {} BEGIN {} END",
                name, database, source
            ),
            Statement::DropContinuousQuery { name } => {
                write!(f, "DROP CONTINUOUS QUERY {}", name)
            }
            Statement::Select(stmt) => write!(f, "{}", stmt),
            Statement::Delete { source, condition } => {
                write!(f, "DELETE FROM {}", source)?;
                if let Some(condition) = condition {
                    write!(f, " WHERE {}", condition)?;
                }
                Ok(())
            }
            Statement::DropSeries { name } => write!(f, "DROP SERIES {}", name),
            Statement::ShowContinuousQueries => f.write_str("SHOW CONTINUOUS QUERIES"),
            Statement::ShowDatabases => f.write_str("SHOW DATABASES"),
            Statement::ShowRetentionPolicies { database } => {
                write!(f, "SHOW RETENTION POLICIES {}", database)
            }
            Statement::ShowUsers => f.write_str("SHOW USERS"),
            Statement::ShowSeries(show) => write!(f, "SHOW SERIES{}", show),
            Statement::ShowMeasurements(show) => write!(f, "SHOW MEASUREMENTS{}", show),
            Statement::ShowTagKeys(show) => write!(f, "SHOW TAG KEYS{}", show),
            Statement::ShowTagValues(show) => write!(f, "SHOW TAG VALUES{}", show),
            Statement::ShowFieldKeys(show) => write!(f, "SHOW FIELD KEYS{}", show),
            Statement::ShowFieldValues(show) => write!(f, "SHOW FIELD VALUES{}", show),
        }
    }
}

/// Clauses shared by the SHOW statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowStatement {
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub sort_fields: Vec<SortField>,
    /// Maximum number of rows; zero means unlimited.
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl fmt::Display for ShowStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, " FROM {}", source)?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }
        write_paging(f, &self.sort_fields, self.limit, self.offset)
    }
}

/// A command for extracting data from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    /// Expressions returned from the selection.
    pub fields: Vec<Field>,
    /// Destination for the results (continuous queries).
    #[serde(default)]
    pub target: Option<Target>,
    /// Expressions used for grouping the selection.
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    pub source: Source,
    /// Predicate evaluated on each data point.
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub sort_fields: Vec<SortField>,
    /// Maximum number of rows; zero means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Rows to skip before the first returned row.
    #[serde(default)]
    pub offset: usize,
}

impl SelectStatement {
    pub fn new(fields: Vec<Field>, source: Source) -> Self {
        Self {
            fields,
            target: None,
            dimensions: Vec::new(),
            source,
            condition: None,
            sort_fields: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }

    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn required_privileges(&self) -> Vec<ExecutionPrivilege> {
        let mut privileges = vec![ExecutionPrivilege::cluster(Privilege::Read)];
        if let Some(target) = &self.target {
            privileges.push(ExecutionPrivilege::new(
                target.database.clone().unwrap_or_default(),
                Privilege::Write,
            ));
        }
        privileges
    }

    /// Returns true if any field calls a function.
    pub fn aggregated(&self) -> bool {
        let mut aggregated = false;
        walk_fn(self.fields.as_slice(), |node| {
            if matches!(node, Node::Expr(Expr::Call(_))) {
                aggregated = true;
            }
        });
        aggregated
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        write_list(f, &self.fields)?;
        if let Some(target) = &self.target {
            write!(f, " {}", target)?;
        }
        write!(f, " FROM {}", self.source)?;
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }
        if !self.dimensions.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.dimensions)?;
        }
        write_paging(f, &self.sort_fields, self.limit, self.offset)
    }
}

/// An expression retrieved by a select statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub expr: Expr,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Field {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// The alias if set, otherwise the function or variable name.
    pub fn name(&self) -> &str {
        if let Some(alias) = self.alias.as_deref().filter(|a| !a.is_empty()) {
            return alias;
        }
        match &self.expr {
            Expr::Call(call) => &call.name,
            Expr::VarRef(var_ref) => &var_ref.name,
            _ => "",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alias.as_deref().filter(|a| !a.is_empty()) {
            Some(alias) => write!(f, "{} AS {}", self.expr, alias),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// An expression a select statement is grouped by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub expr: Expr,
}

impl Dimension {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// A field to sort results by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub name: String,
    pub ascending: bool,
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "{} {}", self.name, order)
    }
}

/// Destination measurement (and database) of a select statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub measurement: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INTO {}", self.measurement)?;
        if let Some(database) = self.database.as_deref().filter(|db| !db.is_empty()) {
            write!(f, " ON {}", database)?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_paging(
    f: &mut fmt::Formatter<'_>,
    sort_fields: &[SortField],
    limit: usize,
    offset: usize,
) -> fmt::Result {
    if !sort_fields.is_empty() {
        f.write_str(" ORDER BY ")?;
        write_list(f, sort_fields)?;
    }
    if limit > 0 {
        write!(f, " LIMIT {}", limit)?;
    }
    if offset > 0 {
        write!(f, " OFFSET {}", offset)?;
    }
    Ok(())
}
