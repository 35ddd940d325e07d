//! Abstract syntax tree for the query language.
//!
//! Nodes are grouped into closed enums per capability: [`Statement`],
//! [`Expr`] and [`Source`]. Children are owned, so a clone is always a deep,
//! independent copy.

pub mod expr;
pub mod format;
pub mod source;
pub mod statement;
pub mod token;
pub mod value;

pub use expr::{BinaryExpr, Call, Expr, VarRef};
pub use format::{format_duration, format_time, quote_string, DATE_TIME_FORMAT};
pub use source::{Measurement, Source};
pub use statement::{
    Dimension, ExecutionPrivilege, Field, Privilege, Query, SelectStatement, ShowStatement,
    SortField, Statement, Target,
};
pub use token::Token;
pub use value::{DataType, Value};
