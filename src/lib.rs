//! vctsdb-ql - the query language core of VCTSDB
//!
//! This crate provides the syntax tree of the query language together with
//! the analyses the planner runs over it: traversal, constant folding, time
//! range extraction and decomposition of multi-measurement selects.

pub mod metrics;
pub mod query;
