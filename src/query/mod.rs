//! Query language core: the AST, its traversal, partial evaluation, time
//! range extraction and planning of multi-source selects.

pub mod ast;
pub mod planner;
pub mod reduce;
pub mod substatement;
pub mod time_range;
pub mod validator;
pub mod walk;

pub use planner::{PlannerConfig, PlanningError, QueryPlan, QueryPlanner};
pub use reduce::{eval, reduce, NowValuer, Valuer};
pub use substatement::{filter_expr_by_source, match_source};
pub use time_range::{time_range, TimeBounds};
pub use validator::{normalize_dimensions, QueryValidator, ValidationError};
pub use walk::{rewrite, rewrite_expr_fn, walk, walk_fn, Node, Rewrite, Rewriter, Visitor};
