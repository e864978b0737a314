//! Query planner
//!
//! Turns a query block into an executable plan tree and estimates what
//! each plan will cost.
//!
//! ## Pipeline
//!
//! ```text
//! SelectClause
//!   → SubqueryPlanner::resolve_query() → subqueries folded into literals
//!   → AggregateExtractor::extract() → aggregate calls as #AGG<n> columns
//!   → leaf plans with pushed-down conjuncts
//!   → DP join-order search (cheapest CPU cost per LeafSet)
//!   → filter / group / HAVING / project / sort / limit → PlanTree
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use quarry::planner::{CostBasedJoinPlanner, Planner};
//!
//! let planner = CostBasedJoinPlanner::new(&storage);
//! let mut plan = planner.make_plan(&query)?;
//! let stats = quarry::executor::execute_plan(&mut plan, &mut sink)?;
//! ```

pub mod aggregates;
pub mod config;
pub mod cost;
pub mod error;
pub mod explain;
pub mod join_planner;
pub mod leaf_set;
pub mod selectivity;
pub mod subquery;

pub use aggregates::{AggregateExtractor, ExtractedAggregates};
pub use config::{PlannerConfig, RewindStrategy};
pub use cost::{CostEstimator, PlanCost};
pub use error::{PlannerError, PlannerResult};
pub use explain::ExplainOutput;
pub use join_planner::{CostBasedJoinPlanner, Planner};
pub use leaf_set::LeafSet;
pub use selectivity::SelectivityEstimator;
pub use subquery::SubqueryPlanner;
