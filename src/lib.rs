//! Quarry - streaming relational operators and a cost-based join planner
//!
//! Features:
//! - Pull-based plan trees with mark/reset for nested-loop rescans
//! - Hash grouping with COUNT/SUM/AVG/MIN/MAX/STDDEV/VARIANCE
//! - Dynamic-programming join ordering driven by table statistics

pub mod catalog;
pub mod executor;
pub mod planner;
pub mod sql;
pub mod storage;
