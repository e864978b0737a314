//! Cost model for query planning
//!
//! Every plan node computes a [`PlanCost`] during `prepare()` from its
//! children's costs plus its own increment. The join planner compares
//! candidate plans by CPU cost.

use std::fmt;

use crate::catalog::TableStats;
use crate::sql::JoinType;

/// Estimated cost of executing a plan subtree
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanCost {
    /// Estimated number of tuples produced
    pub num_tuples: f32,
    /// Average size of a produced tuple, in bytes
    pub tuple_size: f32,
    /// Accumulated CPU cost (tuples touched)
    pub cpu_cost: f32,
    /// Accumulated block reads
    pub block_ios: u64,
}

impl PlanCost {
    pub fn new(num_tuples: f32, tuple_size: f32, cpu_cost: f32, block_ios: u64) -> Self {
        Self {
            num_tuples,
            tuple_size,
            cpu_cost,
            block_ios,
        }
    }
}

impl fmt::Display for PlanCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[tuples={:.1}, tupSize={:.1}, cpuCost={:.1}, blockIOs={}]",
            self.num_tuples, self.tuple_size, self.cpu_cost, self.block_ios
        )
    }
}

/// Per-operator cost formulas
pub struct CostEstimator;

impl CostEstimator {
    /// Tuple size assumed when nothing better is known
    pub const DEFAULT_TUPLE_SIZE: f32 = 100.0;

    /// Sequential scan of a tuple file with a residual predicate
    pub fn file_scan(stats: &TableStats, selectivity: f32) -> PlanCost {
        let n = stats.num_tuples as f32;
        PlanCost {
            num_tuples: n * selectivity,
            tuple_size: stats.avg_tuple_size,
            cpu_cost: n,
            block_ios: stats.data_pages,
        }
    }

    /// Filter over an input
    pub fn filter(input: &PlanCost, selectivity: f32) -> PlanCost {
        PlanCost {
            num_tuples: input.num_tuples * selectivity,
            tuple_size: input.tuple_size,
            cpu_cost: input.cpu_cost + input.num_tuples,
            block_ios: input.block_ios,
        }
    }

    /// Projection over an input
    pub fn project(input: &PlanCost, tuple_size: f32) -> PlanCost {
        PlanCost {
            num_tuples: input.num_tuples,
            tuple_size,
            cpu_cost: input.cpu_cost + input.num_tuples,
            block_ios: input.block_ios,
        }
    }

    /// Projection with no input: one tuple, evaluated once
    pub fn leaf_project(tuple_size: f32) -> PlanCost {
        PlanCost::new(1.0, tuple_size, 1.0, 0)
    }

    /// Nested-loop join.
    ///
    /// When the inner side is rewound by mark/reset its blocks are read
    /// once; when it is re-initialized they are read once per outer tuple.
    pub fn nested_loop(
        left: &PlanCost,
        right: &PlanCost,
        join_type: JoinType,
        selectivity: f32,
        rescan_right: bool,
    ) -> PlanCost {
        let pairs = left.num_tuples * right.num_tuples;
        let num_tuples = match join_type {
            JoinType::Cross => pairs,
            JoinType::Inner => selectivity * pairs,
            JoinType::LeftOuter => selectivity * pairs + (1.0 - selectivity) * left.num_tuples,
            JoinType::RightOuter => selectivity * pairs + (1.0 - selectivity) * right.num_tuples,
            JoinType::FullOuter => {
                selectivity * pairs
                    + (1.0 - selectivity) * (left.num_tuples + right.num_tuples)
            }
            JoinType::Semi => selectivity * left.num_tuples,
            JoinType::Anti => (1.0 - selectivity) * left.num_tuples,
        };

        let right_ios = if rescan_right {
            (left.num_tuples.max(1.0) as u64).saturating_mul(right.block_ios)
        } else {
            right.block_ios
        };

        PlanCost {
            num_tuples,
            tuple_size: left.tuple_size + right.tuple_size,
            cpu_cost: left.cpu_cost + right.cpu_cost + pairs,
            block_ios: left.block_ios.saturating_add(right_ios),
        }
    }

    /// Hash grouping producing `groups` output rows
    pub fn group_aggregate(input: &PlanCost, groups: f32, tuple_size: f32) -> PlanCost {
        PlanCost {
            num_tuples: groups,
            tuple_size,
            cpu_cost: input.cpu_cost + input.num_tuples,
            block_ios: input.block_ios,
        }
    }

    /// In-memory sort
    pub fn sort(input: &PlanCost) -> PlanCost {
        let n = input.num_tuples;
        PlanCost {
            num_tuples: n,
            tuple_size: input.tuple_size,
            cpu_cost: input.cpu_cost + n * n.log2().max(1.0),
            block_ios: input.block_ios,
        }
    }

    /// LIMIT/OFFSET; a zero limit means unbounded
    pub fn limit_offset(input: &PlanCost, limit: u64, offset: u64) -> PlanCost {
        let available = (input.num_tuples - offset as f32).max(0.0);
        let num_tuples = if limit == 0 {
            available
        } else {
            available.min(limit as f32)
        };
        PlanCost {
            num_tuples,
            tuple_size: input.tuple_size,
            cpu_cost: input.cpu_cost + num_tuples + offset as f32,
            block_ios: input.block_ios,
        }
    }

    /// Buffering every input tuple
    pub fn materialize(input: &PlanCost) -> PlanCost {
        PlanCost {
            num_tuples: input.num_tuples,
            tuple_size: input.tuple_size,
            cpu_cost: input.cpu_cost + input.num_tuples,
            block_ios: input.block_ios,
        }
    }
}
