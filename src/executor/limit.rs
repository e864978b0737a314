//! LimitOffset executor
//!
//! Implements LIMIT and OFFSET for query results.

use std::fmt;

use crate::planner::CostEstimator;

use super::error::ExecutorResult;
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::Executor;

/// Limit executor
#[derive(Debug)]
pub struct LimitOffset {
    /// Maximum tuples to return (0 = unlimited)
    limit: u64,
    /// Tuples to skip
    offset: u64,
    /// Number of tuples skipped so far
    skipped: u64,
    /// Number of tuples returned so far
    returned: u64,
    done: bool,
}

impl LimitOffset {
    pub fn new(limit: u64, offset: u64) -> Self {
        LimitOffset {
            limit,
            offset,
            skipped: 0,
            returned: 0,
            done: false,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn equivalent(&self, other: &LimitOffset) -> bool {
        self.limit == other.limit && self.offset == other.offset
    }
}

impl fmt::Display for LimitOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.limit > 0 {
            parts.push(format!("limit={}", self.limit));
        }
        if self.offset > 0 {
            parts.push(format!("offset={}", self.offset));
        }
        write!(f, "Limit: {}", parts.join(", "))
    }
}

impl Executor for LimitOffset {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let child = inputs.left()?;
        Ok(Prepared {
            schema: child.schema.clone(),
            cost: CostEstimator::limit_offset(&child.cost, self.limit, self.offset),
            stats: child.stats.clone(),
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.skipped = 0;
        self.returned = 0;
        self.done = false;
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        // Check if we've reached the limit
        if self.limit > 0 && self.returned >= self.limit {
            self.done = true;
            return Ok(None);
        }

        loop {
            match inputs.next_left()? {
                Some(tuple) => {
                    if self.skipped < self.offset {
                        self.skipped += 1;
                        continue;
                    }
                    self.returned += 1;
                    return Ok(Some(tuple));
                }
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }

    fn duplicate(&self) -> Self {
        LimitOffset::new(self.limit, self.offset)
    }
}
