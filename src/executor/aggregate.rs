//! Aggregate executor
//!
//! Implements GROUP BY with aggregate functions (COUNT, SUM, AVG, MIN, MAX,
//! STDDEV, VARIANCE). Grouping is hash-based: the whole input is consumed on
//! the first pull, then one row per distinct group key is emitted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::catalog::{ColumnInfo, ColumnStats, DataType, Schema};
use crate::planner::CostEstimator;
use crate::sql::Expr;

use super::datum::Datum;
use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::eval_add;
use super::node::{Inputs, Prepared};
use super::tuple::Tuple;
use super::{Executor, MarkingSupport};

/// Aggregate function kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// COUNT(expr), non-NULL values only
    Count,
    /// COUNT(*), every row
    CountStar,
    Sum,
    Avg,
    Min,
    Max,
    /// Population standard deviation
    StdDev,
    /// Population variance
    Variance,
}

impl AggregateFunction {
    /// Look up an aggregate by its SQL name (case-insensitive).
    ///
    /// `COUNT` always maps to [`AggregateFunction::Count`]; the caller decides
    /// whether the argument was `*`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            "STDDEV" | "STDDEV_POP" => Some(AggregateFunction::StdDev),
            "VARIANCE" | "VAR_POP" => Some(AggregateFunction::Variance),
            _ => None,
        }
    }

    pub fn is_aggregate_name(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count | AggregateFunction::CountStar => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::StdDev => "STDDEV",
            AggregateFunction::Variance => "VARIANCE",
        }
    }

    /// Whether DISTINCT changes the result of this function
    pub fn supports_distinct(&self) -> bool {
        matches!(
            self,
            AggregateFunction::Count | AggregateFunction::Sum | AggregateFunction::Avg
        )
    }

    /// Result type given the argument type
    pub fn result_type(&self, arg_type: &DataType) -> DataType {
        match self {
            AggregateFunction::Count | AggregateFunction::CountStar => DataType::BigInt,
            AggregateFunction::Sum => {
                if arg_type.is_integer() {
                    DataType::BigInt
                } else {
                    DataType::Double
                }
            }
            AggregateFunction::Avg | AggregateFunction::StdDev | AggregateFunction::Variance => {
                DataType::Double
            }
            AggregateFunction::Min | AggregateFunction::Max => arg_type.clone(),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One aggregate call: function, argument, DISTINCT flag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub distinct: bool,
    pub arg: Expr,
}

impl AggregateCall {
    pub fn new(function: AggregateFunction, arg: Expr) -> Self {
        AggregateCall {
            function,
            distinct: false,
            arg,
        }
    }

    pub fn count_star() -> Self {
        AggregateCall::new(AggregateFunction::CountStar, Expr::literal(1i64))
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function == AggregateFunction::CountStar {
            return write!(f, "COUNT(*)");
        }
        if self.distinct {
            write!(f, "{}(DISTINCT {})", self.function, self.arg)
        } else {
            write!(f, "{}({})", self.function, self.arg)
        }
    }
}

/// Running state of one aggregate function
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Sum(Option<Datum>),
    Avg { sum: f64, count: i64 },
    Min(Option<Datum>),
    Max(Option<Datum>),
    /// Welford's running mean and sum of squared deviations
    Moments { count: i64, mean: f64, m2: f64 },
}

impl Accumulator {
    fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count | AggregateFunction::CountStar => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum(None),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::StdDev | AggregateFunction::Variance => Accumulator::Moments {
                count: 0,
                mean: 0.0,
                m2: 0.0,
            },
        }
    }

    fn accumulate(&mut self, value: &Datum) -> ExecutorResult<()> {
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(sum) => {
                numeric(value, "SUM")?;
                *sum = Some(match sum.take() {
                    Some(s) => eval_add(&s, value)?,
                    None => value.clone(),
                });
            }
            Accumulator::Avg { sum, count } => {
                *sum += numeric(value, "AVG")?;
                *count += 1;
            }
            Accumulator::Min(min) => match min {
                Some(m) if value >= m => {}
                _ => *min = Some(value.clone()),
            },
            Accumulator::Max(max) => match max {
                Some(m) if value <= m => {}
                _ => *max = Some(value.clone()),
            },
            Accumulator::Moments { count, mean, m2 } => {
                let v = numeric(value, "STDDEV/VARIANCE")?;
                *count += 1;
                let delta = v - *mean;
                *mean += delta / *count as f64;
                *m2 += delta * (v - *mean);
            }
        }
        Ok(())
    }

    fn finalize(&self, function: AggregateFunction) -> Datum {
        match self {
            Accumulator::Count(n) => Datum::Int(*n),
            Accumulator::Sum(sum) => sum.clone().unwrap_or(Datum::Null),
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    Datum::Null
                } else {
                    Datum::Float(*sum / *count as f64)
                }
            }
            Accumulator::Min(min) => min.clone().unwrap_or(Datum::Null),
            Accumulator::Max(max) => max.clone().unwrap_or(Datum::Null),
            Accumulator::Moments { count, m2, .. } => {
                if *count == 0 {
                    return Datum::Null;
                }
                let variance = *m2 / *count as f64;
                if function == AggregateFunction::StdDev {
                    Datum::Float(variance.sqrt())
                } else {
                    Datum::Float(variance)
                }
            }
        }
    }
}

fn numeric(value: &Datum, function: &str) -> ExecutorResult<f64> {
    match value {
        Datum::Int(_) | Datum::Float(_) => value
            .as_float()
            .ok_or_else(|| ExecutorError::Internal("numeric datum without value".to_string())),
        _ => Err(ExecutorError::TypeMismatch {
            expected: DataType::Double,
            got: value.data_type().unwrap_or(DataType::Null),
            context: function.to_string(),
        }),
    }
}

/// Accumulator for one call, with the DISTINCT filter and NULL policy
#[derive(Debug, Clone)]
struct AggregateState {
    function: AggregateFunction,
    acc: Accumulator,
    seen: Option<HashSet<Datum>>,
}

impl AggregateState {
    fn new(call: &AggregateCall) -> Self {
        let distinct = call.distinct && call.function.supports_distinct();
        AggregateState {
            function: call.function,
            acc: Accumulator::new(call.function),
            seen: distinct.then(HashSet::new),
        }
    }

    /// Back to the identity value
    fn reset(&mut self) {
        self.acc = Accumulator::new(self.function);
        if let Some(seen) = &mut self.seen {
            seen.clear();
        }
    }

    fn add_value(&mut self, value: &Datum) -> ExecutorResult<()> {
        if self.function == AggregateFunction::CountStar {
            return self.acc.accumulate(value);
        }
        if value.is_null() {
            return Ok(());
        }
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
        }
        self.acc.accumulate(value)
    }

    fn result(&self) -> Datum {
        self.acc.finalize(self.function)
    }
}

/// Hash-based grouping and aggregation
#[derive(Debug)]
pub struct HashGroupAggregate {
    /// Group by expressions, plain column references only
    group_by: Vec<Expr>,
    /// Aggregate calls with their output column names
    aggregates: Vec<(String, AggregateCall)>,
    /// Input positions of the group columns, resolved by `prepare()`
    group_indices: Vec<usize>,
    /// One row per group, in first-seen order
    output: Vec<Tuple>,
    loaded: bool,
    position: usize,
    marked: Option<usize>,
}

impl HashGroupAggregate {
    pub fn new(group_by: Vec<Expr>, aggregates: Vec<(String, AggregateCall)>) -> Self {
        HashGroupAggregate {
            group_by,
            aggregates,
            group_indices: Vec::new(),
            output: Vec::new(),
            loaded: false,
            position: 0,
            marked: None,
        }
    }

    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    pub fn aggregates(&self) -> &[(String, AggregateCall)] {
        &self.aggregates
    }

    pub fn equivalent(&self, other: &HashGroupAggregate) -> bool {
        self.group_by == other.group_by && self.aggregates == other.aggregates
    }

    fn fresh_states(&self) -> Vec<AggregateState> {
        self.aggregates
            .iter()
            .map(|(_, call)| AggregateState::new(call))
            .collect()
    }

    fn load(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        let mut index: HashMap<Tuple, usize> = HashMap::new();
        let mut groups: Vec<(Tuple, Vec<AggregateState>)> = Vec::new();

        while let Some(tuple) = inputs.next_left()? {
            let key = tuple.project(&self.group_indices)?;
            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    groups.push((key.clone(), self.fresh_states()));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let schema = &inputs.left()?.schema;
            let env = Environment::new(schema, &tuple);
            let states = &mut groups[slot].1;
            for ((_, call), state) in self.aggregates.iter().zip(states.iter_mut()) {
                let value = if call.function == AggregateFunction::CountStar {
                    Datum::Int(1)
                } else {
                    call.arg.evaluate(&env)?
                };
                state.add_value(&value)?;
            }
        }

        // No GROUP BY: one implicit group, even over empty input
        if groups.is_empty() && self.group_by.is_empty() {
            let mut states = self.fresh_states();
            for state in &mut states {
                state.reset();
            }
            groups.push((Tuple::empty(), states));
        }

        self.output = groups
            .into_iter()
            .map(|(key, states)| {
                let mut row = key;
                for state in &states {
                    row.push(state.result());
                }
                row
            })
            .collect();
        self.position = 0;
        self.loaded = true;
        Ok(())
    }

    fn reset_state(&mut self) {
        self.output.clear();
        self.loaded = false;
        self.position = 0;
        self.marked = None;
    }
}

impl fmt::Display for HashGroupAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group_by: Vec<String> = self.group_by.iter().map(|e| e.to_string()).collect();
        let aggregates: Vec<String> = self
            .aggregates
            .iter()
            .map(|(name, call)| format!("{}={}", name, call))
            .collect();
        write!(
            f,
            "HashGroupAggregate: group by [{}] aggregates [{}]",
            group_by.join(", "),
            aggregates.join(", ")
        )
    }
}

impl Executor for HashGroupAggregate {
    fn prepare(&mut self, inputs: &Inputs<'_>) -> ExecutorResult<Prepared> {
        let child = inputs.left()?;
        let mut schema = Schema::new();
        let mut stats = Vec::with_capacity(self.group_by.len() + self.aggregates.len());
        let mut group_indices = Vec::with_capacity(self.group_by.len());

        for expr in &self.group_by {
            let name = match expr {
                Expr::Column(name) if !name.is_wildcard() => name,
                _ => {
                    return Err(ExecutorError::InvalidPlan(format!(
                        "GROUP BY expression must be a column reference: {}",
                        expr
                    )))
                }
            };
            let index = child
                .schema
                .column_index(name)?
                .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))?;
            let info = child
                .schema
                .column(index)
                .cloned()
                .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))?;
            schema.add_column(info)?;

            // All NULL keys fall into a single group
            let mut column_stats = child.stats.get(index).cloned().unwrap_or_default();
            column_stats.null_values = column_stats.null_values.map(|n| n.min(1));
            stats.push(column_stats);
            group_indices.push(index);
        }

        let groups = if self.group_by.is_empty() {
            1.0
        } else {
            let product = group_indices.iter().try_fold(1.0f32, |acc, &index| {
                child
                    .stats
                    .get(index)
                    .and_then(|s| s.unique_values)
                    .map(|u| acc * u.max(1) as f32)
            });
            product.unwrap_or(child.cost.num_tuples)
        };
        let group_estimate = groups.round().max(1.0) as u64;

        for (name, call) in &self.aggregates {
            let arg_type = if call.function == AggregateFunction::CountStar {
                DataType::BigInt
            } else {
                call.arg.column_info(&child.schema)?.data_type
            };
            schema.add_column(ColumnInfo::new(
                name.clone(),
                None,
                call.function.result_type(&arg_type),
            ))?;

            let unique = match call.function {
                AggregateFunction::Min | AggregateFunction::Max => {
                    let arg_unique = match &call.arg {
                        Expr::Column(col) => child
                            .schema
                            .column_index(col)?
                            .and_then(|i| child.stats.get(i))
                            .and_then(|s| s.unique_values),
                        _ => None,
                    };
                    arg_unique.map_or(group_estimate, |u| u.min(group_estimate))
                }
                _ => group_estimate,
            };
            stats.push(ColumnStats::unknown().with_unique_values(unique));
        }

        let tuple_size = schema.iter().map(|c| c.data_type.estimated_width()).sum();
        self.group_indices = group_indices;
        Ok(Prepared {
            schema,
            cost: CostEstimator::group_aggregate(&child.cost, groups, tuple_size),
            stats,
        })
    }

    fn initialize(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.reset_state();
        inputs.initialize_left()
    }

    fn next(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<Option<Tuple>> {
        if !self.loaded {
            self.load(inputs)?;
        }
        match self.output.get(self.position) {
            Some(tuple) => {
                self.position += 1;
                Ok(Some(tuple.clone()))
            }
            None => Ok(None),
        }
    }

    fn clean_up(&mut self, inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        self.reset_state();
        inputs.clean_up_children()
    }

    fn supports_marking(&self, _children: MarkingSupport) -> bool {
        true
    }

    fn mark_current_position(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        if self.position == 0 {
            return Err(ExecutorError::NoCurrentTuple(self.to_string()));
        }
        self.marked = Some(self.position - 1);
        Ok(())
    }

    fn reset_to_last_mark(&mut self, _inputs: &mut Inputs<'_>) -> ExecutorResult<()> {
        let marked = self
            .marked
            .ok_or_else(|| ExecutorError::NoMark(self.to_string()))?;
        self.position = marked;
        Ok(())
    }

    fn duplicate(&self) -> Self {
        HashGroupAggregate::new(self.group_by.clone(), self.aggregates.clone())
    }
}
