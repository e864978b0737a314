//! Result sinks and the plan driver
//!
//! A sink receives the output schema once, then every result tuple in
//! order, then a final `finish()`.

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::catalog::Schema;

use super::error::{ExecutorError, ExecutorResult};
use super::plan::PlanTree;
use super::tuple::Tuple;

/// Destination for query results
pub trait TupleSink {
    fn set_schema(&mut self, schema: &Schema) -> ExecutorResult<()>;

    fn process(&mut self, tuple: &Tuple) -> ExecutorResult<()>;

    fn finish(&mut self) -> ExecutorResult<()> {
        Ok(())
    }
}

/// Keeps every result row in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    schema: Option<Schema>,
    tuples: Vec<Tuple>,
    finished: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn into_tuples(self) -> Vec<Tuple> {
        self.tuples
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl TupleSink for CollectingSink {
    fn set_schema(&mut self, schema: &Schema) -> ExecutorResult<()> {
        if self.schema.is_some() {
            return Err(ExecutorError::Internal(
                "sink schema set twice".to_string(),
            ));
        }
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn process(&mut self, tuple: &Tuple) -> ExecutorResult<()> {
        self.tuples.push(tuple.clone());
        Ok(())
    }

    fn finish(&mut self) -> ExecutorResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// Writes a header line and one ` | `-separated line per row
pub struct TuplePrinter<W: Write> {
    out: W,
    rows: u64,
}

impl<W: Write> TuplePrinter<W> {
    pub fn new(out: W) -> Self {
        TuplePrinter { out, rows: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TupleSink for TuplePrinter<W> {
    fn set_schema(&mut self, schema: &Schema) -> ExecutorResult<()> {
        let header: Vec<String> = schema.iter().map(|c| c.column_name().to_string()).collect();
        writeln!(self.out, "{}", header.join(" | "))?;
        Ok(())
    }

    fn process(&mut self, tuple: &Tuple) -> ExecutorResult<()> {
        let values: Vec<String> = tuple.iter().map(|d| d.to_string()).collect();
        writeln!(self.out, "{}", values.join(" | "))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> ExecutorResult<()> {
        writeln!(
            self.out,
            "({} row{})",
            self.rows,
            if self.rows == 1 { "" } else { "s" }
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// Counters from one plan evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvalStats {
    pub rows_produced: u64,
    pub elapsed: Duration,
}

/// Prepare, initialize and drain `plan` into `sink`.
///
/// `clean_up` runs on the plan whether or not evaluation succeeded.
pub fn execute_plan(plan: &mut PlanTree, sink: &mut dyn TupleSink) -> ExecutorResult<EvalStats> {
    let start = Instant::now();
    let result = drive(plan, sink);
    let cleaned = plan.clean_up();
    let rows_produced = result?;
    cleaned?;

    let stats = EvalStats {
        rows_produced,
        elapsed: start.elapsed(),
    };
    debug!(
        rows = stats.rows_produced,
        elapsed_us = stats.elapsed.as_micros() as u64,
        "plan evaluated"
    );
    Ok(stats)
}

fn drive(plan: &mut PlanTree, sink: &mut dyn TupleSink) -> ExecutorResult<u64> {
    plan.prepare()?;
    plan.initialize()?;
    let schema = plan
        .schema()
        .cloned()
        .ok_or_else(|| ExecutorError::NotPrepared(plan.to_string()))?;
    sink.set_schema(&schema)?;

    let mut rows = 0u64;
    while let Some(tuple) = plan.next_tuple()? {
        sink.process(&tuple)?;
        rows += 1;
    }
    sink.finish()?;
    Ok(rows)
}
