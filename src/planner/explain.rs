//! EXPLAIN output formatting
//!
//! Formats plan trees for display, with the cost estimate of every
//! prepared node.

use std::fmt::{self, Write};

use crate::executor::{NodeId, PlanTree};

/// Format a plan tree for EXPLAIN output
pub struct ExplainOutput;

impl ExplainOutput {
    /// Format a plan tree as a string
    pub fn format(plan: &PlanTree) -> String {
        let mut output = String::new();
        // writing into a String cannot fail
        Self::write(plan, &mut output).map_or_else(|_| String::new(), |()| output)
    }

    /// Write the plan tree to any formatter sink
    pub fn write<W: Write>(plan: &PlanTree, out: &mut W) -> fmt::Result {
        if plan.is_empty() {
            return Ok(());
        }
        Self::write_node(plan, plan.root(), 0, out)
    }

    fn write_node<W: Write>(
        plan: &PlanTree,
        id: NodeId,
        indent: usize,
        out: &mut W,
    ) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        let Some(node) = plan.node(id) else {
            return Ok(());
        };

        writeln!(out, "{}{}", prefix, node.operator())?;
        if let Some(prepared) = node.prepared() {
            writeln!(out, "{}  cost: {}", prefix, prepared.cost)?;
        }

        match (node.left(), node.right()) {
            (Some(left), Some(right)) => {
                writeln!(out, "{}  left:", prefix)?;
                Self::write_node(plan, left, indent + 2, out)?;
                writeln!(out, "{}  right:", prefix)?;
                Self::write_node(plan, right, indent + 2, out)
            }
            (Some(child), None) | (None, Some(child)) => {
                Self::write_node(plan, child, indent + 1, out)
            }
            (None, None) => Ok(()),
        }
    }
}
