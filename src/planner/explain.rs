//! EXPLAIN output for planned scans and modifications
//!
//! Lines are label/value pairs so the host can lay them out in its own
//! EXPLAIN format. Nothing here opens a connection.

use super::{ModifyPlan, QueryPlan};
use crate::parser::Expr;

pub const QUERY_LABEL: &str = "ScyllaDB Query";

fn join(exprs: &[Expr]) -> String {
    if exprs.is_empty() {
        return "(none)".to_string();
    }
    exprs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[must_use]
pub fn explain(plan: &QueryPlan, verbose: bool) -> Vec<(&'static str, String)> {
    let mut lines = vec![(QUERY_LABEL, plan.cql.clone())];
    if verbose {
        lines.push(("Remote filters", join(&plan.remote)));
        lines.push(("Local filters", join(&plan.local)));
        lines.push((
            "Allow Filtering",
            if plan.allow_filtering { "yes" } else { "no" }.to_string(),
        ));
        lines.push((
            "Estimated rows",
            format!("{} fetched, {} returned", plan.estimate.fetched_rows, plan.estimate.rows),
        ));
        lines.push((
            "Estimated cost",
            format!("{:.2}..{:.2}", plan.estimate.startup_cost, plan.estimate.total_cost),
        ));
    }
    lines
}

#[must_use]
pub fn explain_modify(plan: &ModifyPlan, verbose: bool) -> Vec<(&'static str, String)> {
    let mut lines = vec![(QUERY_LABEL, plan.cql.clone())];
    if verbose {
        let slots = plan
            .slots
            .iter()
            .map(|slot| format!("{}::{}", slot.column, slot.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(("Bind order", slots));
    }
    lines
}

/// `label: value` lines as the text EXPLAIN format prints them
#[must_use]
pub fn render(lines: &[(&'static str, String)]) -> String {
    lines
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
