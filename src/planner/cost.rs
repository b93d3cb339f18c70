//! Row and cost estimates for a scan.

use super::classify::Classified;
use crate::core::RelationDescriptor;
use crate::parser::{BoolOp, ColumnRelation, CompareOp, Expr};
use serde::Serialize;

pub const DEFAULT_ROWS: f64 = 1000.0;
pub const DEFAULT_WIDTH: u32 = 100;
pub const STARTUP_COST: f64 = 100.0;
/// Network transfer per fetched row, on top of the generic per-row CPU cost
pub const FDW_TUPLE_COST: f64 = 0.01;
pub const CPU_TUPLE_COST: f64 = 0.01;
pub const CPU_OPERATOR_COST: f64 = 0.0025;
/// Rows expected in one partition once the partition key is pinned
pub const PARTITION_ROWS: f64 = 10.0;

const EQ_SELECTIVITY: f64 = 0.005;
const RANGE_SELECTIVITY: f64 = 1.0 / 3.0;
const DEFAULT_SELECTIVITY: f64 = 0.5;

/// Baseline handed over by the host's row-estimate collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Baseline {
    pub rows: Option<f64>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Rows the remote is expected to send
    pub fetched_rows: f64,
    /// Rows left after local filtering
    pub rows: f64,
    pub width: u32,
    pub startup_cost: f64,
    pub total_cost: f64,
}

fn selectivity(expr: &Expr) -> f64 {
    match expr.column_relation() {
        Some(ColumnRelation::Compare { op: CompareOp::Eq, .. }) => EQ_SELECTIVITY,
        Some(ColumnRelation::Compare { op, .. }) if op.is_range() => RANGE_SELECTIVITY,
        Some(ColumnRelation::In { .. }) => RANGE_SELECTIVITY,
        _ => match expr {
            Expr::Bool {
                op: BoolOp::And,
                args,
            } => args.iter().map(selectivity).product(),
            _ => DEFAULT_SELECTIVITY,
        },
    }
}

fn clamp_rows(rows: f64) -> f64 {
    if rows.is_finite() { rows.max(1.0).round() } else { 1.0 }
}

fn pins_partition(relation: &RelationDescriptor, remote: &[Expr]) -> bool {
    relation.has_primary_key()
        && relation.partition_key.iter().all(|pk| {
            remote.iter().any(|expr| {
                expr.column_relation()
                    .is_some_and(|rel| rel.column() == pk && rel.is_equality())
            })
        })
}

/// Estimate rows and cost for a scan with the given classification.
#[must_use]
pub fn estimate(relation: &RelationDescriptor, classified: &Classified, baseline: Baseline) -> CostEstimate {
    let base_rows = baseline.rows.filter(|r| *r > 0.0).unwrap_or(DEFAULT_ROWS);
    let width = baseline.width.filter(|w| *w > 0).unwrap_or(DEFAULT_WIDTH);

    let mut fetched = base_rows * classified.remote.iter().map(selectivity).product::<f64>();
    if pins_partition(relation, &classified.remote) {
        fetched = fetched.min(PARTITION_ROWS);
    }
    let fetched = clamp_rows(fetched);
    let rows = clamp_rows(fetched * classified.local.iter().map(selectivity).product::<f64>());

    #[allow(clippy::cast_precision_loss)]
    let per_row = CPU_TUPLE_COST
        + FDW_TUPLE_COST
        + CPU_OPERATOR_COST * classified.local.len() as f64;
    let mut total_cost = STARTUP_COST + per_row * fetched;
    // Rows fetched only to be thrown away locally
    if fetched > rows {
        total_cost += (fetched - rows) * CPU_TUPLE_COST * 0.5;
    }

    CostEstimate {
        fetched_rows: fetched,
        rows,
        width,
        startup_cost: STARTUP_COST,
        total_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::parser::parse_restriction;

    fn relation() -> RelationDescriptor {
        RelationDescriptor::new(
            "ks",
            "tbl",
            vec![
                Column::new("pk", DataType::Integer),
                Column::new("ck", DataType::Integer),
                Column::new("v", DataType::Text),
            ],
        )
        .with_partition_key(&["pk"])
        .with_clustering_key(&["ck"])
    }

    fn classified(remote: &[&str], local: &[&str]) -> Classified {
        Classified {
            remote: remote.iter().map(|r| parse_restriction(r).unwrap()).collect(),
            local: local.iter().map(|r| parse_restriction(r).unwrap()).collect(),
        }
    }

    #[test]
    fn test_full_scan_defaults() {
        let est = estimate(&relation(), &Classified::default(), Baseline::default());
        assert_eq!(est.rows, 1000.0);
        assert_eq!(est.width, 100);
        assert_eq!(est.startup_cost, 100.0);
        assert!((est.total_cost - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_partition_lookup_is_cheap() {
        let est = estimate(&relation(), &classified(&["pk = 1"], &[]), Baseline::default());
        assert_eq!(est.fetched_rows, 5.0);

        let big = Baseline {
            rows: Some(1_000_000.0),
            width: Some(40),
        };
        let est = estimate(&relation(), &classified(&["pk = 1"], &[]), big);
        assert_eq!(est.fetched_rows, PARTITION_ROWS);
        assert_eq!(est.width, 40);
    }

    #[test]
    fn test_local_filters_reduce_output_only() {
        let est = estimate(&relation(), &classified(&[], &["v LIKE 'a%'"]), Baseline::default());
        assert_eq!(est.fetched_rows, 1000.0);
        assert_eq!(est.rows, 500.0);
        let unfiltered = estimate(&relation(), &Classified::default(), Baseline::default());
        assert!(est.total_cost > unfiltered.total_cost);
    }

    #[test]
    fn test_range_selectivity() {
        let est = estimate(&relation(), &classified(&["ck > 3"], &[]), Baseline::default());
        assert_eq!(est.fetched_rows, 333.0);
    }
}
