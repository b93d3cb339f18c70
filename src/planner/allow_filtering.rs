//! When a SELECT needs `ALLOW FILTERING`.
//!
//! The server refuses a query it cannot answer from partition lookups and
//! clustering slices unless the flag is present, so the policy errs toward
//! setting it.

use crate::core::RelationDescriptor;
use crate::parser::{BoolOp, ColumnRelation, CompareOp, Expr};

/// How a remote predicate set restricts one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restriction {
    /// `=` or `IN`
    Equality,
    /// `<`, `<=`, `>`, `>=`
    Slice,
    /// `!=`
    Other,
}

/// `None` when something in the set is not a plain column relation
fn relations(remote: &[Expr]) -> Option<Vec<ColumnRelation<'_>>> {
    remote
        .iter()
        .flat_map(conjuncts)
        .map(Expr::column_relation)
        .collect()
}

fn conjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr.unwrap_casts() {
        Expr::Bool {
            op: BoolOp::And,
            args,
        } => args.iter().flat_map(conjuncts).collect(),
        other => vec![other],
    }
}

fn restriction_on(relations: &[ColumnRelation<'_>], column: &str) -> Option<Restriction> {
    let mut found = None;
    for rel in relations.iter().filter(|r| r.column() == column) {
        let kind = match rel {
            ColumnRelation::In { .. }
            | ColumnRelation::Compare {
                op: CompareOp::Eq, ..
            } => Restriction::Equality,
            ColumnRelation::Compare { op, .. } if op.is_range() => Restriction::Slice,
            ColumnRelation::Compare { .. } => Restriction::Other,
        };
        // Equality dominates, anything else is kept as the weakest seen
        found = match (found, kind) {
            (Some(Restriction::Equality), _) | (_, Restriction::Equality) => Some(Restriction::Equality),
            (Some(Restriction::Other), _) | (_, Restriction::Other) => Some(Restriction::Other),
            _ => Some(Restriction::Slice),
        };
    }
    found
}

/// Decide whether the SELECT for `remote` must carry `ALLOW FILTERING`.
///
/// The flag is forced when:
/// - there is no remote predicate at all;
/// - the relation declares no partition key;
/// - a partition key column has no `=` or `IN` relation;
/// - a remote relation names a column outside the primary key;
/// - a relation uses `!=`;
/// - a clustering column is restricted after an earlier clustering column
///   that is unrestricted or only sliced.
#[must_use]
pub fn needs_allow_filtering(relation: &RelationDescriptor, remote: &[Expr]) -> bool {
    if remote.is_empty() || relation.partition_key.is_empty() {
        return true;
    }

    let Some(relations) = relations(remote) else {
        return true;
    };

    let partition_complete = relation
        .partition_key
        .iter()
        .all(|pk| restriction_on(&relations, pk) == Some(Restriction::Equality));
    if !partition_complete {
        return true;
    }

    if relations.iter().any(|r| {
        !relation.is_key_column(r.column())
            || matches!(r, ColumnRelation::Compare { op: CompareOp::NotEq, .. })
    }) {
        return true;
    }

    let mut prefix_open = true;
    for ck in &relation.clustering_key {
        match restriction_on(&relations, ck) {
            Some(_) if !prefix_open => return true,
            Some(Restriction::Equality) => {}
            Some(_) | None => prefix_open = false,
        }
    }
    false
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
                Column::new("pk1", DataType::Integer),
                Column::new("pk2", DataType::Integer),
                Column::new("ck1", DataType::Integer),
                Column::new("ck2", DataType::Integer),
                Column::new("v", DataType::Text),
            ],
        )
        .with_partition_key(&["pk1", "pk2"])
        .with_clustering_key(&["ck1", "ck2"])
    }

    fn remote(parts: &[&str]) -> Vec<Expr> {
        parts.iter().map(|p| parse_restriction(p).unwrap()).collect()
    }

    #[test]
    fn test_partial_partition_key_needs_filtering() {
        assert!(needs_allow_filtering(&relation(), &remote(&["pk1 = 1"])));
        assert!(!needs_allow_filtering(&relation(), &remote(&["pk1 = 1", "pk2 = 2"])));
    }

    #[test]
    fn test_in_counts_as_equality() {
        assert!(!needs_allow_filtering(&relation(), &remote(&["pk1 IN (1, 2)", "pk2 = 2"])));
    }

    #[test]
    fn test_empty_remote_or_missing_key() {
        assert!(needs_allow_filtering(&relation(), &[]));
        let keyless = RelationDescriptor::new("ks", "t", vec![Column::new("a", DataType::Integer)]);
        assert!(needs_allow_filtering(&keyless, &remote(&["a = 1"])));
    }

    #[test]
    fn test_range_on_partition_key() {
        assert!(needs_allow_filtering(&relation(), &remote(&["pk1 > 1", "pk2 = 2"])));
    }

    #[test]
    fn test_regular_column_needs_filtering() {
        assert!(needs_allow_filtering(&relation(), &remote(&["pk1 = 1", "pk2 = 2", "v = 'x'"])));
    }

    #[test]
    fn test_clustering_prefix() {
        assert!(!needs_allow_filtering(&relation(), &remote(&["pk1 = 1", "pk2 = 2", "ck1 > 3"])));
        assert!(!needs_allow_filtering(
            &relation(),
            &remote(&["pk1 = 1", "pk2 = 2", "ck1 = 3", "ck2 <= 4"])
        ));
        assert!(needs_allow_filtering(&relation(), &remote(&["pk1 = 1", "pk2 = 2", "ck2 = 4"])));
        assert!(needs_allow_filtering(
            &relation(),
            &remote(&["pk1 = 1", "pk2 = 2", "ck1 > 3", "ck2 = 4"])
        ));
    }

    #[test]
    fn test_not_equal_needs_filtering() {
        assert!(needs_allow_filtering(&relation(), &remote(&["pk1 = 1", "pk2 = 2", "ck1 != 3"])));
    }

    #[test]
    fn test_nested_and_is_seen_through() {
        let nested = vec![Expr::and(remote(&["pk1 = 1", "pk2 = 2"]))];
        assert!(!needs_allow_filtering(&relation(), &nested));
    }
}
