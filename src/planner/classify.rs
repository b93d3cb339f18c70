//! Split a restriction into the conjuncts CQL can evaluate remotely and the
//! ones the host must check itself.

use crate::core::{DataType, RelationDescriptor, Value};
use crate::parser::{BoolOp, ColumnRelation, CompareOp, Expr};
use serde::Serialize;
use std::cmp::Ordering;

/// Operators that may appear in a remote relation.
pub const PUSHDOWN_OPERATORS: &[CompareOp] = &[
    CompareOp::Eq,
    CompareOp::Lt,
    CompareOp::Gt,
    CompareOp::LtEq,
    CompareOp::GtEq,
    CompareOp::NotEq,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// `!=` support varies between server versions
    pub pushdown_not_equal: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            pushdown_not_equal: true,
        }
    }
}

impl ClassifyOptions {
    #[must_use]
    pub fn allows(&self, op: CompareOp) -> bool {
        PUSHDOWN_OPERATORS.contains(&op) && (op != CompareOp::NotEq || self.pushdown_not_equal)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classified {
    #[serde(serialize_with = "super::serialize_exprs")]
    pub remote: Vec<Expr>,
    #[serde(serialize_with = "super::serialize_exprs")]
    pub local: Vec<Expr>,
}

/// Whether the CQL literal for `coerced` selects the same rows the host
/// would select with `original`.
fn renders_exactly(original: &Value, coerced: &Value) -> bool {
    match coerced {
        // CQL timestamps stop at milliseconds
        Value::Timestamp(us) | Value::TimestampTz(us) => us.rem_euclid(1_000) == 0,
        // Narrowing to float or to a day must not move the value
        Value::Real(_) | Value::Date(_) => coerced.compare(original) == Some(Ordering::Equal),
        _ => true,
    }
}

struct Classifier<'a> {
    relation: &'a RelationDescriptor,
    options: ClassifyOptions,
}

impl Classifier<'_> {
    fn column_type(&self, name: &str) -> Option<DataType> {
        self.relation
            .column_type(name)
            .filter(|ty| ty.is_pushdown_safe())
    }

    /// A literal is usable when it is non-null, of a pushdown-safe type and
    /// representable as a value of the column it is compared with.
    fn literal_fits(value: &Expr, column_type: DataType) -> bool {
        match value.unwrap_casts() {
            Expr::Literal(Value::Null) => false,
            Expr::Literal(v) => {
                v.data_type().is_some_and(DataType::is_pushdown_safe)
                    && v.cast_to(column_type).is_ok_and(|coerced| renders_exactly(v, &coerced))
            }
            _ => false,
        }
    }

    fn is_remote(&self, expr: &Expr) -> bool {
        match expr.unwrap_casts() {
            Expr::Bool {
                op: BoolOp::And,
                args,
            } => !args.is_empty() && args.iter().all(|arg| self.is_remote(arg)),
            Expr::Compare { .. } | Expr::InList { .. } => match expr.column_relation() {
                Some(ColumnRelation::Compare { column, op, value }) => {
                    self.options.allows(op)
                        && self
                            .column_type(column)
                            .is_some_and(|ty| Self::literal_fits(value, ty))
                }
                Some(ColumnRelation::In { column, values }) => {
                    self.column_type(column).is_some_and(|ty| {
                        !values.is_empty() && values.iter().all(|v| Self::literal_fits(v, ty))
                    })
                }
                None => false,
            },
            // OR, NOT, null tests, parameters, functions
            _ => false,
        }
    }
}

/// Classify each top-level conjunct of `restriction` independently.
///
/// A conjunct goes remote only if the whole subtree is pushable; an OR
/// anywhere keeps its subtree local in one piece.
#[must_use]
pub fn classify(
    relation: &RelationDescriptor,
    restriction: Option<&Expr>,
    options: ClassifyOptions,
) -> Classified {
    let classifier = Classifier { relation, options };
    let mut classified = Classified::default();

    let conjuncts = restriction.cloned().map(Expr::into_conjuncts).unwrap_or_default();
    for conjunct in conjuncts {
        if classifier.is_remote(&conjunct) {
            // A pushable AND contributes its children as separate relations
            classified.remote.extend(conjunct.into_conjuncts());
        } else {
            classified.local.push(conjunct);
        }
    }

    tracing::trace!(
        table = %relation.table,
        remote = classified.remote.len(),
        local = classified.local.len(),
        "classified restriction"
    );
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Column;
    use crate::parser::parse_restriction;

    fn relation() -> RelationDescriptor {
        RelationDescriptor::new(
            "ks",
            "tbl",
            vec![
                Column::new("pk", DataType::Integer),
                Column::new("ck", DataType::Integer),
                Column::new("other", DataType::Integer),
                Column::new("name", DataType::Text),
                Column::new("doc", DataType::Json),
            ],
        )
        .with_partition_key(&["pk"])
        .with_clustering_key(&["ck"])
    }

    fn run(text: &str) -> Classified {
        let expr = parse_restriction(text).unwrap();
        classify(&relation(), Some(&expr), ClassifyOptions::default())
    }

    #[test]
    fn test_single_equality_is_remote() {
        let c = run("pk = 5");
        assert_eq!(c.remote, vec![Expr::equals(Expr::col("pk"), Expr::lit(5))]);
        assert!(c.local.is_empty());
    }

    #[test]
    fn test_disjunction_stays_local_whole() {
        let c = run("pk = 5 OR other = 3");
        assert!(c.remote.is_empty());
        assert_eq!(c.local.len(), 1);
        assert!(matches!(c.local[0], Expr::Bool { op: BoolOp::Or, .. }));
    }

    #[test]
    fn test_conjuncts_are_independent() {
        let c = run("pk = 5 AND name IS NULL AND ck > 10");
        assert_eq!(c.remote.len(), 2);
        assert_eq!(c.local, vec![Expr::is_null(Expr::col("name"))]);
    }

    #[test]
    fn test_unsafe_types_stay_local() {
        let c = run("doc = '{}'");
        assert!(c.remote.is_empty());
        assert_eq!(c.local.len(), 1);
    }

    #[test]
    fn test_casts_are_unwrapped() {
        let c = run("pk::bigint = 5");
        assert_eq!(c.remote.len(), 1);
    }

    #[test]
    fn test_non_relation_shapes_stay_local() {
        for text in [
            "pk = ck",
            "name LIKE 'a%'",
            "pk = $1",
            "lower(name) = 'x'",
            "NOT pk = 5",
            "pk = NULL",
            "pk = 'seven'",
            "pk NOT IN (1, 2)",
        ] {
            let c = run(text);
            assert!(c.remote.is_empty(), "{text} should not be remote");
        }
    }

    #[test]
    fn test_in_list_is_remote() {
        let c = run("pk IN (1, 2, 3)");
        assert_eq!(c.remote.len(), 1);
    }

    #[test]
    fn test_not_equal_whitelist() {
        assert!(ClassifyOptions::default().allows(CompareOp::NotEq));
        assert!(!ClassifyOptions::default().allows(CompareOp::Like));

        let strict = ClassifyOptions {
            pushdown_not_equal: false,
        };
        let expr = parse_restriction("other != 3").unwrap();
        let c = classify(&relation(), Some(&expr), strict);
        assert!(c.remote.is_empty());
        assert_eq!(c.local.len(), 1);
    }

    #[test]
    fn test_literal_on_left_is_remote() {
        let c = run("10 < ck");
        assert_eq!(c.remote.len(), 1);
    }

    #[test]
    fn test_sub_millisecond_timestamps_stay_local() {
        let rel = RelationDescriptor::new(
            "ks",
            "events",
            vec![
                Column::new("source", DataType::Text),
                Column::new("at", DataType::TimestampTz),
            ],
        )
        .with_partition_key(&["source"])
        .with_clustering_key(&["at"]);
        let split = |text: &str| {
            let expr = parse_restriction(text).unwrap();
            classify(&rel, Some(&expr), ClassifyOptions::default())
        };

        assert_eq!(split("at >= '2024-03-01 10:00:00.001'").remote.len(), 1);
        for text in [
            "at >= '2024-03-01 10:00:00.0005'",
            "at = '2024-03-01 10:00:00.000001'",
            "at IN ('2024-03-01 10:00:00', '2024-03-01 10:00:00.0005')",
        ] {
            let c = split(text);
            assert!(c.remote.is_empty(), "{text} should stay local");
            assert_eq!(c.local.len(), 1);
        }
    }

    #[test]
    fn test_narrowed_float_literals_stay_local() {
        let rel = RelationDescriptor::new(
            "ks",
            "readings",
            vec![Column::new("id", DataType::Integer), Column::new("r", DataType::Real)],
        )
        .with_partition_key(&["id"]);
        let compare = |value: Value| {
            let expr = Expr::equals(Expr::col("r"), Expr::Literal(value));
            classify(&rel, Some(&expr), ClassifyOptions::default())
        };

        assert!(compare(Value::Double(0.1)).remote.is_empty());
        assert!(compare(Value::Numeric("0.1".parse().unwrap())).remote.is_empty());
        assert_eq!(compare(Value::Double(0.5)).remote.len(), 1);
        assert_eq!(compare(Value::Integer(3)).remote.len(), 1);
    }

    #[test]
    fn test_no_restriction() {
        let c = classify(&relation(), None, ClassifyOptions::default());
        assert_eq!(c, Classified::default());
    }
}
