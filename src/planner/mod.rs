// Module declarations
pub mod allow_filtering;
pub mod classify;
pub mod cost;
pub mod deparse;
pub mod explain;

pub use allow_filtering::needs_allow_filtering;
pub use classify::{classify, Classified, ClassifyOptions, PUSHDOWN_OPERATORS};
pub use cost::{estimate, Baseline, CostEstimate};
pub use deparse::{count_placeholders, quote_identifier, render_literal};
pub use explain::{explain, explain_modify};

use crate::core::{DataType, RelationDescriptor, SchemaError};
use crate::parser::Expr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

pub(crate) fn serialize_exprs<S: serde::Serializer>(exprs: &[Expr], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(exprs.iter().map(ToString::to_string))
}

/// Everything a scan needs, fixed at plan time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    /// Attribute indexes the host asked for
    pub projection: Vec<usize>,
    #[serde(serialize_with = "serialize_exprs")]
    pub remote: Vec<Expr>,
    #[serde(serialize_with = "serialize_exprs")]
    pub local: Vec<Expr>,
    pub allow_filtering: bool,
    pub cql: String,
    /// Attribute index of each column in the SELECT list, in order
    pub retrieved: Vec<usize>,
    pub estimate: CostEstimate,
}

/// Which row image a bind slot reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    NewValue,
    KeyValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSlot {
    pub attr: usize,
    pub column: String,
    pub data_type: DataType,
    pub source: SlotSource,
}

/// A prepared modification: statement text plus the exact order in which
/// values must be bound to its markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyPlan {
    pub kind: OpKind,
    pub cql: String,
    pub slots: Vec<ParamSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Plan {
    Query(QueryPlan),
    Modify(ModifyPlan),
}

/// Plans scans and modifications against one relation.
#[derive(Debug, Clone)]
pub struct Planner<'a> {
    relation: &'a RelationDescriptor,
    options: ClassifyOptions,
    baseline: Baseline,
}

impl<'a> Planner<'a> {
    #[must_use]
    pub fn new(relation: &'a RelationDescriptor) -> Self {
        Self {
            relation,
            options: ClassifyOptions::default(),
            baseline: Baseline::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ClassifyOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    fn check_attrs(&self, attrs: &[usize]) -> Result<(), SchemaError> {
        for &attr in attrs {
            match self.relation.columns.get(attr) {
                Some(column) if !column.dropped => {}
                Some(column) => return Err(SchemaError::UnknownColumn(column.name.clone())),
                None => return Err(SchemaError::UnknownColumn(format!("#{attr}"))),
            }
        }
        Ok(())
    }

    fn slot(&self, attr: usize, source: SlotSource) -> ParamSlot {
        let column = &self.relation.columns[attr];
        ParamSlot {
            attr,
            column: column.name.clone(),
            data_type: column.data_type,
            source,
        }
    }

    fn key_attrs(&self) -> Result<Vec<usize>, SchemaError> {
        if !self.relation.has_primary_key() {
            return Err(self.relation.missing_primary_key());
        }
        self.relation
            .primary_key()
            .map(|name| self.relation.require_column(name))
            .collect()
    }

    fn finish(&self, kind: OpKind, cql: String, slots: Vec<ParamSlot>) -> ModifyPlan {
        let markers = deparse::count_placeholders(&cql);
        assert_eq!(
            markers,
            slots.len(),
            "{kind} statement has {markers} markers for {} bind slots: {cql}",
            slots.len()
        );
        tracing::debug!(%kind, cql = %cql, slots = slots.len(), "planned modification");
        ModifyPlan { kind, cql, slots }
    }

    /// Plan a scan of `projection` filtered by `restriction`.
    pub fn plan_scan(&self, projection: &[usize], restriction: Option<&Expr>) -> Result<QueryPlan, SchemaError> {
        self.relation.validate()?;
        self.check_attrs(projection)?;
        if let Some(expr) = restriction {
            let mut names = Vec::new();
            expr.columns(&mut names);
            for name in names {
                self.relation.require_column(name)?;
            }
        }

        let classified = classify(self.relation, restriction, self.options);
        let allow_filtering = needs_allow_filtering(self.relation, &classified.remote);
        let retrieved = deparse::retrieved_columns(self.relation, projection, &classified.local);
        let cql = deparse::deparse_select(self.relation, &retrieved, &classified.remote, allow_filtering)?;
        let estimate = estimate(self.relation, &classified, self.baseline);

        tracing::debug!(cql = %cql, allow_filtering, "planned scan");
        Ok(QueryPlan {
            projection: projection.to_vec(),
            remote: classified.remote,
            local: classified.local,
            allow_filtering,
            cql,
            retrieved,
            estimate,
        })
    }

    /// Plan an INSERT of `targets`; an empty list means every live column.
    pub fn plan_insert(&self, targets: &[usize]) -> Result<ModifyPlan, SchemaError> {
        self.relation.validate()?;
        self.check_attrs(targets)?;
        let targets: Vec<usize> = if targets.is_empty() {
            self.relation.live_columns().collect()
        } else {
            targets.to_vec()
        };

        let cql = deparse::deparse_insert(self.relation, &targets);
        let slots = targets
            .iter()
            .map(|&attr| self.slot(attr, SlotSource::NewValue))
            .collect();
        Ok(self.finish(OpKind::Insert, cql, slots))
    }

    /// Plan an UPDATE setting the non-key columns among `targets` (all
    /// non-key columns when none are given), keyed on the full primary key.
    pub fn plan_update(&self, targets: &[usize]) -> Result<ModifyPlan, SchemaError> {
        self.relation.validate()?;
        self.check_attrs(targets)?;
        let key = self.key_attrs()?;

        let non_key = |attr: &usize| !key.contains(attr);
        let mut set: Vec<usize> = targets.iter().copied().filter(non_key).collect();
        if set.is_empty() {
            set = self.relation.live_columns().filter(non_key).collect();
        }
        if set.is_empty() {
            return Err(SchemaError::NothingToUpdate);
        }

        let cql = deparse::deparse_update(self.relation, &set, &key);
        let slots = set
            .iter()
            .map(|&attr| self.slot(attr, SlotSource::NewValue))
            .chain(key.iter().map(|&attr| self.slot(attr, SlotSource::KeyValue)))
            .collect();
        Ok(self.finish(OpKind::Update, cql, slots))
    }

    pub fn plan_delete(&self) -> Result<ModifyPlan, SchemaError> {
        self.relation.validate()?;
        let key = self.key_attrs()?;
        let cql = deparse::deparse_delete(self.relation, &key);
        let slots = key
            .iter()
            .map(|&attr| self.slot(attr, SlotSource::KeyValue))
            .collect();
        Ok(self.finish(OpKind::Delete, cql, slots))
    }

    /// Single entry point: `columns` is the projection for a SELECT and the
    /// target list for INSERT/UPDATE. The restriction only applies to SELECT;
    /// modifications address rows by primary key.
    pub fn plan(&self, columns: &[usize], restriction: Option<&Expr>, op: OpKind) -> Result<Plan, SchemaError> {
        match op {
            OpKind::Select => self.plan_scan(columns, restriction).map(Plan::Query),
            OpKind::Insert => self.plan_insert(columns).map(Plan::Modify),
            OpKind::Update => self.plan_update(columns).map(Plan::Modify),
            OpKind::Delete => self.plan_delete().map(Plan::Modify),
        }
    }
}

/// Plan with default classification options and baseline.
pub fn plan(
    relation: &RelationDescriptor,
    columns: &[usize],
    restriction: Option<&Expr>,
    op: OpKind,
) -> Result<Plan, SchemaError> {
    Planner::new(relation).plan(columns, restriction, op)
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
                Column::new("k1", DataType::Integer),
                Column::new("k2", DataType::Text),
                Column::new("a", DataType::Text),
                Column::new("b", DataType::BigInt),
            ],
        )
        .with_partition_key(&["k1"])
        .with_clustering_key(&["k2"])
    }

    #[test]
    fn test_update_binds_set_then_key() {
        let rel = relation();
        let plan = Planner::new(&rel).plan_update(&[2, 3]).unwrap();
        assert_eq!(plan.cql, "UPDATE ks.tbl SET a = ?, b = ? WHERE k1 = ? AND k2 = ?");
        let order: Vec<_> = plan.slots.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "k1", "k2"]);
        assert_eq!(plan.slots[0].source, SlotSource::NewValue);
        assert_eq!(plan.slots[3].source, SlotSource::KeyValue);
    }

    #[test]
    fn test_update_ignores_key_targets() {
        let rel = relation();
        let plan = Planner::new(&rel).plan_update(&[0, 3]).unwrap();
        assert_eq!(plan.cql, "UPDATE ks.tbl SET b = ? WHERE k1 = ? AND k2 = ?");
    }

    #[test]
    fn test_update_defaults_to_all_non_key_columns() {
        let rel = relation();
        let plan = Planner::new(&rel).plan_update(&[]).unwrap();
        assert_eq!(plan.slots.len(), 4);
    }

    #[test]
    fn test_update_with_only_key_columns() {
        let rel = RelationDescriptor::new("ks", "t", vec![Column::new("id", DataType::Integer)])
            .with_partition_key(&["id"]);
        assert_eq!(Planner::new(&rel).plan_update(&[0]), Err(SchemaError::NothingToUpdate));
    }

    #[test]
    fn test_modifications_need_primary_key() {
        let rel = RelationDescriptor::new("ks", "t", vec![Column::new("id", DataType::Integer)]);
        let err = Planner::new(&rel).plan_delete().unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingPrimaryKey {
                keyspace: "ks".to_string(),
                table: "t".to_string()
            }
        );
        assert!(Planner::new(&rel).plan_update(&[0]).is_err());
        assert!(Planner::new(&rel).plan_insert(&[0]).is_ok());
    }

    #[test]
    fn test_insert_defaults_to_live_columns() {
        let mut rel = relation();
        rel.columns.push(Column::new("old", DataType::Text).dropped());
        let plan = Planner::new(&rel).plan_insert(&[]).unwrap();
        assert_eq!(plan.cql, "INSERT INTO ks.tbl (k1, k2, a, b) VALUES (?, ?, ?, ?)");
        assert!(plan.slots.iter().all(|s| s.source == SlotSource::NewValue));
    }

    #[test]
    fn test_scan_rejects_unknown_columns() {
        let rel = relation();
        let expr = parse_restriction("nope = 1").unwrap();
        assert_eq!(
            Planner::new(&rel).plan_scan(&[0], Some(&expr)),
            Err(SchemaError::UnknownColumn("nope".to_string()))
        );
        assert!(Planner::new(&rel).plan_scan(&[9], None).is_err());
    }

    #[test]
    fn test_scan_plan() {
        let rel = relation();
        let expr = parse_restriction("k1 = 5 AND k2 > 'm' AND a LIKE 'x%'").unwrap();
        let plan = Planner::new(&rel).plan_scan(&[3], Some(&expr)).unwrap();
        assert_eq!(plan.remote.len(), 2);
        assert_eq!(plan.local.len(), 1);
        assert!(!plan.allow_filtering);
        assert_eq!(plan.retrieved, vec![2, 3]);
        assert_eq!(plan.cql, "SELECT a, b FROM ks.tbl WHERE k1 = 5 AND k2 > 'm'");
    }

    #[test]
    fn test_not_equal_can_be_kept_local() {
        let rel = relation();
        let expr = parse_restriction("k1 = 5 AND b != 3").unwrap();
        let strict = ClassifyOptions {
            pushdown_not_equal: false,
        };
        let plan = Planner::new(&rel).with_options(strict).plan_scan(&[0], Some(&expr)).unwrap();
        assert_eq!(plan.cql, "SELECT k1, b FROM ks.tbl WHERE k1 = 5");
        assert!(!plan.allow_filtering);
    }

    #[test]
    fn test_op_kind_parse() {
        assert_eq!("Delete".parse::<OpKind>(), Ok(OpKind::Delete));
        assert!("merge".parse::<OpKind>().is_err());
    }
}
