use serde::{Deserialize, Serialize};
use super::column::Column;
use super::data_type::DataType;
use super::error::SchemaError;

/// Catalog view of one remote table: where it lives, its columns in host
/// order and its key layout. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub partition_key: Vec<String>,
    #[serde(default)]
    pub clustering_key: Vec<String>,
}

impl RelationDescriptor {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            columns,
            partition_key: Vec::new(),
            clustering_key: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_partition_key<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.partition_key = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_clustering_key<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.clustering_key = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    /// Index of a live (non-dropped) column
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| !c.dropped && c.name == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.column(name).map(|c| c.data_type)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, SchemaError> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))
    }

    /// Partition key columns followed by clustering key columns
    pub fn primary_key(&self) -> impl Iterator<Item = &str> {
        self.partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key().any(|k| k == name)
    }

    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        !self.partition_key.is_empty()
    }

    /// Indexes of all live columns, in declaration order
    pub fn live_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.dropped)
            .map(|(idx, _)| idx)
    }

    /// Check that column names are unique and every key column exists.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for column in self.columns.iter().filter(|c| !c.dropped) {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
        }
        if seen.is_empty() {
            return Err(SchemaError::NoColumns);
        }

        let mut keys = std::collections::HashSet::new();
        for key in self.primary_key() {
            self.require_column(key)?;
            if !keys.insert(key) {
                return Err(SchemaError::DuplicateColumn(key.to_string()));
            }
        }
        Ok(())
    }

    pub(crate) fn missing_primary_key(&self) -> SchemaError {
        SchemaError::MissingPrimaryKey {
            keyspace: self.keyspace.clone(),
            table: self.table.clone(),
        }
    }
}
