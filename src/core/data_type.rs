use serde::{Deserialize, Serialize};
use std::fmt;

/// Relational (semantic) column types known to the bridge.
///
/// `Json` and `Other` have no dedicated wire encoding and travel as text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    // Boolean
    Boolean,
    // Numeric types
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    // String types
    Text,
    Varchar,
    Char,
    // Binary
    Bytea,
    // Special types
    Uuid,
    Inet,
    // Date/Time types
    Timestamp,
    TimestampTz,
    Date,
    Time,
    // Text fallback
    Json,
    Other,
}

impl DataType {
    /// Every known type, in declaration order
    pub const ALL: [Self; 19] = [
        Self::Boolean,
        Self::SmallInt,
        Self::Integer,
        Self::BigInt,
        Self::Real,
        Self::DoublePrecision,
        Self::Numeric,
        Self::Text,
        Self::Varchar,
        Self::Char,
        Self::Bytea,
        Self::Uuid,
        Self::Inet,
        Self::Timestamp,
        Self::TimestampTz,
        Self::Date,
        Self::Time,
        Self::Json,
        Self::Other,
    ];

    /// Whether values of this type may appear in a predicate sent to the remote.
    #[must_use]
    pub const fn is_pushdown_safe(self) -> bool {
        !matches!(self, Self::Json | Self::Other)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::SmallInt
                | Self::Integer
                | Self::BigInt
                | Self::Real
                | Self::DoublePrecision
                | Self::Numeric
        )
    }

    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Varchar | Self::Char)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::DoublePrecision => "double precision",
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Varchar => "varchar",
            Self::Char => "bpchar",
            Self::Bytea => "bytea",
            Self::Uuid => "uuid",
            Self::Inet => "inet",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamp with time zone",
            Self::Date => "date",
            Self::Time => "time",
            Self::Json => "json",
            Self::Other => "other",
        }
    }

    /// Parse a relational type name, accepting the usual aliases.
    /// Length/precision modifiers such as `varchar(20)` are ignored.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let base = name.split('(').next().unwrap_or(name).trim().to_lowercase();
        let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
        let ty = match base.as_str() {
            "bool" | "boolean" => Self::Boolean,
            "int2" | "smallint" => Self::SmallInt,
            "int" | "int4" | "integer" => Self::Integer,
            "int8" | "bigint" => Self::BigInt,
            "float4" | "real" => Self::Real,
            "float8" | "double precision" | "double" => Self::DoublePrecision,
            "numeric" | "decimal" => Self::Numeric,
            "text" => Self::Text,
            "varchar" | "character varying" => Self::Varchar,
            "char" | "character" | "bpchar" => Self::Char,
            "bytea" => Self::Bytea,
            "uuid" => Self::Uuid,
            "inet" => Self::Inet,
            "timestamp" | "timestamp without time zone" => Self::Timestamp,
            "timestamptz" | "timestamp with time zone" => Self::TimestampTz,
            "date" => Self::Date,
            "time" | "time without time zone" => Self::Time,
            "json" | "jsonb" => Self::Json,
            "other" => Self::Other,
            _ => return None,
        };
        Some(ty)
    }

    /// Relational type for a remote CQL column type.
    ///
    /// Collections, tuples, user-defined and custom types are read as text.
    #[must_use]
    pub fn from_cql(cql_type: &str) -> Self {
        match cql_type.trim().to_lowercase().as_str() {
            "text" | "ascii" | "varchar" => Self::Text,
            "int" => Self::Integer,
            "bigint" | "counter" => Self::BigInt,
            "smallint" | "tinyint" => Self::SmallInt,
            "float" => Self::Real,
            "double" => Self::DoublePrecision,
            "boolean" => Self::Boolean,
            "uuid" | "timeuuid" => Self::Uuid,
            "timestamp" => Self::TimestampTz,
            "date" => Self::Date,
            "time" => Self::Time,
            "blob" => Self::Bytea,
            "inet" => Self::Inet,
            "decimal" | "varint" => Self::Numeric,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
