// Module declarations
mod common;
pub mod cql;
pub mod expr;
mod restriction;

pub use common::{data_type, is_reserved};
pub use cql::{parse_cql, CqlRelation, CqlStatement, CqlTerm};
pub use expr::{BoolOp, ColumnRelation, CompareOp, Expr};
pub use restriction::parse_restriction;

/// Parse a relational type name such as `timestamp with time zone`.
pub fn parse_data_type(input: &str) -> Result<crate::core::DataType, String> {
    nom::combinator::all_consuming(common::ws(data_type))(input)
        .map(|(_, ty)| ty)
        .map_err(|_| format!("Unknown type '{}'", input.trim()))
}

/// Read back an identifier as written in CQL: bare names fold to lower
/// case, double-quoted names are taken verbatim with `""` unescaped.
pub fn parse_identifier(input: &str) -> Result<String, String> {
    nom::combinator::all_consuming(common::identifier)(input)
        .map(|(_, name)| name)
        .map_err(|_| format!("Invalid identifier '{input}'"))
}

/// Parse a comma-separated `name:type` list, e.g. `id:bigint,name:text`.
pub fn parse_column_list(input: &str) -> Result<Vec<crate::core::Column>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, ty) = part
                .split_once(':')
                .ok_or_else(|| format!("Expected name:type, got '{part}'"))?;
            Ok(crate::core::Column::new(name.trim(), parse_data_type(ty)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    #[test]
    fn test_parse_column_list() {
        let columns = parse_column_list("id:bigint, name:text,ts:timestamp with time zone").unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[2].name, "ts");
        assert_eq!(columns[2].data_type, DataType::TimestampTz);
        assert!(parse_column_list("id").is_err());
        assert!(parse_column_list("id:geometry").is_err());
    }
}
