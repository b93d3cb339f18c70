//! CQL text generation for scans and modifications.

use crate::core::{DataType, RelationDescriptor, SchemaError, Value};
use crate::parser::{is_reserved, BoolOp, ColumnRelation, Expr};

/// Quote an identifier unless it is a plain lower-case name.
///
/// `[a-z_][a-z0-9_]*` passes through bare; anything else is wrapped in
/// double quotes with embedded quotes doubled.
#[must_use]
pub fn quote_identifier(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !is_reserved(ident);

    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn unrenderable(value: &Value) -> SchemaError {
    SchemaError::UnsupportedExpression(format!("literal {value} has no CQL form"))
}

/// Render a value as a CQL literal.
pub fn render_literal(value: &Value) -> Result<String, SchemaError> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::SmallInt(v) => v.to_string(),
        Value::Integer(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Numeric(n) => n.to_string(),
        Value::Real(v) => render_float(f64::from(*v)),
        Value::Double(v) => render_float(*v),
        Value::Text(s) => quote_text(s),
        Value::Bytea(bytes) => format!("0x{}", hex::encode(bytes)),
        Value::Uuid(u) => u.hyphenated().to_string(),
        Value::Timestamp(_) => {
            let ts = value.to_naive_datetime().ok_or_else(|| unrenderable(value))?;
            quote_text(&ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        }
        Value::TimestampTz(_) => {
            let ts = value.to_naive_datetime().ok_or_else(|| unrenderable(value))?;
            quote_text(&ts.format("%Y-%m-%d %H:%M:%S%.3f+0000").to_string())
        }
        Value::Date(_) => {
            let date = value.to_naive_date().ok_or_else(|| unrenderable(value))?;
            quote_text(&date.format("%Y-%m-%d").to_string())
        }
        Value::Time(_) | Value::Inet(_) => quote_text(&value.to_string()),
    })
}

fn render_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() && v.is_sign_positive() {
        "Infinity".to_string()
    } else if v.is_infinite() {
        "-Infinity".to_string()
    } else {
        v.to_string()
    }
}

fn render_term(term: &Expr, column_type: DataType) -> Result<String, SchemaError> {
    match term.unwrap_casts() {
        Expr::Literal(value) => {
            let coerced = value
                .cast_to(column_type)
                .map_err(|e| SchemaError::UnsupportedExpression(e.to_string()))?;
            render_literal(&coerced)
        }
        other => Err(SchemaError::UnsupportedExpression(other.to_string())),
    }
}

/// Render one remote predicate as CQL relations joined by `AND`.
pub fn render_predicate(relation: &RelationDescriptor, expr: &Expr) -> Result<String, SchemaError> {
    if let Expr::Bool {
        op: BoolOp::And,
        args,
    } = expr.unwrap_casts()
    {
        let parts = args
            .iter()
            .map(|arg| render_predicate(relation, arg))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(parts.join(" AND "));
    }

    let column_type = |name: &str| {
        relation
            .column_type(name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))
    };
    match expr.column_relation() {
        Some(ColumnRelation::Compare { column, op, value }) => Ok(format!(
            "{} {} {}",
            quote_identifier(column),
            op.symbol(),
            render_term(value, column_type(column)?)?
        )),
        Some(ColumnRelation::In { column, values }) => {
            let ty = column_type(column)?;
            let items = values
                .iter()
                .map(|v| render_term(v, ty))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("{} IN ({})", quote_identifier(column), items.join(", ")))
        }
        None => Err(SchemaError::UnsupportedExpression(expr.to_string())),
    }
}

fn table_name(relation: &RelationDescriptor) -> String {
    format!(
        "{}.{}",
        quote_identifier(&relation.keyspace),
        quote_identifier(&relation.table)
    )
}

fn column_names(relation: &RelationDescriptor, attrs: &[usize]) -> Vec<String> {
    attrs
        .iter()
        .map(|&idx| quote_identifier(&relation.columns[idx].name))
        .collect()
}

/// Columns a scan must fetch: the projection plus whatever local filters
/// read, in relation order. Falls back to the first live column because a
/// zero-column SELECT is invalid.
#[must_use]
pub fn retrieved_columns(relation: &RelationDescriptor, projection: &[usize], local: &[Expr]) -> Vec<usize> {
    let mut referenced = Vec::new();
    for expr in local {
        expr.columns(&mut referenced);
    }

    let mut retrieved: Vec<usize> = relation
        .live_columns()
        .filter(|idx| {
            projection.contains(idx) || referenced.contains(&relation.columns[*idx].name.as_str())
        })
        .collect();

    if retrieved.is_empty() {
        retrieved.extend(relation.live_columns().next());
    }
    retrieved
}

/// `SELECT c1, c2 FROM ks.tbl [WHERE r1 AND r2] [ALLOW FILTERING]`
pub fn deparse_select(
    relation: &RelationDescriptor,
    retrieved: &[usize],
    remote: &[Expr],
    allow_filtering: bool,
) -> Result<String, SchemaError> {
    if retrieved.is_empty() {
        return Err(SchemaError::NoColumns);
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        column_names(relation, retrieved).join(", "),
        table_name(relation)
    );

    if !remote.is_empty() {
        let relations = remote
            .iter()
            .map(|expr| render_predicate(relation, expr))
            .collect::<Result<Vec<_>, _>>()?;
        sql.push_str(" WHERE ");
        sql.push_str(&relations.join(" AND "));
    }

    if allow_filtering {
        sql.push_str(" ALLOW FILTERING");
    }
    Ok(sql)
}

fn placeholders(attrs: &[usize], relation: &RelationDescriptor) -> Vec<String> {
    column_names(relation, attrs)
        .into_iter()
        .map(|name| format!("{name} = ?"))
        .collect()
}

/// `INSERT INTO ks.tbl (c1, c2) VALUES (?, ?)`
#[must_use]
pub fn deparse_insert(relation: &RelationDescriptor, targets: &[usize]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_name(relation),
        column_names(relation, targets).join(", "),
        vec!["?"; targets.len()].join(", ")
    )
}

/// `UPDATE ks.tbl SET a = ?, b = ? WHERE k1 = ? AND k2 = ?`
#[must_use]
pub fn deparse_update(relation: &RelationDescriptor, targets: &[usize], key: &[usize]) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        table_name(relation),
        placeholders(targets, relation).join(", "),
        placeholders(key, relation).join(" AND ")
    )
}

/// `DELETE FROM ks.tbl WHERE k1 = ? AND k2 = ?`
#[must_use]
pub fn deparse_delete(relation: &RelationDescriptor, key: &[usize]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        table_name(relation),
        placeholders(key, relation).join(" AND ")
    )
}

/// Count `?` markers outside quoted literals and identifiers.
#[must_use]
pub fn count_placeholders(cql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in cql.chars() {
        match (quote, c) {
            // A doubled quote toggles twice and stays inside the literal
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '?') => count += 1,
            (None, _) => {}
        }
    }
    count
}
