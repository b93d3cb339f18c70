//! Parser for the CQL subset the bridge emits: single-table SELECT with
//! conjunctive relations, and the INSERT/UPDATE/DELETE shapes used for
//! prepared modifications.

use super::common::{identifier, keyword, literal, ws};
use super::expr::CompareOp;
use super::restriction::compare_op;
use crate::core::Value;
use nom::{
    branch::alt,
    character::complete::char,
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum CqlTerm {
    /// `?` bind marker
    Marker,
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CqlRelation {
    Compare {
        column: String,
        op: CompareOp,
        term: CqlTerm,
    },
    In {
        column: String,
        terms: Vec<CqlTerm>,
    },
}

impl CqlRelation {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Compare { column, .. } | Self::In { column, .. } => column,
        }
    }

    fn terms(&self) -> &[CqlTerm] {
        match self {
            Self::Compare { term, .. } => std::slice::from_ref(term),
            Self::In { terms, .. } => terms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CqlStatement {
    Select {
        /// Empty for `SELECT *`
        columns: Vec<String>,
        keyspace: String,
        table: String,
        relations: Vec<CqlRelation>,
        allow_filtering: bool,
    },
    Insert {
        keyspace: String,
        table: String,
        columns: Vec<String>,
        values: Vec<CqlTerm>,
    },
    Update {
        keyspace: String,
        table: String,
        assignments: Vec<(String, CqlTerm)>,
        relations: Vec<CqlRelation>,
    },
    Delete {
        keyspace: String,
        table: String,
        relations: Vec<CqlRelation>,
    },
}

impl CqlStatement {
    #[must_use]
    pub fn target(&self) -> (&str, &str) {
        match self {
            Self::Select { keyspace, table, .. }
            | Self::Insert { keyspace, table, .. }
            | Self::Update { keyspace, table, .. }
            | Self::Delete { keyspace, table, .. } => (keyspace, table),
        }
    }

    /// Number of `?` markers, in statement order.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        let markers = |terms: &[CqlTerm]| terms.iter().filter(|t| **t == CqlTerm::Marker).count();
        let in_relations = |relations: &[CqlRelation]| -> usize {
            relations.iter().map(|r| markers(r.terms())).sum()
        };
        match self {
            Self::Select { relations, .. } | Self::Delete { relations, .. } => in_relations(relations),
            Self::Insert { values, .. } => markers(values),
            Self::Update {
                assignments,
                relations,
                ..
            } => {
                assignments.iter().filter(|(_, t)| *t == CqlTerm::Marker).count()
                    + in_relations(relations)
            }
        }
    }
}

fn cql_literal(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Double(f64::NAN), keyword("NaN")),
        value(Value::Double(f64::INFINITY), keyword("Infinity")),
        value(Value::Double(f64::NEG_INFINITY), preceded(char('-'), keyword("Infinity"))),
        literal,
    ))(input)
}

fn term(input: &str) -> IResult<&str, CqlTerm> {
    ws(alt((
        value(CqlTerm::Marker, char('?')),
        map(cql_literal, CqlTerm::Value),
    )))(input)
}

fn qualified_name(input: &str) -> IResult<&str, (String, String)> {
    ws(separated_pair(identifier, char('.'), identifier))(input)
}

fn relation(input: &str) -> IResult<&str, CqlRelation> {
    let (input, column) = ws(identifier)(input)?;
    alt((
        map(
            preceded(
                ws(keyword("IN")),
                delimited(char('('), separated_list1(char(','), term), ws(char(')'))),
            ),
            {
                let column = column.clone();
                move |terms| CqlRelation::In {
                    column: column.clone(),
                    terms,
                }
            },
        ),
        map(pair(ws(compare_op), term), move |(op, term)| CqlRelation::Compare {
            column: column.clone(),
            op,
            term,
        }),
    ))(input)
}

fn where_clause(input: &str) -> IResult<&str, Vec<CqlRelation>> {
    preceded(ws(keyword("WHERE")), separated_list1(ws(keyword("AND")), relation))(input)
}

fn column_list(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char(','), ws(identifier))(input)
}

fn select(input: &str) -> IResult<&str, CqlStatement> {
    let (input, _) = ws(keyword("SELECT"))(input)?;
    let (input, columns) = alt((value(Vec::new(), ws(char('*'))), column_list))(input)?;
    let (input, _) = ws(keyword("FROM"))(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, relations) = opt(where_clause)(input)?;
    let (input, allow_filtering) = opt(tuple((ws(keyword("ALLOW")), ws(keyword("FILTERING")))))(input)?;

    Ok((
        input,
        CqlStatement::Select {
            columns,
            keyspace,
            table,
            relations: relations.unwrap_or_default(),
            allow_filtering: allow_filtering.is_some(),
        },
    ))
}

fn insert(input: &str) -> IResult<&str, CqlStatement> {
    let (input, _) = ws(keyword("INSERT"))(input)?;
    let (input, _) = ws(keyword("INTO"))(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, columns) = delimited(char('('), column_list, ws(char(')')))(input)?;
    let (input, _) = ws(keyword("VALUES"))(input)?;
    let (input, values) = delimited(char('('), separated_list1(char(','), term), ws(char(')')))(input)?;

    Ok((
        input,
        CqlStatement::Insert {
            keyspace,
            table,
            columns,
            values,
        },
    ))
}

fn update(input: &str) -> IResult<&str, CqlStatement> {
    let (input, _) = ws(keyword("UPDATE"))(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, _) = ws(keyword("SET"))(input)?;
    let (input, assignments) = separated_list1(
        char(','),
        separated_pair(ws(identifier), char('='), term),
    )(input)?;
    let (input, relations) = where_clause(input)?;

    Ok((
        input,
        CqlStatement::Update {
            keyspace,
            table,
            assignments,
            relations,
        },
    ))
}

fn delete(input: &str) -> IResult<&str, CqlStatement> {
    let (input, _) = ws(keyword("DELETE"))(input)?;
    let (input, _) = ws(keyword("FROM"))(input)?;
    let (input, (keyspace, table)) = qualified_name(input)?;
    let (input, relations) = where_clause(input)?;

    Ok((
        input,
        CqlStatement::Delete {
            keyspace,
            table,
            relations,
        },
    ))
}

pub fn parse_cql(input: &str) -> Result<CqlStatement, String> {
    let input = input.trim().trim_end_matches(';');
    all_consuming(alt((select, insert, update, delete)))(input)
        .map(|(_, statement)| statement)
        .map_err(|e| format!("Failed to parse CQL '{input}': {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_with_relations() {
        let stmt = parse_cql(
            "SELECT pk, ck, v FROM ks.t WHERE pk = 5 AND ck > 10 AND v IN ('a', 'b') ALLOW FILTERING",
        )
        .unwrap();
        match stmt {
            CqlStatement::Select {
                columns,
                keyspace,
                table,
                relations,
                allow_filtering,
            } => {
                assert_eq!(columns, vec!["pk", "ck", "v"]);
                assert_eq!((keyspace.as_str(), table.as_str()), ("ks", "t"));
                assert_eq!(relations.len(), 3);
                assert_eq!(
                    relations[1],
                    CqlRelation::Compare {
                        column: "ck".to_string(),
                        op: CompareOp::Gt,
                        term: CqlTerm::Value(Value::Integer(10)),
                    }
                );
                assert!(matches!(&relations[2], CqlRelation::In { terms, .. } if terms.len() == 2));
                assert!(allow_filtering);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_select_star_without_where() {
        let stmt = parse_cql("SELECT * FROM \"Ks\".\"Events\";").unwrap();
        assert_eq!(stmt.target(), ("Ks", "Events"));
        assert!(matches!(stmt, CqlStatement::Select { ref columns, allow_filtering: false, .. } if columns.is_empty()));
    }

    #[test]
    fn test_special_floats() {
        let stmt = parse_cql("SELECT v FROM ks.t WHERE v = -Infinity").unwrap();
        let CqlStatement::Select { relations, .. } = stmt else {
            panic!("not a select");
        };
        assert!(matches!(
            &relations[0],
            CqlRelation::Compare { term: CqlTerm::Value(Value::Double(d)), .. } if *d == f64::NEG_INFINITY
        ));
    }

    #[test]
    fn test_modification_shapes() {
        let insert = parse_cql("INSERT INTO ks.t (id, name) VALUES (?, ?)").unwrap();
        assert_eq!(insert.marker_count(), 2);

        let update = parse_cql("UPDATE ks.t SET a = ?, b = ? WHERE k1 = ? AND k2 = ?").unwrap();
        assert_eq!(update.marker_count(), 4);
        assert!(matches!(&update, CqlStatement::Update { assignments, .. } if assignments[1].0 == "b"));

        let delete = parse_cql("DELETE FROM ks.t WHERE id = ?").unwrap();
        assert_eq!(delete.marker_count(), 1);
        assert_eq!(delete.target(), ("ks", "t"));
    }

    #[test]
    fn test_rejects_unsupported_statements() {
        assert!(parse_cql("TRUNCATE ks.t").is_err());
        assert!(parse_cql("SELECT a FROM t").is_err());
        assert!(parse_cql("DELETE FROM ks.t").is_err());
    }
}
