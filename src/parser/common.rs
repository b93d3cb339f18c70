use crate::core::{DataType, Numeric, Value};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_while, take_while_m_n},
    character::complete::{alpha1, char, digit1, hex_digit0, multispace0, multispace1, one_of, satisfy},
    combinator::{map, map_res, not, opt, recognize, value, verify},
    multi::fold_many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use uuid::Uuid;

/// Words that never parse as bare identifiers
const RESERVED: &[&str] = &[
    "and", "or", "not", "is", "in", "null", "true", "false", "like", "allow", "where", "from",
    "set", "values", "as", "cast",
];

/// Words that must be quoted to be read back as identifiers
#[must_use]
pub fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that is not the prefix of a longer word
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_ident_char)))
}

/// Unquoted identifier, folded to lower case
pub fn bare_identifier(input: &str) -> IResult<&str, String> {
    map(
        verify(
            recognize(pair(alt((alpha1, tag("_"))), take_while(is_ident_char))),
            |s: &str| !is_reserved(s),
        ),
        str::to_lowercase,
    )(input)
}

/// `"..."` identifier with `""` standing for an embedded quote; case is kept
pub fn quoted_identifier(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((is_not("\""), value("\"", tag("\"\"")))),
            String::new,
            |mut acc, part| {
                acc.push_str(part);
                acc
            },
        ),
        char('"'),
    )(input)
}

pub fn identifier(input: &str) -> IResult<&str, String> {
    alt((quoted_identifier, bare_identifier))(input)
}

/// `'...'` with `''` standing for an embedded quote
pub fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        fold_many0(
            alt((is_not("'"), value("'", tag("''")))),
            String::new,
            |mut acc, part| {
                acc.push_str(part);
                acc
            },
        ),
        char('\''),
    )(input)
}

fn hex_run<'a>(len: usize) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    take_while_m_n(len, len, |c: char| c.is_ascii_hexdigit())
}

/// Unquoted UUID: 8-4-4-4-12 hex digits
fn uuid_literal(input: &str) -> IResult<&str, Value> {
    map_res(
        terminated(
            recognize(tuple((
                hex_run(8),
                char('-'),
                hex_run(4),
                char('-'),
                hex_run(4),
                char('-'),
                hex_run(4),
                char('-'),
                hex_run(12),
            ))),
            not(satisfy(is_ident_char)),
        ),
        |s: &str| Uuid::parse_str(s).map(Value::Uuid),
    )(input)
}

/// `0x` followed by hex digit pairs
fn blob_literal(input: &str) -> IResult<&str, Value> {
    map_res(
        terminated(preceded(tag_no_case("0x"), hex_digit0), not(satisfy(is_ident_char))),
        |digits: &str| hex::decode(digits).map(Value::Bytea),
    )(input)
}

/// Integers become `Integer` or `BigInt`; anything with a fraction or
/// exponent stays exact as `Numeric`.
fn number_literal(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| -> Result<Value, String> {
            if s.contains(['.', 'e', 'E']) {
                return s.parse::<Numeric>().map(Value::Numeric).map_err(|e| e.to_string());
            }
            let n: i64 = s.parse().map_err(|e| format!("{e:?}"))?;
            Ok(i32::try_from(n).map_or(Value::BigInt(n), Value::Integer))
        },
    )(input)
}

pub fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Null, keyword("NULL")),
        value(Value::Boolean(true), keyword("TRUE")),
        value(Value::Boolean(false), keyword("FALSE")),
        map(string_literal, Value::Text),
        uuid_literal,
        blob_literal,
        number_literal,
    ))(input)
}

/// Relational type name, including the multi-word spellings
pub fn data_type(input: &str) -> IResult<&str, DataType> {
    fn phrase<'a>(words: &'static [&'static str], ty: DataType) -> impl FnMut(&'a str) -> IResult<&'a str, DataType> {
        move |mut input: &'a str| {
            for (i, &word) in words.iter().enumerate() {
                if i > 0 {
                    (input, _) = multispace1(input)?;
                }
                (input, _) = keyword(word)(input)?;
            }
            Ok((input, ty))
        }
    }

    alt((
        phrase(&["timestamp", "with", "time", "zone"], DataType::TimestampTz),
        phrase(&["timestamp", "without", "time", "zone"], DataType::Timestamp),
        phrase(&["time", "without", "time", "zone"], DataType::Time),
        phrase(&["double", "precision"], DataType::DoublePrecision),
        phrase(&["character", "varying"], DataType::Varchar),
        map_res(
            recognize(pair(alpha1, take_while(is_ident_char))),
            |name: &str| DataType::parse(name).ok_or(()),
        ),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert_eq!(identifier("user_id rest"), Ok((" rest", "user_id".to_string())));
        assert_eq!(identifier("UserId"), Ok(("", "userid".to_string())));
        assert_eq!(identifier("\"UserId\""), Ok(("", "UserId".to_string())));
        assert_eq!(identifier("\"say \"\"hi\"\"\""), Ok(("", "say \"hi\"".to_string())));
        assert!(identifier("and").is_err());
        assert!(identifier("1abc").is_err());
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("IN")("IN (1)").is_ok());
        assert!(keyword("IN")("index").is_err());
        assert_eq!(literal("true_flag").ok(), None);
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal("NULL"), Ok(("", Value::Null)));
        assert_eq!(literal("false"), Ok(("", Value::Boolean(false))));
        assert_eq!(literal("'it''s'"), Ok(("", Value::Text("it's".to_string()))));
        assert_eq!(literal("''"), Ok(("", Value::Text(String::new()))));
        assert_eq!(literal("42"), Ok(("", Value::Integer(42))));
        assert_eq!(literal("-5000000000"), Ok(("", Value::BigInt(-5_000_000_000))));
        assert_eq!(literal("0xCAFE"), Ok(("", Value::Bytea(vec![0xca, 0xfe]))));
        assert_eq!(
            literal("12.50").map(|(_, v)| v.to_string()),
            Ok("12.50".to_string())
        );

        let id = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(literal(id), Ok(("", Value::Uuid(Uuid::parse_str(id).unwrap()))));
    }

    #[test]
    fn test_data_types() {
        assert_eq!(data_type("timestamp with time zone"), Ok(("", DataType::TimestampTz)));
        assert_eq!(data_type("timestamp AND"), Ok((" AND", DataType::Timestamp)));
        assert_eq!(data_type("int8"), Ok(("", DataType::BigInt)));
        assert_eq!(data_type("double precision"), Ok(("", DataType::DoublePrecision)));
        assert!(data_type("geometry").is_err());
    }
}
