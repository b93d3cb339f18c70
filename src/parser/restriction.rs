use super::common::{data_type, identifier, keyword, literal, ws};
use super::expr::{CompareOp, Expr};
use crate::core::DataType;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// What may follow the left operand of a predicate
enum Suffix {
    IsNull(bool),
    In(bool, Vec<Expr>),
    Like(bool, Expr),
    Compare(CompareOp, Expr),
}

// $n, optionally typed as $n::type
fn param(input: &str) -> IResult<&str, Expr> {
    map(
        pair(
            preceded(char('$'), map_res(digit1, |s: &str| s.parse::<usize>())),
            opt(preceded(ws(tag("::")), data_type)),
        ),
        |(index, data_type)| Expr::Param {
            index,
            data_type: data_type.unwrap_or(DataType::Text),
        },
    )(input)
}

// CAST(expr AS type)
fn cast_call(input: &str) -> IResult<&str, Expr> {
    map(
        preceded(
            keyword("CAST"),
            delimited(
                ws(char('(')),
                pair(or_expr, preceded(ws(keyword("AS")), ws(data_type))),
                char(')'),
            ),
        ),
        |(expr, ty)| Expr::cast(expr, ty),
    )(input)
}

fn func_call(input: &str) -> IResult<&str, Expr> {
    map(
        pair(
            identifier,
            delimited(
                ws(char('(')),
                separated_list0(char(','), or_expr),
                char(')'),
            ),
        ),
        |(name, args)| Expr::Func { name, args },
    )(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), or_expr, char(')')),
        cast_call,
        param,
        map(literal, Expr::Literal),
        func_call,
        map(identifier, Expr::Column),
    )))(input)
}

// primary followed by any number of ::type coercions
fn operand(input: &str) -> IResult<&str, Expr> {
    let (input, base) = primary(input)?;
    let (input, casts) = many0(preceded(tag("::"), ws(data_type)))(input)?;
    Ok((input, casts.into_iter().fold(base, Expr::cast)))
}

pub(super) fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::GtEq, tag(">=")),
        value(CompareOp::LtEq, tag("<=")),
        value(CompareOp::NotEq, tag("!=")),
        value(CompareOp::NotEq, tag("<>")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Lt, tag("<")),
    ))(input)
}

fn negation(input: &str) -> IResult<&str, bool> {
    map(opt(ws(keyword("NOT"))), |n| n.is_some())(input)
}

fn suffix(input: &str) -> IResult<&str, Suffix> {
    alt((
        map(
            tuple((ws(keyword("IS")), negation, ws(keyword("NULL")))),
            |(_, negated, _)| Suffix::IsNull(negated),
        ),
        map(
            pair(
                negation,
                preceded(
                    ws(keyword("IN")),
                    delimited(char('('), separated_list1(char(','), operand), char(')')),
                ),
            ),
            |(negated, list)| Suffix::In(negated, list),
        ),
        map(
            pair(negation, preceded(ws(keyword("LIKE")), operand)),
            |(negated, pattern)| Suffix::Like(negated, pattern),
        ),
        map(pair(ws(compare_op), operand), |(op, right)| Suffix::Compare(op, right)),
    ))(input)
}

fn predicate(input: &str) -> IResult<&str, Expr> {
    let (input, left) = operand(input)?;
    let (input, suffix) = opt(suffix)(input)?;

    let expr = match suffix {
        None => left,
        Some(Suffix::IsNull(negated)) => Expr::IsNull {
            expr: Box::new(left),
            negated,
        },
        Some(Suffix::In(negated, list)) => Expr::InList {
            expr: Box::new(left),
            list,
            negated,
        },
        Some(Suffix::Like(negated, pattern)) => {
            let like = Expr::compare(CompareOp::Like, left, pattern);
            if negated {
                Expr::not(like)
            } else {
                like
            }
        }
        Some(Suffix::Compare(op, right)) => Expr::compare(op, left, right),
    };
    Ok((input, expr))
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((map(preceded(ws(keyword("NOT")), not_expr), Expr::not), predicate))(input)
}

fn collapse(mut args: Vec<Expr>, build: fn(Vec<Expr>) -> Expr) -> Expr {
    if args.len() == 1 {
        args.swap_remove(0)
    } else {
        build(args)
    }
}

// AND binds tighter than OR
fn and_expr(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(ws(keyword("AND")), not_expr), |args| collapse(args, Expr::and))(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(ws(keyword("OR")), and_expr), |args| collapse(args, Expr::or))(input)
}

/// Parse a restriction in SQL syntax, e.g. `pk = 5 AND ck > 10`.
pub fn parse_restriction(input: &str) -> Result<Expr, String> {
    all_consuming(ws(or_expr))(input)
        .map(|(_, expr)| expr)
        .map_err(|e| format!("Failed to parse restriction '{input}': {e:?}"))
}
