/// Local evaluation of restriction conjuncts the remote could not take.
///
/// SQL three-valued logic: a comparison involving NULL is unknown, and a
/// row whose filter is unknown does not pass.
use crate::core::{RelationDescriptor, Value};
use crate::parser::{BoolOp, CompareOp, Expr};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Parameters and function calls are left to the host
    #[error("cannot evaluate {0} locally")]
    Unsupported(String),
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
}

pub struct Evaluator<'a> {
    relation: &'a RelationDescriptor,
    /// Full-width row, one value per relation column
    row: &'a [Value],
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub const fn new(relation: &'a RelationDescriptor, row: &'a [Value]) -> Self {
        Self { relation, row }
    }

    /// Whether the row passes `expr`; unknown counts as not passing.
    pub fn matches(&self, expr: &Expr) -> Result<bool, EvalError> {
        Ok(self.truth(expr)? == Some(true))
    }

    /// Whether the row passes every conjunct in `filters`.
    pub fn matches_all(&self, filters: &[Expr]) -> Result<bool, EvalError> {
        for filter in filters {
            if !self.matches(filter)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn value(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Column(name) => {
                let idx = self
                    .relation
                    .column_index(name)
                    .ok_or_else(|| EvalError::UnknownColumn(name.clone()))?;
                Ok(self.row.get(idx).cloned().unwrap_or(Value::Null))
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Cast { expr, data_type } => self
                .value(expr)?
                .cast_to(*data_type)
                .map_err(|e| EvalError::Unsupported(e.to_string())),
            Expr::Param { .. } | Expr::Func { .. } => Err(EvalError::Unsupported(expr.to_string())),
            Expr::Compare { .. } | Expr::InList { .. } | Expr::Bool { .. } | Expr::IsNull { .. } => {
                Ok(self.truth(expr)?.map_or(Value::Null, Value::Boolean))
            }
        }
    }

    /// `None` is SQL's unknown
    fn truth(&self, expr: &Expr) -> Result<Option<bool>, EvalError> {
        match expr {
            Expr::Compare { op, left, right } => {
                let left = self.value(left)?;
                let right = self.value(right)?;
                if *op == CompareOp::Like {
                    return Ok(Self::like(&left, &right));
                }
                Ok(left.compare(&right).map(|ord| match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::NotEq => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::LtEq => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::GtEq => ord != Ordering::Less,
                    CompareOp::Like => false,
                }))
            }
            Expr::InList { expr, list, negated } => {
                let value = self.value(expr)?;
                if value.is_null() {
                    return Ok(None);
                }
                let mut unknown = false;
                for item in list {
                    match value.compare(&self.value(item)?) {
                        Some(Ordering::Equal) => return Ok(Some(!negated)),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                Ok(if unknown { None } else { Some(*negated) })
            }
            Expr::Bool { op: BoolOp::And, args } => {
                let mut result = Some(true);
                for arg in args {
                    match self.truth(arg)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            Expr::Bool { op: BoolOp::Or, args } => {
                let mut result = Some(false);
                for arg in args {
                    match self.truth(arg)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            Expr::Bool { op: BoolOp::Not, args } => match args.as_slice() {
                [arg] => Ok(self.truth(arg)?.map(|b| !b)),
                _ => Err(EvalError::Unsupported(expr.to_string())),
            },
            Expr::IsNull { expr, negated } => Ok(Some(self.value(expr)?.is_null() != *negated)),
            other => match self.value(other)? {
                Value::Null => Ok(None),
                Value::Boolean(b) => Ok(Some(b)),
                _ => Err(EvalError::Unsupported(other.to_string())),
            },
        }
    }

    fn like(value: &Value, pattern: &Value) -> Option<bool> {
        match (value, pattern) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(text), Value::Text(pattern)) => Some(like_pattern_match(text, pattern)),
            (other, Value::Text(pattern)) => Some(like_pattern_match(&other.to_string(), pattern)),
            _ => None,
        }
    }
}

/// `%` matches any run of characters, `_` exactly one.
#[must_use]
pub fn like_pattern_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    match_recursive(&text, &pattern)
}

fn match_recursive(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => {
            // Zero characters, or one more and stay on the %
            match_recursive(text, rest) || (!text.is_empty() && match_recursive(&text[1..], pattern))
        }
        Some((p, rest)) => match text.split_first() {
            Some((t, text_rest)) if *p == '_' || t == p => match_recursive(text_rest, rest),
            _ => false,
        },
    }
}
