use crate::core::{DataType, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
        }
    }

    /// Operator with its operands swapped: `a < b` is `b > a`.
    #[must_use]
    pub const fn commute(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Eq),
            Self::NotEq => Some(Self::NotEq),
            Self::Lt => Some(Self::Gt),
            Self::LtEq => Some(Self::GtEq),
            Self::Gt => Some(Self::Lt),
            Self::GtEq => Some(Self::LtEq),
            Self::Like => None,
        }
    }

    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// Restriction expression handed over by the host.
///
/// `Column` always names a column of the scanned relation; values coming
/// from elsewhere (outer relations, runtime parameters) are `Param`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Param { index: usize, data_type: DataType },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Bool { op: BoolOp, args: Vec<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    /// Type coercion wrapper
    Cast { expr: Box<Expr>, data_type: DataType },
    Func { name: String, args: Vec<Expr> },
}

/// A `column op term` or `column IN (terms)` relation in its CQL shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnRelation<'a> {
    Compare {
        column: &'a str,
        op: CompareOp,
        value: &'a Expr,
    },
    In {
        column: &'a str,
        values: &'a [Expr],
    },
}

impl ColumnRelation<'_> {
    #[must_use]
    pub const fn column(&self) -> &str {
        match self {
            Self::Compare { column, .. } | Self::In { column, .. } => column,
        }
    }

    /// Equality or set membership: pins the column to known values
    #[must_use]
    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::In { .. } | Self::Compare { op: CompareOp::Eq, .. })
    }
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn equals(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    #[must_use]
    pub fn and(args: Vec<Self>) -> Self {
        Self::Bool { op: BoolOp::And, args }
    }

    #[must_use]
    pub fn or(args: Vec<Self>) -> Self {
        Self::Bool { op: BoolOp::Or, args }
    }

    #[must_use]
    pub fn not(expr: Self) -> Self {
        Self::Bool {
            op: BoolOp::Not,
            args: vec![expr],
        }
    }

    #[must_use]
    pub fn is_null(expr: Self) -> Self {
        Self::IsNull {
            expr: Box::new(expr),
            negated: false,
        }
    }

    #[must_use]
    pub fn in_list(expr: Self, list: Vec<Self>) -> Self {
        Self::InList {
            expr: Box::new(expr),
            list,
            negated: false,
        }
    }

    #[must_use]
    pub fn cast(expr: Self, data_type: DataType) -> Self {
        Self::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    /// Strip coercion wrappers
    #[must_use]
    pub fn unwrap_casts(&self) -> &Self {
        let mut expr = self;
        while let Self::Cast { expr: inner, .. } = expr {
            expr = inner;
        }
        expr
    }

    #[must_use]
    pub fn as_column(&self) -> Option<&str> {
        match self.unwrap_casts() {
            Self::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Split nested top-level ANDs into a flat list of conjuncts.
    #[must_use]
    pub fn into_conjuncts(self) -> Vec<Self> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts(self, out: &mut Vec<Self>) {
        match self {
            Self::Bool { op: BoolOp::And, args } => {
                for arg in args {
                    arg.collect_conjuncts(out);
                }
            }
            other => out.push(other),
        }
    }

    /// View this expression as a single CQL relation, normalising
    /// `term op column` to `column op' term`.
    #[must_use]
    pub fn column_relation(&self) -> Option<ColumnRelation<'_>> {
        match self.unwrap_casts() {
            Self::Compare { op, left, right } => match (left.as_column(), right.as_column()) {
                (Some(column), None) => Some(ColumnRelation::Compare {
                    column,
                    op: *op,
                    value: right.unwrap_casts(),
                }),
                (None, Some(column)) => Some(ColumnRelation::Compare {
                    column,
                    op: op.commute()?,
                    value: left.unwrap_casts(),
                }),
                _ => None,
            },
            Self::InList {
                expr,
                list,
                negated: false,
            } => Some(ColumnRelation::In {
                column: expr.as_column()?,
                values: list,
            }),
            _ => None,
        }
    }

    /// Every column name referenced anywhere in the tree
    pub fn columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Literal(_) | Self::Param { .. } => {}
            Self::Compare { left, right, .. } => {
                left.columns(out);
                right.columns(out);
            }
            Self::InList { expr, list, .. } => {
                expr.columns(out);
                for item in list {
                    item.columns(out);
                }
            }
            Self::Bool { args, .. } | Self::Func { args, .. } => {
                for arg in args {
                    arg.columns(out);
                }
            }
            Self::IsNull { expr, .. } | Self::Cast { expr, .. } => expr.columns(out),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// SQL-like rendering used in EXPLAIN output and diagnostics
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{name}"),
            Self::Literal(Value::Null) => write!(f, "NULL"),
            Self::Literal(v @ (Value::Text(_) | Value::Timestamp(_) | Value::TimestampTz(_)
                | Value::Date(_) | Value::Time(_) | Value::Inet(_) | Value::Uuid(_))) => {
                write!(f, "'{}'", v.to_string().replace('\'', "''"))
            }
            Self::Literal(v) => write!(f, "{v}"),
            Self::Param { index, .. } => write!(f, "${index}"),
            Self::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Self::InList { expr, list, negated } => {
                write!(f, "{expr} {}IN (", if *negated { "NOT " } else { "" })?;
                write_list(f, list, ", ")?;
                write!(f, ")")
            }
            Self::Bool { op: BoolOp::Not, args } => {
                write!(f, "NOT (")?;
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
            Self::Bool { op, args } => {
                let sep = if *op == BoolOp::And { " AND " } else { " OR " };
                write!(f, "(")?;
                write_list(f, args, sep)?;
                write!(f, ")")
            }
            Self::IsNull { expr, negated } => {
                write!(f, "{expr} IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Self::Cast { expr, data_type } => write!(f, "{expr}::{data_type}"),
            Self::Func { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
        }
    }
}
