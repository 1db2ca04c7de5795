use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JoinType {
    /// LEFT OUTER JOIN
    Left,
    /// INNER JOIN
    Inner,
    /// LEFT ANTI JOIN: rows of the left side without a partner on the right.
    Anti,
}

/// Logical conjunctions like `and`, `or` used as a binary operator.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum LogicalBinaryOperator {
    And,
    Or,
}

/// Comparison operators like `==`, `!=`, `>`, `<`, `<=`, `>=`.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum ComparisonBinaryOperator {
    Eq,
    Neq,
    Gt,
    Lt,
    Le,
    Ge,
}

/// A binary operator that can be applied to two expressions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinOperator {
    Logical(LogicalBinaryOperator),
    Comparison(ComparisonBinaryOperator),
}

impl BinOperator {
    #[inline(always)]
    pub fn is_logical(&self) -> bool {
        matches!(self, BinOperator::Logical(_))
    }
}

impl fmt::Display for LogicalBinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalBinaryOperator::And => write!(f, "&&"),
            LogicalBinaryOperator::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for ComparisonBinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonBinaryOperator::Eq => write!(f, "=="),
            ComparisonBinaryOperator::Neq => write!(f, "!="),
            ComparisonBinaryOperator::Gt => write!(f, ">"),
            ComparisonBinaryOperator::Lt => write!(f, "<"),
            ComparisonBinaryOperator::Le => write!(f, "<="),
            ComparisonBinaryOperator::Ge => write!(f, ">="),
        }
    }
}

impl fmt::Display for BinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOperator::Logical(op) => write!(f, "{}", op),
            BinOperator::Comparison(op) => write!(f, "{}", op),
        }
    }
}

/// Aggregation methods supported in `group_by(..).agg(..)` and window expressions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupByMethod {
    /// Number of non-null values.
    Count,
    Sum,
}
