//! A small expression DSL in the style of dataframe libraries:
//!
//! ```text
//! when(col("city.city").like("a%"))
//!     .then(col("film.rental_duration"))
//!     .otherwise(lit(0))
//!     .sum()
//!     .alias("rent_a")
//! ```

use super::{AggExpr, Expr};
use crate::constants::{BinOperator, ComparisonBinaryOperator, LogicalBinaryOperator};
use crate::value::AnyValue;

pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

pub fn lit<V: Into<AnyValue>>(value: V) -> Expr {
    Expr::Literal(value.into())
}

pub fn when(cond: Expr) -> When {
    When { cond }
}

/// `DENSE_RANK() OVER (ORDER BY order_by)`; attach a partition with [`Expr::over`].
pub fn dense_rank(order_by: Expr, descending: bool) -> Expr {
    Expr::Window {
        function: Box::new(Expr::DenseRank {
            order_by: Box::new(order_by),
            descending,
        }),
        partition_by: vec![],
    }
}

pub struct When {
    cond: Expr,
}

pub struct Then {
    cond: Expr,
    then: Expr,
}

impl When {
    pub fn then(self, expr: Expr) -> Then {
        Then {
            cond: self.cond,
            then: expr,
        }
    }
}

impl Then {
    pub fn otherwise(self, expr: Expr) -> Expr {
        Expr::Ternary {
            cond: Box::new(self.cond),
            then: Box::new(self.then),
            otherwise: Box::new(expr),
        }
    }
}

macro_rules! binary_expr {
    ($name:ident, $op:expr) => {
        pub fn $name(self, other: Expr) -> Expr {
            Expr::BinaryExpr {
                left: Box::new(self),
                op: $op,
                right: Box::new(other),
            }
        }
    };
}

impl Expr {
    binary_expr!(eq, BinOperator::Comparison(ComparisonBinaryOperator::Eq));
    binary_expr!(neq, BinOperator::Comparison(ComparisonBinaryOperator::Neq));
    binary_expr!(gt, BinOperator::Comparison(ComparisonBinaryOperator::Gt));
    binary_expr!(lt, BinOperator::Comparison(ComparisonBinaryOperator::Lt));
    binary_expr!(lt_eq, BinOperator::Comparison(ComparisonBinaryOperator::Le));
    binary_expr!(gt_eq, BinOperator::Comparison(ComparisonBinaryOperator::Ge));
    binary_expr!(and, BinOperator::Logical(LogicalBinaryOperator::And));
    binary_expr!(or, BinOperator::Logical(LogicalBinaryOperator::Or));

    pub fn like(self, pattern: &str) -> Expr {
        Expr::Like {
            input: Box::new(self),
            pattern: pattern.to_string(),
        }
    }

    pub fn count(self) -> Expr {
        Expr::Agg(AggExpr::Count(Box::new(self)))
    }

    pub fn sum(self) -> Expr {
        Expr::Agg(AggExpr::Sum(Box::new(self)))
    }

    pub fn alias(self, name: &str) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            name: name.to_string(),
        }
    }

    /// Evaluates the expression once per partition of `partition_by` and attaches the result
    /// to every row of that partition. An empty partition list spans the whole frame.
    pub fn over<S: AsRef<str>>(self, partition_by: &[S]) -> Expr {
        let partition_by: Vec<String> = partition_by
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        match self {
            Expr::Window { function, .. } => Expr::Window {
                function,
                partition_by,
            },
            Expr::Alias { expr, name } => expr.over(&partition_by[..]).alias(&name),
            function => Expr::Window {
                function: Box::new(function),
                partition_by,
            },
        }
    }
}
