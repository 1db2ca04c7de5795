use std::fmt;

use crate::constants::{BinOperator, GroupByMethod};
use crate::value::AnyValue;

pub mod builder;
pub(crate) mod pexpr;

pub use builder::{col, dense_rank, lit, when};

#[derive(PartialEq, Clone)]
pub enum AggExpr {
    /// Counts non-null values.
    Count(Box<Expr>),
    Sum(Box<Expr>),
}

impl AggExpr {
    pub fn method(&self) -> GroupByMethod {
        match self {
            AggExpr::Count(_) => GroupByMethod::Count,
            AggExpr::Sum(_) => GroupByMethod::Sum,
        }
    }

    pub fn input(&self) -> &Expr {
        match self {
            AggExpr::Count(input) | AggExpr::Sum(input) => input,
        }
    }
}

/// An expression type for describing a node in the query.
#[derive(Clone, PartialEq)]
pub enum Expr {
    /// Aggregation.
    Agg(AggExpr),
    /// Select a column, either `table.column` or an unambiguous `column`.
    Column(String),
    /// Making alias.
    Alias { expr: Box<Expr>, name: String },
    /// Binary operations
    BinaryExpr {
        left: Box<Expr>,
        op: BinOperator,
        right: Box<Expr>,
    },
    /// SQL `LIKE` with `%` and `_` wildcards. Case-sensitive.
    Like { input: Box<Expr>, pattern: String },
    /// `when(cond).then(..).otherwise(..)`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Literal(AnyValue),
    /// Only meaningful as the function of a [`Expr::Window`].
    DenseRank { order_by: Box<Expr>, descending: bool },
    /// A function evaluated per partition whose result is attached to every row.
    Window {
        function: Box<Expr>,
        partition_by: Vec<String>,
    },
}

impl Expr {
    /// The name a projected column gets when no alias is given.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(name) => unqualified_name(name).to_string(),
            Expr::Alias { name, .. } => name.clone(),
            Expr::Agg(agg) => {
                let method = match agg.method() {
                    GroupByMethod::Count => "count",
                    GroupByMethod::Sum => "sum",
                };
                format!("{method}({})", agg.input().output_name())
            },
            Expr::BinaryExpr { left, op, right } => {
                format!("({} {op} {})", left.output_name(), right.output_name())
            },
            Expr::Like { input, pattern } => format!("{} LIKE {pattern}", input.output_name()),
            Expr::Ternary { .. } => "CASE WHEN".to_string(),
            Expr::Literal(value) => value.to_string(),
            Expr::DenseRank { .. } => "dense_rank()".to_string(),
            Expr::Window { function, .. } => function.output_name(),
        }
    }
}

/// Strips the `table.` qualifier from a column name.
pub fn unqualified_name(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, column)| column).unwrap_or(name)
}

impl fmt::Debug for AggExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(input) => write!(f, "COUNT({input:?})"),
            Self::Sum(input) => write!(f, "SUM({input:?})"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agg(agg) => write!(f, "{agg:?}"),
            Self::Column(column) => write!(f, "col({column})"),
            Self::Alias { expr, name } => write!(f, "ALIAS {expr:?} -> {name}"),
            Self::BinaryExpr { left, op, right } => write!(f, "({left:?} {op} {right:?})"),
            Self::Like { input, pattern } => write!(f, "{input:?} LIKE {pattern:?}"),
            Self::Ternary {
                cond,
                then,
                otherwise,
            } => write!(f, "WHEN {cond:?} THEN {then:?} OTHERWISE {otherwise:?}"),
            Self::Literal(value) => write!(f, "lit({value:?})"),
            Self::DenseRank {
                order_by,
                descending,
            } => {
                let order = if *descending { "DESC" } else { "ASC" };
                write!(f, "DENSE_RANK(ORDER BY {order_by:?} {order})")
            },
            Self::Window {
                function,
                partition_by,
            } => write!(f, "{function:?} OVER (PARTITION BY {partition_by:?})"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names() {
        assert_eq!(col("category.name").output_name(), "name");
        assert_eq!(col("film.film_id").count().output_name(), "count(film_id)");
        assert_eq!(
            col("film.film_id").count().alias("number_of_films").output_name(),
            "number_of_films"
        );
    }

    #[test]
    fn test_debug_format() {
        let expr = when(col("city.city").like("a%"))
            .then(col("film.rental_duration"))
            .otherwise(lit(0));
        assert_eq!(
            format!("{expr:?}"),
            r#"WHEN col(city.city) LIKE "a%" THEN col(film.rental_duration) OTHERWISE lit(0: i64)"#
        );
    }
}
