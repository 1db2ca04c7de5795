use std::mem::discriminant;
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BooleanArray, Int64Array};
use arrow_schema::{DataType, Schema};
use pagila_error::{pagila_bail, pagila_ensure, PagilaResult};

use super::Expr;
use crate::constants::{BinOperator, ComparisonBinaryOperator, GroupByMethod, LogicalBinaryOperator};
use crate::dataframe::{partition_rows, resolve_column, sort_indices, DataFrame};
use crate::value::{normalize_dtype, value_at, values_to_array, AnyValue};

/// A physical expression reified from an [`Expr`] against a concrete schema.
///
/// Column references are resolved to indices once so that evaluation does not need to
/// look names up for every row.
#[derive(Clone, Debug)]
pub(crate) enum PExpr {
    Column {
        index: usize,
        dtype: DataType,
    },
    Literal(AnyValue),
    Alias(Box<PExpr>),
    BinaryExpr {
        left: Box<PExpr>,
        op: BinOperator,
        right: Box<PExpr>,
    },
    Like {
        input: Box<PExpr>,
        pattern: Vec<char>,
    },
    Ternary {
        cond: Box<PExpr>,
        then: Box<PExpr>,
        otherwise: Box<PExpr>,
        dtype: DataType,
    },
    Agg {
        method: GroupByMethod,
        input: Box<PExpr>,
    },
    Window {
        function: PWindowFunction,
        partition_by: Vec<usize>,
    },
}

#[derive(Clone, Debug)]
pub(crate) enum PWindowFunction {
    Agg {
        method: GroupByMethod,
        input: Box<PExpr>,
    },
    DenseRank {
        order_by: Box<PExpr>,
        descending: bool,
    },
}

impl PExpr {
    pub(crate) fn new_from_expr(expr: &Expr, schema: &Schema) -> PagilaResult<Self> {
        let new = |e: &Expr| PExpr::new_from_expr(e, schema).map(Box::new);

        Ok(match expr {
            Expr::Column(name) => {
                let index = resolve_column(schema, name)?;
                PExpr::Column {
                    index,
                    dtype: schema.field(index).data_type().clone(),
                }
            },
            Expr::Literal(value) => PExpr::Literal(value.clone()),
            Expr::Alias { expr, .. } => PExpr::Alias(new(expr)?),
            Expr::BinaryExpr { left, op, right } => PExpr::BinaryExpr {
                left: new(left)?,
                op: *op,
                right: new(right)?,
            },
            Expr::Like { input, pattern } => {
                let input = new(input)?;
                let dtype = normalize_dtype(&input.dtype()?)?;
                pagila_ensure!(
                    matches!(dtype, DataType::Utf8 | DataType::Null),
                    op = "`like`", got = dtype, expected = "utf8"
                );
                PExpr::Like {
                    input,
                    pattern: pattern.chars().collect(),
                }
            },
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let (cond, then, otherwise) = (new(cond)?, new(then)?, new(otherwise)?);
                let cond_dtype = cond.dtype()?;
                pagila_ensure!(
                    matches!(cond_dtype, DataType::Boolean | DataType::Null),
                    op = "`when`", got = cond_dtype, expected = "bool"
                );
                let dtype = match normalize_dtype(&then.dtype()?)? {
                    DataType::Null => normalize_dtype(&otherwise.dtype()?)?,
                    dtype => dtype,
                };
                PExpr::Ternary {
                    cond,
                    then,
                    otherwise,
                    dtype,
                }
            },
            Expr::Agg(agg) => PExpr::Agg {
                method: agg.method(),
                input: new(agg.input())?,
            },
            Expr::DenseRank { .. } => pagila_bail!(
                InvalidOperation: "`dense_rank` must be evaluated over a window: {expr:?}"
            ),
            Expr::Window {
                function,
                partition_by,
            } => {
                let partition_by = partition_by
                    .iter()
                    .map(|name| resolve_column(schema, name))
                    .collect::<PagilaResult<Vec<_>>>()?;
                let function = match function.as_ref() {
                    Expr::Agg(agg) => PWindowFunction::Agg {
                        method: agg.method(),
                        input: new(agg.input())?,
                    },
                    Expr::DenseRank {
                        order_by,
                        descending,
                    } => PWindowFunction::DenseRank {
                        order_by: new(order_by)?,
                        descending: *descending,
                    },
                    other => pagila_bail!(
                        InvalidOperation: "{other:?} cannot be evaluated over a window"
                    ),
                };
                PExpr::Window {
                    function,
                    partition_by,
                }
            },
        })
    }

    /// The arrow type of the array [`PExpr::evaluate`] produces.
    pub(crate) fn dtype(&self) -> PagilaResult<DataType> {
        match self {
            PExpr::Column { dtype, .. } => Ok(dtype.clone()),
            PExpr::Literal(value) => Ok(value.dtype()),
            PExpr::Alias(expr) => expr.dtype(),
            PExpr::BinaryExpr { .. } | PExpr::Like { .. } => Ok(DataType::Boolean),
            PExpr::Ternary { dtype, .. } => Ok(dtype.clone()),
            PExpr::Agg { method, input } => agg_dtype(*method, &input.dtype()?),
            PExpr::Window { function, .. } => match function {
                PWindowFunction::Agg { method, input } => agg_dtype(*method, &input.dtype()?),
                PWindowFunction::DenseRank { .. } => Ok(DataType::Int64),
            },
        }
    }

    /// Splits an aggregation (optionally aliased) into its parts.
    pub(crate) fn as_aggregation(&self) -> Option<(GroupByMethod, &PExpr)> {
        match self {
            PExpr::Agg { method, input } => Some((*method, input)),
            PExpr::Alias(expr) => expr.as_aggregation(),
            _ => None,
        }
    }

    pub(crate) fn evaluate(&self, df: &DataFrame) -> PagilaResult<ArrayRef> {
        let height = df.height();

        match self {
            PExpr::Column { index, .. } => Ok(df.batch.column(*index).clone()),
            PExpr::Literal(value) => values_to_array(&vec![value.clone(); height], &value.dtype()),
            PExpr::Alias(expr) => expr.evaluate(df),
            PExpr::BinaryExpr { left, op, right } => {
                let (lhs, rhs) = (left.evaluate(df)?, right.evaluate(df)?);
                let out = (0..height)
                    .map(|row| binary(*op, value_at(&lhs, row)?, value_at(&rhs, row)?))
                    .collect::<PagilaResult<BooleanArray>>()?;
                Ok(Arc::new(out))
            },
            PExpr::Like { input, pattern } => {
                let input = input.evaluate(df)?;
                let out = (0..height)
                    .map(|row| {
                        Ok(match value_at(&input, row)? {
                            AnyValue::String(s) => {
                                Some(like_match(pattern, &s.chars().collect::<Vec<_>>()))
                            },
                            _ => None,
                        })
                    })
                    .collect::<PagilaResult<BooleanArray>>()?;
                Ok(Arc::new(out))
            },
            PExpr::Ternary {
                cond,
                then,
                otherwise,
                dtype,
            } => {
                let cond = cond.evaluate(df)?;
                let (then, otherwise) = (then.evaluate(df)?, otherwise.evaluate(df)?);
                let values = (0..height)
                    .map(|row| match value_at(&cond, row)? {
                        // A null condition falls through to `otherwise`.
                        AnyValue::Boolean(true) => value_at(&then, row),
                        _ => value_at(&otherwise, row),
                    })
                    .collect::<PagilaResult<Vec<_>>>()?;
                values_to_array(&values, dtype)
            },
            PExpr::Agg { .. } => pagila_bail!(
                InvalidOperation: "aggregations are only allowed in `group_by(..).agg(..)` or over a window"
            ),
            PExpr::Window {
                function,
                partition_by,
            } => {
                let keys = partition_by
                    .iter()
                    .map(|&index| df.batch.column(index).clone())
                    .collect::<Vec<_>>();
                let partitions = partition_rows(&keys, height)?;
                tracing::debug!("window over {} partitions", partitions.len());

                match function {
                    PWindowFunction::Agg { method, input } => {
                        let values = input.evaluate(df)?;
                        let mut out = vec![AnyValue::Null; height];
                        for rows in partitions.iter() {
                            let value = aggregate(*method, &values, rows)?;
                            for &row in rows.iter() {
                                out[row] = value.clone();
                            }
                        }
                        values_to_array(&out, &self.dtype()?)
                    },
                    PWindowFunction::DenseRank {
                        order_by,
                        descending,
                    } => {
                        let values = order_by.evaluate(df)?;
                        let mut out = vec![0i64; height];
                        for rows in partitions.iter() {
                            let keys = rows
                                .iter()
                                .map(|&row| value_at(&values, row))
                                .collect::<PagilaResult<Vec<_>>>()?;
                            // Ties share a rank and the next distinct value gets rank + 1.
                            let mut rank = 0;
                            let mut prev: Option<&AnyValue> = None;
                            for i in sort_indices(&keys, *descending) {
                                if prev != Some(&keys[i]) {
                                    rank += 1;
                                    prev = Some(&keys[i]);
                                }
                                out[rows[i]] = rank;
                            }
                        }
                        Ok(Arc::new(Int64Array::from(out)))
                    },
                }
            },
        }
    }
}

/// The type an aggregation produces for an input of type `input`.
pub(crate) fn agg_dtype(method: GroupByMethod, input: &DataType) -> PagilaResult<DataType> {
    match method {
        GroupByMethod::Count => Ok(DataType::Int64),
        GroupByMethod::Sum => match normalize_dtype(input)? {
            DataType::Int64 | DataType::Null => Ok(DataType::Int64),
            DataType::Float64 => Ok(DataType::Float64),
            DataType::Decimal128(_, scale) => Ok(DataType::Decimal128(38, scale)),
            other => pagila_bail!(op = "`sum`", other),
        },
    }
}

/// Aggregates the `rows` of `values`.
///
/// `Count` skips nulls. `Sum` over no non-null value is null.
pub(crate) fn aggregate(
    method: GroupByMethod,
    values: &dyn Array,
    rows: &[usize],
) -> PagilaResult<AnyValue> {
    match method {
        GroupByMethod::Count => Ok(AnyValue::Int64(
            rows.iter().filter(|&&row| !values.is_null(row)).count() as _,
        )),
        GroupByMethod::Sum => rows.iter().try_fold(AnyValue::Null, |acc, &row| {
            acc.checked_add(&value_at(values, row)?)
        }),
    }
}

fn binary(op: BinOperator, lhs: AnyValue, rhs: AnyValue) -> PagilaResult<Option<bool>> {
    if op.is_logical() {
        let as_bool = |v: &AnyValue| match v {
            AnyValue::Null => Ok(None),
            AnyValue::Boolean(b) => Ok(Some(*b)),
            other => pagila_bail!(op = format!("`{op}`"), got = other.dtype(), expected = "bool"),
        };
        let (lhs, rhs) = (as_bool(&lhs)?, as_bool(&rhs)?);

        return Ok(match op {
            BinOperator::Logical(LogicalBinaryOperator::And) => match (lhs, rhs) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            _ => match (lhs, rhs) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        });
    }

    if lhs.is_null() || rhs.is_null() {
        return Ok(None);
    }

    let (lhs, rhs) = coerce_pair(lhs, rhs);
    pagila_ensure!(
        discriminant(&lhs) == discriminant(&rhs),
        op = format!("`{op}`"), lhs.dtype(), rhs.dtype()
    );

    let ordering = lhs.cmp(&rhs);
    Ok(Some(match op {
        BinOperator::Comparison(ComparisonBinaryOperator::Eq) => ordering.is_eq(),
        BinOperator::Comparison(ComparisonBinaryOperator::Neq) => ordering.is_ne(),
        BinOperator::Comparison(ComparisonBinaryOperator::Gt) => ordering.is_gt(),
        BinOperator::Comparison(ComparisonBinaryOperator::Lt) => ordering.is_lt(),
        BinOperator::Comparison(ComparisonBinaryOperator::Le) => ordering.is_le(),
        BinOperator::Comparison(ComparisonBinaryOperator::Ge) => ordering.is_ge(),
        BinOperator::Logical(_) => unreachable!("logical operators are handled above"),
    }))
}

/// Promotes integers when they are compared against decimals or floats.
fn coerce_pair(lhs: AnyValue, rhs: AnyValue) -> (AnyValue, AnyValue) {
    match (lhs, rhs) {
        (AnyValue::Int64(l), AnyValue::Decimal(r)) => (AnyValue::Decimal(l.into()), AnyValue::Decimal(r)),
        (AnyValue::Decimal(l), AnyValue::Int64(r)) => (AnyValue::Decimal(l), AnyValue::Decimal(r.into())),
        (AnyValue::Int64(l), AnyValue::Float64(r)) => ((l as f64).into(), AnyValue::Float64(r)),
        (AnyValue::Float64(l), AnyValue::Int64(r)) => (AnyValue::Float64(l), (r as f64).into()),
        pair => pair,
    }
}

/// Matches `text` against a SQL `LIKE` pattern: `%` is any run of characters and `_` is
/// exactly one character.
fn like_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position of the last `%` seen and the text position it is currently matched up to.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                star = Some((p, t));
                p += 1;
            },
            Some(&c) if c == '_' || c == text[t] => {
                p += 1;
                t += 1;
            },
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                },
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::df;
    use crate::expr::{col, dense_rank, lit, when};

    fn like(pattern: &str, text: &str) -> bool {
        like_match(
            &pattern.chars().collect::<Vec<_>>(),
            &text.chars().collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_like_patterns() {
        assert!(like("a%", "abha"));
        assert!(!like("a%", "Abha"));
        assert!(!like("a%", "ba"));
        assert!(like("%-%", "al-Qatif"));
        assert!(!like("%-%", "Adana"));
        assert!(like("%", ""));
        assert!(like("_b_", "abc"));
        assert!(!like("_b_", "abcd"));
        assert!(like("%a%a", "banana"));
    }

    #[test]
    fn test_ternary_and_window_sum() {
        let df = df! {
            "city.city_id" => vec![1i64, 1, 2],
            "customer.active" => vec![1i64, 0, 1],
        }
        .unwrap();

        let active = when(col("active").eq(lit(1)))
            .then(lit(1))
            .otherwise(lit(0))
            .sum()
            .over(&["city.city_id"])
            .alias("active_customer");
        let out = df.with_column(active).unwrap();

        assert_eq!(
            out.column_values("active_customer").unwrap(),
            vec![AnyValue::Int64(1), AnyValue::Int64(1), AnyValue::Int64(1)]
        );
    }

    #[test]
    fn test_dense_rank_shares_ties() {
        let df = df! {
            "film_count" => vec![3i64, 5, 5, 3, 1],
        }
        .unwrap();

        let out = df
            .with_column(
                dense_rank(col("film_count"), true)
                    .over::<&str>(&[])
                    .alias("row_rank"),
            )
            .unwrap();

        assert_eq!(
            out.column_values("row_rank").unwrap(),
            [2, 1, 1, 2, 3].into_iter().map(AnyValue::Int64).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_comparison_with_nulls() {
        assert_eq!(
            binary(
                BinOperator::Comparison(ComparisonBinaryOperator::Eq),
                AnyValue::Null,
                AnyValue::Int64(1)
            )
            .unwrap(),
            None
        );
        assert_eq!(
            binary(
                BinOperator::Logical(LogicalBinaryOperator::And),
                AnyValue::Null,
                AnyValue::Boolean(false)
            )
            .unwrap(),
            Some(false)
        );
        assert!(binary(
            BinOperator::Comparison(ComparisonBinaryOperator::Eq),
            AnyValue::from("Children"),
            AnyValue::Int64(1)
        )
        .is_err());
    }

    #[test]
    fn test_dense_rank_requires_window() {
        let df = df! { "a" => vec![1i64] }.unwrap();
        let rank = Expr::DenseRank {
            order_by: Box::new(col("a")),
            descending: true,
        };
        assert!(df.select(&[rank]).is_err());
    }
}
