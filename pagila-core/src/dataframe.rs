use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use arrow_array::cast::AsArray;
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, RecordBatchOptions,
    StringArray, UInt64Array,
};
use arrow_schema::{Field, Schema, SchemaRef};
use arrow_select::concat::concat;
use arrow_select::filter::filter_record_batch;
use arrow_select::take::take;
use pagila_error::{pagila_bail, pagila_ensure, pagila_err, PagilaResult};
use rust_decimal::Decimal;
use tabled::builder::Builder;
use tabled::settings::object::Rows;
use tabled::settings::{Alignment, Style};

use crate::constants::JoinType;
use crate::expr::pexpr::{agg_dtype, aggregate, PExpr};
use crate::expr::{unqualified_name, Expr};
use crate::value::{normalize_dtype, value_at, values_to_array, AnyValue};

/// The number of rows `Display` prints.
const DISPLAY_ROWS: usize = 20;

/// An immutable table backed by an arrow [`RecordBatch`].
///
/// Every operator returns a new [`DataFrame`]; the batch itself is never mutated. All fields
/// are nullable so that outer joins and window expressions can introduce nulls anywhere.
#[derive(Clone)]
pub struct DataFrame {
    pub(crate) batch: RecordBatch,
}

/// Converts test and fixture data into arrow arrays; used by [`crate::df`].
pub trait IntoArrayRef {
    fn into_array_ref(self) -> PagilaResult<ArrayRef>;
}

impl IntoArrayRef for ArrayRef {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(self)
    }
}

impl IntoArrayRef for Vec<i64> {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(Arc::new(Int64Array::from(self)))
    }
}

impl IntoArrayRef for Vec<Option<i64>> {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(Arc::new(Int64Array::from(self)))
    }
}

impl IntoArrayRef for Vec<f64> {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(Arc::new(Float64Array::from(self)))
    }
}

impl IntoArrayRef for Vec<bool> {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(Arc::new(BooleanArray::from(self)))
    }
}

impl IntoArrayRef for Vec<&str> {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(Arc::new(StringArray::from(self)))
    }
}

impl IntoArrayRef for Vec<Option<&str>> {
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        Ok(Arc::new(StringArray::from(self)))
    }
}

impl IntoArrayRef for Vec<Decimal> {
    /// Builds a `Decimal128(38, s)` array where `s` is the largest scale among the values.
    fn into_array_ref(self) -> PagilaResult<ArrayRef> {
        let scale = self.iter().map(|d| d.scale()).max().unwrap_or(0);
        let values = self.into_iter().map(AnyValue::Decimal).collect::<Vec<_>>();
        values_to_array(&values, &arrow_schema::DataType::Decimal128(38, scale as i8))
    }
}

impl DataFrame {
    pub fn new(batch: RecordBatch) -> PagilaResult<Self> {
        let schema = batch.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| (field.name().clone(), array.clone()))
            .collect();

        Self::from_columns(columns)
    }

    pub fn empty() -> Self {
        DataFrame {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    /// Builds a frame from named columns. Names must be unique and all arrays must have the
    /// same length.
    pub fn from_columns(columns: Vec<(String, ArrayRef)>) -> PagilaResult<Self> {
        let height = columns.first().map(|(_, array)| array.len()).unwrap_or(0);

        let mut seen = HashSet::with_capacity(columns.len());
        for (name, array) in columns.iter() {
            pagila_ensure!(seen.insert(name.as_str()), duplicate = name);
            pagila_ensure!(
                array.len() == height,
                ShapeMismatch: "column `{name}` has {} rows but expected {height}", array.len()
            );
        }

        let (fields, arrays): (Vec<_>, Vec<_>) = columns
            .into_iter()
            .map(|(name, array)| (Field::new(name, array.data_type().clone(), true), array))
            .unzip();

        let batch = RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(height)),
        )
        .map_err(pagila_error::map_err)?;

        Ok(DataFrame { batch })
    }

    #[inline]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Get (height, width) of the [`DataFrame`].
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.batch.num_rows(), self.batch.num_columns())
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.batch.num_rows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn get_column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Resolves `name` to a column index. See [`resolve_column`].
    #[inline]
    pub fn resolve(&self, name: &str) -> PagilaResult<usize> {
        resolve_column(&self.batch.schema(), name)
    }

    pub fn column(&self, name: &str) -> PagilaResult<&ArrayRef> {
        Ok(self.batch.column(self.resolve(name)?))
    }

    pub fn column_values(&self, name: &str) -> PagilaResult<Vec<AnyValue>> {
        let array = self.column(name)?;
        (0..self.height()).map(|row| value_at(array, row)).collect()
    }

    pub fn get(&self, row: usize, name: &str) -> PagilaResult<AnyValue> {
        pagila_ensure!(row < self.height(), oob = row, self.height());
        value_at(self.column(name)?, row)
    }

    pub fn row(&self, idx: usize) -> PagilaResult<Vec<AnyValue>> {
        pagila_ensure!(idx < self.height(), oob = idx, self.height());
        row_key(self.batch.columns(), idx)
    }

    /// Convert the [`DataFrame`] into a vector of rows.
    pub fn rows(&self) -> PagilaResult<Vec<Vec<AnyValue>>> {
        (0..self.height())
            .map(|row| row_key(self.batch.columns(), row))
            .collect()
    }

    /// Prefixes every unqualified column with `table.`.
    pub fn qualify(&self, table: &str) -> PagilaResult<Self> {
        self.map_names(|name| match name.contains('.') {
            true => name.to_string(),
            false => format!("{table}.{name}"),
        })
    }

    /// Strips the `table.` prefix from every column. Fails if that makes two names collide.
    pub fn unqualified(&self) -> PagilaResult<Self> {
        self.map_names(|name| unqualified_name(name).to_string())
    }

    /// Renames columns by position.
    pub fn rename(&self, names: &[&str]) -> PagilaResult<Self> {
        pagila_ensure!(
            names.len() == self.shape().1,
            ShapeMismatch: "cannot rename {} columns with {} names", self.shape().1, names.len()
        );

        Self::from_columns(
            names
                .iter()
                .zip(self.batch.columns())
                .map(|(name, array)| (name.to_string(), array.clone()))
                .collect(),
        )
    }

    fn map_names<F: Fn(&str) -> String>(&self, f: F) -> PagilaResult<Self> {
        Self::from_columns(
            self.schema()
                .fields()
                .iter()
                .zip(self.batch.columns())
                .map(|(field, array)| (f(field.name()), array.clone()))
                .collect(),
        )
    }

    /// Projects the frame onto `exprs`. Output columns are named by [`Expr::output_name`].
    pub fn select(&self, exprs: &[Expr]) -> PagilaResult<Self> {
        tracing::debug!("select: {exprs:?}");

        let schema = self.schema();
        let columns = exprs
            .iter()
            .map(|expr| {
                let pexpr = PExpr::new_from_expr(expr, &schema)?;
                Ok((expr.output_name(), pexpr.evaluate(self)?))
            })
            .collect::<PagilaResult<Vec<_>>>()?;

        Self::from_columns(columns)
    }

    /// Adds the column `expr` evaluates to, replacing a column with the same name.
    pub fn with_column(&self, expr: Expr) -> PagilaResult<Self> {
        tracing::debug!("with_column: {expr:?}");

        let name = expr.output_name();
        let array = PExpr::new_from_expr(&expr, &self.schema())?.evaluate(self)?;

        let mut columns = self
            .schema()
            .fields()
            .iter()
            .zip(self.batch.columns())
            .map(|(field, array)| (field.name().clone(), array.clone()))
            .collect::<Vec<_>>();
        match columns.iter_mut().find(|(n, _)| *n == name) {
            Some(column) => column.1 = array,
            None => columns.push((name, array)),
        }

        Self::from_columns(columns)
    }

    /// Keeps the rows for which `predicate` is true. Null counts as false.
    pub fn filter(&self, predicate: &Expr) -> PagilaResult<Self> {
        tracing::debug!("filter: {predicate:?}");

        let mask = PExpr::new_from_expr(predicate, &self.schema())?.evaluate(self)?;
        let mask = mask.as_boolean_opt().ok_or_else(
            || pagila_err!(op = "`filter`", got = mask.data_type(), expected = "bool"),
        )?;
        let mask = mask
            .iter()
            .map(|v| Some(v == Some(true)))
            .collect::<BooleanArray>();

        let batch = filter_record_batch(&self.batch, &mask).map_err(pagila_error::map_err)?;
        Ok(DataFrame { batch })
    }

    /// Hash-joins `other` on `left_on == right_on`.
    ///
    /// The output carries all columns of both sides (left first). `Anti` keeps only the left
    /// rows without a partner. Null keys never match anything.
    pub fn join(
        &self,
        other: &DataFrame,
        left_on: &[&str],
        right_on: &[&str],
        how: JoinType,
    ) -> PagilaResult<Self> {
        tracing::debug!("join ({how:?}): {left_on:?} == {right_on:?}");

        pagila_ensure!(
            left_on.len() == right_on.len() && !left_on.is_empty(),
            ShapeMismatch: "join keys {left_on:?} and {right_on:?} do not pair up"
        );

        let keys = |df: &DataFrame, on: &[&str]| {
            on.iter()
                .map(|name| df.column(name).cloned())
                .collect::<PagilaResult<Vec<_>>>()
        };
        let (left_keys, right_keys) = (keys(self, left_on)?, keys(other, right_on)?);

        // Build on the right side; the probe keeps the left order.
        let mut table: HashMap<Vec<AnyValue>, Vec<usize>> = HashMap::new();
        for row in 0..other.height() {
            let key = row_key(&right_keys, row)?;
            if key.iter().any(AnyValue::is_null) {
                continue;
            }
            table.entry(key).or_default().push(row);
        }

        let mut left_idx = vec![];
        let mut right_idx = vec![];
        for row in 0..self.height() {
            let key = row_key(&left_keys, row)?;
            let partners = match key.iter().any(AnyValue::is_null) {
                true => None,
                false => table.get(&key),
            };

            match (how, partners) {
                (JoinType::Anti, None) => left_idx.push(Some(row)),
                (JoinType::Anti, Some(_)) | (JoinType::Inner, None) => {},
                (JoinType::Left, None) => {
                    left_idx.push(Some(row));
                    right_idx.push(None);
                },
                (_, Some(partners)) => {
                    for &partner in partners.iter() {
                        left_idx.push(Some(row));
                        right_idx.push(Some(partner));
                    }
                },
            }
        }

        if how == JoinType::Anti {
            return self.take(&left_idx);
        }

        let (lhs, rhs) = rayon::join(|| self.take(&left_idx), || other.take(&right_idx));
        lhs?.hstack(&rhs?)
    }

    pub fn group_by<S: AsRef<str>>(&self, by: &[S]) -> GroupBy<'_> {
        GroupBy {
            df: self,
            by: by.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Stable sort on `by`. Descending puts nulls last, ascending puts them first.
    pub fn sort(&self, by: &[&str], descending: bool) -> PagilaResult<Self> {
        tracing::debug!("sort: {by:?}, descending = {descending}");

        let columns = by
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<PagilaResult<Vec<_>>>()?;
        let keys = (0..self.height())
            .map(|row| row_key(&columns, row))
            .collect::<PagilaResult<Vec<_>>>()?;

        let indices = sort_indices(&keys, descending)
            .into_iter()
            .map(Some)
            .collect::<Vec<_>>();
        self.take(&indices)
    }

    /// The first `n` rows.
    pub fn limit(&self, n: usize) -> Self {
        DataFrame {
            batch: self.batch.slice(0, n.min(self.height())),
        }
    }

    /// Removes duplicated rows, keeping the first occurrence.
    pub fn distinct(&self) -> PagilaResult<Self> {
        let mut seen = HashSet::with_capacity(self.height());
        let mut keep = vec![];
        for row in 0..self.height() {
            if seen.insert(row_key(self.batch.columns(), row)?) {
                keep.push(Some(row));
            }
        }

        tracing::debug!("distinct: {} -> {} rows", self.height(), keep.len());
        self.take(&keep)
    }

    /// Appends the rows of `other` by position. Names are taken from `self`.
    pub fn union_all(&self, other: &DataFrame) -> PagilaResult<Self> {
        pagila_ensure!(
            self.shape().1 == other.shape().1,
            ShapeMismatch: "cannot union {} columns with {} columns", self.shape().1, other.shape().1
        );

        let schema = self.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(self.batch.columns().iter().zip(other.batch.columns()))
            .map(|(field, (lhs, rhs))| {
                pagila_ensure!(
                    normalize_dtype(lhs.data_type())? == normalize_dtype(rhs.data_type())?,
                    SchemaMismatch: "column `{}` is `{}` on the left but `{}` on the right",
                    field.name(), lhs.data_type(), rhs.data_type()
                );
                let array = match lhs.data_type() == rhs.data_type() {
                    true => concat(&[lhs.as_ref(), rhs.as_ref()]).map_err(pagila_error::map_err)?,
                    false => {
                        let values = (0..lhs.len())
                            .map(|row| value_at(lhs, row))
                            .chain((0..rhs.len()).map(|row| value_at(rhs, row)))
                            .collect::<PagilaResult<Vec<_>>>()?;
                        values_to_array(&values, &normalize_dtype(lhs.data_type())?)?
                    },
                };
                Ok((field.name().clone(), array))
            })
            .collect::<PagilaResult<Vec<_>>>()?;

        Self::from_columns(columns)
    }

    /// Renders at most `limit` rows (all rows if `None`) as a table.
    pub fn show(&self, limit: Option<usize>) -> String {
        let shown = limit.unwrap_or(self.height()).min(self.height());

        let mut builder = Builder::new();
        builder.push_record(self.get_column_names());
        for row in 0..shown {
            builder.push_record(
                self.batch
                    .columns()
                    .iter()
                    .map(|array| match value_at(array, row) {
                        Ok(value) => value.to_string(),
                        Err(_) => "?".to_string(),
                    })
                    .collect::<Vec<_>>(),
            );
        }

        let mut out = builder
            .build()
            .with(Style::rounded())
            .modify(Rows::new(1..), Alignment::left())
            .to_string();
        if shown < self.height() {
            out.push_str(&format!("\nonly showing top {shown} of {} rows", self.height()));
        }
        out
    }

    /// One JSON object per row, keyed by column name.
    pub fn to_json_rows(&self) -> PagilaResult<serde_json::Value> {
        let names = self.get_column_names();
        let rows = self
            .rows()?
            .into_iter()
            .map(|row| -> PagilaResult<serde_json::Value> {
                let object = names
                    .iter()
                    .cloned()
                    .zip(row)
                    .map(|(name, value)| {
                        serde_json::to_value(value)
                            .map(|value| (name, value))
                            .map_err(pagila_error::map_err)
                    })
                    .collect::<PagilaResult<serde_json::Map<_, _>>>()?;
                Ok(serde_json::Value::Object(object))
            })
            .collect::<PagilaResult<Vec<_>>>()?;

        Ok(serde_json::Value::Array(rows))
    }

    /// Gathers rows by index; `None` produces a row of nulls.
    pub(crate) fn take(&self, indices: &[Option<usize>]) -> PagilaResult<Self> {
        let indices = indices
            .iter()
            .map(|idx| idx.map(|i| i as u64))
            .collect::<UInt64Array>();

        let columns = self
            .schema()
            .fields()
            .iter()
            .zip(self.batch.columns())
            .map(|(field, array)| {
                let array = take(array.as_ref(), &indices, None).map_err(pagila_error::map_err)?;
                Ok((field.name().clone(), array))
            })
            .collect::<PagilaResult<Vec<_>>>()?;

        // A frame without columns still has a height.
        if columns.is_empty() {
            let batch = RecordBatch::try_new_with_options(
                self.schema(),
                vec![],
                &RecordBatchOptions::new().with_row_count(Some(indices.len())),
            )
            .map_err(pagila_error::map_err)?;
            return Ok(DataFrame { batch });
        }

        Self::from_columns(columns)
    }

    /// Stitches the columns of `other` to the right of `self`.
    fn hstack(&self, other: &DataFrame) -> PagilaResult<Self> {
        pagila_ensure!(
            self.height() == other.height(),
            ShapeMismatch: "the number of rows must be the same: {} != {}", self.height(), other.height()
        );

        let named = |df: &DataFrame| {
            df.schema()
                .fields()
                .iter()
                .zip(df.batch.columns())
                .map(|(field, array)| (field.name().clone(), array.clone()))
                .collect::<Vec<_>>()
        };
        let mut columns = named(self);
        columns.extend(named(other));

        Self::from_columns(columns)
    }
}

pub struct GroupBy<'a> {
    df: &'a DataFrame,
    by: Vec<String>,
}

impl GroupBy<'_> {
    /// One row per distinct key, in order of first appearance. Key columns come first with
    /// unqualified names, followed by one column per aggregation in `aggs`.
    pub fn agg(&self, aggs: &[Expr]) -> PagilaResult<DataFrame> {
        let df = self.df;
        let schema = df.schema();

        let key_idx = self
            .by
            .iter()
            .map(|name| df.resolve(name))
            .collect::<PagilaResult<Vec<_>>>()?;
        let keys = key_idx
            .iter()
            .map(|&idx| df.batch.column(idx).clone())
            .collect::<Vec<_>>();
        let groups = partition_rows(&keys, df.height())?;
        tracing::debug!("group_by {:?}: {} groups", self.by, groups.len());

        let first = groups
            .iter()
            .map(|rows| Some(rows[0] as u64))
            .collect::<UInt64Array>();
        let mut columns = key_idx
            .iter()
            .map(|&idx| {
                let array =
                    take(df.batch.column(idx).as_ref(), &first, None).map_err(pagila_error::map_err)?;
                Ok((unqualified_name(schema.field(idx).name()).to_string(), array))
            })
            .collect::<PagilaResult<Vec<_>>>()?;

        for expr in aggs.iter() {
            let pexpr = PExpr::new_from_expr(expr, &schema)?;
            let (method, input) = pexpr.as_aggregation().ok_or_else(
                || pagila_err!(InvalidOperation: "expected an aggregation in `agg`, got {expr:?}"),
            )?;

            let values = input.evaluate(df)?;
            let out = groups
                .iter()
                .map(|rows| aggregate(method, &values, rows))
                .collect::<PagilaResult<Vec<_>>>()?;
            pagila_ensure!(out.len() == groups.len(), agg_len = out.len(), groups.len());

            let dtype = agg_dtype(method, &input.dtype()?)?;
            columns.push((expr.output_name(), values_to_array(&out, &dtype)?));
        }

        DataFrame::from_columns(columns)
    }
}

/// Resolves a column name against `schema`.
///
/// An exact match wins. Otherwise `name` must be the unqualified suffix of exactly one
/// `table.column` field.
pub(crate) fn resolve_column(schema: &Schema, name: &str) -> PagilaResult<usize> {
    if let Ok(idx) = schema.index_of(name) {
        return Ok(idx);
    }

    let candidates = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| unqualified_name(field.name()) == name)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();

    match candidates.as_slice() {
        [idx] => Ok(*idx),
        [] => pagila_bail!(ColumnNotFound: "{name}"),
        many => {
            let names = many
                .iter()
                .map(|&idx| schema.field(idx).name().as_str())
                .collect::<Vec<_>>();
            pagila_bail!(AmbiguousColumn: "`{name}` could be any of {names:?}")
        },
    }
}

pub(crate) fn row_key(columns: &[ArrayRef], row: usize) -> PagilaResult<Vec<AnyValue>> {
    columns.iter().map(|array| value_at(array, row)).collect()
}

/// Splits `0..height` into groups of equal keys, in order of first appearance. Without keys
/// every row falls into a single group.
pub(crate) fn partition_rows(keys: &[ArrayRef], height: usize) -> PagilaResult<Vec<Vec<usize>>> {
    let mut lookup: HashMap<Vec<AnyValue>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = vec![];

    for row in 0..height {
        match lookup.entry(row_key(keys, row)?) {
            Entry::Occupied(entry) => groups[*entry.get()].push(row),
            Entry::Vacant(entry) => {
                entry.insert(groups.len());
                groups.push(vec![row]);
            },
        }
    }

    Ok(groups)
}

/// A stable argsort of `keys`.
pub(crate) fn sort_indices<K: Ord>(keys: &[K], descending: bool) -> Vec<usize> {
    let mut indices = (0..keys.len()).collect::<Vec<_>>();
    indices.sort_by(|&l, &r| compare(&keys[l], &keys[r], descending));
    indices
}

#[inline]
fn compare<K: Ord>(lhs: &K, rhs: &K, descending: bool) -> Ordering {
    match descending {
        true => rhs.cmp(lhs),
        false => lhs.cmp(rhs),
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.show(Some(DISPLAY_ROWS)))
    }
}

impl fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\nshape: {:?}\n{}", self.shape(), self.show(Some(DISPLAY_ROWS)))
    }
}

impl PartialEq for DataFrame {
    fn eq(&self, other: &Self) -> bool {
        self.get_column_names() == other.get_column_names()
            && matches!((self.rows(), other.rows()), (Ok(l), Ok(r)) if l == r)
    }
}

#[cfg(test)]
mod tests {
    use pagila_error::PagilaError;

    use super::*;
    use crate::df;
    use crate::expr::{col, lit};

    fn categories() -> DataFrame {
        df! {
            "category.category_id" => vec![1i64, 2, 3],
            "category.name" => vec!["Action", "Comedy", "Drama"],
        }
        .unwrap()
    }

    fn film_category() -> DataFrame {
        df! {
            "film_category.film_id" => vec![10i64, 11, 12],
            "film_category.category_id" => vec![1i64, 1, 2],
        }
        .unwrap()
    }

    #[test]
    fn test_resolve_qualified_and_suffix() {
        let df = categories()
            .join(
                &film_category(),
                &["category.category_id"],
                &["film_category.category_id"],
                JoinType::Inner,
            )
            .unwrap();
        assert_eq!(df.resolve("film_id").unwrap(), 2);
        assert_eq!(df.resolve("film_category.category_id").unwrap(), 3);
        // `category_id` exists on both sides.
        assert!(matches!(df.resolve("category_id"), Err(PagilaError::AmbiguousColumn(_))));
        assert!(matches!(df.resolve("title"), Err(PagilaError::ColumnNotFound(_))));
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let df = categories()
            .join(
                &film_category(),
                &["category.category_id"],
                &["film_category.category_id"],
                JoinType::Left,
            )
            .unwrap();

        assert_eq!(df.shape(), (4, 4));
        assert_eq!(df.get(3, "name").unwrap(), AnyValue::from("Drama"));
        assert!(df.get(3, "film_id").unwrap().is_null());
    }

    #[test]
    fn test_anti_join_is_complement() {
        let (lhs, rhs) = (categories(), film_category());
        let on = (["category.category_id"], ["film_category.category_id"]);
        let inner = lhs
            .join(&rhs, &on.0, &on.1, JoinType::Inner)
            .unwrap()
            .select(&[col("category.category_id")])
            .unwrap()
            .distinct()
            .unwrap();
        let anti = lhs.join(&rhs, &on.0, &on.1, JoinType::Anti).unwrap();

        assert_eq!(anti.get_column_names(), lhs.get_column_names());
        assert_eq!(inner.height() + anti.height(), lhs.height());
        assert_eq!(anti.get(0, "name").unwrap(), AnyValue::from("Drama"));
    }

    #[test]
    fn test_null_keys_never_match() {
        let lhs = df! { "l.k" => vec![Some(1i64), None] }.unwrap();
        let rhs = df! { "r.k" => vec![Some(1i64), None] }.unwrap();

        let inner = lhs.join(&rhs, &["l.k"], &["r.k"], JoinType::Inner).unwrap();
        assert_eq!(inner.height(), 1);
        let anti = lhs.join(&rhs, &["l.k"], &["r.k"], JoinType::Anti).unwrap();
        assert_eq!(anti.height(), 1);
        assert!(anti.get(0, "l.k").unwrap().is_null());
    }

    #[test]
    fn test_group_by_first_appearance_order() {
        let df = df! {
            "t.name" => vec!["b", "a", "b", "c"],
            "t.v" => vec![Some(1i64), Some(2), None, Some(4)],
        }
        .unwrap();

        let out = df
            .group_by(&["t.name"])
            .agg(&[col("t.v").count().alias("n"), col("t.v").sum().alias("s")])
            .unwrap();

        assert_eq!(out.get_column_names(), vec!["name", "n", "s"]);
        assert_eq!(
            out.rows().unwrap(),
            vec![
                vec![AnyValue::from("b"), AnyValue::Int64(1), AnyValue::Int64(1)],
                vec![AnyValue::from("a"), AnyValue::Int64(1), AnyValue::Int64(2)],
                vec![AnyValue::from("c"), AnyValue::Int64(1), AnyValue::Int64(4)],
            ]
        );
    }

    #[test]
    fn test_group_by_on_empty_input() {
        let df = categories().filter(&col("name").eq(lit("Horror"))).unwrap();
        let out = df
            .group_by(&["name"])
            .agg(&[col("category_id").count()])
            .unwrap();
        assert_eq!(out.shape(), (0, 2));
    }

    #[test]
    fn test_sort_is_stable_and_nulls_last_when_descending() {
        let df = df! {
            "k" => vec![Some(1i64), None, Some(3), Some(1)],
            "id" => vec![0i64, 1, 2, 3],
        }
        .unwrap();

        let ids = |df: DataFrame| {
            df.column_values("id")
                .unwrap()
                .iter()
                .filter_map(AnyValue::as_i64)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(df.sort(&["k"], true).unwrap()), vec![2, 0, 3, 1]);
        assert_eq!(ids(df.sort(&["k"], false).unwrap()), vec![1, 0, 3, 2]);
    }

    #[test]
    fn test_distinct_and_union_all() {
        let df = df! {
            "a" => vec![1i64, 1, 2],
            "b" => vec!["x", "x", "y"],
        }
        .unwrap();

        let distinct = df.distinct().unwrap();
        assert_eq!(distinct.height(), 2);

        let other = df! { "c" => vec![3i64], "d" => vec!["z"] }.unwrap();
        let union = distinct.union_all(&other).unwrap();
        assert_eq!(union.get_column_names(), vec!["a", "b"]);
        assert_eq!(union.height(), 3);
        assert!(distinct
            .union_all(&df! { "a" => vec![1i64] }.unwrap())
            .is_err());
    }

    #[test]
    fn test_unqualified_detects_collisions() {
        let joined = categories()
            .join(
                &film_category(),
                &["category.category_id"],
                &["film_category.category_id"],
                JoinType::Inner,
            )
            .unwrap();
        assert!(joined.unqualified().is_err());
        assert_eq!(
            categories().unqualified().unwrap().get_column_names(),
            vec!["category_id", "name"]
        );
    }

    #[test]
    fn test_show_truncates() {
        let shown = categories().show(Some(2));
        assert!(shown.contains("Comedy"));
        assert!(!shown.contains("Drama"));
        assert!(shown.ends_with("only showing top 2 of 3 rows"));
    }

    #[test]
    fn test_json_rows() {
        let json = categories().limit(1).unqualified().unwrap().to_json_rows().unwrap();
        assert_eq!(json, serde_json::json!([{ "category_id": 1, "name": "Action" }]));
    }
}
