//! Where the eleven tables come from.

use futures::future::{try_join_all, BoxFuture};
use pagila_error::{pagila_ensure, pagila_err, PagilaResult};

use crate::catalog::{TableDef, Tables, TABLES};
use crate::dataframe::DataFrame;

#[cfg(feature = "use_parquet")]
pub mod parquet;
#[cfg(feature = "postgres")]
pub mod postgres;

/// A relational source the tables are fetched from.
pub trait TableSource: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Fetches the catalog columns of `table` with unqualified names.
    fn fetch<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, PagilaResult<DataFrame>>;
}

/// Fetches every table of the catalog. The first error fails the whole load.
pub async fn load_tables(source: &dyn TableSource) -> PagilaResult<Tables> {
    tracing::info!("loading {} tables from {}", TABLES.len(), source.name());

    let frames = try_join_all(TABLES.into_iter().map(|table| async move {
        let df = source.fetch(&table).await?;
        tracing::info!(table = table.name, rows = df.height(), "loaded table");
        PagilaResult::Ok((table.name, df))
    }))
    .await?;

    Tables::from_map(frames.into_iter().collect())
}

/// Projects `df` onto the catalog columns of `table`, in catalog order.
///
/// A column that is absent or stored with an incompatible type is a schema mismatch.
pub(crate) fn conform(table: &TableDef, df: DataFrame) -> PagilaResult<DataFrame> {
    let schema = df.schema();

    let columns = table
        .columns
        .iter()
        .map(|column| {
            let idx = schema.index_of(column.name).map_err(|_| {
                pagila_err!(SchemaMismatch: "table `{}` has no column `{}`", table.name, column.name)
            })?;
            let dtype = schema.field(idx).data_type();
            pagila_ensure!(
                column.dtype.accepts(dtype),
                SchemaMismatch: "column `{}.{}` is stored as `{dtype}` but `{}` was expected",
                table.name, column.name, column.dtype.to_arrow()
            );
            Ok((column.name.to_string(), df.batch.column(idx).clone()))
        })
        .collect::<PagilaResult<Vec<_>>>()?;

    DataFrame::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use pagila_error::PagilaError;

    use super::*;
    use crate::catalog::CITY;
    use crate::df;

    #[test]
    fn test_conform_projects_in_catalog_order() {
        let df = df! {
            "last_update" => vec!["2022-02-15"],
            "country_id" => vec![87i64],
            "city" => vec!["A Corua (La Corua)"],
            "city_id" => vec![1i64],
        }
        .unwrap();

        let df = conform(&CITY, df).unwrap();
        assert_eq!(df.get_column_names(), vec!["city_id", "city", "country_id"]);
    }

    #[test]
    fn test_conform_rejects_missing_and_mistyped_columns() {
        let missing = df! { "city_id" => vec![1i64], "city" => vec!["Abha"] }.unwrap();
        assert!(matches!(
            conform(&CITY, missing),
            Err(PagilaError::SchemaMismatch(_))
        ));

        let mistyped = df! {
            "city_id" => vec!["1"],
            "city" => vec!["Abha"],
            "country_id" => vec![82i64],
        }
        .unwrap();
        assert!(matches!(
            conform(&CITY, mistyped),
            Err(PagilaError::SchemaMismatch(_))
        ));
    }
}
