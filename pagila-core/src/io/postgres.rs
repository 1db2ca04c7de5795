use std::fmt;
use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use futures::future::BoxFuture;
use futures::FutureExt;
use pagila_error::{pagila_ensure, pagila_err, PagilaError, PagilaResult};
use rust_decimal::Decimal;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::FromSql;
use tokio_postgres::{NoTls, Row};

use super::{conform, TableSource};
use crate::catalog::{ColumnType, TableDef};
use crate::dataframe::DataFrame;
use crate::value::{values_to_array, AnyValue};

/// Connection parameters of the Postgres instance holding the pagila schema.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl PostgresConfig {
    pub fn validate(&self) -> PagilaResult<()> {
        pagila_ensure!(!self.host.is_empty(), InvalidConfig: "database host is empty");
        pagila_ensure!(self.port != 0, InvalidConfig: "database port must not be 0");
        pagila_ensure!(!self.dbname.is_empty(), InvalidConfig: "database name is empty");
        pagila_ensure!(!self.user.is_empty(), InvalidConfig: "database user is empty");
        Ok(())
    }

    fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .application_name("pagila-report");
        if !self.password.is_empty() {
            config.password(&self.password);
        }
        config
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reads tables over a single `tokio-postgres` connection.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    client: Arc<tokio_postgres::Client>,
}

impl PostgresSource {
    pub async fn connect(config: &PostgresConfig) -> PagilaResult<Self> {
        config.validate()?;
        tracing::debug!("connecting to {config:?}");

        let (client, connection) = config
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| pagila_err!(FetchError: "cannot connect to {}:{}: {e}", config.host, config.port))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(%e, "postgres connection errored");
            }
        });

        Ok(PostgresSource {
            client: Arc::new(client),
        })
    }

    async fn fetch_inner(&self, table: &TableDef) -> PagilaResult<DataFrame> {
        let sql = table.select_sql();
        tracing::debug!("{sql}");

        let rows = self
            .client
            .query(&sql, &[])
            .await
            .map_err(|e| query_error(table, e))?;

        let columns = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| Ok((column.name.to_string(), decode_column(&rows, idx, column.dtype)?)))
            .collect::<PagilaResult<Vec<_>>>()?;

        conform(table, DataFrame::from_columns(columns)?)
    }
}

impl TableSource for PostgresSource {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn fetch<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, PagilaResult<DataFrame>> {
        self.fetch_inner(table).boxed()
    }
}

/// A missing column is a schema problem; everything else means the fetch failed.
fn query_error(table: &TableDef, e: tokio_postgres::Error) -> PagilaError {
    match e.code() {
        Some(code) if *code == SqlState::UNDEFINED_COLUMN => {
            pagila_err!(SchemaMismatch: "table `{}`: {e}", table.name)
        },
        _ => pagila_err!(FetchError: "table `{}`: {e}", table.name),
    }
}

fn decode_column(rows: &[Row], idx: usize, dtype: ColumnType) -> PagilaResult<ArrayRef> {
    fn values<'a, T: FromSql<'a>>(rows: &'a [Row], idx: usize) -> PagilaResult<Vec<Option<T>>> {
        rows.iter()
            .map(|row| {
                row.try_get::<_, Option<T>>(idx)
                    .map_err(|e| pagila_err!(SchemaMismatch: "cannot decode column {idx}: {e}"))
            })
            .collect()
    }

    Ok(match dtype {
        ColumnType::Int64 => Arc::new(Int64Array::from(values::<i64>(rows, idx)?)),
        ColumnType::Float64 => Arc::new(Float64Array::from(values::<f64>(rows, idx)?)),
        ColumnType::Boolean => Arc::new(BooleanArray::from(values::<bool>(rows, idx)?)),
        ColumnType::Utf8 => Arc::new(StringArray::from(values::<String>(rows, idx)?)),
        ColumnType::Decimal { .. } => {
            let decimals = values::<Decimal>(rows, idx)?
                .into_iter()
                .map(|d| d.map(AnyValue::Decimal).unwrap_or(AnyValue::Null))
                .collect::<Vec<_>>();
            values_to_array(&decimals, &dtype.to_arrow())?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PostgresConfig {
        PostgresConfig {
            host: "localhost".into(),
            port: 5432,
            dbname: "pagila".into(),
            user: "postgres".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", config());
        assert!(debug.contains("localhost"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());
        let config = PostgresConfig {
            host: String::new(),
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(PagilaError::InvalidConfig(_))
        ));
    }
}
