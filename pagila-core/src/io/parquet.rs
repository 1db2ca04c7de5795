use std::fs::{self, File};
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use pagila_error::{pagila_err, PagilaError, PagilaResult};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rayon::prelude::*;

use super::{conform, TableSource};
use crate::catalog::{TableDef, Tables};
use crate::dataframe::DataFrame;
use crate::thread_pool::THREAD_POOL;

/// Reads `<dir>/<table>.parquet` for every table.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    dir: PathBuf,
}

impl ParquetSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        ParquetSource {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, table: &TableDef) -> PathBuf {
        self.dir.join(format!("{}.parquet", table.name))
    }
}

impl TableSource for ParquetSource {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn fetch<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, PagilaResult<DataFrame>> {
        let path = self.path_of(table);
        let table = *table;

        async move {
            tokio::task::spawn_blocking(move || read_parquet(&path, &table))
                .await
                .map_err(|e| pagila_err!(FetchError: "reader task for `{}` failed: {e}", table.name))?
        }
        .boxed()
    }
}

/// Reads one table file and checks it against the catalog.
pub fn read_parquet(path: &Path, table: &TableDef) -> PagilaResult<DataFrame> {
    let file = File::open(path)
        .map_err(|e| pagila_err!(FetchError: "cannot open `{}`: {e}", path.display()))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        pagila_err!(FetchError: "failed to create Parquet reader for `{}`: {e}", path.display())
    })?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| {
        pagila_err!(FetchError: "failed to build Parquet reader for `{}`: {e}", path.display())
    })?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| pagila_err!(FetchError: "failed to read `{}`: {e}", path.display()))?;
    let batch =
        arrow_select::concat::concat_batches(&schema, &batches).map_err(pagila_error::map_err)?;

    conform(table, DataFrame::new(batch)?)
}

/// Exports a loaded snapshot as one Parquet file per table, readable by [`ParquetSource`].
pub fn write_parquet<P: AsRef<Path>>(dir: P, tables: &Tables) -> PagilaResult<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let tables = tables.iter().collect::<Vec<_>>();
    THREAD_POOL.install(|| {
        tables
            .par_iter()
            .map(|(table, df)| {
                let path = dir.join(format!("{}.parquet", table.name));
                write_one(&path, &df.unqualified()?)?;
                tracing::info!(table = table.name, rows = df.height(), "exported {}", path.display());
                Ok(())
            })
            .collect::<PagilaResult<Vec<()>>>()
    })?;

    Ok(())
}

fn write_one(path: &Path, df: &DataFrame) -> PagilaResult<()> {
    let writer_err = |e: parquet::errors::ParquetError| -> PagilaError {
        pagila_err!(InvalidOperation: "failed to write `{}`: {e}", path.display())
    };

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, df.schema(), Some(props)).map_err(writer_err)?;
    writer.write(&df.batch).map_err(writer_err)?;
    writer.close().map_err(writer_err)?;

    Ok(())
}
