use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pagila::io::parquet::ParquetSource;
use pagila::io::postgres::{PostgresConfig, PostgresSource};
use pagila::io::TableSource;
use pagila::pipeline::{run_pipeline, PipelineOptions};
use pagila::profiler::PROFILER;
use pagila::render::{render, OutputFormat};
use pagila::reports::Report;
use pagila_error::{pagila_err, PagilaResult};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Source {
    Postgres,
    Parquet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Table => OutputFormat::Table,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "pagila-report", about = "Runs the pagila movie-rental reports")]
pub struct Args {
    #[clap(long, env = "DATABASE_HOST", default_value = "localhost", help = "The database host")]
    host: String,

    #[clap(long, env = "DATABASE_PORT", default_value = "5432", help = "The database port")]
    port: u16,

    #[clap(long, env = "DATABASE_NAME", default_value = "pagila", help = "The database name")]
    dbname: String,

    #[clap(long, env = "DATABASE_USER", default_value = "", help = "The database user")]
    user: String,

    #[clap(
        long,
        env = "DATABASE_PASSWORD",
        default_value = "",
        hide_env_values = true,
        help = "The database password"
    )]
    password: String,

    #[clap(long, value_enum, default_value = "postgres", help = "Where the tables are read from")]
    source: Source,

    #[clap(
        long,
        default_value = "data/pagila",
        help = "The directory holding <table>.parquet when reading from Parquet"
    )]
    parquet_dir: PathBuf,

    #[clap(
        short,
        long,
        value_parser = clap::value_parser!(u8).range(1..=7),
        help = "Run only this report (1-7)"
    )]
    report: Option<u8>,

    #[clap(long, help = "Compute the reports concurrently")]
    parallel: bool,

    #[clap(long, help = "Keep running the other reports when one fails")]
    isolate_failures: bool,

    #[clap(long, value_parser = parse_duration::parse, help = "Give up loading the tables after this long, e.g. 30s")]
    timeout: Option<Duration>,

    #[clap(long, value_enum, default_value = "table", help = "How results are printed")]
    format: Format,

    #[clap(long, help = "Export the loaded tables as Parquet files to this directory")]
    export_parquet: Option<PathBuf>,

    #[clap(long, help = "Print per-report timings")]
    enable_profiling: bool,
}

impl Args {
    fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.host.clone(),
            port: self.port,
            dbname: self.dbname.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    fn reports(&self) -> PagilaResult<Vec<Report>> {
        match self.report {
            Some(n) => Report::try_from(n)
                .map(|report| vec![report])
                .map_err(|_| pagila_err!(InvalidConfig: "there is no report {n}")),
            None => Ok(Report::ALL.to_vec()),
        }
    }
}

async fn open_source(args: &Args) -> PagilaResult<Arc<dyn TableSource>> {
    Ok(match args.source {
        Source::Postgres => Arc::new(PostgresSource::connect(&args.postgres_config()).await?),
        Source::Parquet => Arc::new(ParquetSource::new(&args.parquet_dir)),
    })
}

async fn run(args: Args, cancel: CancellationToken) -> PagilaResult<bool> {
    let options = PipelineOptions {
        reports: args.reports()?,
        parallel: args.parallel,
        isolate_failures: args.isolate_failures,
        profile: args.enable_profiling,
        timeout: args.timeout,
        export_dir: args.export_parquet.clone(),
    };

    let source = tokio::select! {
        _ = cancel.cancelled() => return Err(pagila_err!(Cancelled: "cancelled while connecting")),
        source = open_source(&args) => source?,
    };
    let output = run_pipeline(source, options, cancel).await?;

    for outcome in output.outcomes.iter() {
        println!("{}", render(outcome, args.format.into())?);
    }

    if args.enable_profiling {
        for (name, total) in PROFILER.dump() {
            println!("{name}: {total:?}");
        }
    }

    let ok = output.failures().next().is_none();
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match run(args, cancel).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(2)
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args() {
        Args::command().debug_assert();

        let args = Args::try_parse_from([
            "pagila-report",
            "--source",
            "parquet",
            "--report",
            "5",
            "--timeout",
            "30s",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.source, Source::Parquet);
        assert_eq!(args.reports().unwrap(), vec![Report::TopChildrenActors]);
        assert_eq!(args.timeout, Some(Duration::from_secs(30)));
        assert!(Args::try_parse_from(["pagila-report", "--report", "8"]).is_err());
    }
}
