//! Fetch-then-compute: load every table once, then run the reports over the snapshot.

use std::future::Future;
#[cfg(feature = "use_parquet")]
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pagila_error::{pagila_bail, pagila_err, PagilaResult};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::catalog::Tables;
use crate::dataframe::DataFrame;
use crate::io::{load_tables, TableSource};
use crate::profiler::PROFILER;
use crate::reports::Report;
use crate::thread_pool::THREAD_POOL;

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Reports to run, in output order.
    pub reports: Vec<Report>,
    /// Run the reports concurrently on [`THREAD_POOL`].
    pub parallel: bool,
    /// Keep going after a report fails. Otherwise the first failure aborts the run.
    pub isolate_failures: bool,
    /// Record per-report timings in [`PROFILER`].
    pub profile: bool,
    /// Upper bound for loading the tables.
    pub timeout: Option<Duration>,
    /// Export the loaded snapshot here before computing.
    #[cfg(feature = "use_parquet")]
    pub export_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            reports: Report::ALL.to_vec(),
            parallel: false,
            isolate_failures: false,
            profile: false,
            timeout: None,
            #[cfg(feature = "use_parquet")]
            export_dir: None,
        }
    }
}

#[derive(Debug)]
pub struct ReportOutcome {
    pub report: Report,
    pub result: PagilaResult<DataFrame>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    pub tables: Arc<Tables>,
    pub outcomes: Vec<ReportOutcome>,
}

impl PipelineOutput {
    pub fn failures(&self) -> impl Iterator<Item = &ReportOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Loads the tables from `source` and runs `options.reports` over them.
///
/// Cancelling `cancel` stops the fetch right away and the compute step before the next
/// report starts. Fetch errors, cancellation and timeouts always fail the whole run.
pub async fn run_pipeline(
    source: Arc<dyn TableSource>,
    options: PipelineOptions,
    cancel: CancellationToken,
) -> PagilaResult<PipelineOutput> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("pipeline", %run_id);

    async move {
        let started = Instant::now();
        let tables = tokio::select! {
            _ = cancel.cancelled() => pagila_bail!(Cancelled: "run {run_id} was cancelled while fetching tables"),
            tables = with_timeout(load_tables(source.as_ref()), options.timeout) => tables?,
        };
        tracing::info!(elapsed = ?started.elapsed(), "tables loaded");

        let tables = Arc::new(tables);

        #[cfg(feature = "use_parquet")]
        if let Some(dir) = options.export_dir.clone() {
            let tables = tables.clone();
            tokio::task::spawn_blocking(move || crate::io::parquet::write_parquet(dir, &tables))
                .await
                .map_err(|e| pagila_err!(ComputeError: "export task failed: {e}"))??;
        }
        let outcomes = {
            let (tables, cancel) = (tables.clone(), cancel.clone());
            let span = tracing::Span::current();
            tokio::task::spawn_blocking(move || span.in_scope(|| compute(&tables, &options, &cancel)))
                .await
                .map_err(|e| pagila_err!(ComputeError: "report task failed: {e}"))??
        };

        Ok(PipelineOutput {
            run_id,
            tables,
            outcomes,
        })
    }
    .instrument(span)
    .await
}

async fn with_timeout<F>(fetch: F, timeout: Option<Duration>) -> PagilaResult<Tables>
where
    F: Future<Output = PagilaResult<Tables>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .map_err(|_| pagila_err!(Timeout: "loading tables took longer than {limit:?}"))?,
        None => fetch.await,
    }
}

fn compute(
    tables: &Tables,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> PagilaResult<Vec<ReportOutcome>> {
    if options.parallel {
        let outcomes = THREAD_POOL.install(|| {
            options
                .reports
                .par_iter()
                .map(|&report| run_one(report, tables, options.profile, cancel))
                .collect::<Vec<_>>()
        });

        return outcomes
            .into_iter()
            .map(|outcome| keep(outcome, options.isolate_failures))
            .collect();
    }

    let mut outcomes = Vec::with_capacity(options.reports.len());
    for &report in options.reports.iter() {
        outcomes.push(keep(
            run_one(report, tables, options.profile, cancel),
            options.isolate_failures,
        )?);
    }

    Ok(outcomes)
}

/// Turns a failed report into a run failure unless failures are isolated. Fatal errors
/// always fail the run.
fn keep(outcome: ReportOutcome, isolate_failures: bool) -> PagilaResult<ReportOutcome> {
    match outcome.result {
        Err(e) if e.is_fatal() || !isolate_failures => Err(e),
        result => Ok(ReportOutcome { result, ..outcome }),
    }
}

fn run_one(
    report: Report,
    tables: &Tables,
    profile: bool,
    cancel: &CancellationToken,
) -> ReportOutcome {
    let start = Instant::now();

    let result = if cancel.is_cancelled() {
        Err(pagila_err!(Cancelled: "not started"))
    } else if profile {
        PROFILER.profile(|| report.run(tables), format!("report_{}", u8::from(report)).into())
    } else {
        report.run(tables)
    };
    let elapsed = start.elapsed();

    let result = match result {
        Ok(df) => {
            tracing::info!(report = u8::from(report), rows = df.height(), ?elapsed, "report done");
            Ok(df)
        },
        Err(e) => {
            tracing::warn!(report = u8::from(report), "report failed: {e}");
            Err(e.wrap_msg(&|msg| format!("{report}: {msg}")))
        },
    };

    ReportOutcome {
        report,
        result,
        elapsed,
    }
}
