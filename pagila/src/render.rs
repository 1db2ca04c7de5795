use std::fmt;

use pagila_core::pipeline::ReportOutcome;
use pagila_error::PagilaResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// A rounded table per report, truncated to the report's display limit.
    #[default]
    Table,
    /// One JSON object per report with every row.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Renders one finished report. Failed reports render their error.
pub fn render(outcome: &ReportOutcome, format: OutputFormat) -> PagilaResult<String> {
    let report = outcome.report;

    match format {
        OutputFormat::Table => Ok(match outcome.result.as_ref() {
            Ok(df) => format!("{report}\n{}", df.show(report.display_limit())),
            Err(e) => format!("{report}\nfailed: {e}"),
        }),
        OutputFormat::Json => {
            let body = match outcome.result.as_ref() {
                Ok(df) => serde_json::json!({
                    "report": u8::from(report),
                    "title": report.title(),
                    "elapsed_ms": outcome.elapsed.as_millis() as u64,
                    "rows": df.to_json_rows()?,
                }),
                Err(e) => serde_json::json!({
                    "report": u8::from(report),
                    "title": report.title(),
                    "error": e.to_string(),
                }),
            };
            Ok(body.to_string())
        },
    }
}
