//! The pagila reports over an arrow-backed dataframe engine.
//!
//! Tables are fetched once from a [`io::TableSource`] into a read-only [`catalog::Tables`]
//! snapshot, and each [`reports::Report`] is a fixed pipeline of joins, aggregations and
//! window functions over it.

pub use pagila_error::{PagilaError, PagilaResult};

pub mod catalog;
pub mod constants;
pub mod dataframe;
pub mod expr;
pub mod io;
pub mod macros;
pub mod pipeline;
pub mod profiler;
pub mod reports;
pub mod thread_pool;
pub mod value;

pub mod prelude {
    pub use crate::catalog::{Tables, TABLES};
    pub use crate::constants::JoinType;
    pub use crate::dataframe::DataFrame;
    pub use crate::expr::{col, dense_rank, lit, when, Expr};
    pub use crate::io::{load_tables, TableSource};
    pub use crate::pipeline::{run_pipeline, PipelineOptions, PipelineOutput, ReportOutcome};
    pub use crate::reports::Report;
    pub use crate::value::AnyValue;
    pub use crate::{PagilaError, PagilaResult};
}
