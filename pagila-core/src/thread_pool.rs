//! The rayon pool reports run on when they are computed in parallel.

use std::num::NonZeroUsize;
use std::sync::LazyLock;
use std::thread::available_parallelism;

use rayon::{ThreadPool, ThreadPoolBuilder};

/// The global thread pool.
pub static THREAD_POOL: LazyLock<ThreadPool> = LazyLock::new(|| {
    let thread_name = "pagila";

    ThreadPoolBuilder::new()
        .num_threads(
            available_parallelism()
                .unwrap_or(NonZeroUsize::MIN)
                .get(),
        )
        .thread_name(move |i| format!("{}-{}", thread_name, i))
        .build()
        .expect("failed to build the report thread pool")
});
