//! Profiler implementation

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
use serde::Serialize;
use spin::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct Stat {
    /// The name of this stat
    pub name: Cow<'static, str>,
    /// Elapsed time of every recorded call.
    pub ticks: Vec<Duration>,
}

/// Collects wall-clock timings grouped by name.
#[derive(Clone)]
pub struct PagilaProfiler {
    /// The hashmap key is the group name of the stats, and the value is the stat itself.
    pub stats: Arc<RwLock<HashMap<Cow<'static, str>, Stat>>>,
}

impl Default for PagilaProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PagilaProfiler {
    pub fn new() -> Self {
        PagilaProfiler {
            stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total time per group, sorted by name.
    pub fn dump(&self) -> Vec<(Cow<'static, str>, Duration)> {
        let mut totals = self
            .stats
            .read()
            .iter()
            .map(|(name, stat)| (name.clone(), stat.ticks.iter().sum::<Duration>()))
            .collect::<Vec<_>>();
        totals.sort_by(|l, r| l.0.cmp(&r.0));
        totals
    }

    pub fn dump_raw(&self) -> Vec<(Cow<'static, str>, Vec<Duration>)> {
        self.stats
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.ticks.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.stats.write().clear();
    }

    /// Profile a function call.
    pub fn profile<T, F: FnOnce() -> T>(&self, func: F, name: Cow<'static, str>) -> T {
        let start = Instant::now();
        let result = func();
        let elapsed = start.elapsed();

        let mut lock = self.stats.write();
        match lock.get_mut(&name) {
            Some(stat) => {
                stat.ticks.push(elapsed);
            },
            None => {
                lock.insert(
                    name.clone(),
                    Stat {
                        name,
                        ticks: vec![elapsed],
                    },
                );
            },
        }

        result
    }
}

pub static PROFILER: LazyLock<PagilaProfiler> = LazyLock::new(PagilaProfiler::new);
