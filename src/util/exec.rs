//! Bulk execution of per-item work
//!
//! [`pending_unique`] and [`exec_unique`] together form the resumable driver
//! every stage uses: dedupe the input, drop the items already done, run the
//! rest with progress logging and hand each result to a post-processing
//! callback. Keeping the two phases apart lets the done-check and the work
//! borrow different stores.

use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;
use tracing::info;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of one item in a bulk stage
#[derive(Error, Debug)]
#[error("{stage}: failed on {item}: {source}")]
pub struct ExecError {
    pub stage: String,
    pub item: String,
    #[source]
    pub source: BoxError,
}

/// Default number of progress lines per stage
pub const PROGRESS_STEPS: usize = 0x100;

/// Dedupe `items` keeping first-seen order, and drop those `is_done` accepts.
pub fn pending_unique<T, I, F, E>(items: I, mut is_done: F) -> Result<Vec<T>, E>
where
    T: Hash + Eq + Clone,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> Result<bool, E>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if !seen.insert(item.clone()) {
            continue;
        }
        if !is_done(&item)? {
            out.push(item);
        }
    }
    Ok(out)
}

/// Run `run` over every item, then `post(i, item, result)` with a running
/// index. Logs about `steps` progress lines. Stops at the first failure,
/// naming the stage and the item; items completed before it stay completed.
pub fn exec_unique<T, R, E, F, P>(stage: &str, items: &[T], steps: usize, mut run: F, mut post: P) -> Result<usize, ExecError>
where
    T: fmt::Display,
    F: FnMut(&T) -> Result<R, E>,
    E: Into<BoxError>,
    P: FnMut(usize, &T, R),
{
    let total = items.len();
    let every = if steps == 0 { f64::INFINITY } else { total as f64 / steps as f64 };
    let mut next_log = 0.0f64;

    for (i, item) in items.iter().enumerate() {
        if i as f64 >= next_log {
            info!("{}: {}/{}", stage, i + 1, total);
            next_log += every.max(1.0);
        }
        let result = run(item).map_err(|e| ExecError { stage: stage.to_string(), item: item.to_string(), source: e.into() })?;
        post(i, item, result);
    }
    info!("{}: {} done", stage, total);
    Ok(total)
}

/// Executes a batch of independent work items
pub trait BulkExecutor {
    /// Apply `f` to every item, yielding `(item, result)` in input order
    fn run_all<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<(T, R)>
    where
        T: Send + Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync;
}

/// Runs items one after another on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialExecutor;

impl BulkExecutor for SerialExecutor {
    fn run_all<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<(T, R)>
    where
        T: Send + Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        items.into_iter().map(|item| {
            let r = f(&item);
            (item, r)
        }).collect()
    }
}

/// Runs items on a bounded rayon thread pool
pub struct PoolExecutor {
    pool: rayon::ThreadPool,
}

impl PoolExecutor {
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(PoolExecutor { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl BulkExecutor for PoolExecutor {
    fn run_all<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<(T, R)>
    where
        T: Send + Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        self.pool.install(|| {
            items.into_par_iter().map(|item| {
                let r = f(&item);
                (item, r)
            }).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_pending_unique() {
        let done: BTreeSet<&str> = ["b"].into_iter().collect();
        let todo = pending_unique(["a", "b", "a", "c"], |x| Ok::<_, ()>(done.contains(x))).unwrap();
        assert_eq!(todo, vec!["a", "c"]);
    }

    #[test]
    fn test_exec_unique_posts_running_index() {
        let mut seen = Vec::new();
        let n = exec_unique("test", &["x", "y"], PROGRESS_STEPS, |s| Ok::<_, BoxError>(s.len()), |i, s, r| {
            seen.push((i, s.to_string(), r))
        })
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen, vec![(0, "x".to_string(), 1), (1, "y".to_string(), 1)]);
    }

    #[test]
    fn test_exec_unique_names_failed_item() {
        let mut done = Vec::new();
        let err = exec_unique(
            "stage",
            &["ok", "bad", "never"],
            0,
            |s| if *s == "bad" { Err("boom") } else { Ok(()) },
            |_, s, _| done.push(s.to_string()),
        )
        .unwrap_err();
        assert_eq!(err.stage, "stage");
        assert_eq!(err.item, "bad");
        assert_eq!(done, vec!["ok"]);
    }

    #[test]
    fn test_executors_agree() {
        let items: Vec<u32> = (0..20).collect();
        let serial = SerialExecutor.run_all(items.clone(), |x| x * 2);
        let pool = PoolExecutor::new(2).unwrap().run_all(items, |x| x * 2);
        assert_eq!(serial, pool);
    }
}
