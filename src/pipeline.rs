//! Bounded-concurrency batch execution over an ordered sequence.
//!
//! A dedicated rayon pool runs a fixed number of workers. Each worker claims
//! the next unclaimed index from a shared counter, transforms that item and
//! puts the result back into the same slot, so the output order always
//! matches the input order no matter which worker finishes first.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{DeflickerError, Result};

/// Receives one notification per successfully completed item.
///
/// Purely advisory: nothing a sink does can change the outcome of a batch.
pub trait ProgressSink: Sync {
    fn item_completed(&self);
}

/// Sink that ignores all progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn item_completed(&self) {}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies `transform` to every item using up to `workers` parallel workers.
///
/// The first failure stops the dispatch of further items; work already in
/// flight is allowed to finish, then that first error is returned. Later
/// failures are logged but not returned. A failed batch yields no items.
///
/// # Arguments
/// * `items` - Records in sequence order; ownership moves into the batch.
/// * `workers` - Number of parallel workers (at least one is used).
/// * `progress` - Notified after each successful transform.
/// * `transform` - Per-item operation.
///
/// # Returns
/// * `Result<Vec<T>>` - Transformed records in input order, or the first error.
pub fn run_batch<T, F>(
    items: Vec<T>,
    workers: usize,
    progress: &dyn ProgressSink,
    transform: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(T) -> Result<T> + Sync,
{
    let len = items.len();
    if len == 0 {
        return Ok(items);
    }
    let workers = workers.clamp(1, len);

    let slots: Vec<Mutex<Option<T>>> = items.into_iter().map(|item| Mutex::new(Some(item))).collect();
    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let first_error: Mutex<Option<DeflickerError>> = Mutex::new(None);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("deflicker-worker-{i}"))
        .build()?;
    debug!(items = len, workers, "starting batch");

    pool.scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|_| loop {
                if failed.load(Ordering::Acquire) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::AcqRel);
                if index >= len {
                    break;
                }
                let Some(item) = lock(&slots[index]).take() else {
                    continue;
                };

                match transform(item) {
                    Ok(done) => {
                        *lock(&slots[index]) = Some(done);
                        progress.item_completed();
                    }
                    Err(err) => {
                        failed.store(true, Ordering::Release);
                        let mut first = lock(&first_error);
                        if first.is_none() {
                            *first = Some(err);
                        } else {
                            warn!(index, error = %err, "further failure in aborted batch");
                        }
                    }
                }
            });
        }
    });

    if let Some(err) = first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(err);
    }

    slots
        .into_iter()
        .map(|slot| slot.into_inner().unwrap_or_else(PoisonError::into_inner))
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| DeflickerError::Task("batch finished with unprocessed items".to_string()))
}
