use anyhow::{Result, anyhow};
use crossbeam::channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log progress every this many completed items
const PROGRESS_EVERY: usize = 25;

/// Producer/consumer pool over crossbeam scoped threads
pub struct ParallelExecutor {
    max_workers: usize,
    buffer_size: usize,
}

/// Per-worker handles, bundled to keep the worker signature small
struct WorkerContext<'a, T, R, F> {
    worker_id: usize,
    work_rx: Receiver<(usize, T)>,
    result_tx: Sender<(usize, R)>,
    completed: &'a AtomicUsize,
    total_items: usize,
    processor: &'a F,
}

impl ParallelExecutor {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            buffer_size: max_workers * 2,
        }
    }

    /// Run `processor` over every item; results come back in input order
    pub fn execute<T, R, F>(&self, work_items: Vec<T>, processor: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        if work_items.is_empty() {
            return Ok(Vec::new());
        }

        let total_items = work_items.len();
        let actual_workers = self.max_workers.min(total_items);
        let (work_tx, work_rx) = bounded::<(usize, T)>(self.buffer_size);
        let (result_tx, result_rx) = bounded::<(usize, R)>(self.buffer_size);
        let completed = AtomicUsize::new(0);
        let processor = &processor;
        let completed_ref = &completed;

        tracing::debug!(
            "Processing {} items on {} workers",
            total_items,
            actual_workers
        );

        crossbeam::thread::scope(|s| -> Result<Vec<R>> {
            for worker_id in 0..actual_workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    completed: completed_ref,
                    total_items,
                    processor,
                };
                s.spawn(move |_| worker_thread(ctx));
            }

            s.spawn(move |_| {
                for item in work_items.into_iter().enumerate() {
                    if work_tx.send(item).is_err() {
                        break;
                    }
                }
            });

            // Workers hold their own clones; these must go so channels can close.
            drop(work_rx);
            drop(result_tx);

            collect_in_order(result_rx, total_items)
        })
        .map_err(|_| anyhow!("Worker thread panicked during parallel execution"))?
    }
}

fn worker_thread<T, R, F>(ctx: WorkerContext<'_, T, R, F>)
where
    F: Fn(T) -> R,
{
    while let Ok((index, item)) = ctx.work_rx.recv() {
        let result = (ctx.processor)(item);
        if ctx.result_tx.send((index, result)).is_err() {
            break;
        }

        let current = ctx.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if current % PROGRESS_EVERY == 0 || current == ctx.total_items {
            tracing::debug!(
                "Processed {}/{} items (worker {})",
                current,
                ctx.total_items,
                ctx.worker_id
            );
        }
    }
}

fn collect_in_order<R>(result_rx: Receiver<(usize, R)>, total_items: usize) -> Result<Vec<R>> {
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total_items).collect();
    let mut received = 0;

    while let Ok((index, result)) = result_rx.recv() {
        slots[index] = Some(result);
        received += 1;
        if received == total_items {
            break;
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<R>>>()
        .ok_or_else(|| anyhow!("Only {} of {} work items completed", received, total_items))
}

/// Execution strategy for a batch of work items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Run `processor` over every item under this strategy, preserving order
    pub fn execute<T, R, F>(&self, work_items: Vec<T>, processor: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        match self {
            ExecutionStrategy::Sequential => Ok(work_items.into_iter().map(processor).collect()),
            ExecutionStrategy::Parallel { workers } => {
                ParallelExecutor::new(*workers).execute(work_items, processor)
            }
        }
    }

    /// Threshold decision between sequential and parallel.
    ///
    /// ```text
    /// work_items_count >= min_items_for_parallel  → Parallel { workers }
    /// otherwise                                   → Sequential
    /// ```
    ///
    /// A single worker is never worth the thread overhead, so `workers <= 1`
    /// also selects `Sequential`.
    pub fn auto(work_items_count: usize, min_items_for_parallel: usize, workers: usize) -> Self {
        if work_items_count >= min_items_for_parallel && workers > 1 {
            ExecutionStrategy::Parallel { workers }
        } else {
            ExecutionStrategy::Sequential
        }
    }

    /// Worker count from available cores and configured limits.
    ///
    /// ```text
    /// 1. cores = num_cpus::get()
    /// 2. by_percentage = max(1, cores * thread_percentage / 100)
    /// 3. min(max_threads, by_percentage) when max_threads > 0
    /// ```
    pub fn calculate_optimal_workers(max_threads: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();
        let by_percentage = std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        if max_threads > 0 {
            std::cmp::min(max_threads, by_percentage)
        } else {
            by_percentage
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_preserves_order() {
        let executor = ParallelExecutor::new(4);
        let items: Vec<u64> = (0..200).collect();
        let results = executor.execute(items, |x| x * 2).unwrap();
        assert_eq!(results, (0..200).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_processor_may_borrow() {
        let offset = String::from("offset");
        let results = ExecutionStrategy::Parallel { workers: 3 }
            .execute(vec!["a", "b", "c"], |s| format!("{}-{}", s, offset))
            .unwrap();
        assert_eq!(results, ["a-offset", "b-offset", "c-offset"]);
    }

    #[test]
    fn test_sequential_and_empty() {
        let seq = ExecutionStrategy::Sequential
            .execute(vec![1, 2, 3], |x| x * 3)
            .unwrap();
        assert_eq!(seq, vec![3, 6, 9]);

        let empty = ParallelExecutor::new(2)
            .execute(Vec::<i32>::new(), |x| x)
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_worker_panic_is_an_error() {
        let result = ParallelExecutor::new(2).execute(vec![1, 2, 3], |x| {
            if x == 2 {
                panic!("boom");
            }
            x
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_strategy() {
        assert_eq!(ExecutionStrategy::auto(5, 10, 8), ExecutionStrategy::Sequential);
        assert_eq!(
            ExecutionStrategy::auto(50, 10, 8),
            ExecutionStrategy::Parallel { workers: 8 }
        );
        assert_eq!(ExecutionStrategy::auto(50, 10, 1), ExecutionStrategy::Sequential);
    }

    #[test]
    fn test_worker_calculation() {
        assert!(ExecutionStrategy::calculate_optimal_workers(0, 75) >= 1);
        assert!(ExecutionStrategy::calculate_optimal_workers(2, 100) <= 2);
        assert_eq!(
            ExecutionStrategy::calculate_optimal_workers(0, 1),
            std::cmp::max(1, num_cpus::get() / 100)
        );
    }
}
