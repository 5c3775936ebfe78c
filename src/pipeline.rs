// Bounded-concurrency work pipeline
//
// Units are fed into a shared FIFO queue and drained by a fixed pool of tokio
// workers. Outputs come back over a channel and are reassembled in unit-index
// order. The first failure cancels the run: queued units are never started and
// partial results are dropped. Calls already in flight run to completion.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{LipiError, Result};

/// Worker count used when a caller passes zero
pub const DEFAULT_CONCURRENCY: usize = 3;

/// One independently processable piece of a larger job
pub trait WorkUnit: Send + 'static {
    /// Label used in error messages, e.g. "chunk" or "batch"
    const KIND: &'static str;

    /// Caller-assigned position; output is ordered by it
    fn index(&self) -> usize;
}

/// Processes a single unit into zero or more outputs
#[async_trait]
pub trait UnitProcessor<U: WorkUnit>: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn process(&self, unit: U) -> Result<Vec<Self::Output>>;
}

/// Cooperative cancellation flag shared by all workers of a run
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any token clone, so this only errors after cancel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO shared by the workers. The lock is only held for a push or pop.
struct WorkQueue<U> {
    items: Mutex<VecDeque<U>>,
    available: Semaphore,
    workers: usize,
}

impl<U> WorkQueue<U> {
    fn new(workers: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            workers,
        }
    }

    fn push(&self, unit: U) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(unit);
        self.available.add_permits(1);
    }

    /// Wake every worker once the queue has been drained
    fn close(&self) {
        self.available.add_permits(self.workers);
    }

    async fn pop(&self) -> Option<U> {
        let permit = self.available.acquire().await.ok()?;
        permit.forget();
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

/// Run every unit through `processor` with at most `concurrency` calls in flight.
///
/// Returns the outputs of all units concatenated in unit-index order, or the
/// first error wrapped with the failing unit's kind and index.
pub async fn run_concurrent<U, P>(
    units: Vec<U>,
    concurrency: usize,
    processor: Arc<P>,
) -> Result<Vec<P::Output>>
where
    U: WorkUnit,
    P: UnitProcessor<U>,
{
    if units.is_empty() {
        return Ok(Vec::new());
    }

    let concurrency = if concurrency == 0 {
        DEFAULT_CONCURRENCY
    } else {
        concurrency
    };

    if units.len() == 1 {
        let mut results = Vec::new();
        for unit in units {
            results.extend(process_one(processor.as_ref(), unit).await?);
        }
        return Ok(results);
    }

    let total = units.len();
    let workers = concurrency.min(total);
    debug!(
        "Running {} {} units with {} workers",
        total,
        U::KIND,
        workers
    );

    let cancel = CancelToken::new();
    let queue: Arc<WorkQueue<U>> = Arc::new(WorkQueue::new(workers));
    let (tx, mut rx) = mpsc::channel::<(usize, Result<Vec<P::Output>>)>(total);

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let processor = Arc::clone(&processor);
        let cancel = cancel.clone();
        let tx = tx.clone();

        pool.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }

                let unit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    unit = queue.pop() => unit,
                };
                let Some(unit) = unit else { break };

                if cancel.is_cancelled() {
                    break;
                }

                let index = unit.index();
                let outcome = process_one(processor.as_ref(), unit).await;
                if outcome.is_err() {
                    cancel.cancel();
                }
                if tx.send((index, outcome)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    for unit in units {
        if cancel.is_cancelled() {
            break;
        }
        queue.push(unit);
    }
    queue.close();

    let mut collected: Vec<(usize, Vec<P::Output>)> = Vec::with_capacity(total);
    let mut first_error: Option<LipiError> = None;
    while let Some((index, outcome)) = rx.recv().await {
        match outcome {
            Ok(outputs) => collected.push((index, outputs)),
            Err(e) => {
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some(e);
                } else {
                    debug!("Discarding later failure of {} {}: {}", U::KIND, index, e);
                }
            }
        }
    }

    let mut panicked = 0;
    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            warn!("{} worker terminated abnormally: {}", U::KIND, e);
            panicked += 1;
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if panicked > 0 {
        return Err(LipiError::Pipeline(format!(
            "{} of {} {} workers panicked",
            panicked,
            workers,
            U::KIND
        )));
    }
    if collected.len() != total {
        return Err(LipiError::Pipeline(format!(
            "only {} of {} {} units completed",
            collected.len(),
            total,
            U::KIND
        )));
    }

    collected.sort_by_key(|(index, _)| *index);
    Ok(collected.into_iter().flat_map(|(_, outputs)| outputs).collect())
}

async fn process_one<U, P>(processor: &P, unit: U) -> Result<Vec<P::Output>>
where
    U: WorkUnit,
    P: UnitProcessor<U>,
{
    let index = unit.index();
    processor
        .process(unit)
        .await
        .map_err(|e| LipiError::UnitFailed {
            kind: U::KIND,
            index,
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Job {
        index: usize,
        delay_ms: u64,
        fail: bool,
    }

    impl WorkUnit for Job {
        const KIND: &'static str = "job";

        fn index(&self) -> usize {
            self.index
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl UnitProcessor<Job> for Recorder {
        type Output = String;

        async fn process(&self, job: Job) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(job.delay_ms)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if job.fail {
                return Err(LipiError::Provider("boom".to_string()));
            }
            Ok(vec![format!("{}a", job.index), format!("{}b", job.index)])
        }
    }

    fn jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|index| Job {
                index,
                // Later units finish first to scramble arrival order.
                delay_ms: ((count - index) * 3) as u64,
                fail: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_output_order_matches_sequential() {
        let expected = run_concurrent(jobs(8), 1, Arc::new(Recorder::default()))
            .await
            .unwrap();
        assert_eq!(expected[0], "0a");
        assert_eq!(expected[15], "7b");

        for concurrency in 2..=10 {
            let got = run_concurrent(jobs(8), concurrency, Arc::new(Recorder::default()))
                .await
                .unwrap();
            assert_eq!(got, expected, "concurrency {}", concurrency);
        }
    }

    #[tokio::test]
    async fn test_respects_concurrency_limit() {
        let recorder = Arc::new(Recorder::default());
        run_concurrent(jobs(12), 3, Arc::clone(&recorder)).await.unwrap();
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 12);
        assert!(recorder.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let recorder = Arc::new(Recorder::default());
        let got = run_concurrent(Vec::<Job>::new(), 4, Arc::clone(&recorder))
            .await
            .unwrap();
        assert!(got.is_empty());
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_unit_error_is_wrapped() {
        let recorder = Arc::new(Recorder::default());
        let err = run_concurrent(
            vec![Job { index: 4, delay_ms: 0, fail: true }],
            0,
            recorder,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LipiError::UnitFailed { kind: "job", index: 4, .. }));
        assert_eq!(err.to_string(), "job 4 failed: Provider error: boom");
    }

    #[tokio::test]
    async fn test_fail_fast_skips_queued_units() {
        let mut units = vec![Job { index: 0, delay_ms: 0, fail: true }];
        units.extend((1..50).map(|index| Job { index, delay_ms: 20, fail: false }));

        let recorder = Arc::new(Recorder::default());
        let err = run_concurrent(units, 2, Arc::clone(&recorder))
            .await
            .unwrap_err();

        assert!(matches!(err, LipiError::UnitFailed { index: 0, .. }));
        // The failing unit plus at most the one call already running on the other worker.
        assert!(recorder.calls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let units = vec![
            Job { index: 0, delay_ms: 5, fail: true },
            Job { index: 1, delay_ms: 40, fail: true },
        ];
        let err = run_concurrent(units, 2, Arc::new(Recorder::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, LipiError::UnitFailed { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), clone.cancelled())
            .await
            .unwrap();
    }
}
