//! Progress reporting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Receives `(completed, total)` snapshots while a pool is running
///
/// `total` grows as secondary jobs are discovered, so it is only an upper
/// bound of the work known so far.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Logs progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        if total == 0 {
            return;
        }
        tracing::info!(
            "Progress: {}/{} assets ({:.0}%)",
            completed,
            total,
            completed as f64 * 100.0 / total as f64
        );
    }
}

/// Discards every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Job counters of a running pool
#[derive(Debug, Default)]
pub(crate) struct Counters {
    total: AtomicUsize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
}

impl Counters {
    pub fn accepted(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn finished(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// `(completed, total)`
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }
}

/// Spawns a task that reports the counters every `interval`
///
/// The task runs until aborted; the caller makes the final report.
pub(crate) fn spawn_reporter(
    counters: Arc<Counters>,
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let (completed, total) = counters.snapshot();
            sink.on_progress(completed, total);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.accepted();
        counters.accepted();
        counters.finished(true);

        assert_eq!(counters.snapshot(), (1, 2));
        assert_eq!(counters.succeeded(), 1);

        counters.finished(false);
        assert_eq!(counters.snapshot(), (2, 2));
        assert_eq!(counters.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_reporter_ticks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn ProgressSink> = {
            let seen = seen.clone();
            Arc::new(move |completed: usize, total: usize| {
                seen.lock().unwrap().push((completed, total));
            })
        };

        let counters = Arc::new(Counters::default());
        counters.accepted();

        let handle = spawn_reporter(counters, sink, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&snapshot| snapshot == (0, 1)));
    }
}
