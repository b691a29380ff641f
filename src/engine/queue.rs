//! Two-tier job queue shared by the worker pool
//!
//! This module handles:
//! - A priority heap (critical before deferred, FIFO inside a tier)
//! - Back-pressure for external submissions
//! - Counting outstanding jobs so workers know when the work tree is drained
//! - Waking idle workers without polling

use crate::engine::job::{Job, Tier};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// A job waiting in the heap
#[derive(Debug)]
struct QueuedJob {
    tier: Tier,
    /// Insertion order, used to keep FIFO order inside a tier
    seq: u64,
    job: Job,
}

// Higher tier first, then lower sequence number first
impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.tier == other.tier && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    closed: bool,
    /// Accepted jobs that have not been finalized yet
    outstanding: usize,
}

/// Job queue guarded by a mutex with a [`Notify`] as the wake-up primitive
#[derive(Debug)]
pub(crate) struct JobQueue {
    state: Mutex<QueueState>,
    changed: Notify,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts a new external job; fails once the queue is closed
    pub fn try_begin(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.outstanding += 1;
        true
    }

    /// Counts a job submitted from inside the work tree
    ///
    /// Always succeeds: the parent job is still outstanding, so the pool
    /// cannot have drained yet.
    pub fn begin(&self) {
        self.lock().outstanding += 1;
    }

    /// Marks one outstanding job as finalized
    pub fn finish(&self) {
        {
            let mut state = self.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Pushes a job, waiting while the heap is at capacity
    pub async fn push_bounded(&self, job: Job) {
        let mut job = Some(job);
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.heap.len() < self.capacity {
                    if let Some(job) = job.take() {
                        Self::insert(&mut state, job);
                    }
                    drop(state);
                    self.changed.notify_waiters();
                    return;
                }
            }

            notified.await;
        }
    }

    /// Pushes a job regardless of capacity
    ///
    /// Used for secondary jobs and retries, which are produced by workers:
    /// blocking them on capacity could deadlock the pool.
    pub fn push(&self, job: Job) {
        {
            let mut state = self.lock();
            Self::insert(&mut state, job);
        }
        self.changed.notify_waiters();
    }

    fn insert(state: &mut QueueState, job: Job) {
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedJob {
            tier: job.tier(),
            seq,
            job,
        });
    }

    /// Takes the highest-priority job
    ///
    /// Waits while the heap is empty. Returns `None` once the queue is closed
    /// and no job is outstanding, which is the pool's fixed point.
    pub async fn pop(&self) -> Option<Job> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(queued) = state.heap.pop() {
                    drop(state);
                    self.changed.notify_waiters();
                    return Some(queued.job);
                }
                if state.closed && state.outstanding == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    #[cfg(test)]
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::job::AssetKind;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn job(path: &str, kind: AssetKind) -> Job {
        let base = Url::parse("https://example.com/").unwrap();
        let url = base.join(path).unwrap();
        Job::new(url, kind, path, base)
    }

    #[tokio::test]
    async fn test_critical_before_deferred_fifo_within_tier() {
        let queue = JobQueue::new(16);
        queue.push(job("a.jpg", AssetKind::Image));
        queue.push(job("b.css", AssetKind::Style));
        queue.push(job("c.woff2", AssetKind::Font));
        queue.push(job("d.js", AssetKind::Script));

        let order: Vec<String> = [
            queue.pop().await.unwrap(),
            queue.pop().await.unwrap(),
            queue.pop().await.unwrap(),
            queue.pop().await.unwrap(),
        ]
        .iter()
        .map(|j| j.origins[0].clone())
        .collect();

        assert_eq!(order, vec!["b.css", "d.js", "a.jpg", "c.woff2"]);
    }

    #[tokio::test]
    async fn test_pop_returns_none_at_fixed_point() {
        let queue = JobQueue::new(4);
        assert!(queue.try_begin());
        queue.push(job("a.css", AssetKind::Style));
        queue.close();

        assert!(queue.pop().await.is_some());
        assert_eq!(queue.outstanding(), 1);
        queue.finish();

        assert!(queue.pop().await.is_none());
        assert!(!queue.try_begin());
    }

    #[tokio::test]
    async fn test_pop_waits_for_outstanding_work() {
        let queue = Arc::new(JobQueue::new(4));
        assert!(queue.try_begin());
        queue.close();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A secondary job arrives before the parent finishes
        queue.begin();
        queue.push(job("font.woff2", AssetKind::Font));
        queue.finish();

        let popped = waiter.await.unwrap();
        assert!(popped.is_some());
    }

    #[tokio::test]
    async fn test_bounded_push_waits_for_space() {
        let queue = Arc::new(JobQueue::new(1));
        queue.push_bounded(job("a.css", AssetKind::Style)).await;

        let pusher = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push_bounded(job("b.css", AssetKind::Style)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pusher.is_finished());
        assert_eq!(queue.len(), 1);

        queue.pop().await.unwrap();
        pusher.await.unwrap();
        assert_eq!(queue.len(), 1);
    }
}
