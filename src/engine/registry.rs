//! Shared result accumulator
//!
//! Tracks every canonical URL the pool has accepted, merges origin strings of
//! duplicate submissions and builds the asset map as jobs succeed.

use crate::engine::job::{AssetKind, AssetResult, Job};
use crate::rewrite::AssetMap;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

struct Entry {
    kind: AssetKind,
    origins: Vec<String>,
    status: watch::Sender<Option<AssetResult>>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, Entry>,
    asset_map: AssetMap,
}

/// Outcome of registering a job
pub(crate) enum Registration {
    /// First time this canonical URL is seen; the job must be queued
    New(watch::Receiver<Option<AssetResult>>),
    /// Already known; origins were merged into the existing entry
    Duplicate(watch::Receiver<Option<AssetResult>>),
    /// Already known as a script that has not finished; it may itself be
    /// waiting on the caller, so its result must not be awaited
    PendingScript,
}

#[derive(Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `job` under its canonical URL
    ///
    /// For a duplicate, origins not seen before are merged. When the existing
    /// entry already succeeded those origins go straight into the asset map.
    pub fn register(&self, job: &Job) -> Registration {
        let mut guard = self.lock();
        let state = &mut *guard;

        if let Some(entry) = state.entries.get_mut(job.key()) {
            let stored = match &*entry.status.borrow() {
                Some(Ok(path)) => Some(path.clone()),
                _ => None,
            };
            for origin in &job.origins {
                if !entry.origins.contains(origin) {
                    entry.origins.push(origin.clone());
                    if let Some(path) = &stored {
                        state.asset_map.insert(origin.clone(), path.clone());
                    }
                }
            }
            if entry.kind == AssetKind::Script && entry.status.borrow().is_none() {
                return Registration::PendingScript;
            }
            return Registration::Duplicate(entry.status.subscribe());
        }

        let (status, receiver) = watch::channel(None);
        state.entries.insert(
            job.key().to_string(),
            Entry {
                kind: job.kind,
                origins: job.origins.clone(),
                status,
            },
        );
        Registration::New(receiver)
    }

    /// Records the terminal result of a job and notifies its watchers
    pub fn complete(&self, job: &Job, result: &AssetResult) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(entry) = state.entries.get_mut(job.key()) else {
            return;
        };

        for origin in &job.origins {
            if !entry.origins.contains(origin) {
                entry.origins.push(origin.clone());
            }
        }

        if let Ok(path) = result {
            for origin in &entry.origins {
                state.asset_map.insert(origin.clone(), path.clone());
            }
        }

        entry.status.send_replace(Some(result.clone()));
    }

    /// Origins recorded for a canonical URL
    #[cfg(test)]
    pub fn origins(&self, key: &str) -> Vec<String> {
        self.lock()
            .entries
            .get(key)
            .map(|e| e.origins.clone())
            .unwrap_or_default()
    }

    pub fn asset_map(&self) -> AssetMap {
        self.lock().asset_map.clone()
    }
}
