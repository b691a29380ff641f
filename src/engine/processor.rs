//! Per-kind processing of a fetched asset
//!
//! - Stylesheets: fonts localized and dispatched as secondary jobs
//! - Scripts: stylesheet literals dispatched; the script is stored once those
//!   jobs are terminal, with the literals pointing at the local copies
//! - Everything else: stored as fetched

use crate::engine::fetcher::{fetch_asset, FetchedAsset};
use crate::engine::job::{AssetError, AssetKind, AssetResult, Job};
use crate::engine::scheduler::{Dispatcher, Execution, JobExecutor};
use crate::rewrite::relative_to_root;
use crate::storage::{local_file_name, NameRegistry, StorageSink};
use crate::transform::{
    find_stylesheet_references, localize_script, localize_stylesheet, strip_source_maps,
};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

/// Fetches, transforms and stores assets
#[derive(Clone)]
pub struct AssetProcessor {
    client: Client,
    storage: Arc<dyn StorageSink>,
    names: Arc<NameRegistry>,
}

impl AssetProcessor {
    pub fn new(client: Client, storage: Arc<dyn StorageSink>, names: Arc<NameRegistry>) -> Self {
        Self {
            client,
            storage,
            names,
        }
    }

    /// Writes `bytes` under the job's local name and returns the stored path
    fn persist(&self, job: &Job, fetched: &FetchedAsset, bytes: &[u8]) -> AssetResult {
        let desired = local_file_name(job.kind, &fetched.final_url, fetched.content_type.as_deref());
        let name = self.names.claim(job.key(), &desired);

        self.storage
            .put(&name, bytes)
            .map(|path| path.to_string_lossy().into_owned())
            .map_err(|e| AssetError::Storage {
                path: name,
                message: e.to_string(),
            })
    }

    fn process_stylesheet(&self, job: &Job, fetched: &FetchedAsset, dispatcher: &Dispatcher) -> AssetResult {
        let localized = localize_stylesheet(&fetched.text(), &fetched.final_url, &self.names);
        for font in localized.fonts {
            dispatcher.dispatch(font);
        }
        self.persist(job, fetched, localized.css.as_bytes())
    }

    fn process_script(&self, job: &Job, fetched: FetchedAsset, dispatcher: &Dispatcher) -> Execution {
        let js = strip_source_maps(&fetched.text()).into_owned();

        // A literal naming the script itself is left as written
        let pending: Vec<_> = find_stylesheet_references(&js, &job.base)
            .into_iter()
            .filter(|reference| reference.url.as_str() != job.key())
            .filter_map(|reference| {
                let dependency = Job::new(
                    reference.url,
                    AssetKind::Style,
                    reference.literal.clone(),
                    job.base.clone(),
                );
                dispatcher
                    .dispatch_and_watch(dependency)
                    .map(|completion| (reference.literal, completion))
            })
            .collect();

        if pending.is_empty() {
            return Execution::Done(self.persist(job, &fetched, js.as_bytes()));
        }

        let processor = self.clone();
        let job = job.clone();
        Execution::Pending(Box::pin(async move {
            let mut replacements = HashMap::new();
            for (literal, completion) in pending {
                match completion.wait().await {
                    Ok(path) => {
                        let local = relative_to_root(&path, processor.storage.root());
                        replacements.insert(literal, local);
                    }
                    Err(e) => tracing::debug!("Keeping script literal {}: {}", literal, e),
                }
            }

            let js = localize_script(&js, &replacements);
            processor.persist(&job, &fetched, js.as_bytes())
        }))
    }
}

#[async_trait]
impl JobExecutor for AssetProcessor {
    async fn execute(&self, job: &Job, dispatcher: &Dispatcher) -> Execution {
        let fetched = match fetch_asset(&self.client, &job.url).await {
            Ok(fetched) => fetched,
            Err(e) => return Execution::Done(Err(e)),
        };

        match job.kind {
            AssetKind::Style => Execution::Done(self.process_stylesheet(job, &fetched, dispatcher)),
            AssetKind::Script => self.process_script(job, fetched, dispatcher),
            AssetKind::Image | AssetKind::Font | AssetKind::Manifest | AssetKind::Json => {
                Execution::Done(self.persist(job, &fetched, &fetched.body))
            }
        }
    }
}
