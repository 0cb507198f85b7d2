//! The "files" miner: composes the crawler, scheduler, monitor and
//! per-file pipeline into a single [`Miner`] implementation for the
//! orchestrator.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracker_core::crawl::{FsIntent, IgnoreRules, Monitor};
use tracker_core::error::Result;
use tracker_core::extract::{ExtractorClient, PooledExtractorClient};
use tracker_core::ontology::Registry;
use tracker_core::orchestrator::{Miner, MinerSummary};
use tracker_core::pipeline::{self, PipelineContext, PipelineOutcome, SparqlFragmentSink};
use tracker_core::scheduler::{RootModule, Scheduler, Tick};
use tracker_core::store::Store;
use tracker_core::writeback::WritebackDispatcher;
use tracing::{debug, info, warn};

pub struct FilesMinerConfig {
    pub recursive_roots: Vec<PathBuf>,
    pub single_roots: Vec<PathBuf>,
    pub ignore: IgnoreRules,
    pub enable_monitors: bool,
}

pub struct FilesMiner<C: ExtractorClient> {
    config: FilesMinerConfig,
    store: Arc<Store>,
    registry: Arc<Registry>,
    extractor: Arc<PooledExtractorClient<C>>,
    sparql_sink: Arc<dyn SparqlFragmentSink>,
    writeback: Arc<WritebackDispatcher>,
}

impl<C: ExtractorClient + 'static> FilesMiner<C> {
    pub fn new(
        config: FilesMinerConfig,
        store: Arc<Store>,
        registry: Arc<Registry>,
        extractor: Arc<PooledExtractorClient<C>>,
        sparql_sink: Arc<dyn SparqlFragmentSink>,
        writeback: Arc<WritebackDispatcher>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            extractor,
            sparql_sink,
            writeback,
        }
    }

    fn build_scheduler(&self) -> Scheduler {
        let mut modules: Vec<RootModule> = self
            .config
            .recursive_roots
            .iter()
            .map(|p| RootModule {
                path: p.clone(),
                recursive: true,
            })
            .collect();
        modules.extend(self.config.single_roots.iter().map(|p| RootModule {
            path: p.clone(),
            recursive: false,
        }));
        Scheduler::new(modules)
    }

    fn build_context(&self) -> PipelineContext<C> {
        PipelineContext {
            store: self.store.clone(),
            registry: self.registry.clone(),
            extractor: self.extractor.clone(),
            sparql_sink: self.sparql_sink.clone(),
            writeback: self.writeback.clone(),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Control surface: (re)checks specific paths immediately, bypassing
    /// the mtime gate so a requested recheck always re-indexes regardless
    /// of whether the file looks unchanged.
    pub async fn check_files(&self, paths: &[PathBuf], cancel: CancellationToken) -> Vec<PipelineOutcome> {
        let ctx = self.build_context();
        let datasource = pipeline::NON_REMOVABLE_DATASOURCE.to_string();
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            outcomes.push(pipeline::process_file(&ctx, path, &datasource, true, cancel.child_token()).await);
        }
        outcomes
    }

    /// Control surface: re-checks a single already-indexed resource by its
    /// stored `file://` URI.
    pub async fn index_file(&self, uri: &str, cancel: CancellationToken) -> PipelineOutcome {
        let Some(path) = pipeline::path_from_file_uri(uri) else {
            return PipelineOutcome::Failed(format!("not a file:// uri: {uri}"));
        };
        let ctx = self.build_context();
        let datasource = pipeline::NON_REMOVABLE_DATASOURCE.to_string();
        pipeline::process_file(&ctx, &path, &datasource, true, cancel).await
    }

    /// Control surface: renames a resource and its descendants in the
    /// store directly, the same store-side operation a monitor-observed
    /// move triggers via `FsIntent::Move`.
    pub async fn move_file(&self, from: &std::path::Path, to: &std::path::Path) -> Result<u64> {
        let from_url = format!("file://{}", from.display());
        let to_url = format!("file://{}", to.display());
        self.store.rename_subtree(&from_url, &to_url).await
    }

    /// Control surface: finds every resource whose `nie:mimeType` is in
    /// `mimes` and re-runs it through the pipeline.
    pub async fn reindex_by_mime_type(&self, mimes: &[String], cancel: CancellationToken) -> Result<usize> {
        let uris = self.store.uris_by_mime_type(mimes).await?;
        let ctx = self.build_context();
        let datasource = pipeline::NON_REMOVABLE_DATASOURCE.to_string();
        let mut count = 0;
        for uri in uris {
            if cancel.is_cancelled() {
                break;
            }
            let Some(path) = pipeline::path_from_file_uri(&uri) else {
                continue;
            };
            pipeline::process_file(&ctx, &path, &datasource, true, cancel.child_token()).await;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl<C: ExtractorClient + 'static> Miner for FilesMiner<C> {
    fn name(&self) -> &str {
        "files"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<MinerSummary> {
        let crawler = tracker_core::crawl::Crawler::new(self.config.ignore.clone());
        let mut scheduler = self.build_scheduler();

        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel::<FsIntent>();
        let _monitor = if self.config.enable_monitors {
            let mut roots = self.config.recursive_roots.clone();
            roots.extend(self.config.single_roots.clone());
            match Monitor::start(&roots, intent_tx) {
                Ok(m) => Some(m),
                Err(err) => {
                    warn!(%err, "failed to start filesystem monitor, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let ctx = self.build_context();

        let mut processed = 0u64;
        let mut indexed = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            while let Ok(intent) = intent_rx.try_recv() {
                apply_intent(&mut scheduler, &self.store, intent).await;
            }

            match scheduler.tick(&crawler) {
                Tick::Finished => {
                    if !self.config.enable_monitors {
                        break;
                    }
                    // With monitors enabled the miner idles, waiting for
                    // the next filesystem intent, rather than exiting.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        intent = intent_rx.recv() => {
                            match intent {
                                Some(intent) => apply_intent(&mut scheduler, &self.store, intent).await,
                                None => break,
                            }
                        }
                    }
                }
                Tick::Progressed => continue,
                Tick::File(path) => {
                    let datasource = pipeline::NON_REMOVABLE_DATASOURCE.to_string();
                    let outcome =
                        pipeline::process_file(&ctx, &path, &datasource, false, cancel.child_token()).await;
                    processed += 1;
                    match outcome {
                        PipelineOutcome::Processed { indexed: was_indexed } => {
                            if was_indexed {
                                indexed += 1;
                            }
                        }
                        PipelineOutcome::Failed(reason) => {
                            debug!(?path, reason, "file processing failed");
                        }
                        PipelineOutcome::Cancelled => {
                            debug!(?path, "file processing cancelled");
                        }
                    }
                }
            }
        }

        info!(processed, indexed, "files miner finished a pass");
        Ok(MinerSummary { processed, indexed })
    }
}

/// Applies one filesystem intent to the in-memory queue and, for a move,
/// to the store: `scheduler.rename_subtree` only rewrites paths still
/// waiting to be crawled, so a moved directory's already-indexed
/// descendants need their own recursive URI rename against `Resource`.
async fn apply_intent(scheduler: &mut Scheduler, store: &Store, intent: FsIntent) {
    match intent {
        FsIntent::Recheck(path) => scheduler.enqueue_file(path),
        FsIntent::Move { from, to } => {
            scheduler.rename_subtree(&from, &to);
            let from_url = format!("file://{}", from.display());
            let to_url = format!("file://{}", to.display());
            if let Err(err) = store.rename_subtree(&from_url, &to_url).await {
                warn!(%err, ?from, ?to, "failed to rename stored resource subtree");
            }
        }
        FsIntent::Remove(path) => scheduler.cancel_subtree(&path),
    }
}
