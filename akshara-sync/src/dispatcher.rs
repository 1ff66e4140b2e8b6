//! The sync dispatcher: a process-wide singleton that periodically pulls
//! corpus pages from the upstream peer, persists them to the learn queue
//! and feeds them through the engine's bulk-learn path.
//!
//! Within one scheme the pipeline is three tasks: a feeder staging queue
//! files left over from earlier runs, a downloader appending fresh pages,
//! and the learner draining both in that order. Staging the local queue
//! first means a page persisted just before a crash is never lost, and
//! the offset file is only advanced after its page is durably on disk.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use akshara_core::metrics::Metrics;
use akshara_engine::pool::HandlePool;

use crate::queue::SyncPaths;
use crate::upstream::UpstreamClient;

/// Buffer size of the file-staging channels.
const PIPELINE_DEPTH: usize = 100;

struct SyncCore {
    pool: Arc<HandlePool>,
    upstream: UpstreamClient,
    paths: SyncPaths,
    tick_interval: Duration,
    enabled: RwLock<HashSet<String>>,
    running: AtomicBool,
    force_tx: mpsc::Sender<()>,
    force_rx: Mutex<Option<mpsc::Receiver<()>>>,
    quit_tx: watch::Sender<bool>,
    metrics: Metrics,
}

/// Handle to the dispatcher. Cloneable; all clones share one runner.
#[derive(Clone)]
pub struct SyncDispatcher {
    core: Arc<SyncCore>,
}

impl SyncDispatcher {
    pub fn new(
        pool: Arc<HandlePool>,
        upstream: UpstreamClient,
        paths: SyncPaths,
        tick_interval: Duration,
        enabled: HashSet<String>,
        metrics: Metrics,
    ) -> Self {
        let (force_tx, force_rx) = mpsc::channel(1);
        let (quit_tx, _) = watch::channel(false);

        Self {
            core: Arc::new(SyncCore {
                pool,
                upstream,
                paths,
                tick_interval,
                enabled: RwLock::new(enabled),
                running: AtomicBool::new(false),
                force_tx,
                force_rx: Mutex::new(Some(force_rx)),
                quit_tx,
                metrics,
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Whether any scheme is download-enabled.
    pub fn has_enabled_schemes(&self) -> bool {
        !self.core.enabled.read().is_empty()
    }

    pub fn is_enabled(&self, scheme: &str) -> bool {
        self.core.enabled.read().contains(scheme)
    }

    /// Toggle downloading for a scheme. Enabling starts the dispatcher if
    /// the daemon came up with nothing to sync.
    pub fn set_download_status(&self, scheme: &str, enabled: bool) {
        {
            let mut set = self.core.enabled.write();
            if enabled {
                set.insert(scheme.to_string());
            } else {
                set.remove(scheme);
            }
        }

        if enabled {
            self.start();
        }
    }

    /// Spawn the ticker task. Idempotent.
    pub fn start(&self) {
        if self.core.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(mut force_rx) = self.core.force_rx.lock().take() else {
            return;
        };

        let core = self.core.clone();
        let mut quit_rx = core.quit_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(core.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("sync dispatcher started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => core.sync_all().await,
                    Some(()) = force_rx.recv() => core.sync_all().await,
                    _ = quit_rx.changed() => {
                        info!("sync dispatcher stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Ask the runner for an immediate pass.
    pub fn run_now(&self) {
        let _ = self.core.force_tx.try_send(());
    }

    pub fn shutdown(&self) {
        let _ = self.core.quit_tx.send(true);
    }

    /// One full pass over every enabled scheme, inline. The ticker calls
    /// this; tests can too.
    pub async fn sync_all(&self) {
        self.core.sync_all().await;
    }
}

impl SyncCore {
    async fn sync_all(&self) {
        let schemes: Vec<String> = self.enabled.read().iter().cloned().collect();
        if schemes.is_empty() {
            return;
        }

        info!("sync begin");

        for scheme in schemes {
            if let Err(e) = self.sync_scheme(&scheme).await {
                warn!(scheme = %scheme, error = %e, "sync aborted for scheme");
            }
        }

        info!("sync done");
    }

    async fn sync_scheme(&self, scheme: &str) -> akshara_core::Result<()> {
        self.paths.ensure_dirs(scheme)?;

        let corpus_size = self.upstream.corpus_size(scheme).await?;
        info!(scheme, corpus_size, "syncing scheme");

        let (local_tx, mut local_rx) = mpsc::channel(PIPELINE_DEPTH);
        let (downloaded_tx, mut downloaded_rx) = mpsc::channel(PIPELINE_DEPTH);

        // Stage whatever a previous run left in the queue.
        let leftovers = self.paths.queued_files(scheme);
        if !leftovers.is_empty() {
            info!(scheme, count = leftovers.len(), "staging files from local learn queue");
        }
        tokio::spawn(async move {
            for file in leftovers {
                if local_tx.send(file).await.is_err() {
                    break;
                }
            }
        });

        // Download fresh pages, advancing the offset only after each page
        // file is durably written.
        let downloader = {
            let upstream = self.upstream.clone();
            let paths = self.paths.clone();
            let metrics = self.metrics.clone();
            let scheme = scheme.to_string();

            tokio::spawn(async move {
                loop {
                    let offset = paths.read_offset(&scheme);
                    if offset >= corpus_size {
                        info!(scheme = %scheme, offset, "local copy is up to date");
                        break;
                    }

                    let page = match upstream.download_page(&scheme, offset).await {
                        Ok(page) => page,
                        Err(e) => {
                            warn!(scheme = %scheme, offset, error = %e, "page download failed");
                            break;
                        }
                    };

                    if page.count == 0 {
                        break;
                    }

                    let file = match paths.persist_page(&scheme, offset, &page.words) {
                        Ok(file) => file,
                        Err(e) => {
                            warn!(scheme = %scheme, offset, error = %e, "failed to persist page");
                            break;
                        }
                    };

                    if let Err(e) = paths.write_offset(&scheme, offset + page.count) {
                        warn!(scheme = %scheme, offset, error = %e, "failed to advance offset");
                        break;
                    }

                    metrics.record_page_synced();

                    if downloaded_tx.send(file).await.is_err() {
                        break;
                    }
                }
            })
        };

        // Learn staged files first, then the fresh downloads.
        while let Some(file) = local_rx.recv().await {
            self.learn_file(scheme, &file).await;
        }
        while let Some(file) = downloaded_rx.recv().await {
            self.learn_file(scheme, &file).await;
        }

        let _ = downloader.await;

        Ok(())
    }

    async fn learn_file(&self, scheme: &str, file: &Path) {
        info!(scheme, file = %file.display(), "learning from file");

        let result = self
            .pool
            .with_handle(scheme, |handle| handle.learn_from_file(file))
            .await;

        match result {
            Ok(status) => {
                info!(
                    scheme,
                    file = %file.display(),
                    total = status.total_words,
                    failed = status.failed,
                    "learned from file"
                );
                self.paths.remove_queued(file);
            }
            Err(e) => {
                // Left in the queue: the next tick retries it.
                warn!(scheme, file = %file.display(), error = %e, "failed to learn from file");
            }
        }
    }
}
