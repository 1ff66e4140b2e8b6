//! Per-scheme mutation workers.
//!
//! Engine handles cannot be written concurrently, so every `learn` and
//! `train` goes through a bounded per-scheme queue consumed by one worker
//! task holding its own pinned handle. Producers never block: a full
//! queue drops the submission and logs it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use akshara_core::error::{Error, Result};
use akshara_core::metrics::Metrics;
use akshara_core::traits::{Engine, EngineHandle};

/// Queue capacity per scheme, learn and train each.
pub const QUEUE_CAPACITY: usize = 1000;

/// A pattern-to-word pairing waiting to be trained.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub pattern: String,
    pub word: String,
}

/// Handles to every scheme's mutation queues.
pub struct Mutations {
    learn: HashMap<String, mpsc::Sender<String>>,
    train: HashMap<String, mpsc::Sender<TrainRequest>>,
    metrics: Metrics,
}

impl Mutations {
    /// Spawn one worker per scheme, each with a pinned handle opened
    /// outside the read pool.
    pub fn start(engine: &Arc<dyn Engine>, metrics: Metrics) -> Result<Self> {
        Self::with_capacity(engine, metrics, QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        engine: &Arc<dyn Engine>,
        metrics: Metrics,
        capacity: usize,
    ) -> Result<Self> {
        let mut learn = HashMap::new();
        let mut train = HashMap::new();

        for scheme in engine.scheme_details() {
            let handle = engine.new_handle(&scheme.identifier)?;
            metrics.record_handle_created();

            let (learn_tx, learn_rx) = mpsc::channel(capacity);
            let (train_tx, train_rx) = mpsc::channel(capacity);

            learn.insert(scheme.identifier.clone(), learn_tx);
            train.insert(scheme.identifier.clone(), train_tx);

            tokio::spawn(worker_loop(scheme.identifier.clone(), handle, learn_rx, train_rx));
        }

        Ok(Self { learn, train, metrics })
    }

    /// Queue a word to learn. Best-effort: a full queue drops the word.
    pub fn submit_learn(&self, scheme: &str, word: String) -> Result<()> {
        let tx = self
            .learn
            .get(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))?;

        match tx.try_send(word) {
            Ok(()) => {
                self.metrics.record_learn_submitted();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(word)) => {
                warn!(scheme, word = %word, "learn queue full, dropping submission");
                self.metrics.record_learn_dropped();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::internal(format!("learn worker for {} is gone", scheme)))
            }
        }
    }

    /// Queue a pattern-to-word training. Best-effort, like `submit_learn`.
    pub fn submit_train(&self, scheme: &str, request: TrainRequest) -> Result<()> {
        let tx = self
            .train
            .get(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))?;

        match tx.try_send(request) {
            Ok(()) => {
                self.metrics.record_train_submitted();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(request)) => {
                warn!(
                    scheme,
                    pattern = %request.pattern,
                    word = %request.word,
                    "train queue full, dropping submission"
                );
                self.metrics.record_train_dropped();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::internal(format!("train worker for {} is gone", scheme)))
            }
        }
    }

    pub fn knows_scheme(&self, scheme: &str) -> bool {
        self.learn.contains_key(scheme)
    }
}

async fn worker_loop(
    scheme: String,
    mut handle: Box<dyn EngineHandle>,
    mut learn_rx: mpsc::Receiver<String>,
    mut train_rx: mpsc::Receiver<TrainRequest>,
) {
    info!(scheme = %scheme, "mutation worker started");

    loop {
        tokio::select! {
            word = learn_rx.recv() => match word {
                Some(word) => {
                    if let Err(e) = handle.learn(word.trim(), 0) {
                        warn!(scheme = %scheme, word = %word, error = %e, "failed to learn");
                    }
                }
                None => break,
            },
            request = train_rx.recv() => match request {
                Some(request) => {
                    if let Err(e) = handle.train(request.pattern.trim(), request.word.trim()) {
                        warn!(
                            scheme = %scheme,
                            pattern = %request.pattern,
                            word = %request.word,
                            error = %e,
                            "failed to train"
                        );
                    }
                }
                None => break,
            },
        }
    }

    info!(scheme = %scheme, "mutation worker stopped");
}
