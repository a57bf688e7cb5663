// store.rs — Lazily loads the vocabulary and inference engine exactly once.
//
// State machine: Unloaded -> Loading -> Loaded | Failed.
// - Loading runs outside the lock; concurrent callers wait on the condvar and observe the
//   in-flight attempt's result, success or failure.
// - Failed is not terminal: the next call after a failure starts a new attempt.
// - If the loading thread unwinds, the state falls back to Unloaded and waiters are woken.
// - The most recent failure is kept apart from the state, so a retry in progress still
//   reports it. Only a successful load clears it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::config;
use crate::error::{EmbedError, LoadError, Result};

use super::assets::{self, Checksums};
use super::engine::{BertEngine, InferenceEngine};
use super::vocab::Vocabulary;

/// Where the vocabulary and engine come from.
pub trait ModelSource: Send + Sync {
    fn load_vocabulary(&self) -> std::result::Result<Vocabulary, LoadError>;
    fn load_engine(&self) -> std::result::Result<Box<dyn InferenceEngine>, LoadError>;
}

/// On-disk model directory: vocab.txt + config.json + model.safetensors (+ optional SHA256SUMS).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ModelSource for DirectorySource {
    fn load_vocabulary(&self) -> std::result::Result<Vocabulary, LoadError> {
        let checksums = Checksums::load(&self.dir)?;
        let path = self.dir.join(config::embedding::VOCAB_FILE);
        let text = assets::read_verified_text(&path, &checksums)?;
        Ok(Vocabulary::from_text(&text))
    }

    fn load_engine(&self) -> std::result::Result<Box<dyn InferenceEngine>, LoadError> {
        let checksums = Checksums::load(&self.dir)?;
        checksums.verify(&self.dir.join(config::embedding::CONFIG_FILE))?;
        checksums.verify(&self.dir.join(config::embedding::WEIGHTS_FILE))?;
        let engine = BertEngine::load(&self.dir).map_err(LoadError::Engine)?;
        Ok(Box::new(engine))
    }
}

/// Vocabulary and engine handle, read-only once loaded.
pub struct LoadedModel {
    pub vocab: Vocabulary,
    pub engine: Box<dyn InferenceEngine>,
}

impl LoadedModel {
    pub fn hidden_size(&self) -> usize {
        self.engine.hidden_size()
    }
}

enum LoadState {
    Unloaded,
    Loading,
    Loaded(Arc<LoadedModel>),
    Failed(Arc<LoadError>),
}

struct Inner {
    state: LoadState,
    /// Number of load attempts started so far.
    attempts: u64,
    last_error: Option<Arc<LoadError>>,
    /// Callers blocked on an in-flight attempt.
    waiting: usize,
}

/// Lifecycle state as reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// Snapshot of the store for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub state: ModelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocab_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_size: Option<usize>,
}

pub struct ModelStore {
    source: Box<dyn ModelSource>,
    inner: Mutex<Inner>,
    settled: Condvar,
}

impl ModelStore {
    pub fn new(source: impl ModelSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            inner: Mutex::new(Inner {
                state: LoadState::Unloaded,
                attempts: 0,
                last_error: None,
                waiting: 0,
            }),
            settled: Condvar::new(),
        }
    }

    /// Store backed by a model directory on disk.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(DirectorySource::new(dir))
    }

    /// Return the loaded model, loading it first if needed. Idempotent and safe to call
    /// concurrently: at most one load runs at a time.
    pub fn ensure_loaded(&self) -> Result<Arc<LoadedModel>> {
        let mut inner = self.inner.lock();
        loop {
            if let LoadState::Loaded(model) = &inner.state {
                return Ok(Arc::clone(model));
            }
            if !matches!(inner.state, LoadState::Loading) {
                break;
            }

            let awaited = inner.attempts;
            inner.waiting += 1;
            while matches!(inner.state, LoadState::Loading) {
                self.settled.wait(&mut inner);
            }
            inner.waiting -= 1;
            // Report the failure of the attempt we waited on instead of retrying it.
            if let LoadState::Failed(err) = &inner.state {
                if inner.attempts == awaited {
                    return Err(EmbedError::ModelLoad(Arc::clone(err)));
                }
            }
        }

        inner.state = LoadState::Loading;
        inner.attempts += 1;
        let attempt = inner.attempts;
        drop(inner);

        let mut reset = ResetOnUnwind {
            store: self,
            armed: true,
        };
        log::info!("Loading embedding model (attempt {})", attempt);
        let started = Instant::now();
        let result = self.load_once();
        reset.armed = false;

        let mut inner = self.inner.lock();
        let outcome = match result {
            Ok(model) => {
                log::info!(
                    "Embedding model loaded in {:?} (vocab={}, dims={})",
                    started.elapsed(),
                    model.vocab.len(),
                    model.hidden_size()
                );
                let model = Arc::new(model);
                inner.state = LoadState::Loaded(Arc::clone(&model));
                inner.last_error = None;
                Ok(model)
            }
            Err(e) => {
                log::warn!("Embedding model load failed: {}", e);
                let err = Arc::new(e);
                inner.state = LoadState::Failed(Arc::clone(&err));
                inner.last_error = Some(Arc::clone(&err));
                Err(EmbedError::ModelLoad(err))
            }
        };
        drop(inner);
        self.settled.notify_all();
        outcome
    }

    fn load_once(&self) -> std::result::Result<LoadedModel, LoadError> {
        let vocab = self.source.load_vocabulary()?;
        if vocab.is_empty() {
            return Err(LoadError::Malformed {
                file: config::embedding::VOCAB_FILE.to_string(),
                message: "vocabulary is empty".to_string(),
            });
        }
        let engine = self.source.load_engine()?;
        Ok(LoadedModel { vocab, engine })
    }

    pub fn status(&self) -> ModelStatus {
        let inner = self.inner.lock();
        let (state, sizes) = match &inner.state {
            LoadState::Unloaded => (ModelState::Unloaded, None),
            LoadState::Loading => (ModelState::Loading, None),
            LoadState::Loaded(model) => (ModelState::Loaded, Some((model.vocab.len(), model.hidden_size()))),
            LoadState::Failed(_) => (ModelState::Failed, None),
        };
        ModelStatus {
            state,
            last_error: inner.last_error.as_ref().map(|e| e.to_string()),
            vocab_size: sizes.map(|(vocab, _)| vocab),
            hidden_size: sizes.map(|(_, hidden)| hidden),
        }
    }

    pub fn state(&self) -> ModelState {
        self.status().state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.inner.lock().state, LoadState::Loaded(_))
    }

    #[cfg(test)]
    fn waiting(&self) -> usize {
        self.inner.lock().waiting
    }
}

/// Puts the store back to Unloaded if a load attempt unwinds.
struct ResetOnUnwind<'a> {
    store: &'a ModelStore,
    armed: bool,
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.inner.lock().state = LoadState::Unloaded;
            self.store.settled.notify_all();
        }
    }
}
