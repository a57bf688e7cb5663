// testing.rs — Stub model sources and engines shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use anyhow::bail;

use crate::error::LoadError;

use super::engine::{HiddenStates, InferenceEngine};
use super::store::ModelSource;
use super::vocab::Vocabulary;

pub const STUB_HIDDEN: usize = 4;

/// Deterministic engine: value at (pos, dim) = id * 0.01 + dim + pos * 0.5.
pub struct StubEngine {
    pub hidden_size: usize,
}

impl InferenceEngine for StubEngine {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn forward(&self, input_ids: &[u32]) -> anyhow::Result<HiddenStates> {
        let data = input_ids
            .iter()
            .enumerate()
            .flat_map(|(pos, &id)| {
                (0..self.hidden_size).map(move |dim| id as f32 * 0.01 + dim as f32 + pos as f32 * 0.5)
            })
            .collect();
        Ok(HiddenStates::new(input_ids.len(), self.hidden_size, data)?)
    }
}

/// Always errors.
pub struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn hidden_size(&self) -> usize {
        STUB_HIDDEN
    }

    fn forward(&self, _input_ids: &[u32]) -> anyhow::Result<HiddenStates> {
        bail!("device lost")
    }
}

/// Returns one position fewer than it was given.
pub struct TruncatingEngine;

impl InferenceEngine for TruncatingEngine {
    fn hidden_size(&self) -> usize {
        STUB_HIDDEN
    }

    fn forward(&self, input_ids: &[u32]) -> anyhow::Result<HiddenStates> {
        let len = input_ids.len() - 1;
        Ok(HiddenStates::new(len, STUB_HIDDEN, vec![1.0; len * STUB_HIDDEN])?)
    }
}

/// Non-reentrant engine that records whether two forward calls ever overlapped.
#[derive(Default)]
pub struct ExclusiveEngine {
    in_flight: AtomicBool,
    pub overlapped: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
}

impl InferenceEngine for ExclusiveEngine {
    fn hidden_size(&self) -> usize {
        STUB_HIDDEN
    }

    fn forward(&self, input_ids: &[u32]) -> anyhow::Result<HiddenStates> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(2));
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
        StubEngine {
            hidden_size: STUB_HIDDEN,
        }
        .forward(input_ids)
    }

    fn is_reentrant(&self) -> bool {
        false
    }
}

pub fn stub_vocab() -> Vocabulary {
    Vocabulary::from_pairs([("hello", 5), ("world", 7), ("quick", 2), ("fox", 3)])
}

#[derive(Debug, Clone, Copy)]
pub enum SourceBehavior {
    Succeed,
    /// Fail this many attempts, then succeed.
    FailFirst(usize),
    PanicFirst,
    EmptyVocab,
}

#[derive(Default)]
pub struct LoadCounter {
    vocab: AtomicUsize,
    engine: AtomicUsize,
}

impl LoadCounter {
    pub fn vocab_loads(&self) -> usize {
        self.vocab.load(Ordering::SeqCst)
    }

    pub fn engine_loads(&self) -> usize {
        self.engine.load(Ordering::SeqCst)
    }
}

/// Model source that counts how often it is asked to load.
pub struct CountingSource {
    behavior: SourceBehavior,
    delay: Duration,
    counter: Arc<LoadCounter>,
}

impl CountingSource {
    pub fn new(behavior: SourceBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            counter: Arc::default(),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn counter(&self) -> Arc<LoadCounter> {
        Arc::clone(&self.counter)
    }
}

impl ModelSource for CountingSource {
    fn load_vocabulary(&self) -> Result<Vocabulary, LoadError> {
        let attempt = self.counter.vocab.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        match self.behavior {
            SourceBehavior::FailFirst(n) if attempt < n => Err(LoadError::Read {
                path: "vocab.txt".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            }),
            SourceBehavior::PanicFirst if attempt == 0 => panic!("loader crashed"),
            SourceBehavior::EmptyVocab => Ok(Vocabulary::default()),
            _ => Ok(stub_vocab()),
        }
    }

    fn load_engine(&self) -> Result<Box<dyn InferenceEngine>, LoadError> {
        self.counter.engine.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubEngine {
            hidden_size: STUB_HIDDEN,
        }))
    }
}

/// Source handing out a prebuilt engine once.
pub struct EngineSource {
    engine: parking_lot::Mutex<Option<Box<dyn InferenceEngine>>>,
}

impl EngineSource {
    pub fn new(engine: impl InferenceEngine + 'static) -> Self {
        Self {
            engine: parking_lot::Mutex::new(Some(Box::new(engine))),
        }
    }
}

impl ModelSource for EngineSource {
    fn load_vocabulary(&self) -> Result<Vocabulary, LoadError> {
        Ok(stub_vocab())
    }

    fn load_engine(&self) -> Result<Box<dyn InferenceEngine>, LoadError> {
        self.engine
            .lock()
            .take()
            .ok_or_else(|| LoadError::Engine(anyhow::anyhow!("engine already taken")))
    }
}

/// Source whose loads always fail; the `gated`-th attempt (1-based) parks between
/// the `entered` and `release` barriers so tests can act while it is in flight.
pub struct GatedSource {
    gated: usize,
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
    counter: Arc<LoadCounter>,
}

impl GatedSource {
    pub fn new(gated: usize) -> Self {
        Self {
            gated,
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
            counter: Arc::default(),
        }
    }

    /// `(entered, release)`: wait on `entered` until the gated attempt starts, then on
    /// `release` to let it fail.
    pub fn gates(&self) -> (Arc<Barrier>, Arc<Barrier>) {
        (Arc::clone(&self.entered), Arc::clone(&self.release))
    }

    pub fn counter(&self) -> Arc<LoadCounter> {
        Arc::clone(&self.counter)
    }
}

impl ModelSource for GatedSource {
    fn load_vocabulary(&self) -> Result<Vocabulary, LoadError> {
        let attempt = self.counter.vocab.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.gated {
            self.entered.wait();
            self.release.wait();
        }
        Err(LoadError::Malformed {
            file: "vocab.txt".into(),
            message: format!("attempt {attempt} rejected"),
        })
    }

    fn load_engine(&self) -> Result<Box<dyn InferenceEngine>, LoadError> {
        self.counter.engine.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubEngine {
            hidden_size: STUB_HIDDEN,
        }))
    }
}
