//! Error taxonomy for the encoding pipeline.
//!
//! Unknown words are never errors (they become UNK tokens). Everything else that can go
//! wrong surfaces as an [`EmbedError`] and is recoverable by the caller.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors returned by `configure` / `encode` and the model store.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Encode input was neither a string nor a sequence of strings.
    #[error("input must be a string or an array of strings: {0}")]
    InputType(String),

    /// Configuration rejected; the previous configuration stays in effect.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Vocabulary or model artifact could not be loaded. A later call may retry.
    #[error("failed to load model or vocabulary: {0}")]
    ModelLoad(#[source] Arc<LoadError>),

    /// The inference engine failed for the text at `index`.
    #[error("inference failed for input #{index}: {source}")]
    Inference {
        index: usize,
        #[source]
        source: InferenceError,
    },

    /// Hidden states too short to hold the CLS/SEP framing.
    #[error("cannot pool a sequence of length {seq_len} (need at least 2 positions)")]
    DegenerateInput { seq_len: usize },
}

impl EmbedError {
    /// Stable machine-readable code used by the host protocol.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputType(_) => "INPUT_TYPE_ERROR",
            Self::InvalidConfig(_) => "CONFIG_ERROR",
            Self::ModelLoad(_) => "MODEL_LOAD_ERROR",
            Self::Inference { .. } => "INFERENCE_ERROR",
            Self::DegenerateInput { .. } => "DEGENERATE_INPUT",
        }
    }
}

/// Reasons a model load attempt can fail.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SHA256 mismatch for {file}: expected {expected}, got {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("malformed {file}: {message}")]
    Malformed { file: String, message: String },

    #[error("inference engine initialisation failed: {0:#}")]
    Engine(anyhow::Error),
}

/// Failures raised while running the inference engine on one token sequence.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("engine error: {0:#}")]
    Engine(anyhow::Error),

    #[error("unexpected hidden-state shape: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("hidden-state buffer holds {actual} values, shape needs {expected}")]
    BufferLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EmbedError>;
