//! Sentence embeddings: text → fixed-size dense vectors.
//!
//! The core is [`embeddings::pipeline::EncodePipeline`]: whole-word tokenization, an
//! opaque [`embeddings::engine::InferenceEngine`] forward pass, mean pooling over the
//! non-special positions and optional L2 normalization. The `embed_host` binary exposes
//! `configure` / `encode` over a length-prefixed JSON protocol.

pub mod config;
pub mod embeddings;
pub mod error;

pub use embeddings::engine::{HiddenStates, InferenceEngine};
pub use embeddings::pipeline::{ConfigureOptions, EncodeConfig, EncodeInput, EncodePipeline};
pub use embeddings::store::{LoadedModel, ModelSource, ModelState, ModelStatus, ModelStore};
pub use embeddings::vocab::Vocabulary;
pub use error::{EmbedError, InferenceError, LoadError};
