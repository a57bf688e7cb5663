// pipeline.rs — configure + encode: tokenize → inference → mean pool → optional L2 normalize.
//
// Configuration is process-wide and snapshotted at the start of every encode call. Texts are
// processed in order and the call fails fast on the first failing text.

use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config;
use crate::error::{EmbedError, InferenceError, Result};

use super::engine::{HiddenStates, InferenceEngine};
use super::pooling::{l2_normalize, mean_pool};
use super::store::{LoadedModel, ModelStatus, ModelStore};
use super::tokenizer::tokenize;

/// Effective encode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeConfig {
    pub max_length: usize,
    pub normalize: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            max_length: config::embedding::DEFAULT_MAX_LENGTH,
            normalize: config::embedding::DEFAULT_NORMALIZE,
        }
    }
}

/// `configure` input. Unset fields fall back to the defaults, not to the previous values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureOptions {
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub normalize: Option<bool>,
}

impl ConfigureOptions {
    /// Parse from JSON. `null` is treated as an empty options object.
    pub fn from_json(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value).map_err(|e| EmbedError::InvalidConfig(e.to_string()))
    }

    fn resolve(&self) -> Result<EncodeConfig> {
        let max_length = self
            .max_length
            .unwrap_or(config::embedding::DEFAULT_MAX_LENGTH);
        if max_length == 0 {
            return Err(EmbedError::InvalidConfig(
                "maxLength must be a positive integer".to_string(),
            ));
        }
        Ok(EncodeConfig {
            max_length,
            normalize: self.normalize.unwrap_or(config::embedding::DEFAULT_NORMALIZE),
        })
    }
}

/// Encode input: one text or an ordered list of texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeInput {
    One(String),
    Many(Vec<String>),
}

impl EncodeInput {
    /// Accept a JSON string or an array of strings. Arrays with any non-string element
    /// are rejected rather than filtered.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::One(s.clone())),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(EmbedError::InputType(format!(
                        "element {i} is {}",
                        json_type_name(other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Many),
            other => Err(EmbedError::InputType(format!("got {}", json_type_name(other)))),
        }
    }

    pub fn into_texts(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Orchestrates model loading and per-text encoding.
pub struct EncodePipeline {
    store: ModelStore,
    config: RwLock<EncodeConfig>,
    /// Held around `forward` for engines that are not reentrant.
    inference_lock: Mutex<()>,
}

impl EncodePipeline {
    pub fn new(store: ModelStore) -> Self {
        Self {
            store,
            config: RwLock::new(EncodeConfig::default()),
            inference_lock: Mutex::new(()),
        }
    }

    pub fn from_model_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(ModelStore::from_dir(dir))
    }

    /// Replace the process-wide configuration. On error the previous one stays in effect.
    /// Does not touch the loaded model.
    pub fn configure(&self, options: &ConfigureOptions) -> Result<EncodeConfig> {
        let resolved = options.resolve()?;
        *self.config.write() = resolved;
        log::info!(
            "Configured: maxLength={}, normalize={}",
            resolved.max_length,
            resolved.normalize
        );
        Ok(resolved)
    }

    pub fn config(&self) -> EncodeConfig {
        *self.config.read()
    }

    pub fn status(&self) -> ModelStatus {
        self.store.status()
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Encode `input` after validating its shape.
    pub fn encode_json(&self, input: &Value) -> Result<Vec<Vec<f32>>> {
        let texts = EncodeInput::from_json(input)?.into_texts();
        self.encode(&texts)
    }

    /// Encode each text into one embedding of `hidden_size` floats, in input order.
    pub fn encode<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        let cfg = self.config();
        let model = self.store.ensure_loaded()?;

        log::debug!(
            "Encoding {} text(s) (maxLength={}, normalize={})",
            texts.len(),
            cfg.max_length,
            cfg.normalize
        );

        texts
            .iter()
            .enumerate()
            .map(|(index, text)| self.encode_one(&model, cfg, index, text.as_ref()))
            .collect()
    }

    fn encode_one(
        &self,
        model: &LoadedModel,
        cfg: EncodeConfig,
        index: usize,
        text: &str,
    ) -> Result<Vec<f32>> {
        let tokens = tokenize(&model.vocab, text, cfg.max_length);

        let states = self
            .forward(model.engine.as_ref(), tokens.ids())
            .map_err(|source| EmbedError::Inference { index, source })?;

        let expected = (1, tokens.len(), model.hidden_size());
        if states.shape() != expected {
            return Err(EmbedError::Inference {
                index,
                source: InferenceError::ShapeMismatch {
                    expected,
                    actual: states.shape(),
                },
            });
        }

        let pooled = mean_pool(&states)?;
        Ok(if cfg.normalize {
            l2_normalize(&pooled)
        } else {
            pooled
        })
    }

    fn forward(
        &self,
        engine: &dyn InferenceEngine,
        ids: &[u32],
    ) -> std::result::Result<HiddenStates, InferenceError> {
        let result = if engine.is_reentrant() {
            engine.forward(ids)
        } else {
            let _guard = self.inference_lock.lock();
            engine.forward(ids)
        };
        result.map_err(InferenceError::Engine)
    }
}
