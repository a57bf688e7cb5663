// engine.rs — Inference engine contract and the candle BERT implementation.
//
// The pipeline only relies on the tensor-in/tensor-out contract: a framed id sequence of
// length L goes in, a (1, L, hidden_size) f32 hidden-state tensor comes out. Pooling happens
// outside the engine (see pooling.rs).

use std::path::Path;

use anyhow::Context;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};

use crate::config;
use crate::error::InferenceError;

/// Row-major hidden states of shape (batch, seq_len, hidden_size).
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenStates {
    shape: (usize, usize, usize),
    data: Vec<f32>,
}

impl HiddenStates {
    /// Single-batch states, shape (1, seq_len, hidden_size).
    pub fn new(seq_len: usize, hidden_size: usize, data: Vec<f32>) -> Result<Self, InferenceError> {
        Self::from_shape((1, seq_len, hidden_size), data)
    }

    pub fn from_shape(shape: (usize, usize, usize), data: Vec<f32>) -> Result<Self, InferenceError> {
        let expected = shape.0 * shape.1 * shape.2;
        if data.len() != expected {
            return Err(InferenceError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn seq_len(&self) -> usize {
        self.shape.1
    }

    pub fn hidden_size(&self) -> usize {
        self.shape.2
    }

    /// Hidden vector at `pos` of the first batch entry.
    pub fn row(&self, pos: usize) -> &[f32] {
        let h = self.shape.2;
        &self.data[pos * h..(pos + 1) * h]
    }
}

/// Opaque model forward pass.
pub trait InferenceEngine: Send + Sync {
    /// Dimensionality of every output vector.
    fn hidden_size(&self) -> usize;

    /// Run the model on one framed id sequence.
    fn forward(&self, input_ids: &[u32]) -> anyhow::Result<HiddenStates>;

    /// Whether `forward` may be called from several threads at once.
    /// Non-reentrant engines are serialized by the pipeline.
    fn is_reentrant(&self) -> bool {
        true
    }
}

/// all-MiniLM-L6-v2 (or any BERT encoder) loaded from safetensors via candle, on CPU.
pub struct BertEngine {
    model: BertModel,
    device: Device,
    hidden_size: usize,
}

impl BertEngine {
    /// Load the model from a directory containing model.safetensors and config.json.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let device = Device::Cpu;

        let config_path = model_dir.join(config::embedding::CONFIG_FILE);
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        let bert_config: BertConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("parse {}", config_path.display()))?;

        log::info!(
            "Loading BERT encoder: hidden_size={}, layers={}, heads={}",
            bert_config.hidden_size,
            bert_config.num_hidden_layers,
            bert_config.num_attention_heads,
        );

        let weights_path = model_dir.join(config::embedding::WEIGHTS_FILE);
        // SAFETY: the weights file is treated as read-only for the process lifetime.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.clone()], DType::F32, &device)
                .with_context(|| format!("load weights from {}", weights_path.display()))?
        };

        let model = BertModel::load(vb, &bert_config).context("load BERT model")?;

        Ok(Self {
            model,
            device,
            hidden_size: bert_config.hidden_size,
        })
    }
}

impl InferenceEngine for BertEngine {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn forward(&self, input_ids: &[u32]) -> anyhow::Result<HiddenStates> {
        // [1, seq_len]
        let ids = Tensor::new(
            input_ids.iter().map(|&id| id as i64).collect::<Vec<_>>().as_slice(),
            &self.device,
        )?
        .unsqueeze(0)?;

        let token_type_ids = ids.zeros_like()?;
        let attention_mask = ids.ones_like()?;

        // Forward pass → [1, seq_len, hidden_size]
        let output = self
            .model
            .forward(&ids, &token_type_ids, Some(&attention_mask))?
            .to_dtype(DType::F32)?;

        let shape = output.dims3()?;
        let data: Vec<f32> = output.flatten_all()?.to_vec1()?;
        Ok(HiddenStates::from_shape(shape, data)?)
    }
}
