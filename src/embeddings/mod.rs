// embeddings/ — Sentence embedding pipeline.
//
// Provides:
// - Vocabulary loading and whole-word tokenization with CLS/SEP framing
// - Inference engine contract + candle BERT implementation
// - Mean pooling (CLS/SEP excluded) and L2 normalization
// - Lazy, single-flight model store and the encode pipeline

pub mod assets;
pub mod engine;
pub mod pipeline;
pub mod pooling;
pub mod store;
pub mod tokenizer;
pub mod vocab;

#[cfg(test)]
pub(crate) mod testing;
