//! Request/response envelopes exchanged with the calling process.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sentence_embeddings::EmbedError;

/// Code for failures outside the encode pipeline (unknown method, bad envelope).
pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";

#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct ResponseOk<T: Serialize> {
    pub id: String,
    pub result: T,
}

#[derive(Debug, Serialize)]
pub struct ResponseErr {
    pub id: String,
    pub error: String,
    /// Stable error code (e.g. `MODEL_LOAD_ERROR`), see `EmbedError::code`.
    pub code: &'static str,
}

impl ResponseErr {
    /// Error response for a failed handler. Pipeline errors keep their own code.
    pub fn from_error(id: String, err: &anyhow::Error) -> Self {
        let code = err
            .downcast_ref::<EmbedError>()
            .map(EmbedError::code)
            .unwrap_or(PROTOCOL_ERROR);
        Self {
            id,
            error: err.to_string(),
            code,
        }
    }
}
