// IMPORTANT:
// Keep ALL numeric values centralized here (repo rule: no hardcoded numeric values scattered around).

// NOTE: HOST_VERSION must stay in sync with the `version` field in Cargo.toml.
pub const HOST_VERSION: &str = "0.1.0";

/// Environment variable that overrides the home directory used for logs and models.
pub const HOME_OVERRIDE_ENV: &str = "EMBED_HOST_HOME";

pub mod logging {
    pub const LOG_DIR_REL: &str = ".sentence-embeddings/logs";
    pub const LOG_FILE_NAME: &str = "embed_host.log";

    /// Log spec used when `RUST_LOG` is unset.
    pub const DEFAULT_LOG_SPEC: &str = "debug";

    pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const LOG_ROTATE_KEEP_FILES: usize = 5;
}

pub mod native_messaging {
    pub const MAX_MESSAGE_SIZE_BYTES: u32 = 64 * 1024 * 1024;
}

/// Special token ids fixed by the model's training-time convention (BERT uncased vocab).
pub mod special_tokens {
    pub const PAD: u32 = 0;
    pub const UNK: u32 = 100;
    pub const CLS: u32 = 101;
    pub const SEP: u32 = 102;
    pub const MASK: u32 = 103;

    /// Number of framing slots (CLS + SEP) every token sequence carries.
    pub const FRAMING_SLOTS: usize = 2;
}

pub mod embedding {
    pub const EMBEDDING_MODEL_NAME: &str = "all-MiniLM-L6-v2";

    // Process-wide encode defaults.
    pub const DEFAULT_MAX_LENGTH: usize = 256;
    pub const DEFAULT_NORMALIZE: bool = true;

    // Local model storage directory (relative to home), overridable by env or CLI.
    pub const MODEL_DIR_REL: &str = ".sentence-embeddings/models/all-MiniLM-L6-v2";
    pub const MODEL_DIR_ENV: &str = "EMBED_MODEL_DIR";

    pub const VOCAB_FILE: &str = "vocab.txt";
    pub const CONFIG_FILE: &str = "config.json";
    pub const WEIGHTS_FILE: &str = "model.safetensors";
    pub const CHECKSUMS_FILE: &str = "SHA256SUMS";
}
