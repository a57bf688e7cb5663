// assets.rs — Model directory resolution and SHA256 verification of model files.
//
// The model directory holds vocab.txt, config.json and model.safetensors. If it also holds a
// SHA256SUMS file (`<hex digest>  <file name>` per line), every listed file is verified
// before it is used.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sha2::{Digest, Sha256};

use crate::config;
use crate::error::LoadError;

/// Resolve the model directory: explicit override, then `EMBED_MODEL_DIR`, then
/// `~/.sentence-embeddings/models/all-MiniLM-L6-v2/`.
pub fn model_dir(override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    if let Ok(v) = std::env::var(config::embedding::MODEL_DIR_ENV) {
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    Ok(home_dir()?.join(config::embedding::MODEL_DIR_REL))
}

/// Get the user's home directory (`EMBED_HOST_HOME`, then HOME, then USERPROFILE).
pub fn home_dir() -> anyhow::Result<PathBuf> {
    [config::HOME_OVERRIDE_ENV, "HOME", "USERPROFILE"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
        .context("cannot determine home directory (neither HOME nor USERPROFILE is set)")
}

/// Expected digests parsed from a SHA256SUMS file, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct Checksums {
    digests: HashMap<String, String>,
}

impl Checksums {
    /// Load `SHA256SUMS` from `dir`. A missing file means no verification.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        let path = dir.join(config::embedding::CHECKSUMS_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(LoadError::Read { path, source }),
        }
    }

    /// Parse `sha256sum` output. Blank lines and `#` comments are skipped; a leading `*`
    /// (binary mode marker) on the file name is ignored.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let mut digests = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (digest, name) = line
                .split_once(char::is_whitespace)
                .map(|(d, n)| (d, n.trim_start().trim_start_matches('*')))
                .filter(|(d, n)| d.len() == 64 && !n.is_empty())
                .ok_or_else(|| LoadError::Malformed {
                    file: config::embedding::CHECKSUMS_FILE.to_string(),
                    message: format!("line {}: expected `<sha256>  <file>`", lineno + 1),
                })?;
            digests.insert(name.to_string(), digest.to_ascii_lowercase());
        }
        Ok(Self { digests })
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Verify `path` if its file name is listed; unlisted files pass.
    pub fn verify(&self, path: &Path) -> Result<(), LoadError> {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let Some(expected) = self.digests.get(&*name) else {
            return Ok(());
        };

        let actual = sha256_file(path)?;
        if &actual != expected {
            return Err(LoadError::Checksum {
                file: name.into_owned(),
                expected: expected.clone(),
                actual,
            });
        }

        log::info!("SHA256 verified for {} ({})", name, &actual[..12]);
        Ok(())
    }
}

/// Streaming SHA256 of a file, hex encoded.
fn sha256_file(path: &Path) -> Result<String, LoadError> {
    let read_err = |source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::open(path).map_err(read_err)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(read_err)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Read a text asset, verifying it first.
pub fn read_verified_text(path: &Path, checksums: &Checksums) -> Result<String, LoadError> {
    checksums.verify(path)?;
    fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}
