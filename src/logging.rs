use std::path::PathBuf;

use anyhow::Context;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};

use sentence_embeddings::config;
use sentence_embeddings::embeddings::assets;

/// Route `log` output to a rotating file under the host home. Stdout carries framed
/// responses and must never see a log line.
pub fn init_logging() -> anyhow::Result<()> {
    let log_dir = host_log_dir()?;

    // RUST_LOG overrides the file level. WARN+ is mirrored to stderr, which the calling
    // process reads as its diagnostics channel.
    Logger::try_with_env_or_str(config::logging::DEFAULT_LOG_SPEC)?
        .log_to_file(
            FileSpec::default()
                .directory(&log_dir)
                .basename(config::logging::LOG_FILE_NAME),
        )
        .rotate(
            Criterion::Size(config::logging::LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config::logging::LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .format(flexi_logger::detailed_format)
        .start()
        .context("failed to start logger")?;

    log::info!(
        "embed_host {} starting (model={}, os={}, logs={})",
        config::HOST_VERSION,
        config::embedding::EMBEDDING_MODEL_NAME,
        std::env::consts::OS,
        log_dir.display()
    );

    Ok(())
}

fn host_log_dir() -> anyhow::Result<PathBuf> {
    let home = assets::home_dir().context("cannot determine home directory for logs")?;
    let dir = home.join(config::logging::LOG_DIR_REL);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed creating log dir {}", dir.display()))?;
    Ok(dir)
}
