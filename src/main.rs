mod logging;
mod native_messaging;
mod protocol;

use std::io::{stdin, stdout};
use std::path::PathBuf;

use anyhow::Context;
use serde_json::Value;

use sentence_embeddings::config;
use sentence_embeddings::embeddings::assets;
use sentence_embeddings::{ConfigureOptions, EncodePipeline};

use crate::protocol::{ResponseErr, ResponseOk};

fn main() {
    if let Err(e) = real_main() {
        // Keep stderr noisy for user bug reports; logs also go to file.
        eprintln!("[embed_host] fatal error: {e:?}");
        log::error!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    logging::init_logging()?;

    let args: Vec<String> = std::env::args().collect();
    let model_dir_arg = read_arg_value(&args, "--model-dir").map(PathBuf::from);
    let model_dir = assets::model_dir(model_dir_arg.as_deref()).context("resolve model directory")?;
    log::info!("Model directory: {}", model_dir.display());

    // The model is loaded lazily on the first encode.
    let pipeline = EncodePipeline::from_model_dir(model_dir);

    log::info!("=== Embedding host started, waiting for messages ===");

    let mut in_stream = stdin();
    let mut out_stream = stdout();

    let mut message_count: u64 = 0;
    loop {
        let req = match native_messaging::read_message(&mut in_stream) {
            Ok(Some(r)) => r,
            Ok(None) => {
                log::info!("No more messages after {} messages, exiting", message_count);
                break;
            }
            Err(e) => {
                log::error!("Error reading message: {:?}", e);
                break;
            }
        };

        message_count += 1;
        log::info!(
            "Processing message #{}: {} (id: {})",
            message_count,
            req.method,
            req.id
        );

        let written = match handle_request(&pipeline, &req.method, &req.params) {
            Ok(result) => native_messaging::write_json(
                &mut out_stream,
                &ResponseOk {
                    id: req.id,
                    result,
                },
            ),
            Err(e) => {
                log::error!("Handler error: {:?}", e);
                native_messaging::write_json(&mut out_stream, &ResponseErr::from_error(req.id, &e))
            }
        };
        if let Err(e) = written {
            log::error!("Error sending response: {:?}", e);
            break;
        }
    }

    log::info!("=== Embedding host stopped ===");
    Ok(())
}

fn handle_request(pipeline: &EncodePipeline, method: &str, params: &Value) -> anyhow::Result<Value> {
    match method {
        "hello" => handle_hello(params),
        "configure" => handle_configure(pipeline, params),
        "encode" => handle_encode(pipeline, params),
        "status" => handle_status(pipeline),
        _ => anyhow::bail!("Unknown method: {method}"),
    }
}

fn handle_hello(params: &Value) -> anyhow::Result<Value> {
    let client_version = params.get("clientVersion").and_then(|v| v.as_str()).unwrap_or("unknown");
    log::info!(
        "Hello from client version {}, responding with host version {}",
        client_version,
        config::HOST_VERSION
    );

    Ok(serde_json::json!({
        "type": "hello-response",
        "hostVersion": config::HOST_VERSION,
        "modelName": config::embedding::EMBEDDING_MODEL_NAME,
        "platform": std::env::consts::OS,
        "clientVersion": client_version
    }))
}

fn handle_configure(pipeline: &EncodePipeline, params: &Value) -> anyhow::Result<Value> {
    let options = ConfigureOptions::from_json(params)?;
    let applied = pipeline.configure(&options)?;
    Ok(serde_json::json!({
        "ok": true,
        "maxLength": applied.max_length,
        "normalize": applied.normalize
    }))
}

fn handle_encode(pipeline: &EncodePipeline, params: &Value) -> anyhow::Result<Value> {
    let input = params.get("input").unwrap_or(&Value::Null);
    let embeddings = pipeline.encode_json(input)?;
    let count = embeddings.len();
    let dims = embeddings.first().map(Vec::len).unwrap_or(0);
    log::info!("Encoded {} text(s), dims={}", count, dims);
    Ok(serde_json::json!({
        "embeddings": embeddings,
        "count": count,
        "dims": dims
    }))
}

fn handle_status(pipeline: &EncodePipeline) -> anyhow::Result<Value> {
    let status = pipeline.status();
    let config = pipeline.config();
    let mut result = serde_json::json!({
        "model": status.state,
        "maxLength": config.max_length,
        "normalize": config.normalize
    });
    if let Some(err) = status.last_error {
        result["lastError"] = Value::String(err);
    }
    Ok(result)
}

fn read_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
