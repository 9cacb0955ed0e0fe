use anyhow::{Context, Result};
use mien_core::PipelineContext;
use mien_hw::Camera;
use tracing_subscriber::EnvFilter;

mod assets;
mod config;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("miend starting");

    let cfg = config::Config::from_env();

    // Resolve model artifacts: extract from the bundle dir on first run.
    if let Some(bundle_dir) = &cfg.bundle_dir {
        for name in [
            mien_core::CLASSIFIER_MODEL_FILE,
            mien_core::DETECTOR_MODEL_FILE,
        ] {
            match assets::ensure_model(bundle_dir, &cfg.model_dir, name) {
                Ok(path) => tracing::info!(path = %path.display(), "model artifact ready"),
                Err(e) => tracing::warn!(error = %e, name, "bundled model unavailable"),
            }
        }
    }

    let ctx = PipelineContext::from_model_dir(cfg.pipeline_config(), &cfg.model_dir);
    let camera = Camera::open(&cfg.camera_device, cfg.camera_rotation)
        .with_context(|| format!("opening camera {}", cfg.camera_device))?;

    let (handle, mut results) = engine::spawn_engine(ctx);

    // Capture loop: deliver frames to the worker, dropping whatever arrives
    // while the previous frame is still being processed.
    let _capture = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut stream = camera.stream()?;
        loop {
            let frame = stream.next_frame()?;
            handle.submit(frame);
        }
    });

    // Render results: one human-readable log line plus one NDJSON line per
    // displayable outcome.
    let _printer = tokio::spawn(async move {
        while let Some(outcome) = results.recv().await {
            if let Some(result) = outcome.result() {
                tracing::info!(%result, "frame classified");
                match serde_json::to_string(&result) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "failed to serialize result"),
                }
            }
        }
    });

    tracing::info!("miend ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("miend shutting down");

    Ok(())
}
