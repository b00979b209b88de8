use std::path::Path;
use std::sync::Arc;

use crate::cli::flags::{Cli, Command};
use crate::config::load_config;
use crate::core::engine::{internal_failure_detail, Engine};
use crate::core::error::PhishyError;
use crate::core::output::{render_results, write_results, OutputFormat};
use crate::core::types::AnalysisRequest;
use crate::modules::inference::LocalEngine;

pub async fn run(cli: Cli) -> Result<(), PhishyError> {
    let engine = Arc::new(build_engine(&cli)?);

    match cli.command {
        Command::Analyze { url } => run_analyze(&engine, &url).await,
        Command::Batch {
            input,
            format,
            output,
        } => run_batch(&engine, &input, format.into(), output.as_deref()).await,
        Command::Status => run_status(&engine),
    }
}

/// Load config and model. A model that fails to load aborts startup.
pub fn build_engine(cli: &Cli) -> Result<Engine, PhishyError> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        cfg.model_path = model.display().to_string();
    }
    let local = LocalEngine::from_artifact(Path::new(&cfg.model_path)).map_err(|e| {
        tracing::error!("ML model or explainer failed to initialize: {}", e);
        e
    })?;
    Engine::new(cfg, local)
}

async fn run_analyze(engine: &Engine, url: &str) -> Result<(), PhishyError> {
    let response = engine.analyze(&AnalysisRequest::new(url)).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// The single stderr line printed when a command fails.
pub fn failure_line(err: &PhishyError) -> String {
    serde_json::json!({ "detail": internal_failure_detail(err) }).to_string()
}

async fn run_batch(
    engine: &Arc<Engine>,
    input: &Path,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), PhishyError> {
    let urls = read_url_list(input)?;
    tracing::info!("analysing {} URLs from {}", urls.len(), input.display());
    let entries = engine.analyze_batch(urls).await;

    match output {
        Some(path) => {
            write_results(&entries, format, path)?;
            tracing::info!("results written to {}", path.display());
        }
        None => print!("{}", render_results(&entries, format)?),
    }
    Ok(())
}

fn run_status(engine: &Engine) -> Result<(), PhishyError> {
    println!("{}", serde_json::to_string_pretty(&engine.status())?);
    Ok(())
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn read_url_list(path: &Path) -> Result<Vec<String>, PhishyError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| PhishyError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
