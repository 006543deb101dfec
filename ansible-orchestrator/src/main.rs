//! Ansible Orchestrator - stdio entry point
//!
//! Reads one JSON request per line on stdin:
//! `{"tool": "<operation>", "params": {...}}`
//! and writes one JSON response per line on stdout.

use ansible_orchestrator::config::{process_env, ProjectRegistry};
use ansible_orchestrator::operations::{error_payload, Orchestrator};
use ansible_orchestrator::{logging, OrchestratorError, ProcessExecutor};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Request {
    tool: String,
    #[serde(default)]
    params: Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let env = process_env();
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let registry = ProjectRegistry::load(&env, &cwd).context("Failed to load project registry")?;

    info!(
        "🤖 Ansible Orchestrator starting ({} projects, registry: {:?})",
        registry.len(),
        registry.location()
    );

    let orchestrator = Orchestrator::new(registry, Arc::new(ProcessExecutor::new()), env, cwd);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => orchestrator.dispatch(&request.tool, request.params).await,
            Err(e) => error_payload(&OrchestratorError::validation(format!("malformed request: {}", e))),
        };

        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
        debug!("Response written ({} bytes)", encoded.len());
    }

    info!("stdin closed, shutting down");
    Ok(())
}
