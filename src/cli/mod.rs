//! CLI layer: argument parsing, command dispatch, and the one-time
//! interactive config wizard.

pub mod parser;
pub mod wizard;

pub use parser::{Cli, Commands};

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::llm::client::{BackendClient, HttpBackendClient};
use crate::orchestrator::{GenerationOrchestrator, RunOptions};

const DEFAULT_CONFIG_PATH: &str = "docuforge.yaml";

/// Resolves the config path to load: the CLI's `--config` override if given,
/// otherwise the fixed default path relative to the current directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf)
}

/// Loads the config at `path`, running the interactive wizard first to
/// write a starter file if none resolves there.
pub fn load_or_init_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        wizard::run_wizard(path)?;
    }
    AppConfig::load(path)
}

/// Dispatches a parsed [`Cli`] against an already-loaded [`AppConfig`].
/// Config resolution happens earlier, in `main`, so that logging can be
/// initialized from the loaded config before any subcommand runs.
pub async fn execute(cli: Cli, cfg: AppConfig) -> Result<()> {
    match cli.command {
        Commands::Build { force, reset, only, max_concurrency } => {
            let opts = RunOptions {
                force,
                reset,
                include_only: if only.is_empty() { None } else { Some(only) },
                max_concurrency,
            };
            let orchestrator = GenerationOrchestrator::new(cfg);
            orchestrator.run(&opts).await
        }
        Commands::Models => run_models(&cfg).await,
    }
}

/// Read-only diagnostic: lists the backend's available model IDs, sorted.
/// Performs no manifest load and writes nothing under the output or state
/// directories.
#[allow(clippy::print_stdout)]
async fn run_models(cfg: &AppConfig) -> Result<()> {
    let api_key = cfg.resolve_api_key()?;
    let client = HttpBackendClient::new(&cfg.llm.base_url, api_key)?;
    let mut ids = client.list_models().await?;
    ids.sort();
    info!(count = ids.len(), "fetched model list");
    for id in ids {
        println!("{id}");
    }
    Ok(())
}
