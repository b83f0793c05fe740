//! Loads the YAML configuration file into an [`AppConfig`] snapshot, with
//! `${NAME}` environment-variable expansion performed before parsing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[allow(clippy::expect_used)]
static ENV_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern"));

/// Replaces every `${NAME}` token in `raw` with the named environment
/// variable's value, or the empty string if unset. Whole-file textual
/// substitution, performed once, before YAML parsing.
pub fn expand_env(raw: &str) -> String {
    ENV_TOKEN
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsCfg {
    pub scan_root: PathBuf,
    pub output_root: PathBuf,
    pub state_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".docuforge/logs")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanCfg {
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolveCfg {
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocgenCfg {
    #[serde(default = "default_template_mode")]
    pub template_mode: String,
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default = "default_true")]
    pub write_index: bool,
    #[serde(default = "default_max_chars")]
    pub max_chars_per_chunk: usize,
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
    #[serde(default = "default_max_snippet_blocks")]
    pub max_snippet_blocks: u32,
    #[serde(default = "default_snippet_max_lines")]
    pub snippet_max_lines_per_block: u32,
}

fn default_template_mode() -> String {
    "builtin".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_tone() -> String {
    "neutral".to_string()
}
fn default_layout() -> String {
    "stem_folder".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_chars() -> usize {
    12_000
}
fn default_overlap_lines() -> usize {
    5
}
fn default_max_snippet_blocks() -> u32 {
    6
}
fn default_snippet_max_lines() -> u32 {
    80
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingCfg {
    #[serde(default = "default_true")]
    pub validate_models: bool,
    pub preferred_models: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryCfg {
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_model: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_s: f64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_s: f64,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_base() -> f64 {
    1.0
}
fn default_backoff_max() -> f64 {
    20.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleCfg {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_interval")]
    pub min_interval_s: f64,
    #[serde(default = "default_min_remaining_tokens")]
    pub min_remaining_tokens: i64,
}

fn default_min_interval() -> f64 {
    0.25
}
fn default_min_remaining_tokens() -> i64 {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmCfg {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub base_url: String,
    pub api_key_env: String,
    #[serde(default)]
    pub api_key_fallback: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_completion_tokens: u32,
    /// Advisory only: the core always forces `stream=false` on the wire.
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub service_tier: Option<String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    pub routing: RoutingCfg,
    pub retry: RetryCfg,
    #[serde(default)]
    pub throttle: ThrottleCfg,
}

impl Default for ThrottleCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_s: default_min_interval(),
            min_remaining_tokens: default_min_remaining_tokens(),
        }
    }
}

fn default_provider() -> String {
    "groq".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerformanceCfg {
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingCfg {
    #[serde(default = "default_verbosity")]
    pub verbosity: String,
}

fn default_verbosity() -> String {
    "info".to_string()
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self { verbosity: default_verbosity() }
    }
}

/// The fully resolved configuration snapshot. Immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub paths: PathsCfg,
    pub scan: ScanCfg,
    #[serde(default)]
    pub resolve: ResolveCfg,
    pub docgen: DocgenCfg,
    pub llm: LlmCfg,
    #[serde(default)]
    pub performance: PerformanceCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl Default for PerformanceCfg {
    fn default() -> Self {
        Self { max_concurrency: default_concurrency() }
    }
}

impl AppConfig {
    /// Loads and validates configuration from a YAML file at `path`,
    /// expanding `${NAME}` tokens before parsing.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let expanded = expand_env(&raw);
        let cfg: Self =
            serde_yaml::from_str(&expanded).map_err(|e| Error::Config(format!("invalid config at {}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.scan.include_extensions.is_empty() {
            return Err(Error::Config("scan.include_extensions must not be empty".to_string()));
        }
        crate::pathing::Layout::parse(&self.docgen.layout)?;
        if self.docgen.template_mode == "file"
            && self
                .docgen
                .template_path
                .as_ref()
                .is_none_or(|p| p.as_os_str().is_empty())
        {
            return Err(Error::Config(
                "docgen.template_mode=file requires a non-empty template_path".to_string(),
            ));
        }
        if self.llm.routing.preferred_models.is_empty() {
            return Err(Error::Config("llm.routing.preferred_models must not be empty".to_string()));
        }
        Ok(())
    }

    /// The API key read from `llm.api_key_env`, or `api_key_fallback` if the
    /// environment variable is unset. A config/precondition error if both
    /// are empty.
    pub fn resolve_api_key(&self) -> Result<String> {
        let key = std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.llm.api_key_fallback.clone())
            .unwrap_or_default();
        if key.trim().is_empty() {
            return Err(Error::Config(format!(
                "missing API key: set {} or llm.api_key_fallback",
                self.llm.api_key_env
            )));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_env_token() {
        std::env::set_var("DOCUFORGE_TEST_TOKEN", "value-123");
        let expanded = expand_env("key: ${DOCUFORGE_TEST_TOKEN}");
        assert_eq!(expanded, "key: value-123");
        std::env::remove_var("DOCUFORGE_TEST_TOKEN");
    }

    #[test]
    fn unset_token_expands_to_empty_string() {
        std::env::remove_var("DOCUFORGE_DEFINITELY_UNSET");
        let expanded = expand_env("key: ${DOCUFORGE_DEFINITELY_UNSET}");
        assert_eq!(expanded, "key: ");
    }

    fn minimal_yaml() -> &'static str {
        r#"
paths:
  scan_root: ./src
  output_root: ./docs
  state_dir: ./.docuforge
scan:
  include_extensions: [".ts"]
docgen:
  layout: stem_folder
llm:
  base_url: "https://api.groq.com/openai/v1"
  api_key_env: "GROQ_API_KEY"
  routing:
    preferred_models: ["llama-3.3-70b-versatile"]
  retry:
    max_attempts_per_model: 3
    backoff_base_s: 1.0
    backoff_max_s: 10.0
"#
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, minimal_yaml()).expect("write");

        let cfg = AppConfig::load(&path).expect("load");
        assert_eq!(cfg.performance.max_concurrency, 4);
        assert_eq!(cfg.docgen.template_mode, "builtin");
        assert!(cfg.llm.throttle.enabled);
    }

    #[test]
    fn unknown_layout_is_rejected_at_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        let bad = minimal_yaml().replace("stem_folder", "nested");
        std::fs::write(&path, bad).expect("write");

        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn empty_preferred_models_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        let bad = minimal_yaml().replace(r#"["llama-3.3-70b-versatile"]"#, "[]");
        std::fs::write(&path, bad).expect("write");

        assert!(AppConfig::load(&path).is_err());
    }
}
