//! A short interactive prompt sequence that writes a starter YAML config
//! when none is found. Never participates in the core pipeline's contract;
//! a config/precondition convenience only.

use std::path::Path;

use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;

use crate::error::{Error, Result};

const STARTER_TEMPLATE: &str = r#"paths:
  scan_root: {scan_root}
  output_root: {output_root}
  state_dir: .docuforge/state
  log_dir: .docuforge/logs

scan:
  include_extensions: [".ts", ".tsx", ".js", ".jsx", ".css", ".scss"]
  exclude_dirs: ["node_modules", ".git", "dist", "build"]
  ignore_patterns: []

docgen:
  template_mode: builtin
  layout: stem_folder
  write_index: true

llm:
  provider: groq
  base_url: "https://api.groq.com/openai/v1"
  api_key_env: {api_key_env}
  routing:
    preferred_models: ["llama-3.3-70b-versatile"]
  retry:
    max_attempts_per_model: 4
    backoff_base_s: 1.0
    backoff_max_s: 20.0

performance:
  max_concurrency: 4
"#;

/// Prompts for scan root, output root, and the API key environment variable
/// name, then writes a starter config to `path`. Run only when no config
/// file resolves at startup.
#[allow(clippy::print_stderr)]
pub fn run_wizard(path: &Path) -> Result<()> {
    eprintln!("No configuration file found at {}.", path.display());
    eprintln!("Let's create one.\n");

    let theme = ColorfulTheme::default();

    let scan_root: String = Input::with_theme(&theme)
        .with_prompt("Source tree to document")
        .default("./src".to_string())
        .interact_text()
        .map_err(|e| Error::Config(format!("wizard input failed: {e}")))?;

    let output_root: String = Input::with_theme(&theme)
        .with_prompt("Where should generated docs go")
        .default("./docs".to_string())
        .interact_text()
        .map_err(|e| Error::Config(format!("wizard input failed: {e}")))?;

    let api_key_env: String = Input::with_theme(&theme)
        .with_prompt("Environment variable holding the backend API key")
        .default("GROQ_API_KEY".to_string())
        .interact_text()
        .map_err(|e| Error::Config(format!("wizard input failed: {e}")))?;

    let body = STARTER_TEMPLATE
        .replace("{scan_root}", &scan_root)
        .replace("{output_root}", &output_root)
        .replace("{api_key_env}", &api_key_env);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, body).map_err(|e| Error::io(path, e))?;

    eprintln!("\nWrote starter config to {}.", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_template_has_no_leftover_placeholders() {
        let body = STARTER_TEMPLATE
            .replace("{scan_root}", "./src")
            .replace("{output_root}", "./docs")
            .replace("{api_key_env}", "GROQ_API_KEY");
        assert!(!body.contains('{'));
        assert!(body.contains("./src"));
        assert!(body.contains("GROQ_API_KEY"));
    }
}
