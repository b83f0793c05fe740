//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// docuforge: batch documentation generator with model routing and
/// rate-limit coordination.
#[derive(Parser, Debug)]
#[command(name = "docuforge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the YAML configuration file. Defaults to `./docuforge.yaml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv). Stacks with -q.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq). Stacks with -v.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one generation pass over the configured source tree.
    #[command(after_help = r#"Examples:
  docuforge build                         # one pass using ./docuforge.yaml
  docuforge build --force                 # ignore the manifest, regenerate everything
  docuforge build --reset                 # clear generated docs and manifest state first
  docuforge build --only src/a.ts --only src/b.ts
  docuforge build --max-concurrency 8
"#)]
    Build {
        /// Ignore the manifest cache and regenerate every file.
        #[arg(long)]
        force: bool,

        /// Remove the generated `src/` subtree, `INDEX.md`, and the state
        /// directory before running.
        #[arg(long)]
        reset: bool,

        /// Restrict generation to this source-relative path. Repeatable.
        #[arg(long = "only")]
        only: Vec<String>,

        /// Overrides `performance.max_concurrency` for this run.
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// List the model IDs available from the configured backend.
    ///
    /// A read-only diagnostic: loads only the `llm` section of config,
    /// performs no manifest load and no filesystem writes.
    Models,
}
