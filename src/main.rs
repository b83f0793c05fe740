//! Process entry point: parses CLI arguments, resolves and loads
//! configuration (running the interactive wizard if none is found),
//! initializes logging, and dispatches to the requested subcommand.
//!
//! Errors encountered before logging is initialized (config load failures)
//! are reported directly to stderr, since no subscriber exists yet to catch
//! a `tracing` event.
#![allow(clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;

use docuforge::cli::{execute, load_or_init_config, resolve_config_path, Cli};
use docuforge::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose_count = (i32::from(cli.verbose) - i32::from(cli.quiet)).clamp(i32::from(i8::MIN), i32::from(i8::MAX));
    let verbose_count = i8::try_from(verbose_count).unwrap_or(0);
    let config_path = resolve_config_path(cli.config.as_deref());

    let cfg = match load_or_init_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1));
        }
    };

    let _logging_guard = logging::setup_logging(&cfg.logging.verbosity, verbose_count, &cfg.paths.log_dir);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(execute(cli, cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("error: {}", e.user_message());
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
