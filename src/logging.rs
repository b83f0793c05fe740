//! Initializes the process-wide `tracing` subscriber: an stderr layer plus an
//! optional non-blocking file layer under the configured log directory.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Must be kept alive for the process lifetime; dropping it stops the
/// non-blocking file writer from flushing.
pub struct LoggingGuard(#[allow(dead_code)] Option<WorkerGuard>);

/// Parses a verbosity name (`error`, `warn`, `info`, `debug`, `trace`) into a
/// level filter, defaulting to `info` for anything unrecognized.
fn level_filter(verbosity: &str) -> LevelFilter {
    match verbosity.to_lowercase().as_str() {
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Sets up logging for the process. `verbosity` comes from configuration,
/// adjusted by `-v`/`-q` CLI flag counts (each `-v` raises the level by one
/// step, each `-q` lowers it). `log_dir` is created if missing; when it
/// cannot be created, logging falls back to stderr only.
pub fn setup_logging(verbosity: &str, verbose_count: i8, log_dir: &Path) -> LoggingGuard {
    let base = level_filter(verbosity);
    let level = adjust_verbosity(base, verbose_count);

    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer_and_guard = std::fs::create_dir_all(log_dir).ok().map(|()| {
        let file_appender = tracing_appender::rolling::never(log_dir, "run.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(false);
        (layer, guard)
    });

    match file_layer_and_guard {
        Some((file_layer, guard)) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            LoggingGuard(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(env_filter).with(stderr_layer).init();
            LoggingGuard(None)
        }
    }
}

fn adjust_verbosity(base: LevelFilter, verbose_count: i8) -> LevelFilter {
    const LADDER: [LevelFilter; 5] = [
        LevelFilter::ERROR,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let current = LADDER.iter().position(|l| *l == base).unwrap_or(2);
    let shifted = i8::try_from(current).unwrap_or(2) + verbose_count;
    let clamped = shifted.clamp(0, i8::try_from(LADDER.len() - 1).unwrap_or(4));
    LADDER[usize::try_from(clamped).unwrap_or(2)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_verbosity_defaults_to_info() {
        assert_eq!(level_filter("banana"), LevelFilter::INFO);
    }

    #[test]
    fn verbose_flags_raise_the_level() {
        assert_eq!(adjust_verbosity(LevelFilter::INFO, 1), LevelFilter::DEBUG);
        assert_eq!(adjust_verbosity(LevelFilter::INFO, 2), LevelFilter::TRACE);
    }

    #[test]
    fn quiet_flags_lower_the_level_and_clamp() {
        assert_eq!(adjust_verbosity(LevelFilter::INFO, -1), LevelFilter::WARN);
        assert_eq!(adjust_verbosity(LevelFilter::ERROR, -5), LevelFilter::ERROR);
        assert_eq!(adjust_verbosity(LevelFilter::TRACE, 5), LevelFilter::TRACE);
    }
}
