use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias. Every fallible operation in this crate returns it.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced anywhere in the generation pipeline.
///
/// Variants are grouped by the taxonomy in the design: config/precondition
/// errors are fatal at run start, backend errors are classified by the router,
/// and everything else surfaces as a per-file failure that aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported output layout: {0}")]
    UnsupportedLayout(String),

    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {message}")]
    Backend {
        status: u16,
        message: String,
        error_type: Option<String>,
        headers: HashMap<String, String>,
    },

    #[error("no preferred model is available on the backend")]
    NoModelsAvailable,

    #[error("exhausted every model without success: {0}")]
    RoutingExhausted(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O error with the path that triggered it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code carried by a `Backend` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The process exit code this error should surface as: `2` for
    /// config/precondition errors, `1` for everything else. Success (`0`) is
    /// never represented by `Error`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::UnsupportedLayout(_) | Self::NoModelsAvailable => 2,
            _ => 1,
        }
    }

    /// A summary safe to show a user: never echoes API keys or raw request bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("configuration error: {msg}"),
            Self::Io { path, .. } => format!("filesystem error at {}", path.display()),
            Self::ManifestParse { path, .. } => {
                format!("manifest at {} is corrupt", path.display())
            }
            Self::UnsupportedLayout(name) => format!("unsupported output layout: {name}"),
            Self::Transport(_) => "request to the documentation backend failed".to_string(),
            Self::Backend { status, .. } => format!("backend returned HTTP {status}"),
            Self::NoModelsAvailable => {
                "none of the preferred models are available on this backend".to_string()
            }
            Self::RoutingExhausted(_) => {
                "generation failed after exhausting every configured model".to_string()
            }
            Self::Other(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_precondition_errors_exit_with_code_2() {
        assert_eq!(Error::Config("bad".to_string()).exit_code(), 2);
        assert_eq!(Error::UnsupportedLayout("nested".to_string()).exit_code(), 2);
        assert_eq!(Error::NoModelsAvailable.exit_code(), 2);
    }

    #[test]
    fn other_errors_exit_with_code_1() {
        assert_eq!(Error::RoutingExhausted("boom".to_string()).exit_code(), 1);
        assert_eq!(Error::Other("boom".to_string()).exit_code(), 1);
    }

    #[test]
    fn user_message_never_echoes_backend_message_verbatim_for_transport() {
        // Transport errors must not leak request/response internals.
        let msg = Error::Backend {
            status: 500,
            message: "internal details".to_string(),
            error_type: None,
            headers: HashMap::new(),
        }
        .user_message();
        assert_eq!(msg, "backend returned HTTP 500");
    }
}
