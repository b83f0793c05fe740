//! docuforge: a batch documentation generator that walks a source tree,
//! synthesizes a per-file Markdown document via a chat-completion backend,
//! and persists the outputs with a content-addressed cache.
//!
//! The [`orchestrator`] module owns the pipeline: it consumes [`scanner`]
//! output, consults the [`imports`] graph, dispatches work bounded by a
//! concurrency cap, and delegates every model call to [`llm::router`], which
//! in turn cooperates with the shared [`llm::ratelimit`] limiter.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod imports;
pub mod llm;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod pathing;
pub mod prompt;
pub mod redact;
pub mod scanner;
