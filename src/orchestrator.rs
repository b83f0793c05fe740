//! Drives one full generation run: scan, build the import graph, fan out
//! bounded-concurrency generation across every discovered file, and persist
//! the manifest plus an optional project index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::imports::ImportGraph;
use crate::llm::client::{BackendClient, HttpBackendClient};
use crate::llm::ratelimit::{RateLimiter, ThrottleConfig};
use crate::llm::router::ModelRouter;
use crate::llm::types::{LlmParams, RoutingPolicy};
use crate::manifest::{Manifest, ManifestEntry};
use crate::pathing::{doc_path_for, Layout};
use crate::prompt::{self, PromptContext};
use crate::scanner::{scan_source_tree, SourceFile};

/// One unit of generation work: a discovered source file and the
/// documentation path it is destined for.
#[derive(Debug, Clone)]
struct WorkItem {
    src: SourceFile,
    out_path: PathBuf,
    rel_key: String,
}

fn kind_from_ext(ext: &str) -> &'static str {
    match ext {
        ".ts" | ".tsx" | ".js" | ".jsx" => "code",
        ".css" | ".scss" => "style",
        ".json" => "json",
        ".md" => "markdown",
        _ => "unknown",
    }
}

fn code_fence_from_ext(ext: &str) -> &'static str {
    match ext {
        ".ts" => "ts",
        ".tsx" => "tsx",
        ".js" => "js",
        ".jsx" => "jsx",
        ".css" => "css",
        ".scss" => "scss",
        ".json" => "json",
        ".md" => "md",
        _ => "",
    }
}

/// Per-run overrides the CLI's `build` subcommand may supply on top of the
/// loaded [`AppConfig`]. Any field left at its default leaves the
/// corresponding config value untouched.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bypasses the content-addressed cache and regenerates every file
    /// regardless of whether its hash already matches the manifest.
    pub force: bool,
    /// Removes the generated `src/` subtree and top-level `INDEX.md` under
    /// the output root, and the whole state directory, before the run
    /// starts. Never touches the output root itself.
    pub reset: bool,
    /// Restricts generation to these exact posix-form relative paths, if
    /// given. `None` means every scanned file.
    pub include_only: Option<Vec<String>>,
    /// Overrides `performance.max_concurrency` for this run.
    pub max_concurrency: Option<usize>,
}

/// Drives one run of the pipeline against a resolved [`AppConfig`].
pub struct GenerationOrchestrator {
    cfg: AppConfig,
}

impl GenerationOrchestrator {
    pub fn new(cfg: AppConfig) -> Self {
        Self { cfg }
    }

    /// Runs the full pipeline: scan, build import graph, generate every file
    /// concurrently (bounded by `performance.max_concurrency`), save the
    /// manifest, and optionally write `INDEX.md`.
    pub async fn run(&self, opts: &RunOptions) -> Result<()> {
        let cfg = &self.cfg;
        let force = opts.force;

        if !cfg.paths.scan_root.is_dir() {
            return Err(Error::Config(format!(
                "scan_root does not exist or is not a directory: {}",
                cfg.paths.scan_root.display()
            )));
        }
        std::fs::create_dir_all(&cfg.paths.output_root)
            .map_err(|e| Error::io(&cfg.paths.output_root, e))?;
        std::fs::create_dir_all(&cfg.paths.state_dir).map_err(|e| Error::io(&cfg.paths.state_dir, e))?;

        if opts.reset {
            info!("reset requested: clearing generated docs and manifest state");
            let generated_src = cfg.paths.output_root.join("src");
            remove_dir_if_exists(&generated_src)?;
            let index_path = cfg.paths.output_root.join("INDEX.md");
            remove_file_if_exists(&index_path)?;
            remove_dir_if_exists(&cfg.paths.state_dir)?;
            std::fs::create_dir_all(&cfg.paths.state_dir).map_err(|e| Error::io(&cfg.paths.state_dir, e))?;
        }

        let manifest_path = cfg.paths.state_dir.join("manifest.json");
        let mut manifest = Manifest::new(&manifest_path);
        manifest.load()?;

        let mut files = scan_source_tree(
            &cfg.paths.scan_root,
            &cfg.scan.include_extensions,
            &cfg.scan.exclude_dirs,
            &cfg.scan.ignore_patterns,
        )?;
        if let Some(only) = &opts.include_only {
            let wanted: std::collections::HashSet<&str> = only.iter().map(String::as_str).collect();
            files.retain(|f| wanted.contains(f.rel_path.to_string_lossy().replace('\\', "/").as_str()));
        }
        info!(count = files.len(), "scanned source tree");

        let graph = crate::imports::build_import_graph(&cfg.paths.scan_root, &files, &cfg.resolve.aliases);

        let template = prompt::load_template(&cfg.docgen.template_mode, cfg.docgen.template_path.as_deref())?;

        let api_key = cfg.resolve_api_key()?;
        let client: Arc<dyn BackendClient> = Arc::new(HttpBackendClient::new(&cfg.llm.base_url, api_key)?);

        let base_params = LlmParams {
            temperature: cfg.llm.temperature,
            top_p: cfg.llm.top_p,
            max_completion_tokens: cfg.llm.max_completion_tokens,
            stream: false,
            service_tier: cfg.llm.service_tier.clone(),
            reasoning_effort: cfg.llm.reasoning_effort.clone(),
        };
        if cfg.llm.stream {
            warn!("llm.stream=true is configured but ignored; this pipeline always requests non-streaming responses");
        }

        let policy = RoutingPolicy {
            preferred_models: cfg.llm.routing.preferred_models.clone(),
            max_attempts_per_model: cfg.llm.retry.max_attempts_per_model,
            backoff_base_s: cfg.llm.retry.backoff_base_s,
            backoff_max_s: cfg.llm.retry.backoff_max_s,
        };
        let limiter = Arc::new(RateLimiter::new(ThrottleConfig {
            enabled: cfg.llm.throttle.enabled,
            min_interval_seconds: cfg.llm.throttle.min_interval_s,
            min_remaining_tokens: cfg.llm.throttle.min_remaining_tokens,
        }));
        let router = Arc::new(ModelRouter::new(client, policy, base_params, limiter));

        let models = if cfg.llm.routing.validate_models {
            router.validate_models().await?
        } else {
            cfg.llm.routing.preferred_models.clone()
        };

        let work = build_work_items(&files, &cfg.paths.output_root, Layout::parse(&cfg.docgen.layout)?);

        let max_concurrency = opts.max_concurrency.unwrap_or(cfg.performance.max_concurrency);
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let known_shas = Arc::new(manifest.snapshot_shas());
        let mut handles = Vec::with_capacity(work.len());
        let mut abort_handles = Vec::with_capacity(work.len());

        for item in work.clone() {
            let sem = Arc::clone(&semaphore);
            let router = Arc::clone(&router);
            let out_root = cfg.paths.output_root.clone();
            let layout = Layout::parse(&cfg.docgen.layout)?;
            let models = models.clone();
            let language = cfg.docgen.language.clone();
            let tone = cfg.docgen.tone.clone();
            let template = template.clone();
            let graph = graph.clone();
            let known_sha = known_shas.get(&item.rel_key).cloned();
            let max_chars = cfg.docgen.max_chars_per_chunk;
            let overlap_lines = cfg.docgen.overlap_lines;
            let max_snippet_blocks = cfg.docgen.max_snippet_blocks;
            let snippet_max_lines = cfg.docgen.snippet_max_lines_per_block;

            let handle = tokio::spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| Error::Other(format!("semaphore acquire failed: {e}")))?;

                process_one(
                    &item,
                    &router,
                    &models,
                    &graph,
                    &out_root,
                    layout,
                    &template,
                    &language,
                    &tone,
                    max_chars,
                    overlap_lines,
                    max_snippet_blocks,
                    snippet_max_lines,
                    force,
                    known_sha.as_deref(),
                )
                .await
            });
            abort_handles.push(handle.abort_handle());
            handles.push((item.rel_key.clone(), handle));
        }

        let fan_in = async {
            let mut failures = 0usize;
            for (rel_key, handle) in handles {
                match handle.await {
                    Ok(Ok(Some(entry))) => manifest.set_entry(rel_key, entry),
                    Ok(Ok(None)) => debug!(rel_key, "skipped, cache hit"),
                    Ok(Err(e)) => {
                        warn!(rel_key, error = %e, "generation failed for file");
                        failures += 1;
                    }
                    Err(join_err) => {
                        warn!(rel_key, error = %join_err, "generation task panicked");
                        failures += 1;
                    }
                }
            }
            failures
        };
        tokio::pin!(fan_in);

        let failures = tokio::select! {
            failures = &mut fan_in => failures,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, aborting in-flight generation tasks; manifest will not be saved this run");
                for abort_handle in &abort_handles {
                    abort_handle.abort();
                }
                return Err(Error::Other("run interrupted by signal".to_string()));
            }
        };

        manifest.save()?;

        if cfg.docgen.write_index {
            write_index(&cfg.paths.output_root, &work)?;
        }

        if failures > 0 {
            warn!(failures, total = work.len(), "run completed with per-file failures");
        }

        Ok(())
    }
}

fn build_work_items(files: &[SourceFile], output_root: &Path, layout: Layout) -> Vec<WorkItem> {
    files
        .iter()
        .map(|f| {
            let out_path = doc_path_for(&f.rel_path, output_root, layout);
            WorkItem {
                src: f.clone(),
                out_path,
                rel_key: f.rel_path.to_string_lossy().replace('\\', "/"),
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn process_one(
    item: &WorkItem,
    router: &ModelRouter,
    models: &[String],
    graph: &ImportGraph,
    output_root: &Path,
    layout: Layout,
    template: &str,
    language: &str,
    tone: &str,
    max_chars: usize,
    overlap_lines: usize,
    max_snippet_blocks: u32,
    snippet_max_lines: u32,
    force: bool,
    known_sha: Option<&str>,
) -> Result<Option<ManifestEntry>> {
    let bytes = std::fs::read(&item.src.abs_path).map_err(|e| Error::io(&item.src.abs_path, e))?;
    let raw = crate::redact::redact_secrets(&crate::redact::read_lossy(&bytes));
    let sha = crate::redact::sha256_hex(&raw);

    if !force && known_sha == Some(sha.as_str()) && item.out_path.exists() {
        return Ok(None);
    }

    let chunks = crate::chunk::chunk_text_by_lines(&raw, max_chars, overlap_lines);

    let imports_links = links_for(graph.imports_of(&item.src.rel_path), output_root, layout, |e| &e.target);
    let imported_by_links = links_for(graph.imported_by(&item.src.rel_path), output_root, layout, |e| &e.src);

    let mut partial_docs = Vec::with_capacity(chunks.len());
    let mut used_model = String::new();
    let total = chunks.len();

    for (i, chunk) in chunks.into_iter().enumerate() {
        let kind = kind_from_ext(&item.src.ext);
        let file_kind = if total > 1 {
            format!("{kind} (chunk {}/{total})", i + 1)
        } else {
            kind.to_string()
        };

        let ctx = PromptContext {
            rel_path: item.src.rel_path.clone(),
            file_kind,
            code_fence: code_fence_from_ext(&item.src.ext).to_string(),
            code: chunk,
            imports_links: imports_links.clone(),
            imported_by_links: imported_by_links.clone(),
        };

        let messages = prompt::render_messages(template, &ctx, language, tone, snippet_max_lines, max_snippet_blocks);
        let (doc, model) = router.generate(&messages, models).await?;
        partial_docs.push(doc.trim().to_string());
        used_model = model;
    }

    let final_doc = if partial_docs.len() > 1 {
        let merge_messages = prompt::render_merge_prompt(&partial_docs);
        let (merged, model) = router.generate(&merge_messages, models).await?;
        used_model = model;
        merged.trim().to_string()
    } else {
        partial_docs.into_iter().next().unwrap_or_default()
    };

    if let Some(parent) = item.out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(&item.out_path, format!("{}\n", final_doc.trim())).map_err(|e| Error::io(&item.out_path, e))?;

    Ok(Some(ManifestEntry {
        sha256: sha,
        model: used_model,
        updated_at: chrono::Utc::now().to_rfc3339(),
    }))
}

fn links_for<F>(
    edges: &[crate::imports::ImportEdge],
    output_root: &Path,
    layout: Layout,
    pick: F,
) -> Vec<(PathBuf, PathBuf)>
where
    F: Fn(&crate::imports::ImportEdge) -> &Path,
{
    edges
        .iter()
        .map(|e| {
            let other = pick(e);
            let doc_path = doc_path_for(other, output_root, layout);
            let doc_rel = doc_path.strip_prefix(output_root).unwrap_or(&doc_path).to_path_buf();
            (other.to_path_buf(), doc_rel)
        })
        .collect()
}

fn write_index(output_root: &Path, work: &[WorkItem]) -> Result<()> {
    let index_path = output_root.join("INDEX.md");

    let mut sorted: Vec<&WorkItem> = work.iter().collect();
    sorted.sort_by(|a, b| a.rel_key.cmp(&b.rel_key));

    let mut lines = vec!["# Documentation index".to_string(), String::new()];
    for item in sorted {
        let doc_rel = item
            .out_path
            .strip_prefix(output_root)
            .unwrap_or(&item.out_path)
            .to_string_lossy()
            .replace('\\', "/");
        lines.push(format!("- {} -> [{doc_rel}]({doc_rel})", item.rel_key));
    }

    std::fs::write(&index_path, format!("{}\n", lines.join("\n"))).map_err(|e| Error::io(&index_path, e))
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}
