//! Parses textual import/require/@import references between source files and
//! builds the forward and reverse adjacency maps the prompt assembler uses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::scanner::SourceFile;

/// A directed reference discovered in one file's text, pointing at another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    pub src: PathBuf,
    pub target: PathBuf,
    pub raw: String,
}

/// Forward and reverse import adjacency, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    imports_of: HashMap<PathBuf, Vec<ImportEdge>>,
    imported_by: HashMap<PathBuf, Vec<ImportEdge>>,
}

impl ImportGraph {
    /// Edges whose source is `rel_path`, in source-text discovery order.
    pub fn imports_of(&self, rel_path: &Path) -> &[ImportEdge] {
        self.imports_of.get(rel_path).map_or(&[], Vec::as_slice)
    }

    /// Edges whose target is `rel_path`, in source-text discovery order.
    pub fn imported_by(&self, rel_path: &Path) -> &[ImportEdge] {
        self.imported_by.get(rel_path).map_or(&[], Vec::as_slice)
    }
}

#[allow(clippy::expect_used)]
static IMPORT_TS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:^|\n)\s*(?:import\s+.*?\s+from\s+|export\s+\*\s+from\s+)["']([^"']+)["']"#)
        .expect("static pattern")
});
#[allow(clippy::expect_used)]
static REQUIRE_TS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\(\s*["']([^"']+)["']\s*\)"#).expect("static pattern"));
#[allow(clippy::expect_used)]
static IMPORT_CSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+["']([^"']+)["']"#).expect("static pattern"));

const CANDIDATE_EXTENSIONS: &[&str] = &["", ".ts", ".tsx", ".js", ".jsx", ".json", ".css", ".scss", ".md"];
const INDEX_CANDIDATES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx"];

/// Resolves a raw reference string to a candidate absolute path, or `None` if
/// the reference is external (neither alias-prefixed nor relative).
fn resolve_candidate(
    base_dir: &Path,
    raw: &str,
    scan_root: &Path,
    aliases: &HashMap<String, String>,
) -> Option<PathBuf> {
    let raw = raw.trim();

    for (prefix, mapped) in aliases {
        if let Some(rest) = raw.strip_prefix(prefix.as_str()) {
            let root_parent = scan_root.parent().unwrap_or(scan_root);
            return Some(normalize(&root_parent.join(mapped).join(rest)));
        }
    }

    if raw.starts_with('.') {
        return Some(normalize(&base_dir.join(raw)));
    }

    None
}

fn expand_extensions(p: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = CANDIDATE_EXTENSIONS
        .iter()
        .map(|ext| PathBuf::from(format!("{}{ext}", p.display())))
        .collect();
    out.extend(INDEX_CANDIDATES.iter().map(|name| p.join(name)));
    out
}

/// Collapses `.` and `..` components without requiring the path to exist,
/// since candidate paths are speculative until matched against a known file.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Scans every file's text for import-like references and resolves them
/// against the known set of source files, producing forward and reverse
/// adjacency. Unresolved references are silently dropped.
pub fn build_import_graph(
    scan_root: &Path,
    files: &[SourceFile],
    aliases: &HashMap<String, String>,
) -> ImportGraph {
    let file_set: std::collections::HashSet<PathBuf> =
        files.iter().map(|f| normalize(&f.abs_path)).collect();
    let rel_by_abs: HashMap<PathBuf, PathBuf> = files
        .iter()
        .map(|f| (normalize(&f.abs_path), f.rel_path.clone()))
        .collect();

    let mut imports_of: HashMap<PathBuf, Vec<ImportEdge>> = HashMap::new();
    let mut imported_by: HashMap<PathBuf, Vec<ImportEdge>> = HashMap::new();

    for f in files {
        let text = match std::fs::read(&f.abs_path) {
            Ok(bytes) => crate::redact::read_lossy(&bytes),
            Err(_) => continue,
        };
        let base_dir = f
            .abs_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut raws: Vec<String> = Vec::new();
        raws.extend(IMPORT_TS.captures_iter(&text).filter_map(|c| c.get(1).map(|m| m.as_str().to_string())));
        raws.extend(REQUIRE_TS.captures_iter(&text).filter_map(|c| c.get(1).map(|m| m.as_str().to_string())));
        raws.extend(IMPORT_CSS.captures_iter(&text).filter_map(|c| c.get(1).map(|m| m.as_str().to_string())));

        for raw in raws {
            let Some(resolved) = resolve_candidate(&base_dir, &raw, scan_root, aliases) else {
                continue;
            };

            let target_abs = expand_extensions(&resolved)
                .into_iter()
                .map(|c| normalize(&c))
                .find(|c| file_set.contains(c));

            let Some(target_abs) = target_abs else {
                continue;
            };
            let Some(target_rel) = rel_by_abs.get(&target_abs) else {
                continue;
            };

            let edge = ImportEdge {
                src: f.rel_path.clone(),
                target: target_rel.clone(),
                raw,
            };
            imports_of.entry(f.rel_path.clone()).or_default().push(edge.clone());
            imported_by.entry(target_rel.clone()).or_default().push(edge);
        }
    }

    ImportGraph { imports_of, imported_by }
}
