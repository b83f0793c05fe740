//! Enumerates source files under a scan root, filtered by extension,
//! directory-name exclusion, and gitignore-style ignore patterns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::{Error, Result};

/// One discovered input file. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub abs_path: PathBuf,
    pub rel_path: PathBuf,
    /// Lowercase extension including the leading dot, e.g. `.ts`.
    pub ext: String,
}

impl SourceFile {
    /// The file stem (name without extension), mirroring `Path::file_stem`.
    pub fn stem(&self) -> String {
        self.abs_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn build_ignore_spec(patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new("");
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| Error::Config(format!("invalid ignore pattern {pattern:?}: {e}")))?;
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("failed to build ignore matcher: {e}")))
}

/// Recursively walks `scan_root`, yielding every regular file whose extension
/// (compared case-insensitively) is in `include_exts`, whose path has no
/// segment matching `exclude_dirs` (case-insensitive exact match), and whose
/// posix-form relative path does not match any of `ignore_patterns`
/// (gitignore wildcard semantics).
///
/// Results are sorted by relative path for deterministic downstream ordering,
/// though emission order is not itself part of the contract.
pub fn scan_source_tree(
    scan_root: &Path,
    include_exts: &[String],
    exclude_dirs: &[String],
    ignore_patterns: &[String],
) -> Result<Vec<SourceFile>> {
    let ignore = build_ignore_spec(ignore_patterns)?;
    let include: HashSet<String> = include_exts.iter().map(|e| e.to_lowercase()).collect();
    let exclude: HashSet<String> = exclude_dirs.iter().map(|d| d.to_lowercase()).collect();

    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(scan_root)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let abs_path = entry.path();
        let rel_path = match abs_path.strip_prefix(scan_root) {
            Ok(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => continue,
        };

        let excluded_segment = rel_path
            .components()
            .any(|c| exclude.contains(&c.as_os_str().to_string_lossy().to_lowercase()));
        if excluded_segment {
            continue;
        }

        let rel_posix = rel_path.to_string_lossy().replace('\\', "/");
        if ignore
            .matched(&rel_posix, entry.file_type().is_dir())
            .is_ignore()
        {
            continue;
        }

        if !entry.file_type().is_file() {
            continue;
        }

        let ext = abs_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if !include.contains(&ext) {
            continue;
        }

        files.push(SourceFile {
            abs_path: abs_path.to_path_buf(),
            rel_path,
            ext,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn includes_only_configured_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.ts"), "a").expect("write");
        fs::write(dir.path().join("b.py"), "b").expect("write");

        let files = scan_source_tree(
            dir.path(),
            &[".ts".to_string()],
            &[],
            &[],
        )
        .expect("scan");

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].ext, ".ts");
    }

    #[test]
    fn excludes_configured_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("node_modules")).expect("mkdir");
        fs::write(dir.path().join("node_modules/dep.ts"), "x").expect("write");
        fs::write(dir.path().join("main.ts"), "x").expect("write");

        let files = scan_source_tree(
            dir.path(),
            &[".ts".to_string()],
            &["node_modules".to_string()],
            &[],
        )
        .expect("scan");

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, PathBuf::from("main.ts"));
    }

    #[test]
    fn directory_exclusion_is_case_insensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("Node_Modules")).expect("mkdir");
        fs::write(dir.path().join("Node_Modules/dep.ts"), "x").expect("write");

        let files = scan_source_tree(
            dir.path(),
            &[".ts".to_string()],
            &["node_modules".to_string()],
            &[],
        )
        .expect("scan");

        assert!(files.is_empty());
    }

    #[test]
    fn gitignore_style_pattern_is_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.generated.ts"), "x").expect("write");
        fs::write(dir.path().join("a.ts"), "x").expect("write");

        let files = scan_source_tree(
            dir.path(),
            &[".ts".to_string()],
            &[],
            &["*.generated.*".to_string()],
        )
        .expect("scan");

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, PathBuf::from("a.ts"));
    }
}
