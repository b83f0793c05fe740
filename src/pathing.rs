//! Maps a source-relative path to a documentation output path under one of
//! the two supported output layouts.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Output layout names accepted by [`doc_path_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `<root>/src/<parent>/<stem>/<stem>.md`
    StemFolder,
    /// `<root>/src/<parent>/<stem>.md`
    Flat,
}

impl Layout {
    /// Parses a layout name from configuration. Unknown names are fatal.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "stem_folder" => Ok(Self::StemFolder),
            "flat" => Ok(Self::Flat),
            other => Err(Error::UnsupportedLayout(other.to_string())),
        }
    }
}

/// Computes the documentation output path for `rel_src_path` under `output_root`.
pub fn doc_path_for(rel_src_path: &Path, output_root: &Path, layout: Layout) -> PathBuf {
    let parent = rel_src_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = rel_src_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match layout {
        Layout::StemFolder => output_root
            .join("src")
            .join(parent)
            .join(&stem)
            .join(format!("{stem}.md")),
        Layout::Flat => output_root.join("src").join(parent).join(format!("{stem}.md")),
    }
}
