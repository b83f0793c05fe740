//! Renders the per-chunk prompt from the configured template plus render-time
//! context, and assembles the merge prompt used when a file produced more
//! than one chunk.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::llm::types::{user_message, ChatMessage};

/// The compiled-in template, used when `docgen.template_mode` is `builtin`.
pub const BUILTIN_TEMPLATE: &str = r#"You are a technical writer producing reference documentation.

Language: {language}
Tone: {tone}

Write a single Markdown document describing the file below. Cover its purpose,
its public surface, and how it relates to the files it imports and the files
that import it.

File: {rel_path}
Kind: {file_kind}

## Imports

{imports_md}

## Imported by

{imported_by_md}

Use at most {max_snippet_blocks} code snippet blocks, each no longer than
{snippet_max_lines_per_block} lines, quoting only what is necessary to support
a claim.

```{code_fence}
{code}
```
"#;

const EMPTY_LINKS_PLACEHOLDER: &str = "(none)";

/// Render-time bundle passed to [`render_messages`].
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub rel_path: PathBuf,
    pub file_kind: String,
    pub code_fence: String,
    pub code: String,
    /// (imported source path, doc output path relative to output root).
    pub imports_links: Vec<(PathBuf, PathBuf)>,
    /// (importer source path, doc output path relative to output root).
    pub imported_by_links: Vec<(PathBuf, PathBuf)>,
}

fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn md_links(links: &[(PathBuf, PathBuf)]) -> String {
    if links.is_empty() {
        return EMPTY_LINKS_PLACEHOLDER.to_string();
    }
    links
        .iter()
        .map(|(src, doc)| {
            let doc = posix(doc);
            format!("- {} -> [{doc}]({doc})", posix(src))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Loads the template body either as the compiled-in default or from a file,
/// depending on `template_mode`.
pub fn load_template(template_mode: &str, template_path: Option<&Path>) -> Result<String> {
    match template_mode {
        "builtin" => Ok(BUILTIN_TEMPLATE.to_string()),
        "file" => {
            let path = template_path
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| Error::Config("docgen.template_mode=file requires a non-empty template_path".to_string()))?;
            std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
        }
        other => Err(Error::Config(format!("unsupported docgen.template_mode: {other}"))),
    }
}

/// Renders `template` against `ctx` and the remaining opaque placeholders,
/// producing a single user-role message.
#[allow(clippy::too_many_arguments)]
pub fn render_messages(
    template: &str,
    ctx: &PromptContext,
    language: &str,
    tone: &str,
    snippet_max_lines_per_block: u32,
    max_snippet_blocks: u32,
) -> Vec<ChatMessage> {
    let rendered = template
        .replace("{language}", language)
        .replace("{tone}", tone)
        .replace("{rel_path}", &posix(&ctx.rel_path))
        .replace("{file_kind}", &ctx.file_kind)
        .replace("{imports_md}", &md_links(&ctx.imports_links))
        .replace("{imported_by_md}", &md_links(&ctx.imported_by_links))
        .replace("{max_snippet_blocks}", &max_snippet_blocks.to_string())
        .replace("{snippet_max_lines_per_block}", &snippet_max_lines_per_block.to_string())
        .replace("{code_fence}", &ctx.code_fence)
        .replace("{code}", &ctx.code);

    vec![user_message(rendered)]
}

/// Builds the single-message instruction asking the backend to unify the
/// partial per-chunk documents, in order, into one coherent Markdown body.
pub fn render_merge_prompt(partial_docs: &[String]) -> Vec<ChatMessage> {
    let body = format!(
        "Merge the partial documentation sections below, in order, into a single \
         coherent Markdown document. Remove duplication, preserve ordering, keep \
         every relevant point. Do not invent anything.\n\n{}",
        partial_docs.join("\n\n---\n\n")
    );
    vec![user_message(body)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_links_render_literal_none() {
        assert_eq!(md_links(&[]), "(none)");
    }

    #[test]
    fn links_render_as_bullet_list() {
        let links = vec![(PathBuf::from("a.ts"), PathBuf::from("src/a/a.md"))];
        let rendered = md_links(&links);
        assert_eq!(rendered, "- a.ts -> [src/a/a.md](src/a/a.md)");
    }

    #[test]
    fn render_messages_fills_every_placeholder() {
        let ctx = PromptContext {
            rel_path: PathBuf::from("a.ts"),
            file_kind: "code".to_string(),
            code_fence: "ts".to_string(),
            code: "const x = 1;".to_string(),
            imports_links: vec![],
            imported_by_links: vec![],
        };
        let messages = render_messages(BUILTIN_TEMPLATE, &ctx, "en", "neutral", 80, 6);
        assert_eq!(messages.len(), 1);
        let body = &messages[0].content;
        assert!(body.contains("const x = 1;"));
        assert!(body.contains("(none)"));
        assert!(!body.contains("{rel_path}"));
    }

    #[test]
    fn merge_prompt_interleaves_partials_with_separator() {
        let partials = vec!["first part".to_string(), "second part".to_string()];
        let messages = render_merge_prompt(&partials);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("first part\n\n---\n\nsecond part"));
    }

    #[test]
    fn file_template_mode_requires_nonempty_path() {
        assert!(load_template("file", None).is_err());
        assert!(load_template("file", Some(Path::new(""))).is_err());
    }

    #[test]
    fn unsupported_template_mode_is_fatal() {
        assert!(load_template("weird", None).is_err());
    }
}
