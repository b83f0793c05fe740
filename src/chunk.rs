//! Splits oversized input text into line-bounded, overlapping chunks.

/// Splits `text` into chunks no larger than `max_chars` characters, preserving
/// line boundaries and terminators. When `overlap_lines` is greater than zero,
/// each chunk after the first repeats the trailing `overlap_lines` lines of its
/// predecessor.
///
/// If `text` already fits within `max_chars`, a single chunk equal to the
/// whole input is returned. A line longer than `max_chars` is never split; it
/// is emitted intact as its own chunk (possibly exceeding the cap).
pub fn chunk_text_by_lines(text: &str, max_chars: usize, overlap_lines: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let lines = split_keep_terminators(text);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for line in &lines {
        let line_len = line.chars().count();
        if !current.is_empty() && current_len + line_len > max_chars {
            chunks.push(current.concat());

            if overlap_lines > 0 {
                let start = current.len().saturating_sub(overlap_lines);
                current = current[start..].to_vec();
                current_len = current.iter().map(|l| l.chars().count()).sum();
            } else {
                current.clear();
                current_len = 0;
            }
        }

        current.push(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current.concat());
    }

    chunks
}

/// Splits `text` into lines, keeping each line's trailing `\n` (or `\r\n`)
/// attached, mirroring Python's `str.splitlines(keepends=True)`.
fn split_keep_terminators(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&text[start..=i]);
            start = i + 1;
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = chunk_text_by_lines("hello", 100, 0);
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn splits_on_line_boundaries_when_over_cap() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = chunk_text_by_lines(text, 10, 0);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc\n".to_string()]);
    }

    #[test]
    fn overlap_repeats_trailing_lines() {
        let text = "1\n2\n3\n4\n5\n";
        let chunks = chunk_text_by_lines(text, 4, 1);
        // every original line must appear somewhere
        for line in ["1\n", "2\n", "3\n", "4\n", "5\n"] {
            assert!(chunks.iter().any(|c| c.contains(line)));
        }
        // successive chunks share the overlap line
        for pair in chunks.windows(2) {
            let prev_last = pair[0].lines().next_back().unwrap_or("");
            assert!(pair[1].contains(prev_last));
        }
    }

    #[test]
    fn line_longer_than_cap_is_emitted_intact() {
        let long_line = "x".repeat(50);
        let text = format!("{long_line}\nshort\n");
        let chunks = chunk_text_by_lines(&text, 10, 0);
        assert!(chunks.iter().any(|c| c.trim_end() == long_line));
    }

    #[test]
    fn terminal_partial_chunk_is_always_emitted() {
        let text = "aaaaaaaaaa\nbb\n";
        let chunks = chunk_text_by_lines(text, 10, 0);
        assert_eq!(chunks.last().map(String::as_str), Some("bb\n"));
    }

    #[test]
    fn no_overlap_means_disjoint_chunks() {
        let text = "1\n2\n3\n4\n";
        let chunks = chunk_text_by_lines(text, 2, 0);
        assert_eq!(chunks, vec!["1\n".to_string(), "2\n".to_string(), "3\n".to_string(), "4\n".to_string()]);
    }
}
