//! Markdown handling for agent-bridge knowledge files.
//!
//! - [`frontmatter`]: YAML header split/parse/render
//! - [`segments`]: delimiter strategy for joining multi-document units
//! - text helpers used by converters to derive names, titles and descriptions

pub mod frontmatter;
pub mod segments;

use std::sync::LazyLock;

use regex::Regex;

pub use frontmatter::{ParsedDocument, parse_document, render_document, render_frontmatter};
pub use segments::{SplitSegment, delimiter_line, is_delimiter, join_segments, split_segments};

/// Strip a UTF-8 byte order mark, if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Extract the first H1 heading text from markdown.
pub fn first_heading(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

/// Remove the first line if it is an H1 heading, plus blank lines after it.
pub fn strip_leading_heading(md: &str) -> &str {
    static LEADING_H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*# [^\n]*\n*").expect("valid regex"));

    match LEADING_H1_RE.find(md) {
        Some(m) => &md[m.end()..],
        None => md,
    }
}

/// First prose paragraph of a markdown body, collapsed to one line.
///
/// Headings, quotes, list items, tables and fenced code are skipped.
pub fn first_paragraph(md: &str) -> Option<String> {
    let mut in_fence = false;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in md.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        let structural = ['#', '>', '-', '*', '|', '<', '!']
            .iter()
            .any(|c| trimmed.starts_with(*c));
        if structural {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        paragraph.push(trimmed);
    }

    if paragraph.is_empty() {
        None
    } else {
        Some(paragraph.join(" "))
    }
}

/// Normalize a name to `[a-z0-9-]`, collapsing dashes, at most 64 chars.
pub fn normalize_skill_name(name: &str) -> String {
    static INVALID_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lower = name.to_lowercase();
    let dashed = INVALID_RE.replace_all(&lower, "-");
    let trimmed: String = dashed.trim_matches('-').chars().take(64).collect();
    trimmed.trim_end_matches('-').to_string()
}

/// `frontend-specialist` to `Frontend Specialist`.
pub fn humanize(identifier: &str) -> String {
    identifier
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate to at most `max` chars, ending with `suffix` when cut.
pub fn truncate_chars(text: &str, max: usize, suffix: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Collapse whitespace runs (including newlines) into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_is_stripped() {
        assert_eq!(strip_bom("\u{feff}# Title"), "# Title");
        assert_eq!(strip_bom("# Title"), "# Title");
    }

    #[test]
    fn heading_helpers() {
        let md = "# Clean Code\n\nWrite small functions.\n\n## Rules\n";
        assert_eq!(first_heading(md).as_deref(), Some("Clean Code"));
        assert_eq!(strip_leading_heading(md), "Write small functions.\n\n## Rules\n");
        assert_eq!(strip_leading_heading("no heading"), "no heading");
    }

    #[test]
    fn first_paragraph_skips_structure() {
        let md = "# Title\n\n> quote\n\n```\ncode\n```\n\nFirst line\ncontinues here.\n\nSecond.";
        assert_eq!(
            first_paragraph(md).as_deref(),
            Some("First line continues here.")
        );
        assert_eq!(first_paragraph("# Only heading\n"), None);
    }

    #[test]
    fn skill_name_normalization() {
        assert_eq!(normalize_skill_name("Clean Code"), "clean-code");
        assert_eq!(normalize_skill_name("api_patterns--v2"), "api-patterns-v2");
        assert_eq!(normalize_skill_name("--Weird!!Name--"), "weird-name");
        assert_eq!(normalize_skill_name(&"a".repeat(80)).len(), 64);
    }

    #[test]
    fn humanize_identifiers() {
        assert_eq!(humanize("frontend-specialist"), "Frontend Specialist");
        assert_eq!(humanize("plan"), "Plan");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10, "..."), "short");
        assert_eq!(truncate_chars("abcdefghij", 6, "..."), "abc...");
        assert_eq!(truncate_chars("ééééé", 4, "…"), "ééé…");
    }

    #[test]
    fn single_line_collapses_whitespace() {
        assert_eq!(single_line("a\n  b\tc "), "a b c");
    }
}
