//! Segment delimiter strategy for multi-document units.
//!
//! Joined output is the primary body, then for each related segment a
//! delimiter line followed by that segment's body:
//!
//! ```text
//! <primary body>
//! <!-- agent-bridge:segment name="reference.md" -->
//! <related body>
//! ```
//!
//! Body lines that already begin with `<!-- agent-bridge:` (after any run of
//! backslashes) get one extra leading backslash when joined, and lose it when
//! split. No body line can therefore be mistaken for a delimiter, and
//! [`split_segments`] is the exact inverse of [`join_segments`].

use std::sync::LazyLock;

use regex::Regex;

/// Prefix shared by every marker this crate emits.
pub const MARKER_PREFIX: &str = "<!-- agent-bridge:";

static DELIMITER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<!-- agent-bridge:segment name="([^"]*)" -->$"#).expect("valid regex")
});

static ESCAPED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\*<!-- agent-bridge:").expect("valid regex"));

/// A segment recovered from joined text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSegment {
    /// `None` for the leading (primary) segment.
    pub name: Option<String>,
    pub body: String,
}

/// The delimiter line introducing a related segment.
pub fn delimiter_line(name: &str) -> String {
    format!(
        "<!-- agent-bridge:segment name=\"{}\" -->",
        escape_attr(name)
    )
}

/// Whether a single line is a segment delimiter.
pub fn is_delimiter(line: &str) -> bool {
    DELIMITER_RE.is_match(line)
}

/// Join `(name, body)` pairs. The first pair is the primary and gets no delimiter.
pub fn join_segments<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (i, (name, body)) in segments.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(&delimiter_line(name));
            out.push('\n');
        }
        push_escaped(&mut out, body);
    }
    out
}

/// Split joined text back into segments.
pub fn split_segments(text: &str) -> Vec<SplitSegment> {
    let mut segments = Vec::new();
    let mut name: Option<String> = None;
    let mut lines: Vec<String> = Vec::new();

    for line in text.split('\n') {
        if let Some(caps) = DELIMITER_RE.captures(line) {
            segments.push(SplitSegment {
                name: name.take(),
                body: lines.join("\n"),
            });
            lines.clear();
            name = Some(unescape_attr(&caps[1]));
        } else if ESCAPED_RE.is_match(line) {
            // An escaped line always carries at least one backslash.
            lines.push(line[1..].to_string());
        } else {
            lines.push(line.to_string());
        }
    }

    segments.push(SplitSegment {
        name,
        body: lines.join("\n"),
    });
    segments
}

fn push_escaped(out: &mut String, body: &str) {
    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if ESCAPED_RE.is_match(line) {
            out.push('\\');
        }
        out.push_str(line);
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

fn unescape_attr(s: &str) -> String {
    s.replace("&quot;", "\"").replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(parts: &[(&str, &str)]) -> Vec<SplitSegment> {
        split_segments(&join_segments(parts.iter().copied()))
    }

    #[test]
    fn delimiter_is_stable() {
        assert_eq!(
            delimiter_line("examples/basic.md"),
            r#"<!-- agent-bridge:segment name="examples/basic.md" -->"#
        );
        assert!(is_delimiter(&delimiter_line("a.md")));
        assert!(!is_delimiter("<!-- a regular comment -->"));
        assert!(!is_delimiter("---"));
    }

    #[test]
    fn join_layout() {
        let joined = join_segments([("SKILL.md", "primary\n"), ("ref.md", "related")]);
        assert_eq!(
            joined,
            "primary\n\n<!-- agent-bridge:segment name=\"ref.md\" -->\nrelated"
        );
    }

    #[test]
    fn split_inverts_join() {
        let parts = [
            ("SKILL.md", "# Skill\n\nBody\n"),
            ("a.md", ""),
            ("b/c.md", "\n\ntrailing blank lines\n\n"),
        ];
        let split = roundtrip(&parts);
        assert_eq!(split.len(), 3);
        assert_eq!(split[0].name, None);
        assert_eq!(split[0].body, parts[0].1);
        assert_eq!(split[1].name.as_deref(), Some("a.md"));
        assert_eq!(split[1].body, "");
        assert_eq!(split[2].name.as_deref(), Some("b/c.md"));
        assert_eq!(split[2].body, parts[2].1);
    }

    #[test]
    fn body_containing_delimiter_text_is_not_split() {
        let forged = delimiter_line("forged.md");
        let body = format!("before\n{forged}\nafter");
        let parts = [("SKILL.md", body.as_str()), ("real.md", "real")];

        let joined = join_segments(parts.iter().copied());
        assert_eq!(joined.lines().filter(|l| is_delimiter(l)).count(), 1);

        let split = split_segments(&joined);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].body, body);
        assert_eq!(split[1].body, "real");
    }

    #[test]
    fn already_escaped_lines_keep_their_backslashes() {
        let body = "\\<!-- agent-bridge:segment name=\"x\" -->\n\\\\<!-- agent-bridge:other";
        let split = roundtrip(&[("SKILL.md", body)]);
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].body, body);
    }

    #[test]
    fn quoted_names_roundtrip() {
        let split = roundtrip(&[("p", "x"), ("we\"ird&.md", "y")]);
        assert_eq!(split[1].name.as_deref(), Some("we\"ird&.md"));
    }
}
