//! YAML frontmatter: split, parse into [`Metadata`], and render back.
//!
//! A document carries frontmatter when its first line is `---` and a later
//! line is `---`. One blank line after the closing fence is part of the
//! header, so `render_document` followed by `parse_document` is lossless.

use agentbridge_shared::{BridgeError, MetaValue, Metadata, Result};
use serde_yaml::Value;

const FENCE: &str = "---";

/// A markdown document split into metadata and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub metadata: Metadata,
    pub body: String,
    /// Keys whose values could not be represented (nested mappings, nulls).
    pub dropped_keys: Vec<String>,
}

/// Split raw text into `(frontmatter yaml, body)`.
///
/// Returns `None` for the yaml part when the text has no frontmatter.
pub fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let Some(after_open) = strip_fence_line(text) else {
        return (None, text);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            let yaml = &after_open[..offset];
            let mut body = &after_open[offset + line.len()..];
            body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, text)
}

fn strip_fence_line(text: &str) -> Option<&str> {
    text.strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
}

/// Parse frontmatter yaml into ordered metadata.
///
/// Scalars and lists of scalars are kept. Nested mappings and nulls are
/// dropped and reported through the second tuple element.
pub fn parse_frontmatter(yaml: &str) -> Result<(Metadata, Vec<String>)> {
    if yaml.trim().is_empty() {
        return Ok((Metadata::new(), Vec::new()));
    }
    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| BridgeError::validation(format!("invalid YAML frontmatter: {e}")))?;

    let mapping = match value {
        Value::Null => return Ok((Metadata::new(), Vec::new())),
        Value::Mapping(m) => m,
        _ => {
            return Err(BridgeError::validation(
                "frontmatter must be a mapping of keys to values",
            ));
        }
    };

    let mut metadata = Metadata::new();
    let mut dropped = Vec::new();

    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                dropped.push(format!("{other:?}"));
                continue;
            }
        };
        match convert_value(value) {
            Some(v) => metadata.insert(key, v),
            None => dropped.push(key),
        }
    }

    Ok((metadata, dropped))
}

fn convert_value(value: Value) -> Option<MetaValue> {
    match value {
        Value::Bool(b) => Some(MetaValue::Bool(b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetaValue::Int)
            .or_else(|| n.as_f64().map(MetaValue::Float)),
        Value::String(s) => Some(MetaValue::Text(s)),
        Value::Sequence(items) => {
            let converted: Option<Vec<MetaValue>> = items.into_iter().map(convert_value).collect();
            converted.map(MetaValue::List)
        }
        Value::Tagged(tagged) => convert_value(tagged.value),
        Value::Null | Value::Mapping(_) => None,
    }
}

/// Parse a whole document: frontmatter (if any) plus body.
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    match split_frontmatter(text) {
        (Some(yaml), body) => {
            let (metadata, dropped_keys) = parse_frontmatter(yaml)?;
            Ok(ParsedDocument {
                metadata,
                body: body.to_string(),
                dropped_keys,
            })
        }
        (None, body) => Ok(ParsedDocument {
            metadata: Metadata::new(),
            body: body.to_string(),
            dropped_keys: Vec::new(),
        }),
    }
}

/// Render metadata as a fenced YAML block, or an empty string for no metadata.
pub fn render_frontmatter(metadata: &Metadata) -> Result<String> {
    if metadata.is_empty() {
        return Ok(String::new());
    }
    let yaml = serde_yaml::to_string(metadata)
        .map_err(|e| BridgeError::validation(format!("frontmatter serialization failed: {e}")))?;

    let mut out = String::with_capacity(yaml.len() + 8);
    out.push_str("---\n");
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    Ok(out)
}

/// Render a document with a frontmatter header followed by a blank line and the body.
pub fn render_document(metadata: &Metadata, body: &str) -> Result<String> {
    let header = render_frontmatter(metadata)?;
    if header.is_empty() {
        return Ok(body.to_string());
    }
    Ok(format!("{header}\n{body}"))
}
