//! Leading YAML metadata block of a document.
//!
//! ```text
//! ---
//! number: 42
//! status: "open"
//! updated: "2024-01-15T10:00:00Z"
//! ---
//! # Body
//! ```
//!
//! Only a handful of keys matter to synchronization; everything else is
//! ignored. Reading is lenient: a missing block yields an empty record, and
//! YAML that does not parse falls back to a scan of top-level `key: value`
//! lines so a hand-broken document does not lose its identity.

use crate::error::{Error, Result};
use crate::timestamp::parse_timestamp;
use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::ops::Range;

const DELIMITER: &str = "---";

/// The byte layout of a frontmatter block within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontmatterSpan {
    /// YAML text between the delimiters.
    pub yaml: Range<usize>,
    /// Everything after the closing delimiter line.
    pub body: Range<usize>,
}

/// Locates the frontmatter block, if the document starts with one.
///
/// The first line must be exactly `---`; the block ends at the next `---` or
/// `...` line. A document whose opening delimiter is never closed has no
/// frontmatter.
pub fn locate(source: &str) -> Option<FrontmatterSpan> {
    let mut lines = source.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end_matches(['\r', '\n']) != DELIMITER {
        return None;
    }

    let yaml_start = first.len();
    let mut cursor = yaml_start;
    for line in lines {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == DELIMITER || trimmed == "..." {
            return Some(FrontmatterSpan {
                yaml: yaml_start..cursor,
                body: cursor + line.len()..source.len(),
            });
        }
        cursor += line.len();
    }
    None
}

/// Splits a document into its frontmatter YAML and body.
pub fn split(source: &str) -> (Option<&str>, &str) {
    match locate(source) {
        Some(span) => (Some(&source[span.yaml]), &source[span.body]),
        None => (None, source),
    }
}

/// The frontmatter fields synchronization reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    /// Remote item identifier (`number`, or `id`).
    pub number: Option<String>,
    /// Stored item status (`status`, or `state`).
    pub status: Option<String>,
    /// Last remote modification written into the document.
    pub updated: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub url: Option<String>,
    /// `opened_by`, or `author`.
    pub author: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    /// `updateMode` as written by the renderer; informational only.
    pub update_mode: Option<String>,
    /// Per-document deletion override (`allowDelete`).
    pub allow_delete: Option<bool>,
}

impl Frontmatter {
    /// Strictly parses the frontmatter of `source`.
    ///
    /// Returns `Ok(None)` when the document has no frontmatter block and an
    /// error when the block is not a YAML mapping.
    pub fn parse(source: &str) -> Result<Option<Self>> {
        let (Some(yaml), _) = split(source) else {
            return Ok(None);
        };
        if yaml.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Mapping(map) => Ok(Some(Self::from_mapping(&map))),
            Value::Null => Ok(Some(Self::default())),
            other => Err(Error::NotAMapping {
                found: kind_name(&other).to_string(),
            }),
        }
    }

    /// Reads the frontmatter of `source`, never failing.
    ///
    /// Invalid YAML is logged and read line by line instead.
    pub fn read(source: &str) -> Self {
        match Self::parse(source) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable frontmatter, scanning lines instead");
                split(source).0.map(Self::scan_lines).unwrap_or_default()
            }
        }
    }

    fn from_mapping(map: &Mapping) -> Self {
        let get = |keys: &[&str]| keys.iter().find_map(|key| map.get(*key));

        Self {
            number: get(&["number", "id"]).and_then(scalar),
            status: get(&["status", "state"]).and_then(scalar),
            updated: get(&["updated", "updated_at"])
                .and_then(scalar)
                .and_then(|s| parse_timestamp(&s)),
            created: get(&["created", "created_at"])
                .and_then(scalar)
                .and_then(|s| parse_timestamp(&s)),
            url: get(&["url"]).and_then(scalar),
            author: get(&["opened_by", "author"]).and_then(scalar),
            labels: get(&["labels"]).map(string_list).unwrap_or_default(),
            assignees: get(&["assignees"]).map(string_list).unwrap_or_default(),
            update_mode: get(&["updateMode", "update_mode"]).and_then(scalar),
            allow_delete: get(&["allowDelete", "allow_delete"]).and_then(flag),
        }
    }

    /// Best-effort read of top-level scalar keys from YAML that does not
    /// parse as a whole.
    fn scan_lines(yaml: &str) -> Self {
        let mut map = Mapping::new();
        for line in yaml.lines() {
            if line.starts_with([' ', '\t', '#', '-']) {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if map.contains_key(key) {
                continue;
            }
            let value = unquote(value.trim());
            if !value.is_empty() {
                map.insert(Value::from(key), Value::from(value));
            }
        }
        Self::from_mapping(&map)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Formats a value as a YAML scalar line value.
///
/// Plain integers stay bare so `number: 42` reads back as a number; anything
/// else is double-quoted.
pub fn yaml_scalar(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.to_string()
    } else {
        format!("\"{}\"", crate::escape::escape_yaml_string(value))
    }
}

/// Writes `fields` into the frontmatter of `source`.
///
/// Existing top-level keys are replaced in place, together with any indented
/// or list continuation lines that belonged to them. Missing keys are added
/// at the end of the block. A document without frontmatter gets a new block
/// in front of its first line. All other bytes are left untouched.
pub fn stamp(source: &str, fields: &[(&str, String)]) -> String {
    let Some(span) = locate(source) else {
        let mut out = String::from("---\n");
        for (key, value) in fields {
            out.push_str(&format!("{}: {}\n", key, yaml_scalar(value)));
        }
        out.push_str("---\n");
        out.push_str(source);
        return out;
    };

    let yaml = &source[span.yaml.clone()];
    let mut written = vec![false; fields.len()];
    let mut out_yaml = String::with_capacity(yaml.len() + 64);
    let mut skipping = false;

    for line in yaml.split_inclusive('\n') {
        if skipping && line.starts_with([' ', '\t', '-']) {
            continue;
        }
        skipping = false;

        let key = line.split_once(':').map(|(key, _)| key);
        let position = key.and_then(|key| fields.iter().position(|(name, _)| *name == key));
        match position {
            Some(idx) if !written[idx] => {
                let (name, value) = &fields[idx];
                out_yaml.push_str(&format!("{}: {}\n", name, yaml_scalar(value)));
                written[idx] = true;
                skipping = true;
            }
            Some(_) => skipping = true,
            None => out_yaml.push_str(line),
        }
    }

    if !out_yaml.is_empty() && !out_yaml.ends_with('\n') {
        out_yaml.push('\n');
    }
    for ((name, value), done) in fields.iter().zip(&written) {
        if !done {
            out_yaml.push_str(&format!("{}: {}\n", name, yaml_scalar(value)));
        }
    }

    let mut out = String::with_capacity(source.len() + 64);
    out.push_str(&source[..span.yaml.start]);
    out.push_str(&out_yaml);
    out.push_str(&source[span.yaml.end..]);
    out
}
