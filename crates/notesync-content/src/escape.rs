//! Escaping of remote text before it is placed into a document.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s").expect("Invalid heading regex"));

/// How aggressively remote text is neutralized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeMode {
    /// Text is inserted as-is.
    Disabled,
    /// Template and frontmatter syntax is defused, nothing is removed.
    #[default]
    Normal,
    /// Markup and template characters are removed.
    Strict,
    /// Like `Strict`, plus quotes and most punctuation with special meaning.
    #[serde(alias = "veryStrict")]
    VeryStrict,
}

impl std::fmt::Display for EscapeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::Normal => "normal",
            Self::Strict => "strict",
            Self::VeryStrict => "very_strict",
        };
        f.write_str(name)
    }
}

/// Escapes remote body text for inclusion in a document.
///
/// Persist markers are always defused unless escaping is disabled, so remote
/// text can never open a persist block of its own.
pub fn escape_body(text: &str, mode: EscapeMode, escape_hash_tags: bool) -> String {
    let escaped = match mode {
        EscapeMode::Disabled => return text.to_string(),
        EscapeMode::Normal => text
            .replace("<%", "'<<'")
            .replace("%>", "'>>'")
            .replace('`', "\"")
            .replace("---", "- - -")
            .replace("{{", "((")
            .replace("}}", "))")
            .replace("{%", "(%")
            .replace("%}", "%)"),
        EscapeMode::Strict => remove_chars(text, &['<', '>', '{', '}', '$', '`', '\\']),
        EscapeMode::VeryStrict => remove_chars(
            text,
            &['<', '>', '{', '}', '$', '`', '\\', '"', '\'', '|', '&', '*', '~', '^'],
        ),
    };

    if escape_hash_tags {
        escape_hashes(&escaped)
    } else {
        escaped
    }
}

fn remove_chars(text: &str, chars: &[char]) -> String {
    text.chars()
        .filter(|c| !chars.contains(c))
        .collect::<String>()
        .replace("---", "- - -")
}

/// Escapes `#` on every line that is not a Markdown heading, so issue
/// references like `#12` do not turn into tags.
fn escape_hashes(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if HEADING_REGEX.is_match(line.trim()) {
                line.to_string()
            } else {
                line.replace('#', "\\#")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escapes a string for a double-quoted YAML scalar.
pub fn escape_yaml_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
