//! Persist block extraction.
//!
//! Parses named, user-owned regions of a document:
//! ```text
//! {% persist "notes" %}
//! anything the user wrote
//! {% endpersist %}
//! ```
//!
//! Markers are line-oriented and do not nest. A start marker inside an open
//! block is ordinary block content; the first end marker closes the block.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Default number of characters captured before a block as its anchor.
pub const DEFAULT_ANCHOR_LEN: usize = 120;

/// Default number of characters captured after a block as trailing context.
pub const DEFAULT_TRAILING_LEN: usize = 60;

/// Canonical end marker, also used to close unterminated blocks.
pub const END_MARKER: &str = "{% endpersist %}";

static OPEN_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\{%\s*persist\s+"([^"]+)"\s*%\}\s*$"#).expect("Invalid open marker regex")
});

static CLOSE_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{%\s*endpersist\s*%\}\s*$").expect("Invalid close marker regex")
});

/// Builds the start marker line (without newline) for a block name.
pub fn start_marker(name: &str) -> String {
    format!("{{% persist \"{}\" %}}", name)
}

/// The text surrounding a block's original position.
///
/// Both windows are taken from the document with every persist block
/// removed, so they only ever contain text a fresh render can reproduce.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Anchor {
    /// Text immediately preceding the start marker.
    pub before: String,
    /// Text immediately following the end marker.
    pub after: String,
    /// Whether `before` starts mid-line because of the length cap.
    pub truncated: bool,
    /// Byte offset of the block within the block-free document.
    pub offset: usize,
}

/// A persist block extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistBlock {
    /// Unique block name within its document.
    pub name: String,
    /// Verbatim block text, markers included. Ends with a newline unless the
    /// block was the last thing in the document.
    pub text: String,
    /// Text between the markers.
    pub content: String,
    /// Where the block sat.
    pub anchor: Anchor,
    /// 1-based line of the start marker.
    pub start_line: usize,
    /// 1-based line of the end marker (last line of the document when the
    /// block was unterminated).
    pub end_line: usize,
    /// Whether the source document closed the block itself.
    pub terminated: bool,
}

/// A recoverable problem found while extracting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractIssue {
    /// A block ran to the end of the document; it was closed with a
    /// synthesized end marker.
    Unterminated { name: String, start_line: usize },
    /// An end marker with no open block; kept as ordinary text.
    StrayEndMarker { line: usize },
}

impl std::fmt::Display for ExtractIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unterminated { name, start_line } => write!(
                f,
                "persist block \"{}\" opened at line {} has no end marker; closed at end of document",
                name, start_line
            ),
            Self::StrayEndMarker { line } => {
                write!(f, "end marker at line {} has no matching persist block", line)
            }
        }
    }
}

/// Tuning for [`extract_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Characters of preceding text kept as the anchor.
    pub anchor_len: usize,
    /// Characters of following text kept as trailing context.
    pub trailing_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            anchor_len: DEFAULT_ANCHOR_LEN,
            trailing_len: DEFAULT_TRAILING_LEN,
        }
    }
}

impl ExtractOptions {
    pub fn with_anchor_len(anchor_len: usize) -> Self {
        Self {
            anchor_len,
            ..Self::default()
        }
    }
}

/// Result of extracting persist blocks from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Blocks in order of appearance.
    pub blocks: Vec<PersistBlock>,
    /// The document with every block removed.
    pub stripped: String,
    /// Recoverable problems, in document order.
    pub issues: Vec<ExtractIssue>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, name: &str) -> Option<&PersistBlock> {
        self.blocks.iter().find(|block| block.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|block| block.name.as_str())
    }
}

struct OpenBlock {
    name: String,
    start_line: usize,
    text: String,
    open_len: usize,
    offset: usize,
}

/// Extracts every persist block from `source`.
///
/// Extraction is read-only. Duplicate block names are rejected so that no
/// user content is silently dropped.
///
/// # Example
/// ```
/// use notesync_blocks::parser::{ExtractOptions, extract_blocks};
///
/// let source = "# Title\n{% persist \"notes\" %}\nmine\n{% endpersist %}\nrest\n";
/// let extraction = extract_blocks(source, &ExtractOptions::default()).unwrap();
///
/// assert_eq!(extraction.len(), 1);
/// assert_eq!(extraction.blocks[0].content, "mine\n");
/// assert_eq!(extraction.blocks[0].anchor.before, "# Title\n");
/// assert_eq!(extraction.stripped, "# Title\nrest\n");
/// ```
pub fn extract_blocks(source: &str, options: &ExtractOptions) -> Result<Extraction> {
    let mut stripped = String::with_capacity(source.len());
    let mut blocks: Vec<PersistBlock> = Vec::new();
    let mut issues = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, line) in source.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;

        if let Some(mut current) = open.take() {
            current.text.push_str(line);
            if CLOSE_MARKER_REGEX.is_match(line) {
                let content_end = current.text.len() - line.len();
                blocks.push(PersistBlock {
                    content: current.text[current.open_len..content_end].to_string(),
                    name: current.name,
                    text: current.text,
                    anchor: Anchor {
                        offset: current.offset,
                        ..Anchor::default()
                    },
                    start_line: current.start_line,
                    end_line: line_no,
                    terminated: true,
                });
            } else {
                open = Some(current);
            }
            continue;
        }

        if let Some(caps) = OPEN_MARKER_REGEX.captures(line) {
            let name = caps[1].to_string();
            if let Some(&first_line) = first_seen.get(&name) {
                return Err(Error::DuplicateBlock {
                    name,
                    first_line,
                    line: line_no,
                });
            }
            first_seen.insert(name.clone(), line_no);
            open = Some(OpenBlock {
                name,
                start_line: line_no,
                text: line.to_string(),
                open_len: line.len(),
                offset: stripped.len(),
            });
            continue;
        }

        if CLOSE_MARKER_REGEX.is_match(line) {
            tracing::warn!(line = line_no, "End marker without an open persist block");
            issues.push(ExtractIssue::StrayEndMarker { line: line_no });
        }
        stripped.push_str(line);
    }

    if let Some(mut current) = open {
        tracing::warn!(
            block = %current.name,
            line = current.start_line,
            "Persist block has no end marker, closing it at end of document"
        );
        issues.push(ExtractIssue::Unterminated {
            name: current.name.clone(),
            start_line: current.start_line,
        });
        let content = current.text[current.open_len..].to_string();
        if !current.text.ends_with('\n') {
            current.text.push('\n');
        }
        current.text.push_str(END_MARKER);
        blocks.push(PersistBlock {
            name: current.name,
            text: current.text,
            content,
            anchor: Anchor {
                offset: current.offset,
                ..Anchor::default()
            },
            start_line: current.start_line,
            end_line: source.split_inclusive('\n').count(),
            terminated: false,
        });
    }

    for block in &mut blocks {
        let preceding = &stripped[..block.anchor.offset];
        let before = tail_chars(preceding, options.anchor_len);
        let before_start = preceding.len() - before.len();
        block.anchor.before = before.to_string();
        block.anchor.truncated = before_start > 0 && !preceding[..before_start].ends_with('\n');
        block.anchor.after = head_chars(&stripped[block.anchor.offset..], options.trailing_len).to_string();
    }

    Ok(Extraction {
        blocks,
        stripped,
        issues,
    })
}

/// Extracts blocks with [`ExtractOptions::default`].
pub fn parse_blocks(source: &str) -> Result<Extraction> {
    extract_blocks(source, &ExtractOptions::default())
}

/// Checks whether `source` contains at least one persist start marker.
pub fn has_blocks(source: &str) -> bool {
    source
        .split_inclusive('\n')
        .any(|line| OPEN_MARKER_REGEX.is_match(line))
}

/// The last `n` characters of `s`, on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// The first `n` characters of `s`, on a char boundary.
fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
