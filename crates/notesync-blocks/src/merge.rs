//! Re-inserting persist blocks into freshly rendered content.
//!
//! Each block is placed by the first strategy that finds a position:
//!
//! 1. **Template slot**: the new content declares a block with the same name;
//!    the preserved block replaces it in place.
//! 2. **Exact**: the full stored anchor occurs verbatim.
//! 3. **Line suffix**: the longest run of trailing anchor lines that matches
//!    whole lines of the new content, comparing with whitespace collapsed.
//! 4. **Following**: the leading lines of the stored trailing context are
//!    found; the block goes right before them.
//! 5. **Fallback**: appended at the end under [`RELOCATED_MARKER`].
//!
//! When a strategy finds several candidates, the one whose following text
//! best matches the stored trailing context wins, then the one nearest the
//! original offset, then the earliest.

use crate::parser::{self, PersistBlock, END_MARKER, start_marker};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Marker line written above blocks whose anchor could not be found.
pub const RELOCATED_MARKER: &str =
    "<!-- notesync: persist blocks below could not be placed at their original position -->";

/// How a block's position was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    TemplateSlot,
    Exact,
    LineSuffix { lines: usize },
    Following { lines: usize },
    Fallback,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateSlot => write!(f, "template slot"),
            Self::Exact => write!(f, "exact anchor"),
            Self::LineSuffix { lines } => write!(f, "last {} anchor line(s)", lines),
            Self::Following { lines } => write!(f, "first {} following line(s)", lines),
            Self::Fallback => write!(f, "anchor not found, appended at end"),
        }
    }
}

/// Where one block ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    pub strategy: Strategy,
}

impl Placement {
    pub fn is_fallback(&self) -> bool {
        self.strategy == Strategy::Fallback
    }
}

/// Merged content plus one placement per block, in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub content: String,
    pub placements: Vec<Placement>,
}

impl MergeOutcome {
    /// Blocks that could not be anchored.
    pub fn relocated(&self) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(|p| p.is_fallback())
    }
}

/// Builds a complete block with markers around `content`.
///
/// # Example
/// ```
/// use notesync_blocks::format_block;
///
/// assert_eq!(
///     format_block("notes", "mine"),
///     "{% persist \"notes\" %}\nmine\n{% endpersist %}\n"
/// );
/// ```
pub fn format_block(name: &str, content: &str) -> String {
    let mut out = start_marker(name);
    out.push('\n');
    out.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(END_MARKER);
    out.push('\n');
    out
}

/// Merges preserved `blocks` into freshly `rendered` content.
///
/// Pure: the result depends only on the two inputs. Bytes inside each block
/// are never changed, and blocks are never dropped.
pub fn merge_blocks(rendered: &str, blocks: &[PersistBlock]) -> MergeOutcome {
    if blocks.is_empty() {
        return MergeOutcome {
            content: rendered.to_string(),
            placements: Vec::new(),
        };
    }

    let base = Base::from_rendered(rendered, blocks);

    let mut positioned: Vec<(usize, usize)> = Vec::new();
    let mut fallback: Vec<usize> = Vec::new();
    let mut placements = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        let found = match base.slots.get(block.name.as_str()) {
            Some(&pos) => Some((pos, Strategy::TemplateSlot)),
            None => base.locate(block),
        };
        let strategy = match found {
            Some((pos, strategy)) => {
                tracing::debug!(block = %block.name, %strategy, "Placed persist block");
                positioned.push((pos, index));
                strategy
            }
            None => {
                tracing::warn!(
                    block = %block.name,
                    "Persist block anchor not found, appending at end of document"
                );
                fallback.push(index);
                Strategy::Fallback
            }
        };
        placements.push(Placement {
            name: block.name.clone(),
            strategy,
        });
    }

    positioned.sort();

    let text = base.text.as_str();
    let mut content = String::with_capacity(text.len() + blocks.iter().map(|b| b.text.len()).sum::<usize>());
    let mut cursor = 0;
    for (pos, index) in positioned {
        content.push_str(&text[cursor..pos]);
        cursor = pos;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&blocks[index].text);
    }
    if cursor < text.len() {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&text[cursor..]);
    }

    if !fallback.is_empty() {
        if !content.is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
        }
        content.push_str(RELOCATED_MARKER);
        content.push('\n');
        for index in fallback {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&blocks[index].text);
        }
    }

    MergeOutcome {
        content,
        placements,
    }
}

/// The rendered content with template slots for preserved blocks removed.
struct Base<'a> {
    text: String,
    /// Preserved block name -> offset of the removed template slot.
    slots: HashMap<&'a str, usize>,
    /// Blocks the template declared that are not being replaced; nothing may
    /// be inserted inside them.
    protected: Vec<Range<usize>>,
    /// Start offset of every line.
    line_starts: Vec<usize>,
}

impl<'a> Base<'a> {
    fn from_rendered(rendered: &str, blocks: &'a [PersistBlock]) -> Self {
        let preserved: HashSet<&'a str> = blocks.iter().map(|b| b.name.as_str()).collect();
        let mut slots = HashMap::new();
        let mut protected = Vec::new();

        let declared = match parser::parse_blocks(rendered) {
            Ok(extraction) => extraction.blocks,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring persist blocks declared by the template");
                Vec::new()
            }
        };

        let mut text = String::with_capacity(rendered.len());
        let mut declared_iter = declared.iter().filter(|b| b.terminated).peekable();
        let mut skip_until = 0;
        let mut protect_from: Option<(usize, usize)> = None;

        for (idx, line) in rendered.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            if line_no <= skip_until {
                continue;
            }
            if let Some(block) = declared_iter.next_if(|b| b.start_line == line_no) {
                if let Some(&name) = preserved.get(block.name.as_str()) {
                    slots.entry(name).or_insert(text.len());
                    skip_until = block.end_line;
                    continue;
                }
                protect_from = Some((text.len(), block.end_line));
            }
            text.push_str(line);
            if let Some((start, end_line)) = protect_from
                && line_no == end_line
            {
                protected.push(start..text.len());
                protect_from = None;
            }
        }

        let mut line_starts = vec![0];
        line_starts.extend(
            text.match_indices('\n')
                .map(|(i, _)| i + 1)
                .filter(|&i| i < text.len()),
        );

        Self {
            text,
            slots,
            protected,
            line_starts,
        }
    }

    fn locate(&self, block: &PersistBlock) -> Option<(usize, Strategy)> {
        self.exact(block)
            .map(|pos| (pos, Strategy::Exact))
            .or_else(|| self.line_suffix(block))
            .or_else(|| self.following(block))
    }

    fn exact(&self, block: &PersistBlock) -> Option<usize> {
        let before = block.anchor.before.as_str();
        if before.is_empty() {
            // Block opened the document
            return (block.anchor.offset == 0).then_some(0);
        }
        // Overlapping occurrences count too
        let mut candidates = Vec::new();
        let mut from = 0;
        while let Some(i) = self.text[from..].find(before) {
            let at = from + i;
            candidates.push(at + before.len());
            from = at + self.text[at..].chars().next().map_or(1, char::len_utf8);
        }
        self.pick(candidates, block)
    }

    fn line_suffix(&self, block: &PersistBlock) -> Option<(usize, Strategy)> {
        let anchor_lines: Vec<&str> = block.anchor.before.split_inclusive('\n').collect();
        let base_lines = self.lines();
        let total = anchor_lines.len();

        for k in (1..=total).rev() {
            let tail = &anchor_lines[total - k..];
            let partial_first = k == total && block.anchor.truncated;
            if tail.iter().all(|line| is_blank(line)) {
                continue;
            }
            let mut candidates = Vec::new();
            for end in (k - 1)..base_lines.len() {
                let window = &base_lines[end + 1 - k..=end];
                let matches = tail.iter().zip(window).enumerate().all(|(i, (a, b))| {
                    if i == 0 && partial_first {
                        normalize(b).ends_with(&normalize(a))
                    } else {
                        normalize(a) == normalize(b)
                    }
                });
                if matches {
                    candidates.push(self.line_end(end));
                }
            }
            if let Some(pos) = self.pick(candidates, block) {
                return Some((pos, Strategy::LineSuffix { lines: k }));
            }
        }
        None
    }

    fn following(&self, block: &PersistBlock) -> Option<(usize, Strategy)> {
        let after_lines: Vec<&str> = block.anchor.after.split_inclusive('\n').collect();
        let base_lines = self.lines();
        let total = after_lines.len();
        let last_partial = after_lines.last().is_some_and(|l| !l.ends_with('\n'));

        for k in (1..=total).rev() {
            let head = &after_lines[..k];
            if head.iter().all(|line| is_blank(line)) {
                continue;
            }
            let mut candidates = Vec::new();
            for start in 0..base_lines.len().saturating_sub(k - 1) {
                let window = &base_lines[start..start + k];
                let matches = head.iter().zip(window).enumerate().all(|(i, (a, b))| {
                    if i == total - 1 && last_partial {
                        normalize(b).starts_with(&normalize(a))
                    } else {
                        normalize(a) == normalize(b)
                    }
                });
                if matches {
                    candidates.push(self.line_starts[start]);
                }
            }
            if let Some(pos) = self.pick(candidates, block) {
                return Some((pos, Strategy::Following { lines: k }));
            }
        }
        None
    }

    /// Chooses among candidate insertion offsets.
    fn pick(&self, candidates: Vec<usize>, block: &PersistBlock) -> Option<usize> {
        candidates
            .into_iter()
            .filter(|&pos| !self.protected.iter().any(|r| pos > r.start && pos < r.end))
            .map(|pos| {
                let shared = common_prefix_len(&self.text[pos..], &block.anchor.after);
                let distance = pos.abs_diff(block.anchor.offset);
                (pos, shared, distance)
            })
            .min_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)))
            .map(|(pos, _, _)| pos)
    }

    fn lines(&self) -> Vec<&str> {
        self.text.split_inclusive('\n').collect()
    }

    /// Offset just past line `index`, including its newline.
    fn line_end(&self, index: usize) -> usize {
        self.line_starts
            .get(index + 1)
            .copied()
            .unwrap_or(self.text.len())
    }
}

fn normalize(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}
