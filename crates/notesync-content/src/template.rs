//! Template parsing and rendering.
//!
//! Two constructs are recognized:
//!
//! - `{name}` is replaced by the context value for `name`, or nothing.
//! - `{name:literal}` emits `literal` only when `name` is truthy. The literal
//!   may contain `{other}` variables but no further conditionals.
//!
//! Anything else between braces is literal text. Rendering never fails: a
//! conditional without a closing brace is kept as literal text and recorded
//! as a [`TemplateIssue`].

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Values that count as false for conditionals, compared case-insensitively
/// after trimming.
const FALSY: &[&str] = &["", "false", "0", "null"];

/// A flat mapping from variable name to rendered value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether a conditional on `name` should render.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| {
            let value = value.trim();
            !FALSY.iter().any(|falsy| value.eq_ignore_ascii_case(falsy))
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (name, value) in iter {
            context.insert(name, value);
        }
        context
    }
}

/// A recoverable problem found while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateIssue {
    /// `{name:` with no closing brace. Everything from the opening brace to
    /// the end of the template renders literally.
    UnclosedConditional { name: String, offset: usize },
    /// A conditional inside a conditional body; the inner one renders
    /// literally.
    NestedConditional { name: String, offset: usize },
}

impl fmt::Display for TemplateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnclosedConditional { name, offset } => write!(
                f,
                "conditional \"{}\" at byte {} is never closed and renders as literal text",
                name, offset
            ),
            Self::NestedConditional { name, offset } => write!(
                f,
                "conditional \"{}\" at byte {} is nested in another conditional and renders as literal text",
                name, offset
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    Conditional { name: String, body: Vec<Segment> },
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    issues: Vec<TemplateIssue>,
}

impl Template {
    /// Parses `source`. Never fails; see [`Template::issues`].
    pub fn parse(source: &str) -> Self {
        let mut issues = Vec::new();
        let segments = parse_segments(source, 0, true, &mut issues);
        for issue in &issues {
            tracing::warn!(%issue, "Malformed template");
        }
        Self {
            source: source.to_string(),
            segments,
            issues,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn issues(&self) -> &[TemplateIssue] {
        &self.issues
    }

    /// Names of every variable and conditional the template references.
    pub fn variables(&self) -> Vec<&str> {
        fn collect<'a>(segments: &'a [Segment], out: &mut Vec<&'a str>) {
            for segment in segments {
                match segment {
                    Segment::Literal(_) => {}
                    Segment::Variable(name) => out.push(name),
                    Segment::Conditional { name, body } => {
                        out.push(name);
                        collect(body, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.segments, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Renders the template against `context`.
    ///
    /// # Example
    /// ```
    /// use notesync_content::{Template, TemplateContext};
    ///
    /// let template = Template::parse("{closed:Closed on {closed}}");
    /// let open = TemplateContext::new().with("closed", "");
    /// let closed = TemplateContext::new().with("closed", "2024-01-15");
    ///
    /// assert_eq!(template.render(&open), "");
    /// assert_eq!(template.render(&closed), "Closed on 2024-01-15");
    /// ```
    pub fn render(&self, context: &TemplateContext) -> String {
        let mut out = String::with_capacity(self.source.len());
        render_segments(&self.segments, context, &mut out);
        out
    }

    /// Recovers the value of `variable` from text this template rendered.
    ///
    /// Other variables match any text, conditionals are optional. Returns
    /// `None` when the text does not fit the template or the template never
    /// references `variable` outside a conditional.
    pub fn extract_variable(&self, rendered: &str, variable: &str) -> Option<String> {
        let mut pattern = String::from("^");
        let mut captured = false;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Variable(name) if name == variable && !captured => {
                    pattern.push_str("(?P<value>.+?)");
                    captured = true;
                }
                Segment::Variable(_) => pattern.push_str(".*?"),
                Segment::Conditional { body, .. } => {
                    pattern.push_str("(?:");
                    for inner in body {
                        match inner {
                            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                            _ => pattern.push_str(".*?"),
                        }
                    }
                    pattern.push_str(")?");
                }
            }
        }
        if !captured {
            return None;
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).ok()?;
        regex
            .captures(rendered)
            .and_then(|caps| caps.name("value"))
            .map(|m| m.as_str().to_string())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses and renders in one step.
pub fn render_str(template: &str, context: &TemplateContext) -> String {
    Template::parse(template).render(context)
}

fn render_segments(segments: &[Segment], context: &TemplateContext, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Variable(name) => out.push_str(context.get(name).unwrap_or_default()),
            Segment::Conditional { name, body } => {
                if context.is_truthy(name) {
                    render_segments(body, context, out);
                }
            }
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Length in bytes of the variable name starting at `s`, if any.
fn name_len(s: &str) -> usize {
    s.find(|c: char| !is_name_char(c)).unwrap_or(s.len())
}

/// Byte index of the brace closing a conditional body that starts at `s`.
fn closing_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}

/// Parses `source`, whose first byte sits at `base` in the full template.
/// Conditionals are only recognized when `allow_conditionals` is set.
fn parse_segments(
    source: &str,
    base: usize,
    allow_conditionals: bool,
    issues: &mut Vec<TemplateIssue>,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut pos = 0usize;

    while let Some(open) = rest.find('{') {
        push_literal(&mut segments, &rest[..open]);
        let after_open = &rest[open + 1..];
        let len = name_len(after_open);
        let name = &after_open[..len];
        let tail = &after_open[len..];

        if !name.is_empty() && tail.starts_with('}') {
            segments.push(Segment::Variable(name.to_string()));
            let consumed = open + 1 + len + 1;
            rest = &rest[consumed..];
            pos += consumed;
            continue;
        }

        if !name.is_empty() && tail.starts_with(':') {
            let offset = base + pos + open;
            let body_start = open + 1 + len + 1;
            match closing_brace(&rest[body_start..]) {
                Some(close) if allow_conditionals => {
                    let body_src = &rest[body_start..body_start + close];
                    let body = parse_segments(body_src, base + pos + body_start, false, issues);
                    segments.push(Segment::Conditional {
                        name: name.to_string(),
                        body,
                    });
                    let consumed = body_start + close + 1;
                    rest = &rest[consumed..];
                    pos += consumed;
                    continue;
                }
                Some(_) => {
                    issues.push(TemplateIssue::NestedConditional {
                        name: name.to_string(),
                        offset,
                    });
                }
                None => {
                    issues.push(TemplateIssue::UnclosedConditional {
                        name: name.to_string(),
                        offset,
                    });
                    push_literal(&mut segments, &rest[open..]);
                    return segments;
                }
            }
        }

        push_literal(&mut segments, "{");
        rest = &rest[open + 1..];
        pos += open + 1;
    }

    push_literal(&mut segments, rest);
    segments
}
