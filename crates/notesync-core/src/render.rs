//! Document rendering
//!
//! Resolves the filename and body templates of a policy (custom or built-in)
//! and renders them against an item's context.

use crate::config::SyncPolicy;
use crate::item::ItemKind;
use notesync_content::{Template, TemplateContext, TemplateIssue};
use notesync_fs::sanitize_file_name;

/// Extension of every synchronized document.
pub const DOCUMENT_EXTENSION: &str = "md";

const ISSUE_TEMPLATE: &str = r#"---
title: "{title_yaml}"
number: {number}
status: "{status}"
created: "{created}"
updated: "{updated_iso}"
url: "{url}"
opened_by: "{author}"
assignees: {assignees_yaml}
labels: {labels_yaml}
updateMode: "{update_mode}"
allowDelete: {allow_delete}
---

# {title}
{description}
{comments}
"#;

const PULL_REQUEST_TEMPLATE: &str = r#"---
title: "{title_yaml}"
number: {number}
status: "{status}"
created: "{created}"
updated: "{updated_iso}"
url: "{url}"
opened_by: "{author}"
assignees: {assignees_yaml}
requested_reviewers: {reviewers_yaml}
labels: {labels_yaml}
updateMode: "{update_mode}"
allowDelete: {allow_delete}
---

# {title}
{baseBranch:`{headBranch}` into `{baseBranch}`
}{description}
{comments}
"#;

const PROJECT_ITEM_TEMPLATE: &str = r#"---
title: "{title_yaml}"
number: "{number}"
status: "{status}"
project: "{project}"
project_status: "{project_status}"
created: "{created}"
updated: "{updated_iso}"
url: "{url}"
assignees: {assignees_yaml}
labels: {labels_yaml}
updateMode: "{update_mode}"
allowDelete: {allow_delete}
---

# {title}
{project_status:Status: {project_status}
}{description}
{comments}
"#;

/// Fragment added to the end of a document in append mode.
const APPEND_TEMPLATE: &str = r#"---
### New status: "{status}"

# {title}
{description}
{comments}"#;

impl ItemKind {
    pub fn default_filename_template(&self) -> &'static str {
        match self {
            Self::Issue => "Issue - {number}",
            Self::PullRequest => "PR - {number}",
            Self::ProjectItem => "Item - {number}",
        }
    }

    pub fn default_body_template(&self) -> &'static str {
        match self {
            Self::Issue => ISSUE_TEMPLATE,
            Self::PullRequest => PULL_REQUEST_TEMPLATE,
            Self::ProjectItem => PROJECT_ITEM_TEMPLATE,
        }
    }
}

/// A fully rendered document: where it goes and what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Sanitized file name including the extension.
    pub filename: String,
    pub body: String,
}

/// The parsed templates for one item kind under one policy.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    filename: Template,
    body: Template,
    append: Template,
}

impl DocumentRenderer {
    pub fn new(kind: ItemKind, policy: &SyncPolicy) -> Self {
        let filename = policy
            .filename_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(kind.default_filename_template());
        let body = policy
            .body_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(kind.default_body_template());

        Self {
            filename: Template::parse(filename),
            body: Template::parse(body),
            append: Template::parse(APPEND_TEMPLATE),
        }
    }

    pub fn filename_template(&self) -> &Template {
        &self.filename
    }

    /// Problems in the filename and body templates.
    pub fn issues(&self) -> impl Iterator<Item = &TemplateIssue> {
        self.filename.issues().iter().chain(self.body.issues())
    }

    /// The sanitized file name (with extension) for `context`.
    pub fn render_filename(&self, context: &TemplateContext) -> String {
        let stem = sanitize_file_name(&self.filename.render(context));
        format!("{}.{}", stem, DOCUMENT_EXTENSION)
    }

    pub fn render(&self, context: &TemplateContext) -> RenderedDocument {
        RenderedDocument {
            filename: self.render_filename(context),
            body: self.body.render(context),
        }
    }

    /// The append-mode fragment for `context`.
    pub fn render_append(&self, context: &TemplateContext) -> String {
        self.append.render(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates_parse_cleanly() {
        for kind in ItemKind::ALL {
            let renderer = DocumentRenderer::new(kind, &SyncPolicy::default());
            assert_eq!(renderer.issues().count(), 0, "{kind} templates have issues");
        }
        assert!(Template::parse(APPEND_TEMPLATE).issues().is_empty());
    }

    #[test]
    fn test_filename_is_sanitized() {
        let policy = SyncPolicy {
            filename_template: Some("{number}: {title}".to_string()),
            ..SyncPolicy::default()
        };
        let renderer = DocumentRenderer::new(ItemKind::Issue, &policy);
        let context = TemplateContext::new()
            .with("number", "5")
            .with("title", "a/b?");
        assert_eq!(renderer.render_filename(&context), "5 ab.md");
    }

    #[test]
    fn test_blank_custom_template_uses_default() {
        let policy = SyncPolicy {
            filename_template: Some("  ".to_string()),
            ..SyncPolicy::default()
        };
        let renderer = DocumentRenderer::new(ItemKind::PullRequest, &policy);
        assert_eq!(renderer.filename_template().source(), "PR - {number}");
    }
}
