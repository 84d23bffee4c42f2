//! Template context construction
//!
//! Projects a [`RemoteItem`] into the flat variable map templates render
//! against. Collections are pre-joined into several scalar shapes here, so
//! the template engine only ever substitutes strings.

use crate::config::{CollectionConfig, Settings};
use crate::item::{Comment, RemoteItem};
use chrono::{DateTime, Utc};
use notesync_content::{
    TemplateContext, escape_body, escape_yaml_string, format_display, format_timestamp,
};

const NO_DESCRIPTION: &str = "No description found";

/// Builds [`TemplateContext`]s for the items of one collection.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder<'a> {
    settings: &'a Settings,
    collection: &'a CollectionConfig,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(settings: &'a Settings, collection: &'a CollectionConfig) -> Self {
        Self {
            settings,
            collection,
        }
    }

    fn escape(&self, text: &str) -> String {
        escape_body(text, self.settings.escape_mode, self.settings.escape_hash_tags)
    }

    fn date(&self, dt: &DateTime<Utc>) -> String {
        format_display(dt, &self.settings.date_format)
    }

    /// Every variable for `item`.
    pub fn build(&self, item: &RemoteItem) -> TemplateContext {
        let common = item.common();
        let policy = self.collection.policy(item.kind());
        let mut ctx = TemplateContext::new();

        // Identity
        ctx.insert("number", common.id.to_string());
        ctx.insert("type", item.kind().as_str());
        ctx.insert("status", item.status());
        ctx.insert("state", item.status());
        ctx.insert("url", common.url.clone().unwrap_or_default());
        ctx.insert("repository", self.collection.name.as_str());
        let (owner, repo_name) = self
            .collection
            .owner_and_repo()
            .unwrap_or(("", self.collection.name.as_str()));
        ctx.insert("owner", owner);
        ctx.insert("repoName", repo_name);

        // Text
        ctx.insert("title", escape_body(&common.title, self.settings.escape_mode, false));
        ctx.insert("title_yaml", escape_yaml_string(&common.title));
        let body = common.body.as_deref().filter(|b| !b.trim().is_empty());
        let escaped_body = body.map(|b| self.escape(b)).unwrap_or_default();
        ctx.insert(
            "description",
            if escaped_body.is_empty() {
                NO_DESCRIPTION.to_string()
            } else {
                escaped_body.clone()
            },
        );
        ctx.insert("body", escaped_body);
        ctx.insert("author", common.author.clone().unwrap_or_default());
        ctx.insert("milestone", common.milestone.clone().unwrap_or_default());

        // People and labels
        insert_list(&mut ctx, "assignees", &common.assignees);
        ctx.insert("assignee", common.assignees.first().cloned().unwrap_or_default());
        insert_list(&mut ctx, "labels", &common.labels);
        ctx.insert("labels_hash", hash_tags(&common.labels));

        // Dates
        ctx.insert("created", self.date(&common.created_at));
        ctx.insert("created_iso", format_timestamp(&common.created_at));
        ctx.insert("updated", self.date(&common.updated_at));
        ctx.insert("updated_iso", format_timestamp(&common.updated_at));
        let closed = item.closed_at();
        ctx.insert("closed", closed.map(|dt| self.date(&dt)).unwrap_or_default());
        ctx.insert(
            "closed_iso",
            closed.map(|dt| format_timestamp(&dt)).unwrap_or_default(),
        );

        // Conversation
        let comments_count = common
            .comments_count
            .unwrap_or(common.comments.len() as u64);
        ctx.insert("commentsCount", comments_count.to_string());
        ctx.insert("isLocked", common.locked.to_string());
        ctx.insert("lockReason", common.lock_reason.clone().unwrap_or_default());
        let comments = if policy.include_comments {
            self.comments_section(&common.comments)
        } else {
            String::new()
        };
        ctx.insert("comments", comments);

        // Policy
        ctx.insert("update_mode", policy.update_mode.as_str());
        ctx.insert("allow_delete", policy.allow_delete.to_string());

        match item {
            RemoteItem::Issue(_) => {}
            RemoteItem::PullRequest(pr) => {
                ctx.insert(
                    "mergedAt",
                    pr.merged_at.map(|dt| self.date(&dt)).unwrap_or_default(),
                );
                ctx.insert("merged", pr.merged_at.is_some().to_string());
                ctx.insert(
                    "mergeable",
                    pr.mergeable.map(|m| m.to_string()).unwrap_or_default(),
                );
                ctx.insert("baseBranch", pr.base_branch.clone().unwrap_or_default());
                ctx.insert("headBranch", pr.head_branch.clone().unwrap_or_default());
                ctx.insert("reviewers", pr.requested_reviewers.join(", "));
                ctx.insert("reviewers_yaml", yaml_list(&pr.requested_reviewers));
            }
            RemoteItem::ProjectItem(card) => {
                ctx.insert("project", card.project.as_str());
                ctx.insert(
                    "project_number",
                    card.project_number.map(|n| n.to_string()).unwrap_or_default(),
                );
                ctx.insert(
                    "project_status",
                    card.project_status.clone().unwrap_or_default(),
                );
                for (field, value) in &card.fields {
                    ctx.insert(format!("field_{}", slug(field)), self.escape(value));
                }
            }
        }

        ctx
    }

    /// The `## Comments` section, oldest comment first. Empty without
    /// comments.
    pub fn comments_section(&self, comments: &[Comment]) -> String {
        if comments.is_empty() {
            return String::new();
        }

        let mut sorted: Vec<&Comment> = comments.iter().collect();
        sorted.sort_by_key(|comment| comment.created_at);

        let mut section = String::from("\n## Comments\n\n");
        for comment in sorted {
            let author = comment.author.as_deref().unwrap_or("Unknown User");
            let created = self.date(&comment.created_at);
            if comment.is_review_comment() {
                let line = comment
                    .line
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                let path = comment.path.as_deref().unwrap_or("unknown");
                section.push_str(&format!(
                    "### {} commented on line {} of file `{}` ({}):\n\n",
                    author, line, path, created
                ));
            } else {
                section.push_str(&format!("### {} commented ({}):\n\n", author, created));
            }
            let body = comment
                .body
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or("No content");
            section.push_str(&self.escape(body));
            section.push_str("\n\n---\n\n");
        }
        section
    }
}

/// Inserts `<name>` (comma list), `<name>_list` (bullets) and `<name>_yaml`
/// (flow sequence).
fn insert_list(ctx: &mut TemplateContext, name: &str, values: &[String]) {
    ctx.insert(name, values.join(", "));
    ctx.insert(
        format!("{}_list", name),
        values
            .iter()
            .map(|v| format!("- {}", v))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    ctx.insert(format!("{}_yaml", name), yaml_list(values));
}

fn yaml_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", escape_yaml_string(v)))
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn hash_tags(labels: &[String]) -> String {
    labels
        .iter()
        .map(|label| format!("#{}", label.split_whitespace().collect::<Vec<_>>().join("-")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Story Points` becomes `story_points`.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
