//! Remote item model
//!
//! Items arrive from an external data source already fetched and filtered.
//! Each kind is its own variant; the fields every kind shares live in
//! [`ItemCommon`] so the context builder has one projection to work from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a remote item: an issue number or an opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Lifecycle state of a remote item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Open,
    Closed,
    Merged,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }

    /// Merged pull requests count as closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::Merged)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a remote item. Each kind has its own sync policy and folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    PullRequest,
    ProjectItem,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [Self::Issue, Self::PullRequest, Self::ProjectItem];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull_request",
            Self::ProjectItem => "project_item",
        }
    }

    /// Folder name used by the default folder layout.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Self::Issue => "Issues",
            Self::PullRequest => "Pull Requests",
            Self::ProjectItem => "Project Items",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment on an item. Review comments carry a file location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

impl Comment {
    pub fn is_review_comment(&self) -> bool {
        self.path.is_some() || self.line.is_some()
    }
}

/// Fields shared by every item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCommon {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Total comment count reported by the remote, which may exceed the
    /// number of comments fetched.
    #[serde(default)]
    pub comments_count: Option<u64>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub lock_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(flatten)]
    pub common: ItemCommon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(flatten)]
    pub common: ItemCommon,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub requested_reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectItem {
    #[serde(flatten)]
    pub common: ItemCommon,
    pub project: String,
    #[serde(default)]
    pub project_number: Option<u64>,
    #[serde(default)]
    pub project_status: Option<String>,
    /// Custom project fields by display name.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// An item fetched from the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteItem {
    Issue(Issue),
    PullRequest(PullRequest),
    ProjectItem(ProjectItem),
}

impl RemoteItem {
    pub fn common(&self) -> &ItemCommon {
        match self {
            Self::Issue(item) => &item.common,
            Self::PullRequest(item) => &item.common,
            Self::ProjectItem(item) => &item.common,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Issue(_) => ItemKind::Issue,
            Self::PullRequest(_) => ItemKind::PullRequest,
            Self::ProjectItem(_) => ItemKind::ProjectItem,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.common().id
    }

    /// Status string compared against a document's stored status.
    pub fn status(&self) -> &'static str {
        self.common().state.as_str()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.common().updated_at
    }

    /// When the item stopped being open. A merged pull request without an
    /// explicit close time uses its merge time.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        let common = self.common();
        match self {
            Self::PullRequest(pr) => common.closed_at.or(pr.merged_at),
            _ => common.closed_at,
        }
    }
}

/// Items for one configured collection, as supplied by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFeed {
    pub collection: String,
    #[serde(default)]
    pub items: Vec<RemoteItem>,
}

impl CollectionFeed {
    /// Parses a JSON array of collection feeds.
    pub fn parse_all(json: &str) -> crate::Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_items() {
        let json = r#"[
            {"kind": "issue", "id": 7, "title": "Bug", "state": "open",
             "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z"},
            {"kind": "pull_request", "id": 8, "title": "Fix", "state": "merged",
             "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-03T00:00:00Z",
             "merged_at": "2024-01-03T00:00:00Z", "requested_reviewers": ["bob"]},
            {"kind": "project_item", "id": "PVTI_1", "title": "Card", "project": "Roadmap",
             "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z",
             "fields": {"Priority": "High"}}
        ]"#;
        let items: Vec<RemoteItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items[0].kind(), ItemKind::Issue);
        assert_eq!(items[0].id(), &ItemId::Number(7));
        assert_eq!(items[1].status(), "merged");
        assert_eq!(
            items[1].closed_at(),
            Some("2024-01-03T00:00:00Z".parse().unwrap())
        );
        match &items[2] {
            RemoteItem::ProjectItem(card) => {
                assert_eq!(card.common.id.to_string(), "PVTI_1");
                assert_eq!(card.fields.get("Priority").map(String::as_str), Some("High"));
                assert_eq!(card.common.state, ItemState::Open);
            }
            other => panic!("expected project item, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_merged_counts_as_closed() {
        assert!(ItemState::Merged.is_closed());
        assert!(ItemState::Closed.is_closed());
        assert!(!ItemState::Open.is_closed());
    }
}
