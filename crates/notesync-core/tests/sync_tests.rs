//! End-to-end tests for the sync engine against an in-memory store

use async_trait::async_trait;
use notesync_content::Frontmatter;
use notesync_core::{
    CollectionConfig, RemoteItem, Settings, SyncAction, SyncEngine, SyncOptions, SyncReport,
    UpdateMode,
};
use notesync_fs::{DocumentStore, MemoryStore, NormalizedPath};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const ISSUE_PATH: &str = "GitHub/octo/tracker/Issues/Issue - 42.md";

fn issue(overrides: Value) -> RemoteItem {
    let mut base = json!({
        "kind": "issue",
        "id": 42,
        "title": "Fix the parser",
        "body": "It breaks.",
        "state": "open",
        "created_at": "2024-01-10T08:00:00Z",
        "updated_at": "2024-01-15T10:00:00Z",
        "author": "octocat",
        "url": "https://github.com/octo/tracker/issues/42",
        "labels": ["bug"],
        "assignees": ["alice"]
    });
    if let (Some(base), Some(overrides)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).expect("test item should deserialize")
}

fn settings(mode: UpdateMode) -> (Settings, CollectionConfig) {
    let mut collection = CollectionConfig::new("octo/tracker");
    collection.issues.update_mode = mode;
    let settings = Settings {
        collections: vec![collection.clone()],
        ..Settings::default()
    };
    (settings, collection)
}

async fn run<S: DocumentStore + ?Sized>(
    store: &S,
    mode: UpdateMode,
    items: &[RemoteItem],
    dry_run: bool,
) -> SyncReport {
    let (settings, collection) = settings(mode);
    SyncEngine::new(store, &settings, SyncOptions { dry_run })
        .sync_collection(&collection, items)
        .await
}

fn expected_document(mode: &str, updated: &str, body: &str) -> String {
    format!(
        r#"---
title: "Fix the parser"
number: 42
status: "open"
created: "2024-01-10T08:00:00Z"
updated: "{updated}"
url: "https://github.com/octo/tracker/issues/42"
opened_by: "octocat"
assignees: ["alice"]
labels: ["bug"]
updateMode: "{mode}"
allowDelete: false
---

{body}
"#
    )
}

mod create_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_creates_document_in_kind_folder() {
        let store = MemoryStore::new();

        let report = run(&store, UpdateMode::None, &[issue(json!({}))], false).await;

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].action, SyncAction::Created);
        assert_eq!(report.items[0].path, ISSUE_PATH);
        assert_eq!(report.items[0].id.as_deref(), Some("42"));
        assert_eq!(
            store.get(ISSUE_PATH).expect("document should exist"),
            expected_document("none", "2024-01-15T10:00:00Z", "# Fix the parser\nIt breaks.\n")
        );
        assert!(store.has_folder("GitHub/octo/tracker/Issues"));
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let store = MemoryStore::new();
        let items = [issue(json!({}))];

        run(&store, UpdateMode::Update, &items, false).await;
        let first = store.get(ISSUE_PATH);
        let report = run(&store, UpdateMode::Update, &items, false).await;

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get(ISSUE_PATH), first);
        assert_eq!(
            report.items[0].action,
            SyncAction::Skipped {
                reason: "up to date".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_body_renders_placeholder() {
        let store = MemoryStore::new();

        run(&store, UpdateMode::None, &[issue(json!({ "body": null }))], false).await;

        let content = store.get(ISSUE_PATH).expect("document should exist");
        assert!(content.contains("# Fix the parser\nNo description found\n"));
    }

    #[tokio::test]
    async fn test_custom_template_without_frontmatter_is_stamped() {
        let store = MemoryStore::new();
        let mut collection = CollectionConfig::new("octo/tracker");
        collection.issues.body_template = Some("# {title}\n".to_string());
        collection.issues.filename_template = Some("{number} {title}".to_string());
        let settings = Settings::default();

        let report = SyncEngine::new(&store, &settings, SyncOptions::default())
            .sync_collection(&collection, &[issue(json!({}))])
            .await;

        let path = "GitHub/octo/tracker/Issues/42 Fix the parser.md";
        assert_eq!(report.items[0].path, path);
        let content = store.get(path).expect("document should exist");
        let doc = Frontmatter::read(&content);
        assert_eq!(doc.number.as_deref(), Some("42"));
        assert_eq!(doc.status.as_deref(), Some("open"));
        assert!(doc.updated.is_some());
        assert!(content.ends_with("---\n# Fix the parser\n"));
    }

    #[tokio::test]
    async fn test_each_kind_gets_its_own_folder() {
        let store = MemoryStore::new();
        let pr: RemoteItem = serde_json::from_value(json!({
            "kind": "pull_request",
            "id": 7,
            "title": "Add lexer",
            "state": "open",
            "created_at": "2024-01-10T08:00:00Z",
            "updated_at": "2024-01-11T08:00:00Z",
            "base_branch": "main",
            "head_branch": "lexer"
        }))
        .expect("pull request should deserialize");

        run(&store, UpdateMode::None, &[issue(json!({})), pr], false).await;

        let pr_doc = store
            .get("GitHub/octo/tracker/Pull Requests/PR - 7.md")
            .expect("pull request document should exist");
        assert!(pr_doc.contains("`lexer` into `main`"));
        assert!(store.get(ISSUE_PATH).is_some());
    }
}

mod update_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_status_change_updates_even_in_none_mode() {
        let store = MemoryStore::new();
        run(&store, UpdateMode::None, &[issue(json!({}))], false).await;

        let closed = issue(json!({
            "state": "closed",
            "closed_at": "2024-01-16T00:00:00Z",
            "updated_at": "2024-01-16T00:00:00Z"
        }));
        let report = run(&store, UpdateMode::None, &[closed], false).await;

        assert_eq!(
            report.items[0].action,
            SyncAction::Updated {
                reason: "status changed".to_string()
            }
        );
        let doc = Frontmatter::read(&store.get(ISSUE_PATH).expect("document should exist"));
        assert_eq!(doc.status.as_deref(), Some("closed"));
    }

    #[tokio::test]
    async fn test_stale_content_is_skipped_in_none_mode() {
        let store = MemoryStore::new();
        run(&store, UpdateMode::None, &[issue(json!({}))], false).await;
        let before = store.get(ISSUE_PATH);

        let edited = issue(json!({ "body": "Edited.", "updated_at": "2024-01-20T00:00:00Z" }));
        let report = run(&store, UpdateMode::None, &[edited], false).await;

        assert_eq!(
            report.items[0].action,
            SyncAction::Skipped {
                reason: "update mode is none".to_string()
            }
        );
        assert_eq!(store.get(ISSUE_PATH), before);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_persist_block() {
        let original = expected_document("update", "2024-01-15T10:00:00Z", "# Fix the parser\nIt breaks.\n");
        let with_block = original.replace(
            "# Fix the parser\n",
            "# Fix the parser\n{% persist \"notes\" %}\nmy notes\n{% endpersist %}\n",
        );
        let store = MemoryStore::new().with_document(ISSUE_PATH, with_block);

        let edited = issue(json!({ "body": "It breaks badly.", "updated_at": "2024-01-20T00:00:00Z" }));
        let report = run(&store, UpdateMode::Update, &[edited], false).await;

        assert_eq!(
            report.items[0].action,
            SyncAction::Updated {
                reason: "remote item changed".to_string()
            }
        );
        assert_eq!(
            store.get(ISSUE_PATH).expect("document should exist"),
            expected_document(
                "update",
                "2024-01-20T00:00:00Z",
                "# Fix the parser\n{% persist \"notes\" %}\nmy notes\n{% endpersist %}\nIt breaks badly.\n"
            )
        );
        assert!(report.items[0].diagnostics[0].contains("\"notes\" restored"));
    }

    #[tokio::test]
    async fn test_unplaceable_block_is_relocated_with_diagnostic() {
        let original = expected_document("update", "2024-01-15T10:00:00Z", "# Fix the parser\nIt breaks.\n");
        let with_block = format!(
            "{}{{% persist \"tail\" %}}\nkeep me\n{{% endpersist %}}\n",
            original.replace("It breaks.\n", "It breaks.\nA paragraph that will vanish.\n")
        );
        let store = MemoryStore::new().with_document(ISSUE_PATH, with_block);

        let edited = issue(json!({
            "title": "Parser rewrite",
            "body": "Entirely new text.",
            "updated_at": "2024-01-20T00:00:00Z"
        }));
        let report = run(&store, UpdateMode::Update, &[edited], false).await;

        let content = store.get(ISSUE_PATH).expect("document should exist");
        assert!(content.contains("{% persist \"tail\" %}\nkeep me\n{% endpersist %}"));
        assert!(content.contains("Entirely new text."));
        assert!(
            report.items[0]
                .diagnostics
                .iter()
                .any(|d| d.contains("moved to the end of the document"))
        );
    }

    #[tokio::test]
    async fn test_duplicate_block_names_fail_without_writing() {
        let original = expected_document("update", "2024-01-15T10:00:00Z", "# Fix the parser\nIt breaks.\n");
        let doubled = format!(
            "{}{{% persist \"notes\" %}}\na\n{{% endpersist %}}\n{{% persist \"notes\" %}}\nb\n{{% endpersist %}}\n",
            original
        );
        let store = MemoryStore::new().with_document(ISSUE_PATH, doubled.clone());

        let edited = issue(json!({ "updated_at": "2024-01-20T00:00:00Z" }));
        let report = run(&store, UpdateMode::Update, &[edited], false).await;

        assert!(report.items[0].action.is_failure());
        assert!(report.has_failures());
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.get(ISSUE_PATH), Some(doubled));
    }
}

mod append_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_append_keeps_existing_content() {
        let store = MemoryStore::new();
        run(&store, UpdateMode::Append, &[issue(json!({}))], false).await;
        let original = store.get(ISSUE_PATH).expect("document should exist");

        let edited = issue(json!({ "body": "More info.", "updated_at": "2024-01-20T00:00:00Z" }));
        let report = run(&store, UpdateMode::Append, &[edited.clone()], false).await;

        assert_eq!(report.items[0].action, SyncAction::Appended);
        let content = store.get(ISSUE_PATH).expect("document should exist");
        let expected_tail = "It breaks.\n\n\n\n---\n### New status: \"open\"\n\n# Fix the parser\nMore info.\n";
        assert!(content.ends_with(expected_tail), "unexpected tail:\n{}", content);
        assert_eq!(
            content,
            format!("{}\n\n---\n### New status: \"open\"\n\n# Fix the parser\nMore info.\n", original)
                .replace("updated: \"2024-01-15T10:00:00Z\"", "updated: \"2024-01-20T00:00:00Z\"")
        );

        // The stamped timestamp makes the next pass a no-op
        let report = run(&store, UpdateMode::Append, &[edited], false).await;
        assert_eq!(
            report.items[0].action,
            SyncAction::Skipped {
                reason: "up to date".to_string()
            }
        );
        assert_eq!(store.write_count(), 2);
    }
}

mod dry_run_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let store = MemoryStore::new();

        let report = run(&store, UpdateMode::None, &[issue(json!({}))], true).await;

        assert!(report.dry_run);
        assert_eq!(report.items[0].action, SyncAction::Created);
        assert_eq!(store.write_count(), 0);
        assert!(store.paths().is_empty());
        assert!(!store.has_folder("GitHub/octo/tracker/Issues"));

        let preview = report.items[0].preview.as_deref().expect("dry run should carry a preview");
        assert!(preview.contains("+++ b/GitHub/octo/tracker/Issues/Issue - 42.md"));
        assert!(preview.contains("+# Fix the parser"));
    }

    #[tokio::test]
    async fn test_dry_run_update_shows_changed_lines() {
        let store = MemoryStore::new();
        run(&store, UpdateMode::Update, &[issue(json!({}))], false).await;

        let edited = issue(json!({ "body": "It breaks badly.", "updated_at": "2024-01-20T00:00:00Z" }));
        let report = run(&store, UpdateMode::Update, &[edited], true).await;

        let preview = report.items[0].preview.as_deref().expect("dry run should carry a preview");
        assert!(preview.contains("-It breaks.\n"));
        assert!(preview.contains("+It breaks badly.\n"));
        assert_eq!(store.write_count(), 1);
    }
}

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Fails every write to one path and delegates the rest.
    struct FailingStore {
        inner: MemoryStore,
        poisoned: NormalizedPath,
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn read(&self, path: &NormalizedPath) -> notesync_fs::Result<Option<String>> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &NormalizedPath, content: &str) -> notesync_fs::Result<()> {
            if *path == self.poisoned {
                return Err(notesync_fs::Error::io(
                    path.to_native(),
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.inner.write(path, content).await
        }

        async fn remove(&self, path: &NormalizedPath) -> notesync_fs::Result<()> {
            self.inner.remove(path).await
        }

        async fn list(&self, prefix: &NormalizedPath) -> notesync_fs::Result<Vec<NormalizedPath>> {
            self.inner.list(prefix).await
        }

        async fn create_folder(&self, path: &NormalizedPath) -> notesync_fs::Result<()> {
            self.inner.create_folder(path).await
        }

        async fn folder_exists(&self, path: &NormalizedPath) -> notesync_fs::Result<bool> {
            self.inner.folder_exists(path).await
        }

        async fn remove_folder_if_empty(&self, path: &NormalizedPath) -> notesync_fs::Result<bool> {
            self.inner.remove_folder_if_empty(path).await
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_pass() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            poisoned: NormalizedPath::new(ISSUE_PATH),
        };
        let other = issue(json!({ "id": 43 }));

        let report = run(&store, UpdateMode::None, &[issue(json!({})), other], false).await;

        assert!(report.items[0].action.is_failure());
        assert_eq!(report.items[1].action, SyncAction::Created);
        assert!(
            store
                .inner
                .get("GitHub/octo/tracker/Issues/Issue - 43.md")
                .is_some()
        );
        assert_eq!(report.count("failed"), 1);
    }
}

mod fs_store_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use notesync_fs::FsStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sync_to_disk() {
        let temp = TempDir::new().expect("temp dir");
        let store = FsStore::new(temp.path());

        let report = run(&store, UpdateMode::Update, &[issue(json!({}))], false).await;
        assert_eq!(report.items[0].action, SyncAction::Created);

        let on_disk = std::fs::read_to_string(temp.path().join(ISSUE_PATH)).expect("document on disk");
        assert!(on_disk.starts_with("---\ntitle: \"Fix the parser\"\n"));

        let report = run(&store, UpdateMode::Update, &[issue(json!({}))], false).await;
        assert_eq!(report.count("skipped"), 1);
    }
}
