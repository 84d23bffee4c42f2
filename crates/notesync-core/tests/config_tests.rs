//! Tests for loading and validating settings

use notesync_content::EscapeMode;
use notesync_core::item::ItemKind;
use notesync_core::{Error, Settings, UpdateMode};
use std::fs;
use tempfile::TempDir;

mod parse_tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
date_format = "%Y-%m-%d"
escape_mode = "very_strict"
escape_hash_tags = true
retention_days = 7
anchor_length = 80

[[collections]]
name = "octo/tracker"
folder = "Work"
cleanup = false

[collections.issues]
update_mode = "update"
allow_delete = true
filename_template = "{number} - {title}"

[collections.pull_requests]
update_mode = "append"
include_comments = false

[[collections]]
name = "Roadmap"

[collections.project_items]
custom_folder = "Planning"
"#;

        let settings = Settings::parse(toml_content).expect("Should parse valid TOML");

        assert_eq!(settings.date_format, "%Y-%m-%d");
        assert_eq!(settings.escape_mode, EscapeMode::VeryStrict);
        assert!(settings.escape_hash_tags);
        assert_eq!(settings.retention_days, 7);
        assert_eq!(settings.anchor_length, 80);
        assert_eq!(settings.collections.len(), 2);

        let tracker = settings.collection("octo/tracker").expect("tracker configured");
        assert_eq!(tracker.folder, "Work");
        assert!(!tracker.cleanup);
        assert_eq!(tracker.issues.update_mode, UpdateMode::Update);
        assert!(tracker.issues.allow_delete);
        assert_eq!(tracker.pull_requests.update_mode, UpdateMode::Append);
        assert!(!tracker.pull_requests.include_comments);
        assert_eq!(tracker.project_items.update_mode, UpdateMode::None);
        assert_eq!(
            tracker.layout(ItemKind::Issue).folder().as_str(),
            "Work/octo/tracker/Issues"
        );

        let roadmap = settings.collection("Roadmap").expect("roadmap configured");
        assert!(roadmap.cleanup);
        assert_eq!(
            roadmap.layout(ItemKind::ProjectItem).folder().as_str(),
            "Planning"
        );
    }

    #[test]
    fn test_parse_rejects_unknown_update_mode() {
        let toml_content = r#"
[[collections]]
name = "octo/tracker"

[collections.issues]
update_mode = "sometimes"
"#;
        let result = Settings::parse(toml_content);
        assert!(matches!(result, Err(Error::Toml(_))));
    }
}

mod validate_tests {
    use super::*;

    #[test]
    fn test_duplicate_collection_is_an_error() {
        let settings = Settings::parse(
            r#"
[[collections]]
name = "octo/tracker"

[[collections]]
name = "octo/tracker"
"#,
        )
        .expect("Should parse");

        let err = settings.validate().expect_err("duplicates must be rejected");
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_zero_anchor_length_is_an_error() {
        let settings = Settings::parse("anchor_length = 0").expect("Should parse");
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_malformed_template_is_a_warning() {
        let settings = Settings::parse(
            r##"
[[collections]]
name = "octo/tracker"

[collections.issues]
body_template = "# {title}\n{labels:Labels: {labels}\n"
"##,
        )
        .expect("Should parse");

        let warnings = settings.validate().expect("warnings only");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, ItemKind::Issue);
        assert!(warnings[0].to_string().starts_with("octo/tracker (issue): body template"));
    }
}

mod load_tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("notesync.toml");

        let err = Settings::load(&path).expect_err("missing config");
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_resolves_template_relative_to_config() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir(temp.path().join("templates")).expect("create templates dir");
        fs::write(temp.path().join("templates/issue.md"), "# {title}\n").expect("write template");
        fs::write(
            temp.path().join("notesync.toml"),
            r#"
[[collections]]
name = "octo/tracker"

[collections.issues]
body_template_path = "templates/issue.md"
"#,
        )
        .expect("write config");

        let settings = Settings::load(&temp.path().join("notesync.toml")).expect("Should load");

        assert_eq!(
            settings.collections[0].issues.body_template.as_deref(),
            Some("# {title}\n")
        );
        assert!(settings.validate().expect("valid").is_empty());
    }

    #[test]
    fn test_load_reports_missing_template() {
        let temp = TempDir::new().expect("temp dir");
        fs::write(
            temp.path().join("notesync.toml"),
            r#"
[[collections]]
name = "octo/tracker"

[collections.issues]
body_template_path = "missing.md"
"#,
        )
        .expect("write config");

        let err = Settings::load(&temp.path().join("notesync.toml")).expect_err("template missing");
        assert!(matches!(err, Error::TemplateLoad { .. }));
    }
}
