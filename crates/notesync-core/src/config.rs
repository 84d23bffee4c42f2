//! Configuration for synchronization passes
//!
//! Settings are read once from a TOML file, resolved (template files loaded
//! relative to the config file) and then only borrowed for the rest of the
//! pass.
//!
//! ```toml
//! retention_days = 14
//! escape_mode = "strict"
//!
//! [[collections]]
//! name = "octo/tracker"
//!
//! [collections.issues]
//! update_mode = "update"
//! allow_delete = true
//! ```

use crate::error::{Error, Result};
use crate::item::ItemKind;
use notesync_content::{EscapeMode, Template};
use notesync_fs::{NormalizedPath, sanitize_file_name};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

fn default_retention_days() -> u32 {
    30
}

fn default_anchor_length() -> usize {
    notesync_blocks::parser::DEFAULT_ANCHOR_LEN
}

fn default_folder() -> String {
    "GitHub".to_string()
}

fn default_true() -> bool {
    true
}

/// How an existing document is refreshed when its item changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Leave the document alone unless the item's status changed.
    #[default]
    None,
    /// Re-render the document, keeping persist blocks.
    Update,
    /// Add a short status fragment to the end of the document.
    Append,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Update => "update",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per item-kind synchronization policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    #[serde(default)]
    pub update_mode: UpdateMode,

    /// Deletion permission used when a document has no `allowDelete` of its
    /// own.
    #[serde(default)]
    pub allow_delete: bool,

    /// Filename template; the kind's default when unset.
    #[serde(default)]
    pub filename_template: Option<String>,

    /// Inline body template; the kind's default when unset.
    #[serde(default)]
    pub body_template: Option<String>,

    /// Body template file, relative to the configuration file. Loaded into
    /// `body_template` by [`Settings::resolve_templates`].
    #[serde(default)]
    pub body_template_path: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub include_comments: bool,

    /// Folder used instead of the default layout.
    #[serde(default)]
    pub custom_folder: Option<String>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::default(),
            allow_delete: false,
            filename_template: None,
            body_template: None,
            body_template_path: None,
            include_comments: true,
            custom_folder: None,
        }
    }
}

impl SyncPolicy {
    /// The custom folder, if one is set and not blank.
    pub fn custom_folder(&self) -> Option<&str> {
        self.custom_folder
            .as_deref()
            .map(str::trim)
            .filter(|folder| !folder.is_empty())
    }
}

/// Where a collection's documents of one kind live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderLayout {
    /// `<base>/<segments...>/<kind folder>`. Created on demand and pruned
    /// bottom-up when emptied, never above `base`.
    Default {
        base: NormalizedPath,
        folder: NormalizedPath,
    },
    /// A user-chosen folder, left in place even when empty.
    Custom { folder: NormalizedPath },
}

impl FolderLayout {
    pub fn folder(&self) -> &NormalizedPath {
        match self {
            Self::Default { folder, .. } | Self::Custom { folder } => folder,
        }
    }

    /// Folders eligible for empty-folder removal, deepest first.
    pub fn removable_folders(&self) -> Vec<NormalizedPath> {
        let Self::Default { base, folder } = self else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut current = Some(folder.clone());
        while let Some(path) = current {
            if !path.is_inside(base) {
                break;
            }
            current = path.parent();
            out.push(path);
        }
        out
    }
}

/// One synchronized remote collection: a repository or a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// `owner/repo` for repositories, the project title for projects.
    pub name: String,

    /// Base folder of the default layout.
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Run the lifecycle reconciler after syncing.
    #[serde(default = "default_true")]
    pub cleanup: bool,

    #[serde(default)]
    pub issues: SyncPolicy,

    #[serde(default)]
    pub pull_requests: SyncPolicy,

    #[serde(default)]
    pub project_items: SyncPolicy,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: default_folder(),
            cleanup: true,
            issues: SyncPolicy::default(),
            pull_requests: SyncPolicy::default(),
            project_items: SyncPolicy::default(),
        }
    }

    pub fn policy(&self, kind: ItemKind) -> &SyncPolicy {
        match kind {
            ItemKind::Issue => &self.issues,
            ItemKind::PullRequest => &self.pull_requests,
            ItemKind::ProjectItem => &self.project_items,
        }
    }

    pub fn policy_mut(&mut self, kind: ItemKind) -> &mut SyncPolicy {
        match kind {
            ItemKind::Issue => &mut self.issues,
            ItemKind::PullRequest => &mut self.pull_requests,
            ItemKind::ProjectItem => &mut self.project_items,
        }
    }

    /// `(owner, repo)` when the name has the `owner/repo` shape.
    pub fn owner_and_repo(&self) -> Option<(&str, &str)> {
        let (owner, repo) = self.name.split_once('/')?;
        let (owner, repo) = (owner.trim(), repo.trim());
        (!owner.is_empty() && !repo.is_empty()).then_some((owner, repo))
    }

    /// Folder layout for documents of `kind`.
    pub fn layout(&self, kind: ItemKind) -> FolderLayout {
        if let Some(custom) = self.policy(kind).custom_folder() {
            return FolderLayout::Custom {
                folder: NormalizedPath::new(custom),
            };
        }

        let base = NormalizedPath::new(self.folder.trim());
        let mut folder = base.clone();
        match self.owner_and_repo() {
            Some((owner, repo)) => {
                folder = folder
                    .join(&sanitize_file_name(owner))
                    .join(&sanitize_file_name(repo));
            }
            None => folder = folder.join(&sanitize_file_name(&self.name)),
        }
        FolderLayout::Default {
            base,
            folder: folder.join(kind.folder_name()),
        }
    }
}

/// A problem found by [`Settings::validate`] that does not stop a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub collection: String,
    pub kind: ItemKind,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.collection, self.kind, self.message)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// chrono strftime pattern for display dates; empty means RFC 3339.
    #[serde(default)]
    pub date_format: String,

    #[serde(default)]
    pub escape_mode: EscapeMode,

    /// Escape `#` outside Markdown headings in remote text.
    #[serde(default)]
    pub escape_hash_tags: bool,

    /// Days a closed item's document is kept before it may be deleted.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Characters of preceding text stored as a persist block's anchor.
    #[serde(default = "default_anchor_length")]
    pub anchor_length: usize,

    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            date_format: String::new(),
            escape_mode: EscapeMode::default(),
            escape_hash_tags: false,
            retention_days: default_retention_days(),
            anchor_length: default_anchor_length(),
            collections: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML content.
    ///
    /// # Example
    ///
    /// ```
    /// use notesync_core::config::{Settings, UpdateMode};
    ///
    /// let settings = Settings::parse(r#"
    /// [[collections]]
    /// name = "octo/tracker"
    ///
    /// [collections.issues]
    /// update_mode = "append"
    /// "#).unwrap();
    ///
    /// assert_eq!(settings.retention_days, 30);
    /// assert_eq!(settings.collections[0].issues.update_mode, UpdateMode::Append);
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Load, parse and resolve a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        let mut settings = Self::parse(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        settings.resolve_templates(base)?;
        Ok(settings)
    }

    /// Load every `body_template_path` into `body_template`.
    ///
    /// Inline templates win over paths; relative paths resolve against
    /// `base`.
    pub fn resolve_templates(&mut self, base: &Path) -> Result<()> {
        for collection in &mut self.collections {
            for kind in ItemKind::ALL {
                let policy = collection.policy_mut(kind);
                if policy.body_template.is_some() {
                    continue;
                }
                let Some(relative) = &policy.body_template_path else {
                    continue;
                };
                let path = base.join(relative);
                let template = std::fs::read_to_string(&path)
                    .map_err(|source| Error::TemplateLoad { path, source })?;
                policy.body_template = Some(template);
            }
        }
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Check the settings before a pass.
    ///
    /// Blank or duplicate collection names and a zero anchor length are
    /// errors. Malformed templates only produce warnings, since they render
    /// as literal text.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>> {
        if self.anchor_length == 0 {
            return Err(Error::InvalidConfig {
                message: "anchor_length must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut warnings = Vec::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() {
                return Err(Error::InvalidConfig {
                    message: "collection name must not be empty".to_string(),
                });
            }
            if !seen.insert(collection.name.as_str()) {
                return Err(Error::InvalidConfig {
                    message: format!("collection \"{}\" is configured twice", collection.name),
                });
            }

            for kind in ItemKind::ALL {
                let policy = collection.policy(kind);
                let mut warn = |message: String| {
                    warnings.push(ConfigWarning {
                        collection: collection.name.clone(),
                        kind,
                        message,
                    })
                };

                let templates = [
                    ("filename template", policy.filename_template.as_deref()),
                    ("body template", policy.body_template.as_deref()),
                ];
                for (label, source) in templates {
                    let Some(source) = source else { continue };
                    for issue in Template::parse(source).issues() {
                        warn(format!("{}: {}", label, issue));
                    }
                }
                if policy.body_template.is_none() && policy.body_template_path.is_some() {
                    warn("body_template_path has not been loaded".to_string());
                }
            }
        }
        Ok(warnings)
    }
}
