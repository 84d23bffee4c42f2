//! Document content handling for notesync
//!
//! Renders templates against a flat variable context, reads and stamps the
//! YAML frontmatter of synchronized documents, escapes remote text, and
//! normalizes timestamps.

pub mod error;
pub mod escape;
pub mod frontmatter;
pub mod template;
pub mod timestamp;

pub use error::{Error, Result};
pub use escape::{EscapeMode, escape_body, escape_yaml_string};
pub use frontmatter::{Frontmatter, stamp};
pub use template::{Template, TemplateContext, TemplateIssue, render_str};
pub use timestamp::{format_display, format_timestamp, parse_timestamp};
