//! Email body templates.
//!
//! Templates use `{{name}}` placeholders. Known variables:
//! - `type` - `Postings` or `Sightings`
//! - `link` - link base followed by the record reference
//! - `reference` - the record reference alone

use crate::{Error, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Body used when no template file is configured.
pub const DEFAULT_TEMPLATE: &str = "Hello,

We found possible matches for one of your {{type}}.
Review them here: {{link}}

Keep this link private, it gives access to your contact details.
";

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").ok());

/// A parsed email body template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    source: String,
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl EmailTemplate {
    /// Wraps template text.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Loads a template file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|e| Error::OperationFailed {
                operation: "read_email_template".to_string(),
                cause: format!("{}: {e}", path.display()),
            })
    }

    /// Substitutes variables; unknown placeholders render as empty text.
    #[must_use]
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        let Some(re) = PLACEHOLDER.as_ref() else {
            return self.source.clone();
        };
        re.replace_all(&self.source, |caps: &Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
    }
}
