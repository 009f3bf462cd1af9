//! `[email]` section.

use super::parse_number;
use crate::Result;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// SMTP settings for match notifications.
///
/// Email is enabled once `host` is set; otherwise notifications only go to
/// the log.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub host: Option<String>,
    /// SMTP submission port.
    pub port: u16,
    /// Login user, also the sender when `from` is unset.
    pub user: String,
    /// Login password.
    pub password: Option<SecretString>,
    /// Sender mailbox, e.g. `Lost Pets <noreply@example.com>`.
    pub from: Option<String>,
    /// Prefix of the private link; the record reference is appended.
    pub link_base: String,
    /// Subject line.
    pub subject: String,
    /// Body template file; the built-in body is used when unset.
    pub template_path: Option<PathBuf>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            user: String::new(),
            password: None,
            from: None,
            link_base: String::new(),
            subject: "Possible matches for your pet".to_string(),
            template_path: None,
        }
    }
}

impl EmailConfig {
    /// Whether an SMTP host is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.trim().is_empty())
    }

    pub(super) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("LOSTPETS_SMTP_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = lookup("LOSTPETS_SMTP_PORT") {
            self.port = parse_number("LOSTPETS_SMTP_PORT", &v)?;
        }
        if let Some(v) = lookup("LOSTPETS_SMTP_USER") {
            self.user = v;
        }
        if let Some(v) = lookup("LOSTPETS_SMTP_PASSWORD") {
            self.password = Some(SecretString::from(v));
        }
        if let Some(v) = lookup("LOSTPETS_SMTP_FROM") {
            self.from = Some(v);
        }
        if let Some(v) = lookup("LOSTPETS_LINK_BASE") {
            self.link_base = v;
        }
        Ok(())
    }
}
