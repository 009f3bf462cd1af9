//! Log-only notifier.

use super::{Notifier, kind_label};
use crate::Result;
use crate::models::RecordKind;

/// Records notifications in the log instead of sending them.
///
/// Used when no SMTP server is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    link_base: String,
}

impl LogNotifier {
    /// Creates a notifier that logs links built from `link_base`.
    #[must_use]
    pub fn new(link_base: impl Into<String>) -> Self {
        Self {
            link_base: link_base.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, kind: RecordKind, recipient: &str, reference: &str) -> Result<()> {
        tracing::info!(
            kind = kind_label(kind),
            recipient,
            link = %format!("{}{reference}", self.link_base),
            "Match notification (not sent, email disabled)"
        );
        metrics::counter!("notifications_total", "channel" => "log", "status" => "success")
            .increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_never_fails() {
        let notifier = LogNotifier::new("https://lostpets.example/private/");
        assert!(notifier
            .notify(RecordKind::Posting, "owner@example.com", "abc")
            .is_ok());
    }
}
