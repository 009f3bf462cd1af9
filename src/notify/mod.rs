//! Match notifications.
//!
//! After a match search the submitter of the new record is told where to
//! review candidates. Delivery is best effort: callers log failures and move
//! on.

mod log;
mod smtp;
mod template;

pub use log::LogNotifier;
pub use smtp::SmtpNotifier;
pub use template::{DEFAULT_TEMPLATE, EmailTemplate};

use crate::Result;
use crate::models::RecordKind;

/// Sends match notifications.
pub trait Notifier: Send + Sync {
    /// Tells `recipient` that matches were found for their record.
    ///
    /// `reference` is the private token of the record (its `guid`).
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    fn notify(&self, kind: RecordKind, recipient: &str, reference: &str) -> Result<()>;
}

/// Capitalized plural label of a kind, as shown to recipients.
#[must_use]
pub const fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Posting => "Postings",
        RecordKind::Sighting => "Sightings",
    }
}
