//! SMTP notifier.

use super::{EmailTemplate, Notifier, kind_label};
use crate::config::EmailConfig;
use crate::models::RecordKind;
use crate::{Error, Result};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Instant;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends match notifications by email.
///
/// Generic over the transport so tests can use lettre's stub transport.
pub struct SmtpNotifier<T = SmtpTransport> {
    transport: T,
    sender: Mailbox,
    subject: String,
    link_base: String,
    template: EmailTemplate,
}

impl<T> std::fmt::Debug for SmtpNotifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("sender", &self.sender.to_string())
            .field("subject", &self.subject)
            .field("link_base", &self.link_base)
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier<SmtpTransport> {
    /// Builds a notifier from the `[email]` section.
    ///
    /// Port 465 uses implicit TLS, any other port STARTTLS. Authenticates with
    /// `user` and `password` when a password is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no host is configured or the sender
    /// is not a valid mailbox, and [`Error::OperationFailed`] if the relay or
    /// template file cannot be set up.
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("email.host is not set".to_string()))?;

        let relay = if config.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(host)
        } else {
            SmtpTransport::starttls_relay(host)
        };
        let mut builder = relay
            .map_err(|e| Error::OperationFailed {
                operation: "smtp_relay".to_string(),
                cause: e.to_string(),
            })?
            .port(config.port);
        if let Some(password) = &config.password {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                password.expose_secret().to_string(),
            ));
        }

        let template = match &config.template_path {
            Some(path) => EmailTemplate::from_file(path)?,
            None => EmailTemplate::default(),
        };
        let sender = parse_mailbox(config.from.as_deref().unwrap_or(&config.user))?;

        Ok(Self::with_transport(builder.build(), sender, &config.link_base)
            .with_subject(config.subject.clone())
            .with_template(template))
    }
}

impl<T> SmtpNotifier<T> {
    /// Creates a notifier over an existing transport.
    #[must_use]
    pub fn with_transport(transport: T, sender: Mailbox, link_base: &str) -> Self {
        Self {
            transport,
            sender,
            subject: EmailConfig::default().subject,
            link_base: link_base.to_string(),
            template: EmailTemplate::default(),
        }
    }

    /// Replaces the subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Replaces the body template.
    #[must_use]
    pub fn with_template(mut self, template: EmailTemplate) -> Self {
        self.template = template;
        self
    }

    /// Renders the body for one notification.
    #[must_use]
    pub fn body(&self, kind: RecordKind, reference: &str) -> String {
        let vars = HashMap::from([
            ("type", kind_label(kind).to_string()),
            ("link", format!("{}{reference}", self.link_base)),
            ("reference", reference.to_string()),
        ]);
        self.template.render(&vars)
    }

    /// Transport in use.
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T> Notifier for SmtpNotifier<T>
where
    T: Transport + Send + Sync,
    T::Error: Display,
{
    fn notify(&self, kind: RecordKind, recipient: &str, reference: &str) -> Result<()> {
        let start = Instant::now();
        let to = parse_mailbox(recipient)?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body(kind, reference))
            .map_err(|e| Error::OperationFailed {
                operation: "build_email".to_string(),
                cause: e.to_string(),
            })?;

        let result = self
            .transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| Error::OperationFailed {
                operation: "send_email".to_string(),
                cause: e.to_string(),
            });

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("notifications_total", "channel" => "smtp", "status" => status)
            .increment(1);
        metrics::histogram!("notification_duration_ms", "channel" => "smtp")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        if result.is_ok() {
            tracing::debug!(kind = kind_label(kind), recipient, "Sent match notification");
        }
        result
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|e| Error::InvalidInput(format!("invalid email address '{address}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lettre::transport::stub::StubTransport;
    use secrecy::SecretString;

    fn notifier(transport: StubTransport) -> SmtpNotifier<StubTransport> {
        SmtpNotifier::with_transport(
            transport,
            "Lost Pets <registry@example.com>".parse().unwrap(),
            "https://lostpets.example/p/",
        )
    }

    #[test]
    fn test_notify_sends_rendered_body() {
        let notifier = notifier(StubTransport::new_ok()).with_subject("Matches found");
        notifier
            .notify(RecordKind::Sighting, "finder@example.com", "guid-123")
            .unwrap();

        let messages = notifier.transport().messages();
        assert_eq!(messages.len(), 1);
        let (envelope, raw) = &messages[0];
        assert_eq!(envelope.to()[0].to_string(), "finder@example.com");
        assert!(raw.contains("Subject: Matches found"));
        assert!(raw.contains("one of your Sightings."));
        assert!(raw.contains("https://lostpets.example/p/guid-123"));
    }

    #[test]
    fn test_custom_template() {
        let notifier =
            notifier(StubTransport::new_ok()).with_template(EmailTemplate::new("{{type}} {{link}}"));
        assert_eq!(
            notifier.body(RecordKind::Posting, "abc"),
            "Postings https://lostpets.example/p/abc"
        );
    }

    #[test]
    fn test_invalid_recipient() {
        let notifier = notifier(StubTransport::new_ok());
        let err = notifier
            .notify(RecordKind::Posting, "not an address", "abc")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(notifier.transport().messages().is_empty());
    }

    #[test]
    fn test_transport_failure() {
        let notifier = notifier(StubTransport::new_error());
        let err = notifier
            .notify(RecordKind::Posting, "owner@example.com", "abc")
            .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "send_email"));
    }

    #[test]
    fn test_from_config_requires_host() {
        let err = SmtpNotifier::from_config(&EmailConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_config_rejects_bad_sender() {
        let config = EmailConfig {
            host: Some("smtp.example.com".to_string()),
            user: "not-a-mailbox".to_string(),
            password: Some(SecretString::from("pw")),
            ..EmailConfig::default()
        };
        let err = SmtpNotifier::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_config() {
        let config = EmailConfig {
            host: Some("smtp.example.com".to_string()),
            user: "registry@example.com".to_string(),
            password: Some(SecretString::from("pw")),
            link_base: "https://lostpets.example/p/".to_string(),
            ..EmailConfig::default()
        };
        let notifier = SmtpNotifier::from_config(&config).unwrap();
        assert!(notifier.body(RecordKind::Posting, "x").contains("/p/x"));
    }
}
