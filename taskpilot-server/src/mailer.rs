//! Outbound email collaborator.
//!
//! The scheduler and the `remind` endpoint only know the [`Mailer`] trait.
//! [`HttpMailer`] posts messages to a transactional-mail provider's JSON
//! endpoint; [`LogMailer`] logs them and keeps a copy, which serves dry runs
//! and tests.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;

/// A plain-text email ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
}

/// Errors that can occur while sending an email.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The provider could not be reached.
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("mail provider rejected message ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The message has no recipients.
    #[error("email has no recipients")]
    NoRecipients,
}

/// Something that can deliver an [`OutboundEmail`].
pub trait Mailer: Send + Sync {
    /// Sends one email. Resolves once the provider has accepted it.
    fn send(&self, email: OutboundEmail) -> BoxFuture<'_, Result<(), MailError>>;
}

/// JSON body posted to the provider.
#[derive(Serialize)]
struct ProviderMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// Sends email through an HTTP provider API with bearer-token auth.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    from: String,
}

impl HttpMailer {
    /// Creates a mailer posting to `endpoint` as `from`.
    #[must_use]
    pub fn new(endpoint: String, api_token: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_token,
            from,
        }
    }
}

impl Mailer for HttpMailer {
    fn send(&self, email: OutboundEmail) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            if email.to.is_empty() {
                return Err(MailError::NoRecipients);
            }
            let body = ProviderMessage {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.text,
            };
            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_token)
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(MailError::Rejected { status, body });
            }

            tracing::debug!(to = ?email.to, subject = %email.subject, "email accepted by provider");
            Ok(())
        })
    }
}

/// Logs every email instead of sending it and records it in an outbox.
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    outbox: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl LogMailer {
    /// Creates a mailer with an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every email "sent" so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().clone()
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: OutboundEmail) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            if email.to.is_empty() {
                return Err(MailError::NoRecipients);
            }
            tracing::info!(
                to = %email.to.join(", "),
                subject = %email.subject,
                "dry run: email not sent"
            );
            self.outbox.lock().push(email);
            Ok(())
        })
    }
}
