//! Mailer contract plus the tracing and recording implementations.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One outbound email, with both HTML and plain-text bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Outbound notification channel.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[async_trait::async_trait]
impl<M> Mailer for Arc<M>
where
    M: Mailer + ?Sized,
{
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        (**self).send(message).await
    }
}

/// Logs instead of sending. Default for dev and for deployments without an
/// SMTP relay configured.
#[derive(Debug, Default)]
pub struct TracingMailer;

#[async_trait::async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "email not sent (tracing mailer); body suppressed"
        );
        Ok(())
    }
}

/// Captures every message for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::Delivery("recording mailer lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_mailer_captures_messages() {
        let mailer = RecordingMailer::new();
        let msg = EmailMessage {
            to: "dara@example.se".to_string(),
            subject: "hej".to_string(),
            html_body: "<p>hej</p>".to_string(),
            text_body: "hej".to_string(),
        };

        mailer.send(&msg).await.unwrap();
        assert_eq!(mailer.sent(), vec![msg]);
    }
}
