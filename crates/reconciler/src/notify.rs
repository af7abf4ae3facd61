//! Outbound operator notifications.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::alert::Alert;
use crate::error::NotifyError;

/// Delivers a message to the operator.
///
/// Callers log failures and carry on; a notification never affects
/// reconciliation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;

    /// Deliver an [`Alert`].
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.notify(&alert.subject(), &alert.body()).await
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(subject = %subject, body = %body, "Notification");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// POSTs notifications as `{"subject", "body"}` JSON.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: Url,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http_client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(self.url.clone())
            .json(&WebhookPayload { subject, body })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(subject = %subject, "Webhook notification delivered");
        Ok(())
    }
}

/// Keeps notifications in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl InMemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far as `(subject, body)`.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Subjects received so far.
    pub async fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|(subject, _)| subject.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .await
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn webhook_for(server: &MockServer) -> WebhookNotifier {
        let url = Url::parse(&format!("{}/hooks/roster", server.uri())).unwrap();
        WebhookNotifier::new(url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_posts_subject_and_body() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hooks/roster"))
            .and(body_json(serde_json::json!({
                "subject": "Roster service recovered",
                "body": "roster service recovered after 4 failed attempts"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        webhook_for(&server)
            .send(&Alert::Recovered { after_failures: 4 })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_webhook_rejection_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = webhook_for(&server).notify("s", "b").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 500 }));
    }

    #[tokio::test]
    async fn test_in_memory_notifier_records_messages() {
        let notifier = InMemoryNotifier::new();
        notifier.notify("hello", "world").await.unwrap();
        notifier.send(&Alert::Degraded { consecutive_failures: 4 }).await.unwrap();

        assert_eq!(
            notifier.subjects().await,
            vec!["hello".to_string(), "Roster service degraded".to_string()]
        );
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify("subject", "body").await.is_ok());
    }
}
