//! [`MailClient`]: transactional mail over HTTP, with bounded retries.
//!
//! Sends run inside staff requests, so retrying stops once the next pause
//! would overrun [`MailSettings::retry_budget`], whatever `max_retries` says.

use std::time::Duration;

use async_trait::async_trait;
use orders::{EmailAddress, Notification, Notifier, NotifyError, RetryPolicy};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Longest pause honoured from a `Retry-After` header.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Connection details of the mail API.
#[derive(Debug, Clone)]
pub struct MailSettings {
    /// Base URL; requests go to `{api_url}/emails`.
    pub api_url: String,
    pub api_key: String,
    /// Sender, e.g. `LinkMe <no-reply@verone.example>`.
    pub from: String,
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First back-off delay; doubled on every retry.
    pub base_backoff: Duration,
    /// Total time one send may spend before giving up on retries.
    pub retry_budget: Duration,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com".to_string(),
            api_key: String::new(),
            from: "LinkMe <no-reply@localhost>".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            base_backoff: Duration::from_millis(250),
            retry_budget: Duration::from_secs(5),
        }
    }
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// A [`Notifier`] backed by a transactional mail HTTP API.
#[derive(Debug, Clone)]
pub struct MailClient {
    http: reqwest::Client,
    endpoint: String,
    settings: MailSettings,
}

impl MailClient {
    /// Builds a client for `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Configuration`] when the API key is empty or the
    /// HTTP client cannot be built.
    pub fn new(settings: MailSettings) -> Result<Self, NotifyError> {
        if settings.api_key.trim().is_empty() {
            return Err(NotifyError::Configuration("mail API key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NotifyError::Configuration(e.to_string()))?;
        let endpoint = format!("{}/emails", settings.api_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            settings,
        })
    }

    async fn send_once(&self, to: &EmailAddress, n: &Notification) -> Result<(), NotifyError> {
        let payload = EmailPayload {
            from: &self.settings.from,
            to: [to.as_str()],
            subject: &n.subject,
            html: &n.html,
            text: &n.text,
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let retry_after = retry_after(resp.headers());
        let body = resp.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
            retry_after,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.settings
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[async_trait]
impl Notifier for MailClient {
    #[instrument(name = "mail_send", skip_all, fields(kind = notification.kind.as_str()))]
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.send_once(&notification.to, notification).await {
                Ok(()) => {
                    debug!(attempt, "mail accepted");
                    return Ok(());
                }
                Err(err) => err,
            };

            let delay = match err.retry_policy() {
                RetryPolicy::Retryable { after } if attempt <= self.settings.max_retries => {
                    after.map_or_else(|| self.backoff(attempt), |a| a.min(MAX_RETRY_AFTER))
                }
                _ => return Err(err),
            };
            if started.elapsed().saturating_add(delay) > self.settings.retry_budget {
                warn!(attempt, error = %err, "mail send failed; retry budget exhausted");
                return Err(err);
            }
            warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "mail send failed; retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_reads_delta_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn backoff_doubles() {
        let client = MailClient::new(MailSettings {
            api_key: "re_test".into(),
            base_backoff: Duration::from_millis(100),
            ..MailSettings::default()
        })
        .unwrap();
        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn empty_api_key_is_a_configuration_error() {
        let err = MailClient::new(MailSettings::default()).unwrap_err();
        assert!(matches!(err, NotifyError::Configuration(_)));
    }
}
