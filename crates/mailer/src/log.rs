//! A notifier that only logs.

use async_trait::async_trait;
use orders::{Notification, Notifier, NotifyError};
use tracing::info;

/// A [`Notifier`] that logs notifications instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            kind = notification.kind.as_str(),
            to = %notification.to,
            subject = %notification.subject,
            "mail disabled; notification logged only"
        );
        Ok(())
    }
}
