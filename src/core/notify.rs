//! Notifier capability.

use async_trait::async_trait;
use thiserror::Error;

use super::model::PermissionStatus;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    /// Deliver a user-visible alert. Fire-and-forget: a dispatched
    /// notification is never retracted.
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes through the `log` facade.
///
/// The default for headless use; platform bindings replace it with a real
/// notification channel.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        log::info!("{title}: {body}");
        Ok(())
    }
}
