//! Notification channel contract
//!
//! Alert delivery is fire-and-forget: implementations log their own
//! failures, and the engine never blocks a scoring cycle on delivery.

use async_trait::async_trait;
use tracing::info;

/// User-visible notification delivery capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Request permission to notify. A denial only disables alerting; it
    /// never blocks scoring.
    async fn request_access(&self) -> bool;

    /// Deliver a notification. Errors are logged by the implementation,
    /// not propagated.
    async fn deliver(&self, title: &str, body: &str);
}

/// Notifier that writes alerts to the log. Used by the CLI and as a stand-in
/// when the host platform offers no notification channel.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn request_access(&self) -> bool {
        true
    }

    async fn deliver(&self, title: &str, body: &str) {
        info!(title, body, "notification delivered");
    }
}
