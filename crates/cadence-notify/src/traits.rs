//! Notifier trait and payload

use async_trait::async_trait;
use cadence_util::ClientId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from notification delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Notifier unavailable: {0}")]
    Unavailable(String),

    #[error("Notification command failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// A due follow-up ready to be shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueNotice {
    /// Per-client idempotency tag; a desktop notifier replaces an earlier
    /// notice with the same tag instead of stacking them
    pub tag: String,
    pub client_id: ClientId,
    pub title: String,
    pub body: String,
}

impl DueNotice {
    pub fn new(client_id: ClientId, company_name: &str, title: impl Into<String>) -> Self {
        let name = if company_name.trim().is_empty() {
            client_id.as_str()
        } else {
            company_name
        };

        Self {
            tag: Self::tag_for(&client_id),
            body: format!("Time to contact {}", name),
            title: title.into(),
            client_id,
        }
    }

    pub fn tag_for(client_id: &ClientId) -> String {
        format!("followup-{}", client_id)
    }
}

/// Delivers due notices. Implementations do not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Deliver one notice
    async fn deliver(&self, notice: &DueNotice) -> NotifyResult<()>;
}
