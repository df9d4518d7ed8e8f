//! Notifier that writes to the log

use async_trait::async_trait;
use tracing::info;

use crate::{DueNotice, Notifier, NotifyResult};

/// Logs each notice at info level. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notice: &DueNotice) -> NotifyResult<()> {
        info!(
            tag = %notice.tag,
            client_id = %notice.client_id,
            title = %notice.title,
            "{}",
            notice.body
        );
        Ok(())
    }
}
