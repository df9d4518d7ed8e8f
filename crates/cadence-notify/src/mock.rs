//! Recording notifier for tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{DueNotice, Notifier, NotifyError, NotifyResult};

/// Records every delivered notice. Delivery can be made to fail, in which
/// case the attempt is counted but the notice is not recorded.
#[derive(Debug, Default, Clone)]
pub struct MockNotifier {
    delivered: Arc<Mutex<Vec<DueNotice>>>,
    attempts: Arc<Mutex<usize>>,

    /// Configure delivery to fail
    pub fail_delivery: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_delivery(&self, fail: bool) {
        *self.fail_delivery.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    /// Notices delivered so far, oldest first
    pub fn delivered(&self) -> Vec<DueNotice> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivery attempts, successful or not
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) = 0;
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn deliver(&self, notice: &DueNotice) -> NotifyResult<()> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;

        if *self.fail_delivery.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(NotifyError::PermissionDenied("mock delivery failure".into()));
        }

        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
        Ok(())
    }
}
