use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::{info, warn};
use vulhub_sync::{Notification, NotificationKind, NotificationSink};

#[derive(Debug, Clone)]
pub struct Toast {
    pub notification: Notification,
    pub created_at: Instant,
}

impl Toast {
    pub fn is_expired(&self, timeout_secs: u64) -> bool {
        self.created_at.elapsed().as_secs() > timeout_secs
    }
}

/// Keeps recent notifications until they expire or are taken for display.
#[derive(Debug)]
pub struct ToastSink {
    toasts: Mutex<VecDeque<Toast>>,
    timeout_secs: u64,
}

impl ToastSink {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            toasts: Mutex::new(VecDeque::new()),
            timeout_secs,
        }
    }

    fn toasts(&self) -> MutexGuard<'_, VecDeque<Toast>> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove and return every unexpired toast, oldest first.
    pub fn take_visible(&self) -> Vec<Toast> {
        let timeout_secs = self.timeout_secs;
        self.toasts()
            .drain(..)
            .filter(|toast| !toast.is_expired(timeout_secs))
            .collect()
    }

    #[cfg(test)]
    fn push(&self, toast: Toast) {
        self.toasts().push_back(toast);
    }
}

impl NotificationSink for ToastSink {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!("{notification}"),
            NotificationKind::Failure => warn!("{notification}"),
        }

        self.toasts().push_back(Toast {
            notification,
            created_at: Instant::now(),
        });
    }
}
