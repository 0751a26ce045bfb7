use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::notify::{AuthExpiryHandler, NotificationSink, Severity};

/// Запоминает все тосты и записи лога.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    toasts: Arc<Mutex<Vec<(String, Severity)>>>,
    logs: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<(String, Severity)> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_toast(&self) -> Option<(String, Severity)> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, s)| *s == severity)
            .count()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn log(&self, message: &str) {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).push(message.to_string());
    }

    fn toast(&self, message: &str, severity: Severity) {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_string(), severity));
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingAuthExpiry {
    expirations: Arc<AtomicUsize>,
}

impl RecordingAuthExpiry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expirations(&self) -> usize {
        self.expirations.load(Ordering::SeqCst)
    }
}

impl AuthExpiryHandler for RecordingAuthExpiry {
    fn session_expired(&self) {
        self.expirations.fetch_add(1, Ordering::SeqCst);
    }
}
