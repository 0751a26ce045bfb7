//! Уведомления пользователя: лог и тосты.
//!
//! Fire-and-forget: сессия бронирования ничего не ждёт от приёмника.

use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

pub trait NotificationSink: Send + Sync {
    fn log(&self, message: &str);

    fn toast(&self, message: &str, severity: Severity);
}

/// Приёмник по умолчанию: всё уходит в `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn log(&self, message: &str) {
        info!(target: "booking_console::notify", "{}", message);
    }

    fn toast(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => {
                info!(target: "booking_console::notify", severity = %severity, "{}", message)
            }
            Severity::Warning => {
                warn!(target: "booking_console::notify", severity = %severity, "{}", message)
            }
            Severity::Error => {
                error!(target: "booking_console::notify", severity = %severity, "{}", message)
            }
        }
    }
}

/// Глобальная обработка истёкшей сессии (401). Сам поток бронирования
/// только прерывается и передаёт управление сюда.
pub trait AuthExpiryHandler: Send + Sync {
    fn session_expired(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuthExpiry;

impl AuthExpiryHandler for LogAuthExpiry {
    fn session_expired(&self) {
        warn!("Session expired - booking flow aborted, re-authentication required");
    }
}
