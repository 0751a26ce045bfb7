use crate::gateway::BookingError;
use crate::models::{Allocation, AuthoritativeAllocation};
use crate::services::capacity::DisplayAvailability;

/// Шаги одной попытки бронирования.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Ресурс загружен; для изменения/отмены цель уже выбрана.
    Browsing,
    /// Выбор слота (площадка) или количества (изменение записи).
    SlotOrQuantitySelection,
    RequesterSelection,
    /// Открыт модальный диалог подтверждения.
    Confirming,
    /// Запрос к шлюзу в полёте; повторная отправка запрещена.
    Committing,
    Settled(Settlement),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Browsing => "Browsing",
            SessionState::SlotOrQuantitySelection => "SlotOrQuantitySelection",
            SessionState::RequesterSelection => "RequesterSelection",
            SessionState::Confirming => "Confirming",
            SessionState::Committing => "Committing",
            SessionState::Settled(Settlement::Succeeded(_)) => "Settled(success)",
            SessionState::Settled(Settlement::Failed(_)) => "Settled(error)",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Settled(_))
    }
}

/// Итог коммита.
///
/// Ошибка, после которой сессия может продолжаться, возвращает её на
/// предыдущий шаг и попадает только в `last_settlement`. Терминальный
/// `Failed` бывает только при истёкшей авторизации или исчезнувшем ресурсе.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Succeeded(CommitReceipt),
    Failed(BookingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Created,
    Updated,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub kind: CommitKind,
    /// Ответ шлюза; у отмены тела нет.
    pub allocation: Option<AuthoritativeAllocation>,
    /// Перезагруженная после коммита картинка; `None`, если перезагрузка не удалась.
    pub availability: Option<DisplayAvailability>,
}

/// Что делает сессия.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingIntent {
    Create,
    Update { original: Allocation },
    Cancel { original: Allocation },
}

impl BookingIntent {
    pub fn original(&self) -> Option<&Allocation> {
        match self {
            BookingIntent::Create => None,
            BookingIntent::Update { original } | BookingIntent::Cancel { original } => Some(original),
        }
    }
}
