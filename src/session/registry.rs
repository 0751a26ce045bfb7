use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::SessionError;

/// Одновременно открыта максимум одна сессия бронирования.
///
/// Лиз освобождается при drop сессии, даже если её бросили на полпути.
/// Фоновое обновление каталога смотрит сюда и пропускает тик, пока лиз занят.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    busy: Arc<AtomicBool>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<SessionLease, SessionError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::AlreadyOpen)?;
        debug!("Booking session lease acquired");
        Ok(SessionLease { busy: Arc::clone(&self.busy) })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SessionLease {
    busy: Arc<AtomicBool>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!("Booking session lease released");
    }
}
