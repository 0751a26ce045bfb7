use crate::cache::{CacheService, Cached};
use crate::gateway::BookingError;
use crate::models::EventResource;
use tracing::debug;

impl CacheService {
    // Получить события
    pub async fn get_events(&self) -> Result<Vec<EventResource>, BookingError> {
        // Сначала пробуем кеш
        if let Some(events) = self.get_events_from_cache().await {
            return Ok(events);
        }

        // Кеша нет или он устарел - идем в API
        let events = self.source.list_events().await?;
        debug!("Fetched {} events from API", events.len());
        self.save_events_to_cache(&events).await;
        Ok(events)
    }

    async fn get_events_from_cache(&self) -> Option<Vec<EventResource>> {
        self.events.read().await.as_ref().and_then(|cached| cached.fresh(self.ttl))
    }

    async fn save_events_to_cache(&self, events: &[EventResource]) {
        *self.events.write().await = Some(Cached::new(events.to_vec()));
    }
}
