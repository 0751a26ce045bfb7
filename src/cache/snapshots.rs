use chrono::NaiveDate;
use tracing::debug;

use crate::cache::{CacheService, Cached};
use crate::gateway::{BookingError, ResourceSnapshot};
use crate::models::ResourceRef;

impl CacheService {
    /// Снимок ресурса с бронями. Для площадок ключ включает дату.
    pub async fn get_snapshot(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
    ) -> Result<ResourceSnapshot, BookingError> {
        // у событий дата не участвует в ключе
        let key = match resource {
            ResourceRef::Event(_) => (resource, None),
            ResourceRef::Facility(_) => (resource, date),
        };

        if let Some(snapshot) =
            self.snapshots.read().await.get(&key).and_then(|cached| cached.fresh(self.ttl))
        {
            return Ok(snapshot);
        }

        let snapshot = self.gateway.fetch_resource_with_allocations(resource, key.1).await?;
        self.snapshots.write().await.insert(key, Cached::new(snapshot.clone()));
        Ok(snapshot)
    }

    /// Сбросить все снимки ресурса, по всем датам.
    pub async fn invalidate_resource(&self, resource: ResourceRef) {
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|(cached, _), _| *cached != resource);
        debug!("Invalidated {} cached snapshots of {}", before - snapshots.len(), resource);
    }
}
