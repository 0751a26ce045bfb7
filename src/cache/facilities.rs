use crate::cache::{CacheService, Cached};
use crate::gateway::BookingError;
use crate::models::FacilityResource;
use tracing::debug;

impl CacheService {
    pub async fn get_facilities(&self) -> Result<Vec<FacilityResource>, BookingError> {
        if let Some(facilities) = self.get_facilities_from_cache().await {
            return Ok(facilities);
        }

        let facilities = self.source.list_facilities().await?;
        debug!("Fetched {} facilities from API", facilities.len());
        self.save_facilities_to_cache(&facilities).await;
        Ok(facilities)
    }

    async fn get_facilities_from_cache(&self) -> Option<Vec<FacilityResource>> {
        self.facilities.read().await.as_ref().and_then(|cached| cached.fresh(self.ttl))
    }

    async fn save_facilities_to_cache(&self, facilities: &[FacilityResource]) {
        *self.facilities.write().await = Some(Cached::new(facilities.to_vec()));
    }
}
