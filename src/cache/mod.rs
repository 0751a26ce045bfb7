//! Read-through кеш каталога поверх шлюза.
//!
//! Списки событий и площадок живут `ttl`; снимки ресурсов хранятся по ключу
//! (ресурс, дата) и сбрасываются после каждого коммита по этому ресурсу.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::gateway::{BookingGateway, CatalogSource, ResourceSnapshot};
use crate::models::{EventResource, FacilityResource, ResourceRef};

pub mod events;
pub mod facilities;
pub mod snapshots;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

type SnapshotKey = (ResourceRef, Option<NaiveDate>);

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T) -> Self {
        Self { value, stored_at: Instant::now() }
    }

    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

#[derive(Clone)]
pub struct CacheService {
    source: Arc<dyn CatalogSource>,
    gateway: Arc<dyn BookingGateway>,
    ttl: Duration,
    events: Arc<RwLock<Option<Cached<Vec<EventResource>>>>>,
    facilities: Arc<RwLock<Option<Cached<Vec<FacilityResource>>>>>,
    snapshots: Arc<RwLock<HashMap<SnapshotKey, Cached<ResourceSnapshot>>>>,
}

impl CacheService {
    pub fn new(source: Arc<dyn CatalogSource>, gateway: Arc<dyn BookingGateway>, ttl: Duration) -> Self {
        Self {
            source,
            gateway,
            ttl,
            events: Arc::default(),
            facilities: Arc::default(),
            snapshots: Arc::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        info!("Starting catalog cache warmup...");

        match self.get_events().await {
            Ok(events) => info!("Loaded {} events", events.len()),
            Err(e) => warn!("Event list warmup failed: {}", e),
        }
        match self.get_facilities().await {
            Ok(facilities) => info!("Loaded {} facilities", facilities.len()),
            Err(e) => warn!("Facility list warmup failed: {}", e),
        }

        info!("Catalog cache warmup done");
    }

    /// Сбросить всё: списки и снимки.
    pub async fn clear(&self) {
        *self.events.write().await = None;
        *self.facilities.write().await = None;
        self.snapshots.write().await.clear();
    }
}
