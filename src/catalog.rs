//! Каталог ресурсов: списки с фильтрами и страницами, доступность,
//! фоновое обновление.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheService;
use crate::gateway::{BookingError, BookingGateway, CatalogSource, ResourceSnapshot};
use crate::models::{EventResource, FacilityResource, FacilityStatus, ResourceRef};
use crate::services::capacity::{CapacityError, CapacityModel, DisplayAvailability};
use crate::session::SessionRegistry;

pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Фильтры списка. `page` считается с 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub search: Option<String>,
    /// Только события на эту дату.
    pub date: Option<NaiveDate>,
    /// Показывать прошедшие события.
    pub include_past: bool,
    /// Фильтр площадок по статусу.
    pub status: Option<FacilityStatus>,
    pub page: u32,
    pub page_size: Option<u32>,
}

impl CatalogQuery {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    fn matches_text(&self, name: &str, description: Option<&str>) -> bool {
        let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();
        name.to_lowercase().contains(&term)
            || description.is_some_and(|d| d.to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.page_size as usize)
    }

    fn slice(items: Vec<T>, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let total = items.len();
        let skip = (page as usize - 1).saturating_mul(page_size as usize);
        let items = items.into_iter().skip(skip).take(page_size as usize).collect();
        Page { items, page, page_size, total }
    }
}

pub struct ResourceCatalog {
    cache: CacheService,
    capacity: CapacityModel,
    default_page_size: u32,
}

impl ResourceCatalog {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        gateway: Arc<dyn BookingGateway>,
        capacity: CapacityModel,
        ttl: Duration,
    ) -> Self {
        Self {
            cache: CacheService::new(source, gateway, ttl),
            capacity,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// События по дате, затем по имени. Прошедшие скрыты по умолчанию.
    pub async fn events(&self, query: &CatalogQuery) -> Result<Page<EventResource>, CatalogError> {
        let today = self.capacity.clock().today();
        let mut events: Vec<EventResource> = self
            .cache
            .get_events()
            .await?
            .into_iter()
            .filter(|e| query.include_past || e.is_bookable_on(today))
            .filter(|e| query.date.map_or(true, |date| e.date == date))
            .filter(|e| query.matches_text(&e.name, e.description.as_deref()))
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));

        Ok(Page::slice(events, query.page, query.page_size.unwrap_or(self.default_page_size)))
    }

    pub async fn facilities(
        &self,
        query: &CatalogQuery,
    ) -> Result<Page<FacilityResource>, CatalogError> {
        let mut facilities: Vec<FacilityResource> = self
            .cache
            .get_facilities()
            .await?
            .into_iter()
            .filter(|f| query.status.map_or(true, |status| f.status == status))
            .filter(|f| query.matches_text(&f.name, f.description.as_deref()))
            .collect();
        facilities.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Page::slice(facilities, query.page, query.page_size.unwrap_or(self.default_page_size)))
    }

    pub async fn snapshot(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
    ) -> Result<ResourceSnapshot, BookingError> {
        self.cache.get_snapshot(resource, date).await
    }

    /// Доступность для карточки каталога.
    pub async fn availability(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
    ) -> Result<DisplayAvailability, CatalogError> {
        let availability = match self.snapshot(resource, date).await? {
            ResourceSnapshot::Event { resource, registrations } => DisplayAvailability::Event(
                CapacityModel::compute_event_availability(&resource, &registrations)?,
            ),
            ResourceSnapshot::Facility { resource, date, reservations } => {
                DisplayAvailability::Facility(
                    self.capacity.compute_facility_slots(&resource, &reservations, date)?,
                )
            }
        };
        Ok(availability)
    }

    /// После коммита: снимки ресурса больше не верны.
    pub async fn invalidate(&self, resource: ResourceRef) {
        self.cache.invalidate_resource(resource).await;
    }

    pub async fn invalidate_all(&self) {
        self.cache.clear().await;
    }

    /// Сбросить кеш и сразу перечитать списки.
    pub async fn refresh(&self) -> Result<(), BookingError> {
        self.cache.clear().await;
        let events = self.cache.get_events().await?;
        let facilities = self.cache.get_facilities().await?;
        info!("Catalog refreshed: {} events, {} facilities", events.len(), facilities.len());
        Ok(())
    }

    /// Периодическое обновление. Тик пропускается, пока открыта сессия
    /// бронирования. Задача снимается при drop хэндла.
    pub fn spawn_auto_refresh(
        self: &Arc<Self>,
        period: Duration,
        registry: SessionRegistry,
    ) -> RefreshHandle {
        let catalog = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if registry.is_busy() {
                    debug!("Booking session in progress, skipping catalog refresh");
                    continue;
                }
                if let Err(e) = catalog.refresh().await {
                    warn!("Periodic catalog refresh failed: {}", e);
                }
            }
        });
        RefreshHandle { handle }
    }
}

pub struct RefreshHandle {
    handle: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
