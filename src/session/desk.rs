use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::{BookingIntent, BookingSession, SessionDeps, SessionError, SessionRegistry};
use crate::catalog::ResourceCatalog;
use crate::directory::MemberDirectory;
use crate::gateway::{BookingError, BookingGateway, ResourceSnapshot};
use crate::models::{Allocation, EventId, FacilityId, ResourceRef};
use crate::notify::{AuthExpiryHandler, NotificationSink, Severity};
use crate::services::capacity::CapacityModel;
use crate::services::member_finder::{MemberFinder, DEFAULT_DEBOUNCE};

/// Точка входа в бронирование: держит зависимости и реестр сессий.
#[derive(Clone)]
pub struct BookingDesk {
    gateway: Arc<dyn BookingGateway>,
    directory: Arc<dyn MemberDirectory>,
    notifier: Arc<dyn NotificationSink>,
    auth_expiry: Arc<dyn AuthExpiryHandler>,
    catalog: Option<Arc<ResourceCatalog>>,
    capacity: CapacityModel,
    registry: SessionRegistry,
    debounce: Duration,
}

impl BookingDesk {
    pub fn new(
        gateway: Arc<dyn BookingGateway>,
        directory: Arc<dyn MemberDirectory>,
        notifier: Arc<dyn NotificationSink>,
        auth_expiry: Arc<dyn AuthExpiryHandler>,
        capacity: CapacityModel,
    ) -> Self {
        Self {
            gateway,
            directory,
            notifier,
            auth_expiry,
            catalog: None,
            capacity,
            registry: SessionRegistry::new(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Каталог, который сбрасывается после коммитов.
    pub fn with_catalog(mut self, catalog: Arc<ResourceCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub async fn open_event_registration(
        &self,
        event_id: EventId,
    ) -> Result<BookingSession, SessionError> {
        self.open(ResourceRef::Event(event_id), None, BookingIntent::Create).await
    }

    pub async fn open_facility_reservation(
        &self,
        facility_id: FacilityId,
        date: NaiveDate,
    ) -> Result<BookingSession, SessionError> {
        self.open(ResourceRef::Facility(facility_id), Some(date), BookingIntent::Create).await
    }

    pub async fn open_update(&self, original: Allocation) -> Result<BookingSession, SessionError> {
        let date = self.allocation_date(&original);
        self.open(original.resource_ref(), date, BookingIntent::Update { original }).await
    }

    pub async fn open_cancel(&self, original: Allocation) -> Result<BookingSession, SessionError> {
        let date = self.allocation_date(&original);
        self.open(original.resource_ref(), date, BookingIntent::Cancel { original }).await
    }

    // Брони площадок живут в дне, на который приходится их начало.
    fn allocation_date(&self, allocation: &Allocation) -> Option<NaiveDate> {
        match allocation {
            Allocation::Registration(_) => None,
            Allocation::Reservation(r) => Some(self.capacity.clock().local_date(r.interval.start)),
        }
    }

    async fn open(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
        intent: BookingIntent,
    ) -> Result<BookingSession, SessionError> {
        let lease = self.registry.try_acquire()?;

        let snapshot = match self.gateway.fetch_resource_with_allocations(resource, date).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.report_open_failure(resource, &err);
                return Err(err.into());
            }
        };

        if !matches!(intent, BookingIntent::Cancel { .. }) {
            self.ensure_bookable(&snapshot)?;
        }

        let deps = SessionDeps {
            gateway: Arc::clone(&self.gateway),
            notifier: Arc::clone(&self.notifier),
            auth_expiry: Arc::clone(&self.auth_expiry),
            catalog: self.catalog.clone(),
            capacity: self.capacity,
        };
        let finder =
            MemberFinder::new(Arc::clone(&self.directory), Arc::clone(&self.notifier), self.debounce);

        BookingSession::start(deps, finder, lease, intent, snapshot)
    }

    fn ensure_bookable(&self, snapshot: &ResourceSnapshot) -> Result<(), SessionError> {
        match snapshot {
            ResourceSnapshot::Event { resource, .. } => {
                let today = self.capacity.clock().today();
                if !resource.is_bookable_on(today) {
                    info!("Event {} on {} is in the past", resource.id, resource.date);
                    return Err(SessionError::NotBookable(
                        snapshot.resource_ref(),
                        "event date has passed".to_string(),
                    ));
                }
            }
            ResourceSnapshot::Facility { resource, .. } => {
                if !resource.status.is_bookable() {
                    info!("Facility {} is {:?}", resource.id, resource.status);
                    return Err(SessionError::NotBookable(
                        snapshot.resource_ref(),
                        format!("facility is {:?}", resource.status).to_lowercase(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn report_open_failure(&self, resource: ResourceRef, err: &BookingError) {
        warn!("Failed to load {}: {}", resource, err);
        match err {
            BookingError::Unauthorized => self.auth_expiry.session_expired(),
            _ => self.notifier.toast(err.user_message(), Severity::Error),
        }
    }
}
