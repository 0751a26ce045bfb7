pub mod api_client;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod gateway;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod models;
pub mod notify;
pub mod services;
pub mod session;

use std::sync::Arc;
use thiserror::Error;
use tokio::task;

use crate::api_client::{ApiClient, ApiError};
use crate::catalog::{RefreshHandle, ResourceCatalog};
use crate::config::{Config, ConfigError};
use crate::directory::RestMemberDirectory;
use crate::gateway::RestBookingGateway;
use crate::notify::{LogAuthExpiry, TracingNotifier};
use crate::services::capacity::CapacityModel;
use crate::session::{BookingDesk, SessionRegistry};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

// Общее состояние консоли
#[derive(Clone)]
pub struct BookingContext {
    pub config: Config,
    pub capacity: CapacityModel,
    pub catalog: Arc<ResourceCatalog>,
    pub desk: BookingDesk,
    pub registry: SessionRegistry,
}

impl BookingContext {
    pub fn new(config: Config) -> Result<Self, ContextError> {
        let api = ApiClient::from_config(&config.api)?;
        let capacity = CapacityModel::new(config.booking.local_clock()?);

        let gateway = Arc::new(RestBookingGateway::new(api.clone()));
        let directory = Arc::new(RestMemberDirectory::new(api));
        let notifier = Arc::new(TracingNotifier);
        let registry = SessionRegistry::new();

        let catalog = Arc::new(
            ResourceCatalog::new(
                gateway.clone(),
                gateway.clone(),
                capacity,
                config.booking.catalog_refresh_interval(),
            )
            .with_page_size(config.booking.page_size),
        );
        let desk = BookingDesk::new(gateway, directory, notifier, Arc::new(LogAuthExpiry), capacity)
            .with_catalog(Arc::clone(&catalog))
            .with_registry(registry.clone())
            .with_debounce(config.booking.search_debounce());

        Ok(Self { config, capacity, catalog, desk, registry })
    }

    /// Прогрев кеша в фоне и периодическое обновление каталога.
    pub fn start_background(&self) -> RefreshHandle {
        let catalog = Arc::clone(&self.catalog);
        task::spawn(async move {
            catalog.cache().warmup_cache().await;
        });

        self.catalog
            .spawn_auto_refresh(self.config.booking.catalog_refresh_interval(), self.registry.clone())
    }
}
