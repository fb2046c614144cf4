//! Core service façade and bootstrap helpers.
//!
//! Wires a validated [`CoreConfig`] into a running [`ProviderService`]:
//! SQLite pool and migrations, repositories, the adapters for every
//! configured provider application, and the event bus. Desktop hosts enable
//! the `desktop-shims` feature to get the reqwest-based HTTP client by
//! default; other hosts inject their own through the config builder.

pub mod error;

pub use error::{CoreError, Result};

pub use core_auth::{AccessToken, ProviderType, RefreshToken, UserId};
pub use core_library::{CatalogEntry, CatalogEntryId, ProviderLink, ProviderLinkId};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, DropboxSettings, YandexDiskSettings};
pub use core_runtime::events::{AuthEvent, CoreEvent, EventBus, EventStream, ProviderEvent};
pub use core_sync::{ProviderService, SyncError};

use core_library::db::{create_pool, DatabaseConfig};
use core_library::{SqliteCatalogEntryRepository, SqliteProviderLinkRepository, SqliteUnitOfWork};
use core_sync::AdapterRegistry;
use provider_dropbox::DropboxConnector;
use provider_yandex_disk::YandexDiskConnector;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Database path that selects a private in-memory catalog.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    providers: Arc<ProviderService>,
    pool: SqlitePool,
}

impl CoreService {
    pub fn providers(&self) -> &ProviderService {
        &self.providers
    }

    /// Shared handle for callers that move work onto other tasks.
    pub fn provider_service(&self) -> Arc<ProviderService> {
        Arc::clone(&self.providers)
    }

    pub fn events(&self) -> &EventBus {
        self.providers.events()
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events().subscribe())
    }

    /// Close the connection pool. Pending queries finish first.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("Core service shut down");
    }
}

/// Adapters for every provider application present in `config`.
pub fn build_adapter_registry(config: &CoreConfig) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    if let Some(dropbox) = &config.dropbox {
        registry.register(Arc::new(DropboxConnector::new(
            Arc::clone(&config.http_client),
            dropbox.clone(),
        )));
    }

    if let Some(yandex) = &config.yandex_disk {
        registry.register(Arc::new(YandexDiskConnector::new(
            Arc::clone(&config.http_client),
            yandex.clone(),
        )));
    }

    registry
}

fn database_config(path: &Path) -> DatabaseConfig {
    if path == Path::new(IN_MEMORY_DATABASE) {
        DatabaseConfig::in_memory()
    } else {
        DatabaseConfig::new(path)
    }
}

/// Build the provider service described by `config`.
///
/// ```ignore
/// let config = CoreConfig::builder()
///     .database_path("providers.db")
///     .dropbox(DropboxSettings::new(app_key, app_secret))
///     .build()?;
/// let core = core_service::bootstrap(config).await?;
/// let links = core.providers().get_all_providers_by_user_id(user_id).await?;
/// ```
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    config.validate()?;

    let pool = create_pool(database_config(&config.database_path)).await?;
    let registry = build_adapter_registry(&config);
    info!(providers = ?registry.providers(), "Provider adapters ready");

    let service = ProviderService::new(
        Arc::new(SqliteProviderLinkRepository::new(pool.clone())),
        Arc::new(SqliteCatalogEntryRepository::new(pool.clone())),
        Arc::new(SqliteUnitOfWork::new(pool.clone())),
        registry,
        Arc::clone(&config.clock),
        EventBus::new(config.event_buffer_size),
        config.operation_timeout,
    );

    Ok(CoreService {
        providers: Arc::new(service),
        pool,
    })
}
