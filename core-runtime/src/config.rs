//! # Core Configuration Module
//!
//! The configuration system uses a builder to construct a [`CoreConfig`]
//! holding every dependency and setting the provider engine needs. `build()`
//! validates eagerly so a misconfigured host fails at startup rather than on
//! the first request.
//!
//! ## Required
//!
//! - `database_path` - SQLite file holding provider links and the catalog
//! - at least one provider application (Dropbox and/or Yandex Disk)
//!
//! ## Optional (with defaults)
//!
//! - `HttpClient` - desktop default: `bridge_desktop::ReqwestHttpClient`
//!   (requires the `desktop-shims` feature)
//! - `Clock` - defaults to [`SystemClock`]
//! - `operation_timeout` - 30 seconds
//! - `event_buffer_size` - 100
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, YandexDiskSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/cloud-music/providers.db")
//!     .yandex_disk(YandexDiskSettings::new("client-id", "client-secret"))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SystemClock};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout applied to each remote adapter call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

const MIN_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_OPERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Dropbox application credentials used for token refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct DropboxSettings {
    pub app_key: String,
    pub app_secret: String,
}

impl DropboxSettings {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.app_key.trim().is_empty() || self.app_secret.trim().is_empty() {
            return Err(Error::Config(
                "Dropbox app_key and app_secret must both be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for DropboxSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxSettings")
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

/// Yandex OAuth application credentials used for token refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct YandexDiskSettings {
    pub client_id: String,
    pub client_secret: String,
}

impl YandexDiskSettings {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "Yandex Disk client_id and client_secret must both be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for YandexDiskSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YandexDiskSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Core configuration for the provider engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// HTTP client shared by all provider adapters
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for token expiry and sync timestamps
    pub clock: Arc<dyn Clock>,

    /// Upper bound for each remote adapter call
    pub operation_timeout: Duration,

    /// Dropbox application, if Dropbox links are supported
    pub dropbox: Option<DropboxSettings>,

    /// Yandex application, if Yandex Disk links are supported
    pub yandex_disk: Option<YandexDiskSettings>,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("operation_timeout", &self.operation_timeout)
            .field("dropbox", &self.dropbox)
            .field("yandex_disk", &self.yandex_disk)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Operation timeout is within 1s..=600s
    /// - At least one provider application is configured, with non-empty credentials
    /// - Event buffer is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.operation_timeout < MIN_OPERATION_TIMEOUT
            || self.operation_timeout > MAX_OPERATION_TIMEOUT
        {
            return Err(Error::Config(format!(
                "Operation timeout must be between {}s and {}s, got {:?}",
                MIN_OPERATION_TIMEOUT.as_secs(),
                MAX_OPERATION_TIMEOUT.as_secs(),
                self.operation_timeout
            )));
        }

        if self.dropbox.is_none() && self.yandex_disk.is_none() {
            return Err(Error::Config(
                "No provider application configured. \
                 Provide Dropbox and/or Yandex Disk credentials."
                    .to_string(),
            ));
        }

        if let Some(dropbox) = &self.dropbox {
            dropbox.validate()?;
        }

        if let Some(yandex) = &self.yandex_disk {
            yandex.validate()?;
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Default reqwest client could not be created: {}", e),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach provider APIs. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Otherwise inject an implementation with CoreConfigBuilder::http_client."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    operation_timeout: Option<Duration>,
    dropbox: Option<DropboxSettings>,
    yandex_disk: Option<YandexDiskSettings>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().database_path("/path/to/providers.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based client is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the time source. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn dropbox(mut self, settings: DropboxSettings) -> Self {
        self.dropbox = Some(settings);
        self
    }

    pub fn yandex_disk(mut self, settings: YandexDiskSettings) -> Self {
        self.yandex_disk = Some(settings);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when a required field is missing or invalid
    /// - [`Error::CapabilityMissing`] when no `HttpClient` is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Call database_path() first.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            database_path,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            operation_timeout: self.operation_timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT),
            dropbox: self.dropbox,
            yandex_disk: self.yandex_disk,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unimplemented!("not used in config tests")
        }
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .database_path("/tmp/providers.db")
            .http_client(Arc::new(NoopHttpClient))
            .dropbox(DropboxSettings::new("key", "secret"))
    }

    #[test]
    fn test_builder_with_required_fields() {
        let config = base_builder().build().unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/providers.db"));
        assert_eq!(config.operation_timeout, DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.yandex_disk.is_none());
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(NoopHttpClient))
            .dropbox(DropboxSettings::new("key", "secret"))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Database path")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_a_provider() {
        let result = CoreConfig::builder()
            .database_path("/tmp/providers.db")
            .http_client(Arc::new(NoopHttpClient))
            .build();

        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("No provider")));
    }

    #[test]
    fn test_blank_provider_credentials_rejected() {
        let result = base_builder()
            .yandex_disk(YandexDiskSettings::new("client", "  "))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_operation_timeout_bounds() {
        assert!(base_builder()
            .operation_timeout(Duration::from_millis(10))
            .build()
            .is_err());
        assert!(base_builder()
            .operation_timeout(Duration::from_secs(3600))
            .build()
            .is_err());
        assert!(base_builder()
            .operation_timeout(Duration::from_secs(5))
            .build()
            .is_ok());
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        assert!(base_builder().event_buffer_size(0).build().is_err());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_without_shims() {
        let result = CoreConfig::builder()
            .database_path("/tmp/providers.db")
            .dropbox(DropboxSettings::new("key", "secret"))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = base_builder()
            .yandex_disk(YandexDiskSettings::new("client", "very-secret"))
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
