//! Provider adapter capability interface and registry.

use async_trait::async_trait;
use core_auth::{ProviderType, RefreshToken, RefreshedToken};
use core_library::{CatalogEntry, ProviderLink, ProviderLinkId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Failure reported by a provider adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Transport or server failure; the same call may succeed later.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The provider rejected the token (expired, revoked or invalid).
    #[error("Authorization failure: {0}")]
    Auth(String),
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// A file as listed by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Provider-assigned id, stable across renames and moves
    pub file_id: String,
    pub name: String,
    pub path: String,
    pub hash: Option<String>,
    pub size: i64,
}

impl RemoteFile {
    pub fn into_entry(self, provider_link_id: ProviderLinkId) -> CatalogEntry {
        CatalogEntry::new(
            provider_link_id,
            self.file_id,
            self.name,
            self.path,
            self.hash,
            self.size,
        )
    }
}

/// Client for one external storage provider.
///
/// Implementations perform their own HTTP-level retries; callers do not
/// retry on top of them.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    fn can_handle(&self, provider_type: ProviderType) -> bool {
        self.provider_type() == provider_type
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    /// `AdapterError::Auth` when the refresh token is invalid or revoked.
    async fn refresh_access_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> AdapterResult<RefreshedToken>;

    /// List every audio file reachable with the link's access token.
    async fn list_files(&self, link: &ProviderLink) -> AdapterResult<Vec<RemoteFile>>;

    /// Produce a playable URL for `entry` using the link's access token.
    async fn resolve_url(&self, entry: &CatalogEntry, link: &ProviderLink) -> AdapterResult<String>;
}

/// Adapters keyed by the provider they serve. Built once at startup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderType, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own provider type, replacing any
    /// previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> &mut Self {
        let provider = adapter.provider_type();
        if self.adapters.insert(provider, adapter).is_some() {
            warn!(provider = %provider, "Replaced previously registered adapter");
        } else {
            info!(provider = %provider, "Registered provider adapter");
        }
        self
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adapter for `provider_type`, falling back to any adapter whose
    /// `can_handle` accepts it.
    pub fn get(&self, provider_type: ProviderType) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider_type)
            .or_else(|| {
                self.adapters
                    .values()
                    .find(|adapter| adapter.can_handle(provider_type))
            })
            .cloned()
    }

    pub fn providers(&self) -> Vec<ProviderType> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}
