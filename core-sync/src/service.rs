//! # Provider Service
//!
//! Lifecycle of provider links (add, sync, remove) and playable URL
//! resolution with transparent token refresh.
//!
//! ## Consistency
//!
//! - Adapter calls run before any transaction is opened, so a failed or
//!   timed-out listing writes nothing.
//! - Catalog changes and the `updated_at` bump of a sync commit together.
//!   The link row is locked first, and the catalog is re-read under that lock
//!   before diffing.
//! - Token refreshes for one link are serialized in-process; a caller that
//!   waited on another caller's refresh reuses its token.
//!
//! ## Usage
//!
//! ```ignore
//! let service = ProviderService::new(links, entries, uow, registry, clock, events, timeout);
//!
//! let link = service
//!     .add_provider_link(
//!         ProviderType::Dropbox,
//!         user_id,
//!         "My Dropbox",
//!         AccessToken::from(access),
//!         RefreshToken::from(refresh),
//!         "2024-06-01T12:00:00Z",
//!     )
//!     .await?;
//!
//! let url = service.resolve_file_url(link.catalog()[0].id, user_id).await?;
//! ```

use crate::adapter::{AdapterRegistry, AdapterResult, ProviderAdapter};
use crate::error::{Result, SyncError};
use crate::reconciler::reconcile;
use bridge_traits::Clock;
use chrono::{DateTime, Utc};
use core_auth::{AccessToken, ProviderType, RefreshLocks, RefreshToken, UserId};
use core_library::{
    CatalogEntry, CatalogEntryId, CatalogEntryRepository, CatalogTransaction, LibraryError,
    LoadOptions, ProviderLink, ProviderLinkId, ProviderLinkRepository, UnitOfWork, UpdateScope,
};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, ProviderEvent};
use core_runtime::logging::strip_path;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Orchestrates provider links, their catalogs and token renewal.
pub struct ProviderService {
    links: Arc<dyn ProviderLinkRepository>,
    entries: Arc<dyn CatalogEntryRepository>,
    unit_of_work: Arc<dyn UnitOfWork>,
    adapters: AdapterRegistry,
    clock: Arc<dyn Clock>,
    events: EventBus,
    operation_timeout: Duration,
    refresh_locks: RefreshLocks<ProviderLinkId>,
}

impl ProviderService {
    pub fn new(
        links: Arc<dyn ProviderLinkRepository>,
        entries: Arc<dyn CatalogEntryRepository>,
        unit_of_work: Arc<dyn UnitOfWork>,
        adapters: AdapterRegistry,
        clock: Arc<dyn Clock>,
        events: EventBus,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            links,
            entries,
            unit_of_work,
            adapters,
            clock,
            events,
            operation_timeout,
            refresh_locks: RefreshLocks::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// All links of a user, without their catalogs.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_all_providers_by_user_id(&self, user_id: UserId) -> Result<Vec<ProviderLink>> {
        Ok(self.links.find_all_by_user(user_id).await?)
    }

    /// A link with its catalog, or `None` if it does not exist.
    ///
    /// # Errors
    /// `NotOwner` if the link belongs to another user.
    #[instrument(skip(self), fields(link_id = %provider_id, user_id = %user_id))]
    pub async fn get_provider_link(
        &self,
        provider_id: ProviderLinkId,
        user_id: UserId,
    ) -> Result<Option<ProviderLink>> {
        let link = self
            .links
            .find_by_id(provider_id, LoadOptions::with_catalog())
            .await?;

        match link {
            Some(link) if link.user_id != user_id => {
                Err(SyncError::not_owner("provider_link", provider_id))
            }
            other => Ok(other),
        }
    }

    /// Create a link from already-issued tokens and index its files.
    ///
    /// `expires_at` is an RFC 3339 timestamp. Nothing is written unless the
    /// listing succeeds and the link and every entry commit together.
    #[instrument(
        skip(self, access_token, refresh_token),
        fields(provider = %provider_type, user_id = %user_id)
    )]
    pub async fn add_provider_link(
        &self,
        provider_type: ProviderType,
        user_id: UserId,
        name: &str,
        access_token: AccessToken,
        refresh_token: RefreshToken,
        expires_at: &str,
    ) -> Result<ProviderLink> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::Validation(
                "Provider link name cannot be empty".to_string(),
            ));
        }
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(SyncError::Validation(
                "Access and refresh tokens must be provided".to_string(),
            ));
        }
        let expires_at = parse_expires_at(expires_at)?;

        if self
            .links
            .find_by_type_and_name(user_id, provider_type, name)
            .await?
            .is_some()
        {
            return Err(SyncError::Validation(format!(
                "A {} link named '{}' already exists",
                provider_type, name
            )));
        }

        let adapter = self.adapter_for(provider_type)?;
        let mut link = ProviderLink::new(
            user_id,
            provider_type,
            name,
            access_token,
            refresh_token,
            expires_at,
            self.clock.now(),
        );

        let files = self
            .call_adapter("list_files", provider_type, adapter.list_files(&link))
            .await?;

        // Collapse repeated ids the same way a sync would.
        let entries: Vec<CatalogEntry> = reconcile(&[], files)
            .to_add
            .into_iter()
            .map(|file| file.into_entry(link.id))
            .collect();

        let mut tx = self.unit_of_work.begin().await.map_err(SyncError::commit)?;
        let staged = async {
            tx.insert_link(&link).await.map_err(|e| match e {
                LibraryError::Duplicate { .. } => SyncError::Validation(format!(
                    "A {} link named '{}' already exists",
                    provider_type, name
                )),
                other => SyncError::commit(other),
            })?;
            tx.insert_entries(&entries).await.map_err(SyncError::commit)
        }
        .await;
        if let Err(e) = staged {
            self.abandon(tx).await;
            return Err(e);
        }
        tx.commit().await.map_err(SyncError::commit)?;

        info!(link_id = %link.id, entries = entries.len(), "Provider link added");
        self.emit(CoreEvent::Provider(ProviderEvent::LinkAdded {
            link_id: link.id.to_string(),
            provider: provider_type.as_str().to_string(),
            entries: entries.len(),
        }));

        link.catalog = Some(entries);
        Ok(link)
    }

    /// Re-list the provider and reconcile the stored catalog with it.
    #[instrument(skip(self), fields(link_id = %provider_id, user_id = %user_id))]
    pub async fn update_provider_link(
        &self,
        provider_id: ProviderLinkId,
        user_id: UserId,
    ) -> Result<ProviderLink> {
        let link = self
            .links
            .find_by_id(provider_id, LoadOptions::with_catalog())
            .await?
            .ok_or_else(|| SyncError::not_found("provider_link", provider_id))?;

        if link.user_id != user_id {
            return Err(SyncError::not_owner("provider_link", provider_id));
        }

        let adapter = self.adapter_for(link.provider_type)?;
        let files = self
            .call_adapter("list_files", link.provider_type, adapter.list_files(&link))
            .await?;

        let mut tx = self.unit_of_work.begin().await.map_err(SyncError::commit)?;
        let staged = async {
            let mut locked = tx
                .lock_link(provider_id)
                .await
                .map_err(SyncError::commit)?
                .ok_or_else(|| SyncError::not_found("provider_link", provider_id))?;

            let stored = locked.catalog.take().unwrap_or_default();
            let changes = reconcile(&stored, files);
            let removed_ids: Vec<CatalogEntryId> =
                changes.to_remove.iter().map(|e| e.id).collect();
            let added: Vec<CatalogEntry> = changes
                .to_add
                .into_iter()
                .map(|file| file.into_entry(provider_id))
                .collect();

            tx.delete_entries(&removed_ids)
                .await
                .map_err(SyncError::commit)?;
            tx.insert_entries(&added).await.map_err(SyncError::commit)?;

            locked.touch(self.clock.now());
            tx.update_link(&locked, UpdateScope::Full)
                .await
                .map_err(SyncError::commit)?;
            Ok::<_, SyncError>((locked, stored, removed_ids, added))
        }
        .await;
        let (mut locked, stored, removed_ids, added) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                self.abandon(tx).await;
                return Err(e);
            }
        };
        tx.commit().await.map_err(SyncError::commit)?;

        info!(
            added = added.len(),
            removed = removed_ids.len(),
            "Provider catalog synchronized"
        );
        self.emit(CoreEvent::Provider(ProviderEvent::CatalogSynced {
            link_id: provider_id.to_string(),
            added: added.len(),
            removed: removed_ids.len(),
        }));

        let removed: HashSet<CatalogEntryId> = removed_ids.into_iter().collect();
        let mut catalog: Vec<CatalogEntry> = stored
            .into_iter()
            .filter(|entry| !removed.contains(&entry.id))
            .collect();
        catalog.extend(added);
        locked.catalog = Some(catalog);

        Ok(locked)
    }

    /// Delete a link owned by `user_id` together with its catalog.
    ///
    /// # Errors
    /// `NotFound` when the link is absent or owned by someone else.
    #[instrument(skip(self), fields(link_id = %provider_id, user_id = %user_id))]
    pub async fn remove_provider_link(
        &self,
        provider_id: ProviderLinkId,
        user_id: UserId,
    ) -> Result<()> {
        let deleted = self
            .links
            .delete_by_id_and_owner(provider_id, user_id)
            .await
            .map_err(SyncError::commit)?;

        if !deleted {
            return Err(SyncError::not_found("provider_link", provider_id));
        }

        info!("Provider link removed");
        self.emit(CoreEvent::Provider(ProviderEvent::LinkRemoved {
            link_id: provider_id.to_string(),
        }));
        Ok(())
    }

    /// Playable URL for a catalog entry, refreshing an expired access token
    /// first.
    ///
    /// A refreshed token is persisted before the URL is requested; if that
    /// write fails the call fails with `Commit`.
    #[instrument(skip(self), fields(entry_id = %file_id, user_id = %user_id))]
    pub async fn resolve_file_url(
        &self,
        file_id: CatalogEntryId,
        user_id: UserId,
    ) -> Result<String> {
        let entry = self
            .entries
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| SyncError::not_found("catalog_entry", file_id))?;

        let link = self
            .links
            .find_by_id(entry.provider_link_id, LoadOptions::default())
            .await?
            .ok_or_else(|| SyncError::not_found("provider_link", entry.provider_link_id))?;

        if link.user_id != user_id {
            return Err(SyncError::not_owner("catalog_entry", file_id));
        }

        let adapter = self.adapter_for(link.provider_type)?;

        let link = if link.access_token_expired(self.clock.now()) {
            self.refresh_access_token(link, adapter.as_ref()).await?
        } else {
            link
        };

        debug!(file = %strip_path(&entry.path), "Resolving playable URL");
        self.call_adapter(
            "resolve_url",
            link.provider_type,
            adapter.resolve_url(&entry, &link),
        )
        .await
    }

    async fn refresh_access_token(
        &self,
        link: ProviderLink,
        adapter: &dyn ProviderAdapter,
    ) -> Result<ProviderLink> {
        let _guard = self.refresh_locks.acquire(link.id).await;

        let mut current = self
            .links
            .find_by_id(link.id, LoadOptions::default())
            .await?
            .ok_or_else(|| SyncError::not_found("provider_link", link.id))?;

        let now = self.clock.now();
        if !current.access_token_expired(now) {
            debug!(link_id = %link.id, "Access token already refreshed");
            return Ok(current);
        }

        info!(link_id = %link.id, "Access token expired, refreshing");
        let provider = current.provider_type;
        let refreshed = self
            .call_adapter(
                "refresh_access_token",
                provider,
                adapter.refresh_access_token(&current.refresh_token),
            )
            .await
            .and_then(|refreshed| {
                current
                    .apply_refresh(refreshed, now)
                    .map_err(|e| SyncError::AdapterAuth {
                        provider,
                        message: e.to_string(),
                    })
            });
        if let Err(e) = refreshed {
            warn!(link_id = %link.id, error = %e, "Access token refresh failed");
            self.emit(CoreEvent::Auth(AuthEvent::TokenRefreshFailed {
                link_id: link.id.to_string(),
                message: e.to_string(),
            }));
            return Err(e);
        }

        self.links
            .update(&current, UpdateScope::TokenOnly)
            .await
            .map_err(SyncError::commit)?;

        self.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
            link_id: link.id.to_string(),
            expires_at: current.expires_at.timestamp(),
        }));
        Ok(current)
    }

    /// Roll back a transaction whose staging failed. The staging error is
    /// what the caller sees; a rollback failure is only logged.
    async fn abandon(&self, tx: Box<dyn CatalogTransaction>) {
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "Rollback failed");
        }
    }

    fn adapter_for(&self, provider_type: ProviderType) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(provider_type)
            .ok_or(SyncError::NoAdapterFound(provider_type))
    }

    async fn call_adapter<T>(
        &self,
        operation: &str,
        provider: ProviderType,
        call: impl Future<Output = AdapterResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result.map_err(|e| SyncError::from_adapter(provider, e)),
            Err(_) => {
                warn!(
                    operation,
                    provider = %provider,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "Adapter call timed out"
                );
                Err(SyncError::Timeout {
                    operation: operation.to_string(),
                })
            }
        }
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is not an error for the operation.
        let _ = self.events.emit(event);
    }
}

fn parse_expires_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| SyncError::Validation(format!("Invalid expires_at '{}': {}", raw, e)))
}
