//! Domain models for provider links and their file catalog
//!
//! Rows are read through `*Row` structs that mirror the table layout and are
//! converted into the domain types with `TryFrom`, which is where stored
//! text and integers get parsed back into ids, enums and timestamps.

use crate::error::{LibraryError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use core_auth::{AccessToken, AuthError, ProviderType, RefreshToken, RefreshedToken, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a provider link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderLinkId(pub Uuid);

impl ProviderLinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ProviderLinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProviderLinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntryId(pub Uuid);

impl CatalogEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CatalogEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CatalogEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Audio Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioType {
    Flac,
    Mp3,
    Unknown,
}

impl AudioType {
    /// Infer the audio type from a file path suffix, ignoring case.
    ///
    /// ```
    /// use core_library::models::AudioType;
    ///
    /// assert_eq!(AudioType::from_path("/Music/a.FLAC"), AudioType::Flac);
    /// assert_eq!(AudioType::from_path("disk:/b.mp3"), AudioType::Mp3);
    /// assert_eq!(AudioType::from_path("/c.ogg"), AudioType::Unknown);
    /// ```
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with("flac") {
            AudioType::Flac
        } else if lower.ends_with("mp3") {
            AudioType::Mp3
        } else {
            AudioType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioType::Flac => "flac",
            AudioType::Mp3 => "mp3",
            AudioType::Unknown => "unknown",
        }
    }

    /// Parse the stored form. Unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "flac" => AudioType::Flac,
            "mp3" => AudioType::Mp3,
            _ => AudioType::Unknown,
        }
    }
}

impl fmt::Display for AudioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Provider Link
// =============================================================================

/// A user's connection to one external storage provider.
///
/// `catalog` is `None` unless the link was loaded with its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLink {
    pub id: ProviderLinkId,
    pub user_id: UserId,
    pub provider_type: ProviderType,
    pub name: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: RefreshToken,
    pub catalog: Option<Vec<CatalogEntry>>,
}

impl ProviderLink {
    /// Create a new link stamped with `now` and an empty catalog.
    ///
    /// Timestamps are cut to whole seconds, the precision they are stored at.
    pub fn new(
        user_id: UserId,
        provider_type: ProviderType,
        name: impl Into<String>,
        access_token: AccessToken,
        refresh_token: RefreshToken,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProviderLinkId::new(),
            user_id,
            provider_type,
            name: name.into(),
            added_at: now.trunc_subsecs(0),
            updated_at: now.trunc_subsecs(0),
            access_token,
            expires_at: expires_at.trunc_subsecs(0),
            refresh_token,
            catalog: Some(Vec::new()),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Provider link name cannot be empty".to_string());
        }

        if self.access_token.is_empty() {
            return Err("Access token cannot be empty".to_string());
        }

        if self.refresh_token.is_empty() {
            return Err("Refresh token cannot be empty".to_string());
        }

        if self.updated_at < self.added_at {
            return Err("updated_at cannot precede added_at".to_string());
        }

        Ok(())
    }

    /// Strictly past expiry; a token expiring exactly at `now` is still used.
    pub fn access_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Replace the access token with a refreshed one issued at `now`.
    ///
    /// The link is left untouched when the token's lifetime is out of range.
    pub fn apply_refresh(
        &mut self,
        refreshed: RefreshedToken,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), AuthError> {
        self.expires_at = refreshed.expires_at(now)?.trunc_subsecs(0);
        self.access_token = refreshed.access_token;
        Ok(())
    }

    /// Mark the link as synced at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.trunc_subsecs(0);
    }

    /// Loaded catalog entries, or an empty slice when not loaded.
    pub fn catalog(&self) -> &[CatalogEntry] {
        self.catalog.as_deref().unwrap_or(&[])
    }

    /// The same link without its catalog.
    pub fn without_catalog(mut self) -> Self {
        self.catalog = None;
        self
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ProviderLinkRow {
    pub id: String,
    pub user_id: String,
    pub provider_type: String,
    pub name: String,
    pub added_at: i64,
    pub updated_at: i64,
    pub access_token: Vec<u8>,
    pub expires_at: i64,
    pub refresh_token: Vec<u8>,
}

impl TryFrom<ProviderLinkRow> for ProviderLink {
    type Error = LibraryError;

    fn try_from(row: ProviderLinkRow) -> Result<Self> {
        Ok(Self {
            id: ProviderLinkId::from_string(&row.id).map_err(|e| invalid("id", e))?,
            user_id: UserId::from_string(&row.user_id).map_err(|e| invalid("user_id", e))?,
            provider_type: row
                .provider_type
                .parse::<ProviderType>()
                .map_err(|e| invalid("provider_type", e))?,
            name: row.name,
            added_at: from_unix("added_at", row.added_at)?,
            updated_at: from_unix("updated_at", row.updated_at)?,
            access_token: AccessToken::new(row.access_token),
            expires_at: from_unix("expires_at", row.expires_at)?,
            refresh_token: RefreshToken::new(row.refresh_token),
            catalog: None,
        })
    }
}

// =============================================================================
// Catalog Entry
// =============================================================================

/// An audio file indexed from a provider link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CatalogEntryId,
    pub provider_link_id: ProviderLinkId,
    /// Provider-assigned id, stable across renames and moves
    pub file_id: String,
    pub hash: Option<String>,
    pub name: String,
    pub path: String,
    pub audio_type: AudioType,
    /// Size in bytes
    pub size: i64,
}

impl CatalogEntry {
    pub fn new(
        provider_link_id: ProviderLinkId,
        file_id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        hash: Option<String>,
        size: i64,
    ) -> Self {
        let path = path.into();
        Self {
            id: CatalogEntryId::new(),
            provider_link_id,
            file_id: file_id.into(),
            hash,
            name: name.into(),
            audio_type: AudioType::from_path(&path),
            path,
            size,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.file_id.is_empty() {
            return Err("Catalog entry file_id cannot be empty".to_string());
        }

        if self.size < 0 {
            return Err(format!("Catalog entry size {} cannot be negative", self.size));
        }

        Ok(())
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CatalogEntryRow {
    pub id: String,
    pub provider_link_id: String,
    pub file_id: String,
    pub hash: Option<String>,
    pub name: String,
    pub path: String,
    pub audio_type: String,
    pub size: i64,
}

impl TryFrom<CatalogEntryRow> for CatalogEntry {
    type Error = LibraryError;

    fn try_from(row: CatalogEntryRow) -> Result<Self> {
        Ok(Self {
            id: CatalogEntryId::from_string(&row.id).map_err(|e| invalid("id", e))?,
            provider_link_id: ProviderLinkId::from_string(&row.provider_link_id)
                .map_err(|e| invalid("provider_link_id", e))?,
            file_id: row.file_id,
            hash: row.hash,
            name: row.name,
            path: row.path,
            audio_type: AudioType::parse(&row.audio_type),
            size: row.size,
        })
    }
}

fn invalid(field: &str, err: impl fmt::Display) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message: err.to_string(),
    }
}

fn from_unix(field: &str, secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| invalid(field, format!("timestamp {} out of range", secs)))
}
