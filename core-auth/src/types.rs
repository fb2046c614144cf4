use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of the user owning provider links.
///
/// # Examples
///
/// ```
/// use core_auth::UserId;
///
/// let id = UserId::from_string("550e8400-e29b-41d4-a716-446655440000").unwrap();
/// assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Supported external storage providers.
///
/// ```
/// use core_auth::ProviderType;
///
/// assert_eq!(ProviderType::YandexDisk.as_str(), "yandex_disk");
/// assert_eq!(ProviderType::parse("Dropbox"), Some(ProviderType::Dropbox));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    Dropbox,
    YandexDisk,
}

impl ProviderType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderType::Dropbox => "Dropbox",
            ProviderType::YandexDisk => "Yandex Disk",
        }
    }

    /// Stable identifier used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Dropbox => "dropbox",
            ProviderType::YandexDisk => "yandex_disk",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dropbox" => Some(ProviderType::Dropbox),
            "yandex_disk" | "yandexdisk" | "yandex" => Some(ProviderType::YandexDisk),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| AuthError::InvalidProvider(s.to_string()))
    }
}

/// Opaque access token bytes.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Vec<u8>);

/// Opaque refresh token bytes.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(Vec<u8>);

macro_rules! opaque_token {
    ($ty:ident, $kind:literal) => {
        impl $ty {
            pub fn new(value: impl Into<Vec<u8>>) -> Self {
                Self(value.into())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Token as text, for use in HTTP headers and form bodies.
            pub fn as_str(&self) -> Result<&str> {
                std::str::from_utf8(&self.0).map_err(|e| AuthError::MalformedToken {
                    kind: $kind,
                    reason: e.to_string(),
                })
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value.into_bytes())
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.as_bytes().to_vec())
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "([REDACTED])"))
            }
        }
    };
}

opaque_token!(AccessToken, "access token");
opaque_token!(RefreshToken, "refresh token");

/// A freshly issued access token as returned by a provider token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: AccessToken,
    pub expires_in_seconds: i64,
}

impl RefreshedToken {
    pub fn new(access_token: AccessToken, expires_in_seconds: i64) -> Self {
        Self {
            access_token,
            expires_in_seconds,
        }
    }

    /// Absolute expiry relative to `now`.
    ///
    /// Fails with `InvalidExpiry` for a negative lifetime or one that does
    /// not fit the calendar.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let invalid = || AuthError::InvalidExpiry(self.expires_in_seconds);
        if self.expires_in_seconds < 0 {
            return Err(invalid());
        }
        Duration::try_seconds(self.expires_in_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(invalid)
    }
}
