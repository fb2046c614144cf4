//! Yandex Disk API response types

use serde::{Deserialize, Serialize};

/// `GET /v1/disk/resources/files` response
///
/// See: https://yandex.com/dev/disk-api/doc/en/reference/all-files
#[derive(Debug, Deserialize)]
pub struct FilesResult {
    pub items: Vec<YandexFile>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YandexFile {
    pub resource_id: String,
    pub name: String,
    /// Path with the `disk:` scheme prefix, e.g. `disk:/Music/a.mp3`
    pub path: String,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// `GET /v1/disk/resources/download` response
#[derive(Debug, Deserialize)]
pub struct DownloadLink {
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenForm<'a> {
    pub grant_type: &'static str,
    pub refresh_token: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Error body of the disk API, e.g. `{"error": "UnauthorizedError", ...}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    #[serde(default)]
    pub description: Option<String>,
}
