//! Dropbox API request and response types
//!
//! Only the fields the connector reads are modelled; unknown fields are
//! ignored.

use serde::{Deserialize, Serialize};

/// `files/list_folder` arguments
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    /// Folder to list; the empty string is the account root
    pub path: &'a str,
    pub recursive: bool,
    pub limit: u32,
}

/// `files/list_folder/continue` arguments
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// Page returned by `list_folder` and `list_folder/continue`
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// A listed item, discriminated by its `.tag` field.
#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum Metadata {
    File(FileMetadata),
    /// Folders and deleted entries
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    /// Stable id of the form `id:...`
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// `files/get_temporary_link` arguments
#[derive(Debug, Serialize)]
pub struct TemporaryLinkArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TemporaryLinkResult {
    pub link: String,
}

/// Form body of the refresh-token grant
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
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// OAuth error body, e.g. `{"error": "invalid_grant"}`
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// API error body of the `/2/` endpoints
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error_summary: String,
}
