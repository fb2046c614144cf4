//! Dropbox API connector implementation
//!
//! Implements the `ProviderAdapter` trait on top of the `/2/files` RPC
//! endpoints and the OAuth 2.0 token endpoint.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_auth::{AccessToken, ProviderType, RefreshToken, RefreshedToken};
use core_library::{AudioType, CatalogEntry, ProviderLink};
use core_runtime::config::DropboxSettings;
use core_runtime::logging::{redact_if_sensitive, strip_path};
use core_sync::{AdapterResult, ProviderAdapter, RemoteFile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{DropboxError, Result};
use crate::types::{
    ApiErrorResponse, FileMetadata, ListFolderArg, ListFolderContinueArg, ListFolderResult,
    Metadata, OAuthErrorResponse, RefreshTokenForm, TemporaryLinkArg, TemporaryLinkResult,
    TokenResponse,
};

/// Dropbox RPC endpoint base URL
const API_BASE: &str = "https://api.dropboxapi.com/2";

const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Maximum entries per `list_folder` page (Dropbox API limit)
const MAX_PAGE_SIZE: u32 = 2000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Dropbox API connector
///
/// Holds the application credentials; access tokens come from the link
/// passed to each call, so one connector serves every Dropbox link.
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxConnector;
/// use core_runtime::config::DropboxSettings;
///
/// let connector = DropboxConnector::new(http_client, DropboxSettings::new(key, secret));
/// let files = connector.list_files(&link).await?;
/// ```
pub struct DropboxConnector {
    http_client: Arc<dyn HttpClient>,
    settings: DropboxSettings,
    retry_policy: RetryPolicy,
}

impl DropboxConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, settings: DropboxSettings) -> Self {
        Self {
            http_client,
            settings,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn access_token(link: &ProviderLink) -> Result<&str> {
        link.access_token
            .as_str()
            .map_err(|e| DropboxError::AuthenticationFailed(e.to_string()))
    }

    /// Convert a listed file into a catalog candidate.
    ///
    /// Files without any path cannot be resolved later and are skipped, as
    /// are files whose extension is not a supported audio format.
    fn convert_file(file: FileMetadata) -> Option<RemoteFile> {
        let path = file.path_display.or(file.path_lower)?;
        if AudioType::from_path(&path) == AudioType::Unknown {
            return None;
        }

        Some(RemoteFile {
            file_id: file.id,
            name: file.name,
            path,
            hash: file.content_hash,
            size: i64::try_from(file.size).unwrap_or(i64::MAX),
        })
    }

    /// POST a JSON argument to an RPC endpoint and decode the JSON result.
    #[instrument(skip(self, token, arg))]
    async fn rpc<A, R>(&self, endpoint: &str, token: &str, arg: &A) -> Result<R>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/{}", API_BASE, endpoint))
            .bearer_token(token)
            .timeout(REQUEST_TIMEOUT)
            .json(arg)?;

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            let error = Self::api_error(&response);
            warn!(endpoint, status = response.status, "Dropbox request failed");
            return Err(error);
        }

        debug!(endpoint, status = response.status, "Dropbox request succeeded");
        response
            .json()
            .map_err(|e| DropboxError::ParseError(format!("{} response: {}", endpoint, e)))
    }

    fn api_error(response: &HttpResponse) -> DropboxError {
        let message = response
            .json::<ApiErrorResponse>()
            .map(|body| body.error_summary)
            .or_else(|_| response.text())
            .unwrap_or_default();

        match response.status {
            401 => DropboxError::AuthenticationFailed(message),
            status_code => DropboxError::ApiError {
                status_code,
                message,
            },
        }
    }

    async fn list_all_files(&self, token: &str) -> Result<Vec<RemoteFile>> {
        let mut page: ListFolderResult = self
            .rpc(
                "files/list_folder",
                token,
                &ListFolderArg {
                    path: "",
                    recursive: true,
                    limit: MAX_PAGE_SIZE,
                },
            )
            .await?;

        let mut files = Vec::new();
        let mut pages = 1;
        loop {
            files.extend(page.entries.into_iter().filter_map(|entry| match entry {
                Metadata::File(file) => Self::convert_file(file),
                Metadata::Other => None,
            }));

            if !page.has_more {
                break;
            }

            page = self
                .rpc(
                    "files/list_folder/continue",
                    token,
                    &ListFolderContinueArg {
                        cursor: &page.cursor,
                    },
                )
                .await?;
            pages += 1;
        }

        info!(files = files.len(), pages, "Listed files from Dropbox");
        Ok(files)
    }

    async fn request_token(&self, refresh_token: &RefreshToken) -> Result<RefreshedToken> {
        let refresh_token = refresh_token
            .as_str()
            .map_err(|e| DropboxError::AuthenticationFailed(e.to_string()))?;
        debug!(
            app_key = %redact_if_sensitive("app_key", &self.settings.app_key),
            "Requesting Dropbox access token"
        );

        let request = HttpRequest::new(HttpMethod::Post, TOKEN_URL)
            .timeout(REQUEST_TIMEOUT)
            .form(&RefreshTokenForm {
                grant_type: "refresh_token",
                refresh_token,
                client_id: &self.settings.app_key,
                client_secret: &self.settings.app_secret,
            })?;

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if matches!(response.status, 400 | 401) {
            let message = match response.json::<OAuthErrorResponse>() {
                Ok(body) => body.error_description.unwrap_or(body.error),
                Err(_) => response.text().unwrap_or_default(),
            };
            return Err(DropboxError::AuthenticationFailed(message));
        }
        if !response.is_success() {
            return Err(Self::api_error(&response));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| DropboxError::ParseError(format!("token response: {}", e)))?;

        Ok(RefreshedToken::new(
            AccessToken::from(token.access_token),
            token.expires_in,
        ))
    }
}

#[async_trait]
impl ProviderAdapter for DropboxConnector {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Dropbox
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_access_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> AdapterResult<RefreshedToken> {
        let refreshed = self.request_token(refresh_token).await?;
        info!(
            expires_in = refreshed.expires_in_seconds,
            "Refreshed Dropbox access token"
        );
        Ok(refreshed)
    }

    #[instrument(skip(self, link), fields(link_id = %link.id))]
    async fn list_files(&self, link: &ProviderLink) -> AdapterResult<Vec<RemoteFile>> {
        let token = Self::access_token(link)?;
        Ok(self.list_all_files(token).await?)
    }

    #[instrument(skip(self, entry, link), fields(file_id = %entry.file_id))]
    async fn resolve_url(&self, entry: &CatalogEntry, link: &ProviderLink) -> AdapterResult<String> {
        let token = Self::access_token(link)?;
        debug!(file = %strip_path(&entry.path), "Requesting temporary link");

        let result: TemporaryLinkResult = self
            .rpc(
                "files/get_temporary_link",
                token,
                &TemporaryLinkArg { path: &entry.path },
            )
            .await?;

        Ok(result.link)
    }
}
