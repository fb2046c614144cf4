//! Yandex Disk API connector implementation

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_auth::{AccessToken, ProviderType, RefreshToken, RefreshedToken};
use core_library::{CatalogEntry, ProviderLink};
use core_runtime::config::YandexDiskSettings;
use core_runtime::logging::strip_path;
use core_sync::{AdapterResult, ProviderAdapter, RemoteFile};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, YandexDiskError};
use crate::types::{
    ApiErrorResponse, DownloadLink, FilesResult, OAuthErrorResponse, RefreshTokenForm,
    TokenResponse, YandexFile,
};

const DISK_API_BASE: &str = "https://cloud-api.yandex.net/v1/disk";

const TOKEN_URL: &str = "https://oauth.yandex.ru/token";

/// Items requested per `resources/files` page
const PAGE_SIZE: u32 = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Yandex Disk API connector
///
/// Requests carry `Authorization: OAuth <token>` rather than a bearer token.
pub struct YandexDiskConnector {
    http_client: Arc<dyn HttpClient>,
    settings: YandexDiskSettings,
    retry_policy: RetryPolicy,
    page_size: u32,
}

impl YandexDiskConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, settings: YandexDiskSettings) -> Self {
        Self {
            http_client,
            settings,
            retry_policy: RetryPolicy::default(),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Override the listing page size (clamped to at least 1).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn access_token(link: &ProviderLink) -> Result<&str> {
        link.access_token
            .as_str()
            .map_err(|e| YandexDiskError::AuthenticationFailed(e.to_string()))
    }

    fn convert_file(file: YandexFile) -> RemoteFile {
        RemoteFile {
            file_id: file.resource_id,
            name: file.name,
            path: file.path,
            hash: file.md5,
            size: i64::try_from(file.size).unwrap_or(i64::MAX),
        }
    }

    #[instrument(skip(self, url, token))]
    async fn get<R: DeserializeOwned>(&self, url: String, token: &str) -> Result<R> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Authorization", format!("OAuth {}", token))
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Yandex Disk request failed");
            return Err(Self::api_error(&response));
        }

        response
            .json()
            .map_err(|e| YandexDiskError::ParseError(e.to_string()))
    }

    fn api_error(response: &HttpResponse) -> YandexDiskError {
        let message = match response.json::<ApiErrorResponse>() {
            Ok(body) => match body.description {
                Some(description) => format!("{}: {}", body.error, description),
                None => body.error,
            },
            Err(_) => response.text().unwrap_or_default(),
        };

        match response.status {
            401 => YandexDiskError::AuthenticationFailed(message),
            status_code => YandexDiskError::ApiError {
                status_code,
                message,
            },
        }
    }

    async fn list_audio_files(&self, token: &str) -> Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let url = format!(
                "{}/resources/files?media_type=audio&limit={}&offset={}",
                DISK_API_BASE, self.page_size, offset
            );
            let page: FilesResult = self.get(url, token).await?;
            let received = page.items.len();
            debug!(offset, received, "Fetched Yandex Disk page");

            files.extend(page.items.into_iter().map(Self::convert_file));

            if received < self.page_size as usize {
                break;
            }
            offset += self.page_size;
        }

        info!(files = files.len(), "Listed audio files from Yandex Disk");
        Ok(files)
    }

    async fn request_token(&self, refresh_token: &RefreshToken) -> Result<RefreshedToken> {
        let refresh_token = refresh_token
            .as_str()
            .map_err(|e| YandexDiskError::AuthenticationFailed(e.to_string()))?;

        let request = HttpRequest::new(HttpMethod::Post, TOKEN_URL)
            .timeout(REQUEST_TIMEOUT)
            .form(&RefreshTokenForm {
                grant_type: "refresh_token",
                refresh_token,
                client_id: &self.settings.client_id,
                client_secret: &self.settings.client_secret,
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
            return Err(YandexDiskError::AuthenticationFailed(message));
        }
        if !response.is_success() {
            return Err(Self::api_error(&response));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| YandexDiskError::ParseError(format!("token response: {}", e)))?;

        Ok(RefreshedToken::new(
            AccessToken::from(token.access_token),
            token.expires_in,
        ))
    }
}

#[async_trait]
impl ProviderAdapter for YandexDiskConnector {
    fn provider_type(&self) -> ProviderType {
        ProviderType::YandexDisk
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_access_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> AdapterResult<RefreshedToken> {
        let refreshed = self.request_token(refresh_token).await?;
        info!(
            expires_in = refreshed.expires_in_seconds,
            "Refreshed Yandex Disk access token"
        );
        Ok(refreshed)
    }

    #[instrument(skip(self, link), fields(link_id = %link.id))]
    async fn list_files(&self, link: &ProviderLink) -> AdapterResult<Vec<RemoteFile>> {
        let token = Self::access_token(link)?;
        Ok(self.list_audio_files(token).await?)
    }

    #[instrument(skip(self, entry, link), fields(file_id = %entry.file_id))]
    async fn resolve_url(&self, entry: &CatalogEntry, link: &ProviderLink) -> AdapterResult<String> {
        let token = Self::access_token(link)?;
        debug!(file = %strip_path(&entry.path), "Requesting download link");

        let url = format!(
            "{}/resources/download?path={}",
            DISK_API_BASE,
            urlencoding::encode(&entry.path)
        );
        let download: DownloadLink = self.get(url, token).await?;
        Ok(download.href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use core_auth::UserId;
    use core_sync::AdapterError;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: String) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body),
        }
    }

    fn page(ids: std::ops::Range<u32>) -> String {
        let items: Vec<String> = ids
            .map(|i| {
                format!(
                    r#"{{"resource_id": "r{i}", "name": "t{i}.mp3", "path": "disk:/Music/t{i}.mp3", "md5": "m{i}", "size": {i}}}"#
                )
            })
            .collect();
        format!(r#"{{"items": [{}], "limit": 2, "offset": 0}}"#, items.join(","))
    }

    fn settings() -> YandexDiskSettings {
        YandexDiskSettings::new("client-id", "client-secret")
    }

    fn link() -> ProviderLink {
        let now = Utc::now();
        ProviderLink::new(
            UserId::new(),
            ProviderType::YandexDisk,
            "Disk",
            AccessToken::from("y0_token"),
            RefreshToken::from("1:refresh"),
            now,
            now,
        )
    }

    #[tokio::test]
    async fn test_list_files_pages_by_offset() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute_with_retry()
            .withf(|req, _| req.url.ends_with("offset=0"))
            .times(1)
            .returning(|req, _| {
                assert_eq!(
                    req.headers.get("Authorization").map(String::as_str),
                    Some("OAuth y0_token")
                );
                assert!(req.url.contains("media_type=audio"));
                assert!(req.url.contains("limit=2"));
                Ok(response(200, page(0..2)))
            });
        mock_http
            .expect_execute_with_retry()
            .withf(|req, _| req.url.ends_with("offset=2"))
            .times(1)
            .returning(|_, _| Ok(response(200, page(2..3))));

        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings()).with_page_size(2);
        let files = connector.list_files(&link()).await.unwrap();

        let ids: Vec<&str> = files.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(ids, vec!["r0", "r1", "r2"]);
        assert_eq!(files[2].path, "disk:/Music/t2.mp3");
        assert_eq!(files[2].hash.as_deref(), Some("m2"));
    }

    #[tokio::test]
    async fn test_list_files_full_last_page_requests_one_more() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .withf(|req, _| req.url.ends_with("offset=0"))
            .times(1)
            .returning(|_, _| Ok(response(200, page(0..2))));
        mock_http
            .expect_execute_with_retry()
            .withf(|req, _| req.url.ends_with("offset=2"))
            .times(1)
            .returning(|_, _| Ok(response(200, page(0..0))));

        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings()).with_page_size(2);

        assert_eq!(connector.list_files(&link()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_files_unauthorized() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute_with_retry().returning(|_, _| {
            Ok(response(
                401,
                r#"{"message": "Unauthorized", "description": "Unauthorized", "error": "UnauthorizedError"}"#.to_string(),
            ))
        });

        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings());
        let result = connector.list_files(&link()).await;

        assert!(matches!(result, Err(AdapterError::Auth(msg)) if msg.contains("UnauthorizedError")));
    }

    #[tokio::test]
    async fn test_resolve_url_encodes_path() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(
                    req.url,
                    "https://cloud-api.yandex.net/v1/disk/resources/download?path=disk%3A%2FMusic%2Fmy%20song.mp3"
                );
                Ok(response(
                    200,
                    r#"{"href": "https://downloader.disk.yandex.ru/disk/abc", "method": "GET", "templated": false}"#.to_string(),
                ))
            });

        let link = link();
        let entry = CatalogEntry::new(
            link.id,
            "r1",
            "my song.mp3",
            "disk:/Music/my song.mp3",
            None,
            1,
        );
        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings());

        assert_eq!(
            connector.resolve_url(&entry, &link).await.unwrap(),
            "https://downloader.disk.yandex.ru/disk/abc"
        );
    }

    #[tokio::test]
    async fn test_refresh_access_token() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .withf(|req, _| req.url == TOKEN_URL)
            .times(1)
            .returning(|req, _| {
                let form = String::from_utf8(req.body.unwrap().to_vec()).unwrap();
                assert!(form.contains("grant_type=refresh_token"));
                assert!(form.contains("refresh_token=1%3Arefresh"));
                assert!(form.contains("client_id=client-id"));
                assert!(form.contains("client_secret=client-secret"));
                Ok(response(
                    200,
                    r#"{"token_type": "bearer", "access_token": "y0_new", "expires_in": 31536000, "refresh_token": "1:next"}"#.to_string(),
                ))
            });

        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings());
        let refreshed = connector
            .refresh_access_token(&RefreshToken::from("1:refresh"))
            .await
            .unwrap();

        assert_eq!(refreshed.access_token.as_str().unwrap(), "y0_new");
        assert_eq!(refreshed.expires_in_seconds, 31536000);
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute_with_retry().returning(|_, _| {
            Ok(response(
                400,
                r#"{"error_description": "expired_token", "error": "invalid_grant"}"#.to_string(),
            ))
        });

        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings());
        let result = connector
            .refresh_access_token(&RefreshToken::from("1:old"))
            .await;

        assert!(matches!(result, Err(AdapterError::Auth(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_io() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .returning(|_, _| Ok(response(502, "Bad Gateway".to_string())));

        let connector = YandexDiskConnector::new(Arc::new(mock_http), settings());
        let result = connector.list_files(&link()).await;

        assert!(matches!(result, Err(AdapterError::Io(msg)) if msg.contains("502")));
    }
}
