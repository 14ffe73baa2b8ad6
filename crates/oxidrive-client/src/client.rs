//! Drive REST API client
//!
//! A thin typed wrapper over `reqwest` that handles the base URL, bearer
//! authentication, and the mapping of failures into the
//! [`SyncError`](oxidrive_core::domain::errors::SyncError) taxonomy the
//! retry policy matches on: non-success responses keep their HTTP status,
//! request failures that never produced a response become transport
//! errors.

use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::remote_drive::DriveQuota;

/// Default base URL of the drive REST API
const DEFAULT_BASE_URL: &str = "https://api.onedrive.com/v1.0";

/// Default chunk size for resumable upload sessions: 10 MiB.
///
/// Must stay a multiple of 320 KiB per the service's session contract;
/// 10 MiB = 32 x 320 KiB.
const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

// ============================================================================
// Wire types owned by the client itself
// ============================================================================

/// Response from the `/drive` endpoint
#[derive(Debug, serde::Deserialize)]
struct DriveResponse {
    quota: Option<QuotaFacet>,
}

#[derive(Debug, serde::Deserialize)]
struct QuotaFacet {
    used: Option<u64>,
    total: Option<u64>,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for the drive REST API
pub struct DriveClient {
    http: Client,
    base_url: String,
    access_token: String,
    chunk_size: u64,
}

impl DriveClient {
    /// Creates a client against the production API
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: Client::new(),
            base_url,
            access_token: access_token.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Overrides the upload session chunk size (in bytes)
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Chunk size used for resumable upload sessions
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// The underlying HTTP client, for absolute-URL requests (upload
    /// session chunks, pagination links)
    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Creates an authenticated request builder for an API-relative path
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Sends a request, mapping failures into the sync error taxonomy.
    ///
    /// Anything that produced a response but not a 2xx status becomes
    /// [`SyncError::Http`] with the response body as the message.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, SyncError> {
        let response = builder
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        expect_success(response).await
    }

    /// Fetches the drive's storage quota
    pub async fn fetch_quota(&self) -> Result<DriveQuota, SyncError> {
        debug!("fetching drive quota");
        let drive: DriveResponse = self
            .send(self.request(Method::GET, "/drive"))
            .await?
            .json()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;

        let quota = drive.quota.unwrap_or(QuotaFacet {
            used: None,
            total: None,
        });
        Ok(DriveQuota {
            used: quota.used.unwrap_or(0),
            total: quota.total.unwrap_or(0),
        })
    }
}

/// Turns a non-2xx response into [`SyncError::Http`], preserving the status
pub(crate) async fn expect_success(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("").to_string());
    Err(SyncError::http(status.as_u16(), message))
}

// ============================================================================
// API path construction
// ============================================================================

/// Builds the API path addressing one item by remote path.
///
/// - Root, no suffix: `/drive/root`
/// - Root with suffix: `/drive/root/children`
/// - Nested, no suffix: `/drive/root:/Documents`
/// - Nested with suffix: `/drive/root:/Documents:/children`
pub(crate) fn item_path(path: &RemotePath, suffix: Option<&str>) -> String {
    match (path.is_root(), suffix) {
        (true, None) => "/drive/root".to_string(),
        (true, Some(suffix)) => format!("/drive/root/{suffix}"),
        (false, None) => format!("/drive/root:{}", path.as_str()),
        (false, Some(suffix)) => format!("/drive/root:{}:/{suffix}", path.as_str()),
    }
}

/// Builds the API path addressing a child of `parent` by name
pub(crate) fn child_path(parent: &RemotePath, name: &str, suffix: &str) -> String {
    if parent.is_root() {
        format!("/drive/root:/{name}:/{suffix}")
    } else {
        format!("/drive/root:{}/{name}:/{suffix}", parent.as_str())
    }
}

/// Builds the API path addressing one item by identifier
pub(crate) fn id_path(id: &str, suffix: Option<&str>) -> String {
    match suffix {
        None => format!("/drive/items/{id}"),
        Some(suffix) => format!("/drive/items/{id}/{suffix}"),
    }
}
