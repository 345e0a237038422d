//! Resource fetchers.
//!
//! Component stylesheets and templates are plain text resources addressed by
//! URL. [`HttpFetcher`] serves `http(s)` URLs, [`FsFetcher`] serves `file:`
//! URLs and [`EmbeddedFetcher`] serves assets compiled into (or registered
//! with) the host application.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::RuntimeConfig;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced while fetching a resource.
///
/// Cloneable so a single failure can be handed to every caller that was
/// waiting on the same load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Failed to fetch {url}: HTTP {status} {reason}")]
    Status { url: String, status: u16, reason: String },

    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported URL scheme '{scheme}' for {url}")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

// ============================================================================
// Fetcher trait
// ============================================================================

/// Retrieves the text body of a resource URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_text(&self, url: &Url) -> FetchResult<String>;
}

// ============================================================================
// HTTP
// ============================================================================

/// Fetches `http` and `https` resources with reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &RuntimeConfig) -> FetchResult<Self> {
        Self::new(config.fetch_timeout())
    }

    /// Use a preconfigured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> FetchResult<String> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                url: url.to_string(),
            });
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// Reads `file:` URLs from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

#[async_trait]
impl ResourceFetcher for FsFetcher {
    async fn fetch_text(&self, url: &Url) -> FetchResult<String> {
        if url.scheme() != "file" {
            return Err(FetchError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                url: url.to_string(),
            });
        }

        let path = url
            .to_file_path()
            .map_err(|_| FetchError::NotFound(url.to_string()))?;

        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(url.to_string())
            } else {
                FetchError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}

// ============================================================================
// Embedded
// ============================================================================

/// Serves resources registered in memory, keyed by absolute URL
#[derive(Debug, Default)]
pub struct EmbeddedFetcher {
    assets: RwLock<HashMap<String, String>>,
}

impl EmbeddedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` under `url`
    pub fn insert(&self, url: &Url, body: impl Into<String>) {
        match self.assets.write() {
            Ok(mut assets) => {
                assets.insert(url.to_string(), body.into());
            }
            Err(_) => log::error!("Embedded asset table poisoned; {} not registered", url),
        }
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_asset(self, url: &Url, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    pub fn len(&self) -> usize {
        self.assets.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResourceFetcher for EmbeddedFetcher {
    async fn fetch_text(&self, url: &Url) -> FetchResult<String> {
        let assets = self
            .assets
            .read()
            .map_err(|_| FetchError::NotFound(url.to_string()))?;
        assets
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}
