//! HTTP fetching with download progress.
//!
//! Fetches JSON documents from the arena API, streaming the body so that
//! progress can be reported while large collections download.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Content too large: {size} bytes (max {max_size})")]
    ContentTooLarge { size: usize, max_size: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download progress callback: `(bytes loaded, total bytes if known)`.
pub type OnProgress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// A decoded JSON response.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub url: Url,
    /// Body size in bytes
    pub content_length: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum body size to accept (default 64MB)
    pub max_content_size: usize,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_content_size: 64 * 1024 * 1024,
            timeout: Duration::from_secs(60),
            user_agent: format!("mat-history/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// JSON fetcher.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("mat-history")),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetcherConfig::default())
    }

    /// Fetch and decode a JSON document, reporting progress per chunk.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        on_progress: OnProgress<'_>,
    ) -> Result<Fetched<T>, FetchError> {
        info!("Fetching {}", url);

        let mut response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                host: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let total = response.content_length();
        if let Some(size) = total {
            self.check_size(size as usize)?;
        }

        let mut body: Vec<u8> = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            self.check_size(body.len())?;
            on_progress(body.len() as u64, total);
        }

        debug!(
            "Received {} from {}",
            human_file_size(body.len() as u64, false, 1),
            url
        );

        let value = serde_json::from_slice(&body)?;

        Ok(Fetched {
            value,
            url: url.clone(),
            content_length: body.len(),
            fetched_at: Utc::now(),
        })
    }

    fn check_size(&self, size: usize) -> Result<(), FetchError> {
        if size > self.config.max_content_size {
            return Err(FetchError::ContentTooLarge {
                size,
                max_size: self.config.max_content_size,
            });
        }
        Ok(())
    }
}

/// Format a byte count for humans.
///
/// `si` selects powers of 1000 (`kB`, `MB`, ...) instead of 1024 (`KiB`,
/// `MiB`, ...); `dp` is the number of decimal places.
pub fn human_file_size(bytes: u64, si: bool, dp: usize) -> String {
    let thresh: f64 = if si { 1000.0 } else { 1024.0 };
    if (bytes as f64) < thresh {
        return format!("{} B", bytes);
    }

    let units: [&str; 8] = if si {
        ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"]
    } else {
        ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"]
    };
    let r = 10f64.powi(dp as i32);

    let mut value = bytes as f64;
    let mut u = 0;
    value /= thresh;
    // Keep dividing while the rounded value would still print as >= thresh
    while (value * r).round() / r >= thresh && u < units.len() - 1 {
        value /= thresh;
        u += 1;
    }

    format!("{:.*} {}", dp, value, units[u])
}
