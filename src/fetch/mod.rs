use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::cache::{CacheError, FileCache, PendingEntry};
use crate::config::AppConfig;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream returned {0}")]
    UpstreamStatus(reqwest::StatusCode),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Cache write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for a concurrent fill of the same source")]
    FillTimeout,
}

const FILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Downloads source images into the cache, at most once per key.
pub struct Fetcher {
    client: reqwest::Client,
    fill_deadline: Duration,
}

impl Fetcher {
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            fill_deadline: Duration::from_secs(config.timeout),
        }
    }

    /// Return the cache path for `key`, fetching `url` into the cache if no
    /// entry exists yet.
    ///
    /// When another request holds the fill claim for the same key, this
    /// waits for that winner to commit instead of fetching a second time.
    /// The wait is bounded; on expiry the client gets a retryable error.
    pub async fn ensure_cached(
        &self,
        cache: &FileCache,
        key: &str,
        url: &str,
    ) -> Result<PathBuf, FetchError> {
        let deadline = tokio::time::Instant::now() + self.fill_deadline;
        loop {
            if let Some(path) = cache.lookup(key) {
                debug!("Cache hit: {}", key);
                return Ok(path);
            }
            match cache.begin_fill(key).await {
                Ok(pending) => return self.fill(cache, pending, url).await,
                Err(CacheError::Busy) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(FetchError::FillTimeout);
                    }
                    tokio::time::sleep(FILL_POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn fill(
        &self,
        cache: &FileCache,
        mut pending: PendingEntry,
        url: &str,
    ) -> Result<PathBuf, FetchError> {
        match self.download(&mut pending, url).await {
            Ok(()) => {
                let path = pending.commit().await?;
                info!("Cached {}", url);
                cache.spawn_evict();
                Ok(path)
            }
            Err(e) => {
                pending.abandon().await;
                Err(e)
            }
        }
    }

    async fn download(&self, pending: &mut PendingEntry, url: &str) -> Result<(), FetchError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus(status));
        }

        // Stream the body to disk chunk by chunk, never holding it whole.
        let mut stream = response.bytes_stream();
        let writer = pending.writer();
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?).await?;
        }
        Ok(())
    }
}
