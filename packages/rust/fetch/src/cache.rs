//! On-disk HTML cache keyed by normalized URL.
//!
//! One JSON file per URL, named by the SHA-256 of the normalized URL, holding
//! `{url, cached_at, method, html}`. Writes go to a temp file and are renamed
//! into place, so readers never see a partial entry. Concurrent writes to the
//! same key are last-write-wins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use cfpscout_shared::{FetchMethod, normalize_url};

/// A cached page as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPage {
    pub url: String,
    pub cached_at: DateTime<Utc>,
    pub method: FetchMethod,
    pub html: String,
}

/// Directory-backed HTML cache with a time-to-live.
#[derive(Debug, Clone)]
pub struct HtmlCache {
    dir: PathBuf,
    ttl: Duration,
}

impl HtmlCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(url)))
    }

    /// A fresh entry for `url`, if any.
    pub async fn get(&self, url: &str) -> Option<CachedPage> {
        self.get_at(url, Utc::now()).await
    }

    /// A fresh entry for `url` as of `now`. Unreadable or corrupt files
    /// count as a miss.
    pub async fn get_at(&self, url: &str, now: DateTime<Utc>) -> Option<CachedPage> {
        let path = self.path_for(url);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        let page: CachedPage = match serde_json::from_str(&raw) {
            Ok(page) => page,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                return None;
            }
        };

        let age = (now - page.cached_at).to_std().unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            debug!(url, age_secs = age.as_secs(), "cache entry expired");
            return None;
        }
        Some(page)
    }

    /// Store `html` for `url`. Failures are logged, never returned: a cache
    /// write must not fail a fetch that already succeeded.
    pub async fn put(&self, url: &str, method: FetchMethod, html: &str) {
        let page = CachedPage {
            url: normalize_url(url),
            cached_at: Utc::now(),
            method,
            html: html.to_string(),
        };
        if let Err(e) = self.write(&page).await {
            warn!(url, error = %e, "failed to write cache entry");
        }
    }

    async fn write(&self, page: &CachedPage) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec(page)?;

        let target = self.path_for(&page.url);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", cache_key(&page.url), Uuid::now_v7()));
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Hex SHA-256 of the normalized URL.
fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    format!("{:x}", hasher.finalize())
}
