//! Durable URL work queue on an embedded libSQL database.
//!
//! The [`UrlStore`] holds one row per discovered source URL with its
//! lifecycle (pending / extracted / failed), the classified failure reason,
//! retry counter and backoff bookkeeping. It is the single source of truth
//! for "what still needs work", so every mutation is committed before the
//! call returns.
//!
//! Mutations that read before they write (`mark_failed`, `add`) run under an
//! internal write lock, so a load-mutate-store cycle for one URL is never
//! interleaved with another write.

mod migrations;
pub mod retry;
pub mod stats;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Database, params};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use cfpscout_shared::{
    CfpScoutError, FailureReason, FetchMethod, Result, RetryPolicy, StoredUrl, normalize_url,
};

pub use stats::UrlStats;

/// Column list shared by every `SELECT` that maps to [`StoredUrl`].
const COLUMNS: &str = "url, source, display_name, submission_url, extracted, extraction_failed, \
     retry_count, max_retries_reached, fetch_method, is_spa, http_status, error_reason, \
     last_attempt_time, added_time";

/// Persistent URL store handle wrapping a libSQL database.
pub struct UrlStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    policy: RetryPolicy,
    write_lock: Mutex<()>,
}

impl UrlStore {
    /// Open or create a store at `path` with the default retry policy.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::open_with_policy(path, RetryPolicy::default()).await
    }

    /// Open or create a store at `path`.
    pub async fn open_with_policy(path: &Path, policy: RetryPolicy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CfpScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        let store = Self {
            db,
            conn,
            policy,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// The retry policy this store applies in `mark_failed` and retry queries.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CfpScoutError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Record a discovered URL. Returns `true` if it was not already stored.
    ///
    /// For an existing entry, missing `display_name` / `submission_url` are
    /// backfilled; status and counters are never touched.
    #[instrument(skip_all, fields(url = %url, source = %source))]
    pub async fn add(
        &self,
        url: &str,
        source: &str,
        name: Option<&str>,
        submission_url: Option<&str>,
    ) -> Result<bool> {
        let url = normalize_url(url);
        if url.is_empty() {
            return Err(CfpScoutError::validation("cannot add an empty URL"));
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let submission_url = submission_url
            .map(normalize_url)
            .filter(|s| !s.is_empty() && *s != url);

        let _guard = self.write_lock.lock().await;
        let inserted = self
            .conn
            .execute(
                "INSERT INTO urls (url, source, display_name, submission_url, added_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(url) DO NOTHING",
                params![
                    url.as_str(),
                    source,
                    name,
                    submission_url.as_deref(),
                    timestamp(Utc::now()),
                ],
            )
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        if inserted > 0 {
            debug!("new url stored");
            return Ok(true);
        }

        self.conn
            .execute(
                "UPDATE urls SET
                   display_name = COALESCE(display_name, ?2),
                   submission_url = COALESCE(submission_url, ?3)
                 WHERE url = ?1",
                params![url.as_str(), name, submission_url.as_deref()],
            )
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look up one entry by URL (normalized before lookup).
    pub async fn get(&self, url: &str) -> Result<Option<StoredUrl>> {
        let url = normalize_url(url);
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COLUMNS} FROM urls WHERE url = ?1"),
                params![url.as_str()],
            )
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_stored_url(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(CfpScoutError::Storage(e.to_string())),
        }
    }

    /// Every entry, oldest-added first.
    pub async fn list_all(&self) -> Result<Vec<StoredUrl>> {
        self.query_entries(
            &format!("SELECT {COLUMNS} FROM urls ORDER BY added_time, rowid"),
            params![],
        )
        .await
    }

    /// Entries neither extracted nor failed, oldest-added first.
    pub async fn get_pending(&self, limit: Option<usize>) -> Result<Vec<StoredUrl>> {
        self.query_entries(
            &format!(
                "SELECT {COLUMNS} FROM urls
                 WHERE extracted = 0 AND extraction_failed = 0
                 ORDER BY added_time, rowid
                 LIMIT ?1"
            ),
            params![sql_limit(limit)],
        )
        .await
    }

    /// Retryable failures whose backoff has elapsed (as of now).
    pub async fn get_retryable(
        &self,
        limit: Option<usize>,
        ignore_backoff: bool,
    ) -> Result<Vec<StoredUrl>> {
        self.get_retryable_at(limit, ignore_backoff, Utc::now()).await
    }

    /// Retryable failures eligible at `now`, oldest attempt first.
    pub async fn get_retryable_at(
        &self,
        limit: Option<usize>,
        ignore_backoff: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredUrl>> {
        let candidates = self
            .query_entries(
                &format!(
                    "SELECT {COLUMNS} FROM urls
                     WHERE extraction_failed = 1 AND max_retries_reached = 0"
                ),
                params![],
            )
            .await?;

        let mut eligible: Vec<StoredUrl> = candidates
            .into_iter()
            .filter(|e| retry::is_eligible(e, &self.policy, now, ignore_backoff))
            .collect();

        // Never-attempted entries sort first, then oldest attempt.
        eligible.sort_by(|a, b| {
            a.last_attempt_time
                .cmp(&b.last_attempt_time)
                .then_with(|| a.added_time.cmp(&b.added_time))
        });
        if let Some(limit) = limit {
            eligible.truncate(limit);
        }
        Ok(eligible)
    }

    async fn query_entries(&self, sql: &str, params: impl IntoParams) -> Result<Vec<StoredUrl>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?
        {
            results.push(row_to_stored_url(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Outcome recording
    // -----------------------------------------------------------------------

    /// Record a successful extraction. `http_status` is the status of the
    /// fetch that produced the page, `None` when it came from the cache.
    #[instrument(skip_all, fields(url = %url, method = %fetch_method, is_spa = is_spa))]
    pub async fn mark_extracted(
        &self,
        url: &str,
        fetch_method: FetchMethod,
        is_spa: bool,
        http_status: Option<u16>,
    ) -> Result<()> {
        let url = normalize_url(url);
        let _guard = self.write_lock.lock().await;
        let changed = self
            .conn
            .execute(
                "UPDATE urls SET
                   extracted = 1,
                   extraction_failed = 0,
                   error_reason = NULL,
                   http_status = ?5,
                   fetch_method = ?2,
                   is_spa = ?3,
                   last_attempt_time = ?4
                 WHERE url = ?1",
                params![
                    url.as_str(),
                    fetch_method.as_str(),
                    i64::from(is_spa),
                    timestamp(Utc::now()),
                    http_status.map(i64::from),
                ],
            )
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        if changed == 0 {
            return Err(CfpScoutError::validation(format!("url not in store: {url}")));
        }
        Ok(())
    }

    /// Record a failed attempt and return the updated entry.
    ///
    /// `retry_count` is incremented only when `is_retry` is set.
    /// `max_retries_reached` is recomputed and never cleared.
    #[instrument(skip_all, fields(url = %url, http_status = ?http_status, is_retry = is_retry))]
    pub async fn mark_failed(
        &self,
        url: &str,
        http_status: Option<u16>,
        error_reason: Option<&FailureReason>,
        is_retry: bool,
    ) -> Result<StoredUrl> {
        let url = normalize_url(url);
        let _guard = self.write_lock.lock().await;

        let mut entry = self
            .get(&url)
            .await?
            .ok_or_else(|| CfpScoutError::validation(format!("url not in store: {url}")))?;

        if is_retry {
            entry.retry_count += 1;
        }
        entry.max_retries_reached = retry::reaches_max_retries(
            &self.policy,
            entry.max_retries_reached,
            error_reason,
            entry.retry_count,
        );
        entry.extracted = false;
        entry.extraction_failed = true;
        entry.http_status = http_status;
        entry.error_reason = error_reason.map(FailureReason::as_string);
        entry.last_attempt_time = Some(Utc::now());

        self.conn
            .execute(
                "UPDATE urls SET
                   extracted = 0,
                   extraction_failed = 1,
                   retry_count = ?2,
                   max_retries_reached = ?3,
                   http_status = ?4,
                   error_reason = ?5,
                   last_attempt_time = ?6
                 WHERE url = ?1",
                params![
                    url.as_str(),
                    i64::from(entry.retry_count),
                    i64::from(entry.max_retries_reached),
                    http_status.map(i64::from),
                    entry.error_reason.as_deref(),
                    entry.last_attempt_time.map(timestamp),
                ],
            )
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;

        debug!(
            retry_count = entry.retry_count,
            max_retries_reached = entry.max_retries_reached,
            reason = entry.error_reason.as_deref().unwrap_or("unknown"),
            "failure recorded"
        );
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Move failed entries back to pending. With `reason`, only entries whose
    /// `error_reason` matches exactly. Returns the number of entries reset.
    ///
    /// Retry counters and `max_retries_reached` are left as they are, so a
    /// reset entry gets one fresh attempt and no further automatic retries
    /// once it was exhausted.
    pub async fn reset_failed(&self, reason: Option<&str>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let count = self
            .conn
            .execute(
                "UPDATE urls SET
                   extraction_failed = 0,
                   error_reason = NULL,
                   http_status = NULL
                 WHERE extraction_failed = 1 AND (?1 IS NULL OR error_reason = ?1)",
                params![reason],
            )
            .await
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?;
        info!(count, reason = reason.unwrap_or("any"), "reset failed urls");
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub async fn stats(&self) -> Result<UrlStats> {
        self.stats_at(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<UrlStats> {
        let entries = self.list_all().await?;
        Ok(UrlStats::from_entries(&entries, &self.policy, now))
    }
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CfpScoutError::Storage(format!("invalid timestamp '{s}': {e}")))
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

/// Convert a database row to a [`StoredUrl`].
fn row_to_stored_url(row: &libsql::Row) -> Result<StoredUrl> {
    let flag = |idx: i32| -> Result<bool> {
        row.get::<i64>(idx)
            .map(|v| v != 0)
            .map_err(|e| CfpScoutError::Storage(e.to_string()))
    };

    Ok(StoredUrl {
        url: row
            .get::<String>(0)
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?,
        source: row
            .get::<String>(1)
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?,
        display_name: row.get::<String>(2).ok(),
        submission_url: row.get::<String>(3).ok(),
        extracted: flag(4)?,
        extraction_failed: flag(5)?,
        retry_count: row
            .get::<i64>(6)
            .map(|v| v.max(0) as u32)
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?,
        max_retries_reached: flag(7)?,
        fetch_method: row
            .get::<String>(8)
            .map_err(|e| CfpScoutError::Storage(e.to_string()))?
            .parse()?,
        is_spa: flag(9)?,
        http_status: row.get::<i64>(10).ok().map(|v| v as u16),
        error_reason: row.get::<String>(11).ok(),
        last_attempt_time: match row.get::<String>(12).ok() {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        },
        added_time: parse_timestamp(
            &row.get::<String>(13)
                .map_err(|e| CfpScoutError::Storage(e.to_string()))?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const CFP: &str = "https://example.com/cfp";

    /// Create a temp file store for testing.
    async fn test_store() -> UrlStore {
        let tmp = std::env::temp_dir().join(format!("cfpscout_test_{}.db", Uuid::now_v7()));
        UrlStore::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn reopen_keeps_entries() {
        let tmp = std::env::temp_dir().join(format!("cfpscout_test_{}.db", Uuid::now_v7()));
        let first = UrlStore::open(&tmp).await.expect("first open");
        first.add(CFP, "test", None, None).await.unwrap();
        first
            .mark_failed(CFP, Some(503), Some(&FailureReason::Http(503)), false)
            .await
            .unwrap();
        drop(first);

        let second = UrlStore::open(&tmp).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 2);
        let entry = second.get(CFP).await.unwrap().expect("entry survives restart");
        assert!(entry.extraction_failed);
        assert_eq!(entry.error_reason.as_deref(), Some("503"));
        assert_eq!(entry.http_status, Some(503));
    }

    #[tokio::test]
    async fn add_is_idempotent_and_backfills() {
        let store = test_store().await;
        assert!(store.add("https://example.com/cfp/", "test", None, None).await.unwrap());
        assert!(
            !store
                .add(CFP, "other", Some("ExampleConf"), Some("https://example.com/submit"))
                .await
                .unwrap()
        );

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        let entry = &all[0];
        assert_eq!(entry.url, CFP);
        assert_eq!(entry.source, "test");
        assert_eq!(entry.display_name.as_deref(), Some("ExampleConf"));
        assert_eq!(entry.submission_url.as_deref(), Some("https://example.com/submit"));

        // Existing values are not overwritten.
        store.add(CFP, "test", Some("Renamed"), None).await.unwrap();
        let entry = store.get(CFP).await.unwrap().unwrap();
        assert_eq!(entry.display_name.as_deref(), Some("ExampleConf"));
    }

    #[tokio::test]
    async fn submission_url_equal_to_url_is_dropped() {
        let store = test_store().await;
        store.add(CFP, "test", None, Some("https://example.com/cfp/")).await.unwrap();
        assert!(store.get(CFP).await.unwrap().unwrap().submission_url.is_none());
    }

    #[tokio::test]
    async fn add_never_regresses_extracted() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        store.mark_extracted(CFP, FetchMethod::Static, false, Some(200)).await.unwrap();
        assert!(!store.add(CFP, "test", None, None).await.unwrap());

        let entry = store.get(CFP).await.unwrap().unwrap();
        assert!(entry.extracted);
        assert!(store.get_pending(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_is_oldest_first_with_limit() {
        let store = test_store().await;
        for i in 0..3 {
            store
                .add(&format!("https://example.com/cfp/{i}"), "test", None, None)
                .await
                .unwrap();
        }
        store
            .mark_extracted("https://example.com/cfp/0", FetchMethod::Static, false, Some(200))
            .await
            .unwrap();

        let pending = store.get_pending(None).await.unwrap();
        let urls: Vec<&str> = pending.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["https://example.com/cfp/1", "https://example.com/cfp/2"]);

        let limited = store.get_pending(Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].url, "https://example.com/cfp/1");
    }

    #[tokio::test]
    async fn mark_extracted_clears_failure() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        store
            .mark_failed(CFP, Some(503), Some(&FailureReason::Http(503)), false)
            .await
            .unwrap();
        store
            .mark_extracted(CFP, FetchMethod::Rendered, true, Some(200))
            .await
            .unwrap();

        let entry = store.get(CFP).await.unwrap().unwrap();
        assert!(entry.extracted);
        assert!(!entry.extraction_failed);
        assert!(entry.error_reason.is_none());
        assert_eq!(entry.http_status, Some(200));
        assert_eq!(entry.fetch_method, FetchMethod::Rendered);
        assert!(entry.is_spa);
        assert!(entry.last_attempt_time.is_some());
    }

    #[tokio::test]
    async fn cached_extraction_has_no_status() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        store
            .mark_extracted(CFP, FetchMethod::Static, false, None)
            .await
            .unwrap();
        assert_eq!(store.get(CFP).await.unwrap().unwrap().http_status, None);
    }

    #[tokio::test]
    async fn mark_unknown_url_is_an_error() {
        let store = test_store().await;
        assert!(store.mark_extracted(CFP, FetchMethod::Static, false, Some(200)).await.is_err());
        assert!(store.mark_failed(CFP, None, None, false).await.is_err());
    }

    #[tokio::test]
    async fn timeout_backoff_window() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        let entry = store
            .mark_failed(CFP, None, Some(&FailureReason::Timeout), false)
            .await
            .unwrap();
        let failed_at = entry.last_attempt_time.unwrap();

        assert!(store.get_retryable_at(None, false, failed_at).await.unwrap().is_empty());
        assert_eq!(
            store
                .get_retryable_at(None, false, failed_at + chrono::Duration::hours(1))
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(store.get_retryable(None, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_never_retryable() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        let entry = store
            .mark_failed(CFP, Some(404), Some(&FailureReason::Http(404)), false)
            .await
            .unwrap();
        assert!(entry.max_retries_reached);
        assert!(store.get_retryable(None, true).await.unwrap().is_empty());
        let later = Utc::now() + chrono::Duration::days(30);
        assert!(store.get_retryable_at(None, true, later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_confidence_is_permanent() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        let entry = store
            .mark_failed(CFP, Some(200), Some(&FailureReason::LowConfidence), false)
            .await
            .unwrap();
        assert!(entry.max_retries_reached);
        assert!(store.get_retryable(None, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retryable_sorted_by_oldest_attempt() {
        let store = test_store().await;
        for url in ["https://a.dev/cfp", "https://b.dev/cfp"] {
            store.add(url, "test", None, None).await.unwrap();
        }
        // b fails first, so it has waited longest.
        store
            .mark_failed("https://b.dev/cfp", None, Some(&FailureReason::Timeout), false)
            .await
            .unwrap();
        store
            .mark_failed("https://a.dev/cfp", None, Some(&FailureReason::Timeout), false)
            .await
            .unwrap();

        let ready = store.get_retryable(None, true).await.unwrap();
        assert_eq!(ready[0].url, "https://b.dev/cfp");
        assert_eq!(store.get_retryable(Some(1), true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_count_only_moves_on_retries() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        let reason = FailureReason::Http(503);

        let e = store.mark_failed(CFP, Some(503), Some(&reason), false).await.unwrap();
        assert_eq!(e.retry_count, 0);
        let e = store.mark_failed(CFP, Some(503), Some(&reason), false).await.unwrap();
        assert_eq!(e.retry_count, 0);
        let e = store.mark_failed(CFP, Some(503), Some(&reason), true).await.unwrap();
        assert_eq!(e.retry_count, 1);
    }

    #[tokio::test]
    async fn max_retries_reached_is_sticky() {
        let store = test_store().await;
        store.add(CFP, "test", None, None).await.unwrap();
        store
            .mark_failed(CFP, Some(404), Some(&FailureReason::Http(404)), false)
            .await
            .unwrap();
        // A later retryable failure does not clear the flag.
        let e = store
            .mark_failed(CFP, None, Some(&FailureReason::Timeout), true)
            .await
            .unwrap();
        assert!(e.max_retries_reached);
        store.mark_extracted(CFP, FetchMethod::Static, false, Some(200)).await.unwrap();
        store.reset_failed(None).await.unwrap();
        assert!(store.get(CFP).await.unwrap().unwrap().max_retries_reached);
    }

    #[tokio::test]
    async fn end_to_end_503_lifecycle() {
        let store = test_store().await;
        assert!(store.add(CFP, "test", None, None).await.unwrap());

        let pending = store.get_pending(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, CFP);

        let reason = FailureReason::Http(503);
        let entry = store.mark_failed(CFP, Some(503), Some(&reason), false).await.unwrap();
        assert!(entry.extraction_failed);
        assert_eq!(entry.retry_count, 0);
        assert!(!entry.max_retries_reached);

        let an_hour_later = entry.last_attempt_time.unwrap() + chrono::Duration::hours(1);
        let ready = store.get_retryable_at(None, false, an_hour_later).await.unwrap();
        assert_eq!(ready.len(), 1);

        let mut last = entry;
        for _ in 0..3 {
            last = store.mark_failed(CFP, Some(503), Some(&reason), true).await.unwrap();
        }
        assert_eq!(last.retry_count, 3);
        assert!(last.max_retries_reached);
        assert!(store.get_retryable(None, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_failed_by_reason() {
        let store = test_store().await;
        for url in ["https://a.dev/cfp", "https://b.dev/cfp"] {
            store.add(url, "test", None, None).await.unwrap();
        }
        store
            .mark_failed("https://a.dev/cfp", Some(200), Some(&FailureReason::LowConfidence), false)
            .await
            .unwrap();
        store
            .mark_failed("https://b.dev/cfp", Some(404), Some(&FailureReason::Http(404)), false)
            .await
            .unwrap();

        assert_eq!(store.reset_failed(Some("low_confidence")).await.unwrap(), 1);
        let pending = store.get_pending(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "https://a.dev/cfp");

        assert_eq!(store.reset_failed(None).await.unwrap(), 1);
        assert_eq!(store.get_pending(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stats_reflect_store() {
        let store = test_store().await;
        store.add("https://a.dev/cfp", "sessionize", None, None).await.unwrap();
        store.add("https://b.dev/cfp", "manual", None, None).await.unwrap();
        store
            .mark_extracted("https://a.dev/cfp", FetchMethod::Rendered, true, None)
            .await
            .unwrap();
        store
            .mark_failed("https://b.dev/cfp", None, Some(&FailureReason::Timeout), false)
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.extracted, 1);
        assert_eq!(stats.spa_extracted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.waiting_backoff, 1);
        assert_eq!(stats.error_reasons["timeout"], 1);
    }
}
