//! Aggregate counts over the URL store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use cfpscout_shared::{RetryPolicy, StoredUrl, UrlStatus};

use crate::retry;

/// Store-wide statistics, computed from a full table snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UrlStats {
    pub total: usize,
    pub pending: usize,
    pub extracted: usize,
    pub failed: usize,
    /// Entry count per provenance tag.
    pub by_source: BTreeMap<String, usize>,
    /// Extracted entries that needed rendering.
    pub spa_extracted: usize,
    /// Extracted entries served by the static path.
    pub static_extracted: usize,
    /// Failed entries per `error_reason` (`"unknown"` when unset).
    pub error_reasons: BTreeMap<String, usize>,
    /// Failed entries per `retry_count`.
    pub retry_attempts: BTreeMap<u32, usize>,
    /// Retryable failures whose backoff has elapsed.
    pub ready_to_retry: usize,
    /// Retryable failures still inside their backoff window.
    pub waiting_backoff: usize,
    /// Failures that will never be retried.
    pub permanently_failed: usize,
}

impl UrlStats {
    pub fn from_entries(entries: &[StoredUrl], policy: &RetryPolicy, now: DateTime<Utc>) -> Self {
        let mut stats = Self {
            total: entries.len(),
            ..Self::default()
        };

        for entry in entries {
            *stats.by_source.entry(entry.source.clone()).or_default() += 1;

            match entry.status() {
                UrlStatus::Pending => stats.pending += 1,
                UrlStatus::Extracted => {
                    stats.extracted += 1;
                    if entry.is_spa {
                        stats.spa_extracted += 1;
                    } else {
                        stats.static_extracted += 1;
                    }
                }
                UrlStatus::Failed => {
                    stats.failed += 1;
                    let reason = entry.error_reason.clone().unwrap_or_else(|| "unknown".into());
                    *stats.error_reasons.entry(reason).or_default() += 1;
                    *stats.retry_attempts.entry(entry.retry_count).or_default() += 1;

                    if !retry::is_retry_candidate(entry) {
                        stats.permanently_failed += 1;
                    } else if retry::is_eligible(entry, policy, now, false) {
                        stats.ready_to_retry += 1;
                    } else {
                        stats.waiting_backoff += 1;
                    }
                }
            }
        }

        stats
    }

    /// Fraction of extracted entries that needed rendering.
    pub fn spa_ratio(&self) -> f64 {
        if self.extracted == 0 {
            0.0
        } else {
            self.spa_extracted as f64 / self.extracted as f64
        }
    }
}
