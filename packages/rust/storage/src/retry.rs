//! Pure retry/backoff scheduling for failed URLs.
//!
//! Nothing here touches the database or the clock; callers pass `now`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use cfpscout_shared::{FailureReason, RetryPolicy, StoredUrl};

/// Backoff before retry number `retry_count + 1`. The schedule's last entry repeats.
pub fn backoff_delay(policy: &RetryPolicy, retry_count: u32) -> Duration {
    let idx = (retry_count as usize).min(policy.schedule.len().saturating_sub(1));
    policy.schedule.get(idx).copied().unwrap_or(Duration::ZERO)
}

/// Whether a failure with this (optional) reason may be retried.
/// An unclassified failure is retryable.
pub fn reason_is_retryable(reason: Option<&FailureReason>) -> bool {
    reason.is_none_or(FailureReason::is_retryable)
}

/// Whether the entry's `max_retries_reached` flag should be set after a
/// failure with `retry_count` retries so far. Sticky: once set, stays set.
pub fn reaches_max_retries(
    policy: &RetryPolicy,
    already_reached: bool,
    reason: Option<&FailureReason>,
    retry_count: u32,
) -> bool {
    already_reached || !reason_is_retryable(reason) || retry_count >= policy.max_retries
}

/// Failed, not exhausted, and classified as retryable.
pub fn is_retry_candidate(entry: &StoredUrl) -> bool {
    entry.extraction_failed
        && !entry.max_retries_reached
        && reason_is_retryable(entry.failure_reason().as_ref())
}

/// Earliest instant the entry may be retried, if it is a retry candidate.
pub fn next_attempt_at(entry: &StoredUrl, policy: &RetryPolicy) -> Option<DateTime<Utc>> {
    if !is_retry_candidate(entry) {
        return None;
    }
    let last = entry.last_attempt_time?;
    let delay = chrono::Duration::from_std(backoff_delay(policy, entry.retry_count)).ok()?;
    last.checked_add_signed(delay)
}

/// Whether `entry` should be handed out by a retry query at `now`.
pub fn is_eligible(
    entry: &StoredUrl,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
    ignore_backoff: bool,
) -> bool {
    if !is_retry_candidate(entry) {
        return false;
    }
    if ignore_backoff {
        return true;
    }
    match entry.last_attempt_time {
        None => true,
        Some(last) => {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            elapsed >= backoff_delay(policy, entry.retry_count)
        }
    }
}
