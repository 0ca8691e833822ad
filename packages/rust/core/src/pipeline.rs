//! Extraction orchestrator: store → fetch → extract → merge → store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use cfpscout_fetch::{FetchOptions, FetchOutcome, Fetcher};
use cfpscout_shared::{
    CfpRecord, CfpScoutError, ExtractionSettings, FailureReason, FetchMethod, Result, StoredUrl,
};
use cfpscout_storage::{UrlStats, UrlStore};

use crate::record::to_record;
use crate::sink::RecordSink;

/// Configuration for one orchestration run.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Upper bound on URLs processed in this run.
    pub limit: Option<usize>,
    /// Also pick up retryable failures after the pending entries.
    pub include_retries: bool,
    /// Only retryable failures; pending entries are left alone.
    pub retry_only: bool,
    /// Treat every retryable failure as due.
    pub ignore_backoff: bool,
    /// Maximum URLs in flight.
    pub concurrency: usize,
    /// Consult and populate the HTML cache.
    pub use_cache: bool,
    /// Merged results below this are failed as `low_confidence`.
    pub min_confidence: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            limit: None,
            include_retries: false,
            retry_only: false,
            ignore_backoff: false,
            concurrency: 5,
            use_cache: true,
            min_confidence: 0.2,
        }
    }
}

impl From<&ExtractionSettings> for ExtractionConfig {
    fn from(settings: &ExtractionSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            min_confidence: settings.min_confidence,
            ..Self::default()
        }
    }
}

/// Result of one URL.
#[derive(Debug, Clone)]
pub enum UrlOutcome {
    Extracted {
        record: Box<CfpRecord>,
        method: FetchMethod,
        cached: bool,
    },
    Failed {
        reason: FailureReason,
        http_status: Option<u16>,
    },
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct ExtractionSummary {
    pub attempted: usize,
    pub extracted: usize,
    pub failed: usize,
    /// Records accepted by the sink.
    pub indexed: usize,
    /// Per-record sink errors.
    pub sink_errors: Vec<(String, String)>,
    /// Failure reasons seen in this run.
    pub error_reasons: BTreeMap<String, usize>,
    /// Store statistics after the run.
    pub stats: UrlStats,
    pub elapsed: Duration,
}

/// Progress callback for reporting orchestration status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the candidate list is known.
    fn started(&self, total: usize);
    /// Called as each URL finishes, in completion order.
    fn url_finished(&self, url: &str, outcome: &UrlOutcome, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &ExtractionSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn started(&self, _total: usize) {}
    fn url_finished(&self, _url: &str, _outcome: &UrlOutcome, _current: usize, _total: usize) {}
    fn done(&self, _summary: &ExtractionSummary) {}
}

/// Run one extraction batch.
///
/// 1. Collect candidates: pending (oldest added first), then retryable
///    failures (oldest attempt first), capped at `limit`
/// 2. Process each under the concurrency limit, consuming results as they
///    complete
/// 3. Hand extracted records to `sink` as one batch
/// 4. Summarize with post-run store stats
///
/// A failing or panicking URL is recorded as `exception:<kind>` and never
/// stops the batch. Records the sink does not take are recorded the same
/// way (`exception:sink`), so their URLs come back on a retry run.
#[instrument(skip_all, fields(concurrency = config.concurrency))]
pub async fn run_extraction(
    store: Arc<UrlStore>,
    fetcher: &Fetcher,
    sink: Option<&dyn RecordSink>,
    config: &ExtractionConfig,
    progress: &dyn ProgressReporter,
) -> Result<ExtractionSummary> {
    let start = Instant::now();

    // --- Phase 1: Candidates ---
    progress.phase("Selecting URLs");
    let candidates = select_candidates(&store, config).await?;
    let total = candidates.len();
    progress.started(total);
    info!(
        total,
        retries = candidates.iter().filter(|(_, r)| *r).count(),
        "starting extraction"
    );

    // --- Phase 2: Fetch + extract ---
    progress.phase("Extracting");
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let opts = FetchOptions {
        use_cache: config.use_cache,
        ..fetcher.default_options()
    };
    let mut tasks = JoinSet::new();
    let mut in_flight: HashMap<tokio::task::Id, (String, bool)> = HashMap::new();

    for (entry, is_retry) in candidates {
        let url = entry.url.clone();
        let store = store.clone();
        let fetcher = fetcher.clone();
        let sem = semaphore.clone();
        let opts = opts.clone();
        let min_confidence = config.min_confidence;

        let handle = tasks.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| CfpScoutError::validation(format!("semaphore closed: {e}")))?;
            process_url(&store, &fetcher, entry, is_retry, &opts, min_confidence).await
        });
        in_flight.insert(handle.id(), (url, is_retry));
    }

    let mut summary = ExtractionSummary {
        attempted: total,
        extracted: 0,
        failed: 0,
        indexed: 0,
        sink_errors: Vec::new(),
        error_reasons: BTreeMap::new(),
        stats: UrlStats::default(),
        elapsed: Duration::ZERO,
    };
    let mut records: Vec<CfpRecord> = Vec::new();
    let mut retried: HashMap<String, bool> = HashMap::new();
    let mut current = 0;

    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                let kind = if e.is_panic() { "panic" } else { "cancelled" };
                (e.id(), Err(TaskFailure::Exception(kind)))
            }
        };
        let Some((url, is_retry)) = in_flight.remove(&id) else {
            continue;
        };
        current += 1;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(failure) => {
                let reason = FailureReason::Exception(failure.kind().to_string());
                warn!(%url, error = %failure, "unexpected failure");
                if let Err(e) = store.mark_failed(&url, None, Some(&reason), is_retry).await {
                    warn!(%url, error = %e, "could not record failure");
                }
                UrlOutcome::Failed {
                    reason,
                    http_status: None,
                }
            }
        };

        match &outcome {
            UrlOutcome::Extracted { record, .. } => {
                summary.extracted += 1;
                retried.insert(record.url.clone(), is_retry);
                records.push(record.as_ref().clone());
            }
            UrlOutcome::Failed { reason, .. } => {
                summary.failed += 1;
                *summary.error_reasons.entry(reason.as_string()).or_default() += 1;
            }
        }
        progress.url_finished(&url, &outcome, current, total);
    }

    // --- Phase 3: Index ---
    if let Some(sink) = sink {
        if !records.is_empty() {
            progress.phase("Indexing records");
            let rejected = match sink.index(&records).await {
                Ok(report) => {
                    summary.indexed = report.indexed;
                    report.errors
                }
                Err(e) => {
                    warn!(error = %e, count = records.len(), "sink rejected batch");
                    records
                        .iter()
                        .map(|r| (r.url.clone(), e.to_string()))
                        .collect()
                }
            };
            let reason = FailureReason::Exception(SINK_KIND.to_string());
            for (url, _) in &rejected {
                let is_retry = retried.get(url).copied().unwrap_or(false);
                if let Err(e) = store.mark_failed(url, None, Some(&reason), is_retry).await {
                    warn!(%url, error = %e, "could not record sink failure");
                }
                summary.extracted = summary.extracted.saturating_sub(1);
                summary.failed += 1;
                *summary.error_reasons.entry(reason.as_string()).or_default() += 1;
            }
            summary.sink_errors = rejected;
        }
    }

    // --- Phase 4: Summary ---
    summary.stats = store.stats().await?;
    summary.elapsed = start.elapsed();
    progress.done(&summary);

    info!(
        attempted = summary.attempted,
        extracted = summary.extracted,
        failed = summary.failed,
        indexed = summary.indexed,
        ready_to_retry = summary.stats.ready_to_retry,
        permanently_failed = summary.stats.permanently_failed,
        elapsed_ms = summary.elapsed.as_millis(),
        "extraction complete"
    );

    Ok(summary)
}

/// Failure kind for records the sink did not index.
const SINK_KIND: &str = "sink";

async fn select_candidates(
    store: &UrlStore,
    config: &ExtractionConfig,
) -> Result<Vec<(StoredUrl, bool)>> {
    let mut candidates: Vec<(StoredUrl, bool)> = Vec::new();

    if !config.retry_only {
        let pending = store.get_pending(config.limit).await?;
        candidates.extend(pending.into_iter().map(|e| (e, false)));
    }

    if config.include_retries || config.retry_only {
        let remaining = config.limit.map(|l| l.saturating_sub(candidates.len()));
        if remaining != Some(0) {
            let retryable = store
                .get_retryable(remaining, config.ignore_backoff)
                .await?;
            candidates.extend(retryable.into_iter().map(|e| (e, true)));
        }
    }
    Ok(candidates)
}

/// Why a URL task ended without an outcome.
#[derive(Debug)]
enum TaskFailure {
    Error(CfpScoutError),
    Exception(&'static str),
}

impl TaskFailure {
    fn kind(&self) -> &'static str {
        match self {
            Self::Error(e) => e.kind(),
            Self::Exception(kind) => kind,
        }
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(e) => e.fmt(f),
            Self::Exception(kind) => write!(f, "task ended: {kind}"),
        }
    }
}

impl From<CfpScoutError> for TaskFailure {
    fn from(e: CfpScoutError) -> Self {
        Self::Error(e)
    }
}

/// Fetch, extract and record one URL. Strictly ordered: nothing is written
/// to the store until the outcome is known.
#[instrument(skip_all, fields(url = %entry.url, is_retry = is_retry))]
async fn process_url(
    store: &UrlStore,
    fetcher: &Fetcher,
    entry: StoredUrl,
    is_retry: bool,
    opts: &FetchOptions,
    min_confidence: f64,
) -> std::result::Result<UrlOutcome, TaskFailure> {
    let fetched = fetcher.fetch(&entry.url, opts).await;

    let method = fetched.method();
    let is_spa = fetched.is_spa();
    let cached = fetched.is_cached();
    let http_status = fetched.http_status();

    let html = match fetched {
        FetchOutcome::Failed {
            http_status,
            reason,
            ..
        } => {
            store
                .mark_failed(&entry.url, http_status, Some(&reason), is_retry)
                .await?;
            return Ok(UrlOutcome::Failed {
                reason,
                http_status,
            });
        }
        FetchOutcome::Cached { html, .. }
        | FetchOutcome::Static { html, .. }
        | FetchOutcome::Rendered { html, .. } => html,
    };

    // Parsing is CPU-bound; keep it off the async workers.
    let url = entry.url.clone();
    let merged = match tokio::task::spawn_blocking(move || cfpscout_extract::extract(&html, &url))
        .await
    {
        Ok(merged) => merged,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => return Err(TaskFailure::Exception("cancelled")),
    };

    if merged.confidence < min_confidence {
        let reason = FailureReason::LowConfidence;
        info!(
            confidence = merged.confidence,
            method = %merged.extraction_method,
            "below confidence threshold"
        );
        store
            .mark_failed(&entry.url, http_status, Some(&reason), is_retry)
            .await?;
        return Ok(UrlOutcome::Failed {
            reason,
            http_status,
        });
    }

    store
        .mark_extracted(&entry.url, method, is_spa, http_status)
        .await?;
    let record = to_record(&entry, merged, is_spa, Utc::now());
    info!(
        method = %method,
        confidence = record.confidence,
        strategies = %record.extraction_method,
        "extracted"
    );
    Ok(UrlOutcome::Extracted {
        record: Box::new(record),
        method,
        cached,
    })
}
