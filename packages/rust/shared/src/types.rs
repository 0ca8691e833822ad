//! Core domain types for cfpscout.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CfpScoutError;

/// Normalize a URL for use as the store's dedup key and record identity.
///
/// Surrounding whitespace and trailing slashes are removed; nothing else is
/// rewritten, so `https://a.dev/cfp/` and `https://a.dev/cfp` collapse.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Stable record identity: a UUID v5 of the normalized URL in the URL namespace.
pub fn record_id(url: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, normalize_url(url).as_bytes())
}

// ---------------------------------------------------------------------------
// FetchMethod
// ---------------------------------------------------------------------------

/// How a page's HTML was ultimately obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Plain HTTP GET.
    #[default]
    Static,
    /// Headless browser rendering.
    Rendered,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Rendered => "rendered",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMethod {
    type Err = CfpScoutError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "rendered" => Ok(Self::Rendered),
            other => Err(CfpScoutError::validation(format!(
                "unknown fetch method '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// FailureReason
// ---------------------------------------------------------------------------

/// Classified reason a URL failed to produce a record.
///
/// The string form (see [`FailureReason::as_string`]) is what gets persisted
/// in the URL store's `error_reason` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Request timed out.
    Timeout,
    /// TCP/DNS connection failure.
    ConnectionError,
    /// TLS handshake or certificate failure.
    SslError,
    /// Non-success HTTP status.
    Http(u16),
    /// Page was reachable but yielded no usable CFP data.
    LowConfidence,
    /// Headless rendering produced no document.
    RenderFailed,
    /// URL could not be parsed.
    InvalidUrl,
    /// Unexpected error while processing a single URL, tagged by kind.
    Exception(String),
    /// Anything else; treated as retryable.
    Other(String),
}

impl FailureReason {
    /// Whether retrying could plausibly change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(code) => !matches!(code, 401 | 403 | 404 | 410),
            Self::LowConfidence | Self::InvalidUrl => false,
            Self::Timeout
            | Self::ConnectionError
            | Self::SslError
            | Self::RenderFailed
            | Self::Exception(_)
            | Self::Other(_) => true,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Self::Timeout => "timeout".into(),
            Self::ConnectionError => "connection_error".into(),
            Self::SslError => "ssl_error".into(),
            Self::Http(code) => code.to_string(),
            Self::LowConfidence => "low_confidence".into(),
            Self::RenderFailed => "render_failed".into(),
            Self::InvalidUrl => "invalid_url".into(),
            Self::Exception(kind) => format!("exception:{kind}"),
            Self::Other(s) => s.clone(),
        }
    }

    /// Parse a persisted reason string. Never fails: unrecognised strings
    /// become [`FailureReason::Other`].
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(code) = s.parse::<u16>() {
            return Self::Http(code);
        }
        if let Some(kind) = s.strip_prefix("exception:") {
            return Self::Exception(kind.to_string());
        }
        match s {
            "timeout" => Self::Timeout,
            "connection_error" => Self::ConnectionError,
            "ssl_error" => Self::SslError,
            "low_confidence" => Self::LowConfidence,
            "render_failed" => Self::RenderFailed,
            "invalid_url" => Self::InvalidUrl,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

// ---------------------------------------------------------------------------
// StoredUrl
// ---------------------------------------------------------------------------

/// Lifecycle state derived from a [`StoredUrl`]'s flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStatus {
    Pending,
    Extracted,
    Failed,
}

/// One entry in the URL store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUrl {
    /// Normalized URL (unique key).
    pub url: String,
    /// Provenance tag (which discovery source found it).
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Submission URL, only when distinct from `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_url: Option<String>,
    pub extracted: bool,
    pub extraction_failed: bool,
    pub retry_count: u32,
    pub max_retries_reached: bool,
    pub fetch_method: FetchMethod,
    pub is_spa: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub added_time: DateTime<Utc>,
}

impl StoredUrl {
    /// A fresh pending entry.
    pub fn new(url: &str, source: &str, added_time: DateTime<Utc>) -> Self {
        Self {
            url: normalize_url(url),
            source: source.to_string(),
            display_name: None,
            submission_url: None,
            extracted: false,
            extraction_failed: false,
            retry_count: 0,
            max_retries_reached: false,
            fetch_method: FetchMethod::Static,
            is_spa: false,
            http_status: None,
            error_reason: None,
            last_attempt_time: None,
            added_time,
        }
    }

    pub fn status(&self) -> UrlStatus {
        if self.extracted {
            UrlStatus::Extracted
        } else if self.extraction_failed {
            UrlStatus::Failed
        } else {
            UrlStatus::Pending
        }
    }

    /// Classified failure reason, if the entry has one.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.error_reason.as_deref().map(FailureReason::parse)
    }
}

// ---------------------------------------------------------------------------
// ExtractedData
// ---------------------------------------------------------------------------

/// Partial CFP record produced by one extraction strategy (or by a merge).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cfp_close_date: Option<NaiveDate>,
    pub event_start_date: Option<NaiveDate>,
    pub event_end_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Free-text location as found on the page.
    pub location: Option<String>,
    /// `Some(true)` when online/virtual/remote/hybrid attendance was detected.
    pub is_online: Option<bool>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Visible page text, when the strategy captured it.
    pub full_text: Option<String>,
    /// Provenance label of the strategy (or strategies, after merging).
    pub extraction_method: String,
    /// Self-assessed confidence in `[0, 1]`. Zero means nothing usable.
    pub confidence: f64,
}

impl ExtractedData {
    /// A zero-confidence result carrying only its method label.
    pub fn none(method: impl Into<String>) -> Self {
        Self {
            extraction_method: method.into(),
            ..Self::default()
        }
    }

    /// True if no CFP field is populated (method/confidence are ignored).
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.cfp_close_date.is_none()
            && self.event_start_date.is_none()
            && self.event_end_date.is_none()
            && self.city.is_none()
            && self.country.is_none()
            && self.location.is_none()
            && self.is_online.is_none()
            && self.topics.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CfpRecord
// ---------------------------------------------------------------------------

/// The reconciled, domain-shaped CFP record handed to the indexing sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfpRecord {
    /// UUID v5 of the normalized URL (see [`record_id`]).
    pub id: Uuid,
    pub url: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_url: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfp_close_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    pub extraction_method: String,
    pub confidence: f64,
    pub is_spa: bool,
    pub extracted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_url(" https://example.com/cfp/ "),
            "https://example.com/cfp"
        );
        assert_eq!(normalize_url("https://example.com/cfp"), "https://example.com/cfp");
    }

    #[test]
    fn record_id_is_stable_across_slash_variants() {
        let a = record_id("https://example.com/cfp");
        let b = record_id("https://example.com/cfp/");
        assert_eq!(a, b);
        assert_ne!(a, record_id("https://example.com/other"));
    }

    #[test]
    fn failure_reason_classification() {
        for code in [401u16, 403, 404, 410] {
            assert!(!FailureReason::Http(code).is_retryable(), "{code}");
        }
        for code in [429u16, 500, 502, 503, 504] {
            assert!(FailureReason::Http(code).is_retryable(), "{code}");
        }
        assert!(FailureReason::Timeout.is_retryable());
        assert!(FailureReason::SslError.is_retryable());
        assert!(!FailureReason::LowConfidence.is_retryable());
        assert!(FailureReason::parse("something_new").is_retryable());
    }

    #[test]
    fn failure_reason_string_forms() {
        assert_eq!(FailureReason::parse("404"), FailureReason::Http(404));
        assert_eq!(
            FailureReason::parse("exception:storage"),
            FailureReason::Exception("storage".into())
        );
        assert_eq!(FailureReason::Exception("io".into()).to_string(), "exception:io");
        assert_eq!(FailureReason::parse("low_confidence"), FailureReason::LowConfidence);
    }

    #[test]
    fn stored_url_status() {
        let mut entry = StoredUrl::new("https://example.com/cfp/", "test", Utc::now());
        assert_eq!(entry.url, "https://example.com/cfp");
        assert_eq!(entry.status(), UrlStatus::Pending);
        entry.extraction_failed = true;
        assert_eq!(entry.status(), UrlStatus::Failed);
    }

    #[test]
    fn extracted_data_none_is_empty() {
        let data = ExtractedData::none("heuristic");
        assert!(data.is_empty());
        assert_eq!(data.confidence, 0.0);
        assert_eq!(data.extraction_method, "heuristic");
    }
}
