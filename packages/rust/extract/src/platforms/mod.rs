//! Platform-specific strategy.
//!
//! Known CFP-hosting platforms are selected purely by URL substring. Each
//! parser knows where its platform puts the event name, the deadline and the
//! event dates, and reports a fixed confidence reflecting how reliable that
//! platform's markup is.

mod easychair;
mod papercall;
mod pretalx;
mod sessionize;

use chrono::NaiveDate;
use scraper::Html;

use cfpscout_shared::ExtractedData;

use crate::dates::{DateMatch, find_dates};
use crate::html::visible_text;

pub use easychair::EasyChairParser;
pub use papercall::PaperCallParser;
pub use pretalx::PretalxParser;
pub use sessionize::SessionizeParser;

pub const METHOD_PREFIX: &str = "platform";

/// Subtrees never worth reading on platform pages.
const SKIP: &[&str] = &["script", "style", "noscript", "template", "head", "nav", "footer"];

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

pub trait PlatformParser: Send + Sync {
    /// Short platform name, used in the method label.
    fn name(&self) -> &'static str;

    /// Lower-case URL substring that routes a page to this parser.
    fn url_marker(&self) -> &'static str;

    /// Fixed confidence for a non-empty result.
    fn confidence(&self) -> f64;

    /// Pull whatever fields the page offers. Method and confidence are set
    /// by the registry.
    fn parse(&self, doc: &Html) -> ExtractedData;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Built-in platform parsers, checked in order.
pub struct PlatformRegistry {
    parsers: Vec<Box<dyn PlatformParser>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(SessionizeParser),
                Box::new(PaperCallParser),
                Box::new(PretalxParser),
                Box::new(EasyChairParser),
            ],
        }
    }

    /// The parser whose marker occurs in `url`, if any.
    pub fn detect(&self, url: &str) -> Option<&dyn PlatformParser> {
        let lower = url.to_ascii_lowercase();
        self.parsers
            .iter()
            .find(|p| lower.contains(p.url_marker()))
            .map(|p| p.as_ref())
    }

    /// `None` when the URL belongs to no known platform. A matching page
    /// that yields nothing comes back with zero confidence.
    pub fn extract(&self, doc: &Html, url: &str) -> Option<ExtractedData> {
        let parser = self.detect(url)?;
        let mut data = parser.parse(doc);
        data.extraction_method = format!("{METHOD_PREFIX}:{}", parser.name());
        data.confidence = if data.is_empty() {
            0.0
        } else {
            parser.confidence()
        };
        Some(data)
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Label helpers
// ---------------------------------------------------------------------------

/// Visible page text as lines, with a lower-cased twin for label matching.
pub(crate) struct Lines {
    lines: Vec<String>,
    lower: Vec<String>,
}

impl Lines {
    pub(crate) fn new(doc: &Html) -> Self {
        let lines: Vec<String> = visible_text(doc, SKIP).lines().map(String::from).collect();
        let lower = lines.iter().map(|l| l.to_ascii_lowercase()).collect();
        Self { lines, lower }
    }

    /// Text following the first label occurrence: the rest of the label's
    /// line, or the next line when the label stands alone.
    pub(crate) fn after(&self, labels: &[&str]) -> Option<String> {
        for (i, lower) in self.lower.iter().enumerate() {
            for label in labels {
                let Some(pos) = lower.find(label) else { continue };
                let rest_start = pos + label.len();
                let rest = self.lines[i]
                    .get(rest_start..)
                    .unwrap_or_default()
                    .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
                    .trim();
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
                if let Some(next) = self.lines.get(i + 1) {
                    return Some(next.clone());
                }
            }
        }
        None
    }

    /// Dates in the text following the first label occurrence.
    pub(crate) fn dates_after(&self, labels: &[&str]) -> Vec<NaiveDate> {
        for (i, lower) in self.lower.iter().enumerate() {
            for label in labels {
                let Some(pos) = lower.find(label) else { continue };
                let rest = self.lines[i].get(pos + label.len()..).unwrap_or_default();
                let mut dates = all_dates(rest);
                if dates.is_empty() {
                    if let Some(next) = self.lines.get(i + 1) {
                        dates = all_dates(next);
                    }
                }
                if !dates.is_empty() {
                    return dates;
                }
            }
        }
        Vec::new()
    }

    pub(crate) fn date_after(&self, labels: &[&str]) -> Option<NaiveDate> {
        self.dates_after(labels).into_iter().next()
    }

    pub(crate) fn mentions(&self, needle: &str) -> bool {
        self.lower.iter().any(|l| l.contains(needle))
    }
}

/// Every date in `text`, ranges expanded to start and end.
pub(crate) fn all_dates(text: &str) -> Vec<NaiveDate> {
    find_dates(text).into_iter().flat_map(DateMatch::dates).collect()
}

/// Start and (if later) end date from a date list.
pub(crate) fn date_range(dates: &[NaiveDate]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = dates.first().copied();
    let end = dates.get(1).copied().filter(|end| start.is_some_and(|s| *end >= s));
    (start, end)
}

/// Apply a free-text location: `City, Country` parts, and the online flag.
pub(crate) fn apply_location(data: &mut ExtractedData, location: Option<String>) {
    let Some(location) = location else { return };
    let lower = location.to_lowercase();
    if ["online", "virtual", "remote"].iter().any(|w| lower.contains(w)) {
        data.is_online = Some(true);
        if !lower.contains(',') {
            data.location = Some(location);
            return;
        }
    }
    let parts: Vec<&str> = location
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() >= 2 {
        data.city = Some(parts[0].to_string());
        data.country = parts.last().map(|c| c.to_string());
    }
    data.location = Some(location);
}
