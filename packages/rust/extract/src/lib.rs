//! CFP field extraction from raw HTML.
//!
//! Three independent strategies each turn a page into a partial,
//! confidence-scored [`ExtractedData`]:
//!
//! - [`structured`]: JSON-LD events, OpenGraph tags, bare `<title>`/meta
//! - [`platforms`]: bespoke parsers for known CFP-hosting sites, by URL
//! - [`heuristic`]: keywords, dates in context, location patterns
//!
//! [`merge`] folds them into one record by confidence.

pub mod dates;
pub mod heuristic;
pub mod html;
pub mod merge;
pub mod platforms;
pub mod structured;

use scraper::Html;
use tracing::{debug, instrument};

use cfpscout_shared::ExtractedData;

pub use merge::merge;
pub use platforms::{PlatformParser, PlatformRegistry};

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run every applicable strategy over `html`. The platform result is
/// present only when `url` belongs to a known platform.
pub fn extract_all(html: &str, url: &str) -> Vec<ExtractedData> {
    let doc = Html::parse_document(html);
    let mut results = Vec::with_capacity(3);
    results.push(structured::extract(&doc));
    if let Some(platform) = PlatformRegistry::new().extract(&doc, url) {
        results.push(platform);
    }
    results.push(heuristic::extract(&doc));
    results
}

/// All strategies, merged.
#[instrument(skip_all, fields(url = %url))]
pub fn extract(html: &str, url: &str) -> ExtractedData {
    let results = extract_all(html, url);
    for r in &results {
        debug!(method = %r.extraction_method, confidence = r.confidence, "strategy result");
    }
    let merged = merge(results);
    debug!(
        method = %merged.extraction_method,
        confidence = merged.confidence,
        "merged extraction"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixture(name: &str) -> String {
        let path = format!(
            "{}/../../../fixtures/html/{name}",
            env!("CARGO_MANIFEST_DIR")
        );
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
    }

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn sessionize_page() {
        let data = extract(
            &fixture("sessionize.html"),
            "https://sessionize.com/kotlinconf-2025/",
        );
        assert_eq!(data.name.as_deref(), Some("KotlinConf 2025"));
        assert_eq!(data.cfp_close_date, d(2025, 1, 5));
        assert_eq!(data.event_start_date, d(2025, 5, 21));
        assert_eq!(data.event_end_date, d(2025, 5, 23));
        assert_eq!(data.city.as_deref(), Some("Copenhagen"));
        assert_eq!(data.country.as_deref(), Some("Denmark"));
        assert_eq!(data.confidence, 0.9);
        assert!(data.extraction_method.starts_with("platform:sessionize+"));
    }

    #[test]
    fn papercall_page() {
        let data = extract(
            &fixture("papercall.html"),
            "https://www.papercall.io/devopsdays-ams-2025",
        );
        assert_eq!(data.name.as_deref(), Some("devopsdays Amsterdam 2025"));
        assert_eq!(data.cfp_close_date, d(2025, 3, 15));
        assert_eq!(data.event_start_date, d(2025, 6, 24));
        assert_eq!(data.event_end_date, d(2025, 6, 26));
        assert_eq!(data.location.as_deref(), Some("Amsterdam, Netherlands"));
        assert_eq!(data.topics, ["devops", "culture", "automation"]);
        assert_eq!(data.confidence, 0.85);
    }

    #[test]
    fn pretalx_page() {
        let data = extract(
            &fixture("pretalx.html"),
            "https://pretalx.com/pyconde-pydata-2025/cfp",
        );
        assert_eq!(data.name.as_deref(), Some("PyCon DE & PyData 2025"));
        assert_eq!(data.cfp_close_date, d(2024, 12, 22));
        assert_eq!(data.event_start_date, d(2025, 4, 23));
        assert_eq!(data.event_end_date, d(2025, 4, 25));
        assert_eq!(data.city.as_deref(), Some("Darmstadt"));
        assert_eq!(data.confidence, 0.8);
    }

    #[test]
    fn easychair_page() {
        let results = extract_all(
            &fixture("easychair.html"),
            "https://easychair.org/cfp/ICSE2026",
        );
        let data = results
            .iter()
            .find(|r| r.extraction_method == "platform:easychair")
            .expect("easychair result");
        assert_eq!(
            data.name.as_deref(),
            Some("ICSE 2026: 48th International Conference on Software Engineering")
        );
        assert_eq!(data.cfp_close_date, d(2025, 7, 18));
        assert_eq!(data.event_start_date, d(2026, 4, 12));
        assert_eq!(data.event_end_date, d(2026, 4, 18));
        assert_eq!(data.location.as_deref(), Some("Rio de Janeiro, Brazil"));
        assert_eq!(data.city.as_deref(), Some("Rio de Janeiro"));
        assert_eq!(data.country.as_deref(), Some("Brazil"));
        assert_eq!(
            data.topics,
            ["software testing", "program analysis", "empirical studies"]
        );
        assert_eq!(data.confidence, 0.6);

        let merged = merge(results);
        assert!(merged.extraction_method.contains("platform:easychair"));
        assert_eq!(merged.cfp_close_date, d(2025, 7, 18));
        assert_eq!(merged.event_end_date, d(2026, 4, 18));
    }

    #[test]
    fn json_ld_page_gap_filled_by_heuristic() {
        let data = extract(&fixture("jsonld_event.html"), "https://rustconf.com/cfp");
        assert_eq!(data.name.as_deref(), Some("RustConf 2025"));
        assert_eq!(
            data.description.as_deref(),
            Some("The annual gathering of the Rust community.")
        );
        assert_eq!(data.event_start_date, d(2025, 9, 2));
        assert_eq!(data.city.as_deref(), Some("Seattle"));
        assert_eq!(data.is_online, Some(false));
        // Only the heuristic strategy sees the deadline sentence.
        assert_eq!(data.cfp_close_date, d(2025, 4, 13));
        assert!(data.full_text.is_some());
        assert_eq!(data.confidence, 0.8);
        assert_eq!(data.extraction_method, "structured:json-ld+heuristic");
    }

    #[test]
    fn generic_page_falls_back_to_heuristic() {
        let results = extract_all(
            &fixture("heuristic_cfp.html"),
            "https://nordicsystems.example/cfp",
        );
        assert_eq!(results.len(), 2, "no platform result for unknown hosts");

        let data = merge(results);
        assert_eq!(data.name.as_deref(), Some("Nordic Systems Summit 2025"));
        assert_eq!(data.cfp_close_date, d(2025, 2, 28));
        assert_eq!(data.event_start_date, d(2025, 6, 12));
        assert_eq!(data.event_end_date, d(2025, 6, 13));
        assert_eq!(data.location.as_deref(), Some("Oslo, Norway"));
        assert!(data.topics.contains(&"storage engines".to_string()));
        assert!(data.topics.contains(&"observability".to_string()));
        assert!((data.confidence - 0.8).abs() < 1e-9);
        assert_eq!(data.extraction_method, "heuristic+structured:meta");
    }

    #[test]
    fn spa_shell_has_only_page_metadata() {
        let data = extract(&fixture("spa_shell.html"), "https://app.example.com/");
        assert_eq!(data.extraction_method, "structured:meta");
        assert!(data.cfp_close_date.is_none());
        assert!(data.full_text.is_none());
    }
}
