//! Heuristic strategy: keywords, dates in context, location patterns.
//!
//! Works on any page, so it is the fallback with the lowest baseline. It
//! starts at 0.4 (0.1 when no CFP vocabulary appears at all) and gains 0.2
//! for a deadline date and 0.2 for a location, capped at 1.0.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};

use cfpscout_shared::ExtractedData;

use crate::dates::find_dates;
use crate::html::{clean_text, element_text, first_text, visible_text, window_bounds};

pub const METHOD: &str = "heuristic";

const BASE_CONFIDENCE: f64 = 0.4;
const NO_KEYWORD_CONFIDENCE: f64 = 0.1;
const BUMP: f64 = 0.2;

/// Text this many bytes either side of a date is searched for keywords.
const CONTEXT_RADIUS: usize = 100;

/// Shortest paragraph accepted as a description.
const MIN_DESCRIPTION_LEN: usize = 50;

const SKIP: &[&str] = &[
    "script", "style", "noscript", "template", "head", "nav", "footer", "header",
];

const CFP_KEYWORDS: &[&str] = &[
    "call for papers",
    "call for proposals",
    "call for speakers",
    "call for talks",
    "call for participation",
    "cfp",
    "submit a talk",
    "submit your talk",
    "submit a proposal",
    "submission",
    "speaker",
    "proposal",
];

/// Closing cues; matched as whole words.
const CLOSING_KEYWORDS: &[&str] = &[
    "deadline",
    "closes",
    "closed",
    "closing",
    "close",
    "due",
    "until",
    "submit by",
    "cfp ends",
];

/// Opening cues; a date next to one is when submissions start, never the
/// deadline. Matched as whole words.
const OPENING_KEYWORDS: &[&str] = &["opens", "opened", "opening", "open", "starts", "launch"];

const EVENT_KEYWORDS: &[&str] = &[
    "conference",
    "event",
    "takes place",
    "held on",
    "held in",
    "summit",
    "workshop",
    "join us",
    "festival",
];

const TOPIC_VOCABULARY: &[&str] = &[
    "rust",
    "python",
    "javascript",
    "typescript",
    "golang",
    "java",
    "kotlin",
    "swift",
    "c++",
    "devops",
    "cloud",
    "kubernetes",
    "security",
    "machine learning",
    "artificial intelligence",
    "data engineering",
    "web development",
    "frontend",
    "backend",
    "mobile",
    "testing",
    "open source",
    "databases",
    "accessibility",
    "observability",
    "webassembly",
];

static LABELLED_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\b(?:location|venue|where)\s*:\s*([^\n;|]{3,80})").expect("valid regex")
});

static IN_AT_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in|at)\s+([A-Z][\p{L}'-]+(?:(?:,\s*|\s+)[A-Z][\p{L}'-]+){0,3})")
        .expect("valid regex")
});

static ONLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(online|virtual|remote|hybrid)\b").expect("valid regex")
});

static TOPICS_SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btopics\s+(?:include|of interest include|such as)\s*:?\s*([^.\n]+)")
        .expect("valid regex")
});

/// Capitalized words that look like places but are not.
const NOT_PLACES: &[&str] = &[
    "The", "This", "Our", "Your", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday", "Call", "Papers", "Speakers",
];

pub fn extract(doc: &Html) -> ExtractedData {
    let text = visible_text(doc, SKIP);
    if text.is_empty() {
        return ExtractedData::none(METHOD);
    }
    let lower = text.to_ascii_lowercase();

    let mut data = ExtractedData::none(METHOD);
    data.name = first_text(doc, "h1").or_else(|| first_text(doc, "title"));
    data.description = first_long_paragraph(doc);

    let (deadline, event_dates) = classify_dates(&text, &lower);
    data.cfp_close_date = deadline;
    data.event_start_date = event_dates.first().copied();
    data.event_end_date = event_dates
        .get(1)
        .copied()
        .filter(|end| data.event_start_date.is_some_and(|start| *end >= start));

    data.location = find_location(&text);
    if let Some(location) = &data.location {
        let parts: Vec<&str> = location.split(',').map(str::trim).collect();
        if parts.len() >= 2 {
            data.city = Some(parts[0].to_string());
            data.country = parts.last().map(|c| c.to_string());
        }
    }
    if ONLINE_RE.is_match(&text) {
        data.is_online = Some(true);
    }

    data.topics = find_topics(&text, &lower);
    data.full_text = Some(text);

    let mut confidence = if CFP_KEYWORDS.iter().any(|k| lower.contains(k)) {
        BASE_CONFIDENCE
    } else {
        NO_KEYWORD_CONFIDENCE
    };
    if data.cfp_close_date.is_some() {
        confidence += BUMP;
    }
    if data.location.is_some() {
        confidence += BUMP;
    }
    data.confidence = confidence.min(1.0);
    data
}

fn first_long_paragraph(doc: &Html) -> Option<String> {
    let sel = Selector::parse("p").ok()?;
    doc.select(&sel)
        .filter(|p| {
            !p.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| SKIP.contains(&e.name()))
            })
        })
        .filter_map(element_text)
        .find(|t| t.chars().count() >= MIN_DESCRIPTION_LEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateKind {
    /// Byte distance to the nearest closing cue.
    Deadline(usize),
    Event,
    Opening,
    Unknown,
}

/// The deadline-context date nearest its closing cue (earliest on ties),
/// and event dates in order of appearance. Dates with no keyword nearby
/// count as event dates only when no date has explicit event context.
/// Opening dates are dropped.
fn classify_dates(text: &str, lower: &str) -> (Option<NaiveDate>, Vec<NaiveDate>) {
    let mut deadlines: Vec<(usize, NaiveDate)> = Vec::new();
    let mut events = Vec::new();
    let mut unknown = Vec::new();

    for m in find_dates(text) {
        match classify(lower, m.start, m.end) {
            DateKind::Deadline(distance) => deadlines.push((distance, m.date)),
            DateKind::Event => events.extend(m.dates()),
            DateKind::Opening => {}
            DateKind::Unknown => unknown.extend(m.dates()),
        }
    }

    if events.is_empty() {
        events = unknown;
    }
    events.dedup();
    let deadline = deadlines
        .into_iter()
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, date)| date);
    (deadline, events)
}

/// Classify one date by the keywords around it. Context never crosses a
/// line break.
///
/// An opening cue wins when it is closer than any closing cue and the
/// sentence is about submissions rather than the event. Otherwise the
/// nearer of the closing and event families decides, ties going to the
/// deadline.
fn classify(lower: &str, start: usize, end: usize) -> DateKind {
    let (lo, hi) = window_bounds(lower, start, end, CONTEXT_RADIUS);
    let line_start = lower[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = lower[end..].find('\n').map_or(lower.len(), |i| end + i);
    let (lo, hi) = (lo.max(line_start), hi.min(line_end));
    let ctx = &lower[lo..hi];
    let (d_start, d_end) = (start - lo, end - lo);

    let nearest = |keywords: &[&str], whole_words: bool| -> Option<usize> {
        keywords
            .iter()
            .flat_map(|k| ctx.match_indices(k).map(move |(i, _)| (i, i + k.len())))
            .filter(|&(i, j)| j <= d_start || i >= d_end)
            .filter(|&(i, j)| !whole_words || is_word_at(ctx, i, j))
            .map(|(i, j)| if j <= d_start { d_start - j } else { i - d_end })
            .min()
    };

    let closing = nearest(CLOSING_KEYWORDS, true);
    let event = nearest(EVENT_KEYWORDS, false);

    if let Some(opening) = nearest(OPENING_KEYWORDS, true) {
        let about_submissions = nearest(CFP_KEYWORDS, false)
            .is_some_and(|cfp| event.is_none_or(|e| cfp < e));
        if about_submissions && closing.is_none_or(|c| opening < c) {
            return DateKind::Opening;
        }
    }

    match (closing, event) {
        (Some(c), Some(e)) if c <= e => DateKind::Deadline(c),
        (Some(_), Some(_)) => DateKind::Event,
        (Some(c), None) => DateKind::Deadline(c),
        (None, Some(_)) => DateKind::Event,
        (None, None) => DateKind::Unknown,
    }
}

/// `haystack[start..end]` is not glued to letters or digits on either side.
fn is_word_at(haystack: &str, start: usize, end: usize) -> bool {
    let before = haystack[..start].chars().next_back();
    let after = haystack[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

fn find_location(text: &str) -> Option<String> {
    if let Some(caps) = LABELLED_LOCATION_RE.captures(text) {
        let value = clean_text(&caps[1]);
        if !value.is_empty() {
            return Some(value);
        }
    }

    IN_AT_LOCATION_RE.captures_iter(text).find_map(|caps| {
        let phrase = caps[1].trim_end_matches(',').trim();
        let first = phrase.split([' ', ',']).next().unwrap_or_default();
        let is_place = !NOT_PLACES.contains(&first) && !is_month_name(first);
        is_place.then(|| phrase.to_string())
    })
}

/// Full or abbreviated month name (`May`, `Sept`, `October`).
fn is_month_name(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    const MONTHS: &[&str] = &[
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    MONTHS
        .iter()
        .any(|m| *m == lower || (lower.len() >= 3 && m.starts_with(lower.as_str())))
}

fn find_topics(text: &str, lower: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();

    for term in TOPIC_VOCABULARY {
        if contains_word(lower, term) {
            topics.push((*term).to_string());
        }
    }

    if let Some(caps) = TOPICS_SENTENCE_RE.captures(text) {
        for item in caps[1].split([',', ';']).flat_map(|s| s.split(" and ")) {
            let item = clean_text(item.trim_start_matches("or ")).to_lowercase();
            if !item.is_empty() && item.len() <= 40 && !topics.contains(&item) {
                topics.push(item);
            }
        }
    }
    topics
}

/// `needle` occurs in `haystack` delimited by non-alphanumerics.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack
        .match_indices(needle)
        .any(|(i, _)| is_word_at(haystack, i, i + needle.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn full_cfp_page() {
        let doc = Html::parse_document(
            r#"<html><head><title>DevFest North | CFP</title></head><body>
            <nav>Home | Schedule | Sponsors</nav>
            <h1>DevFest North 2025</h1>
            <p>Short intro.</p>
            <p>DevFest North is a community-run conference for developers of every stripe across the region.</p>
            <p>Call for papers: submissions close on March 1, 2025.</p>
            <p>The conference takes place on May 20, 2025 and May 21, 2025.</p>
            <p>Location: Leeds, United Kingdom</p>
            <p>Topics include: Rust, cloud native and developer experience.</p>
            <footer>Contact us in London</footer>
            </body></html>"#,
        );
        let data = extract(&doc);

        assert_eq!(data.name.as_deref(), Some("DevFest North 2025"));
        assert!(data.description.as_deref().unwrap().starts_with("DevFest North is"));
        assert_eq!(data.cfp_close_date, d(2025, 3, 1));
        assert_eq!(data.event_start_date, d(2025, 5, 20));
        assert_eq!(data.location.as_deref(), Some("Leeds, United Kingdom"));
        assert_eq!(data.city.as_deref(), Some("Leeds"));
        assert_eq!(data.country.as_deref(), Some("United Kingdom"));
        assert!(data.topics.contains(&"rust".to_string()));
        assert!(data.topics.contains(&"cloud native".to_string()));
        assert!(!data.full_text.as_deref().unwrap().contains("Sponsors"));
        assert!((data.confidence - 0.8).abs() < 1e-9);
        assert_eq!(data.extraction_method, METHOD);
    }

    #[test]
    fn no_keywords_drops_confidence() {
        let doc = Html::parse_document("<h1>My Blog</h1><p>Nothing to see here.</p>");
        let data = extract(&doc);
        assert!((data.confidence - NO_KEYWORD_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn in_at_location_and_online_flag() {
        let doc = Html::parse_document(
            "<h1>Call for Speakers</h1><p>Join us in Berlin, Germany or online on June 3, 2025.</p>",
        );
        let data = extract(&doc);
        assert_eq!(data.location.as_deref(), Some("Berlin, Germany"));
        assert_eq!(data.is_online, Some(true));
        assert_eq!(data.event_start_date, d(2025, 6, 3));
        assert!(data.cfp_close_date.is_none());
    }

    #[test]
    fn month_names_are_not_places() {
        assert_eq!(find_location("Submissions open in March 2025"), None);
        assert_eq!(find_location("See you in Sept!"), None);
        assert_eq!(find_location("held in Porto"), Some("Porto".into()));
    }

    #[test]
    fn deadline_beats_event_when_closer() {
        let text = "The conference is great. Deadline: 2025-04-01.";
        let lower = text.to_ascii_lowercase();
        let (deadline, events) = classify_dates(text, &lower);
        assert_eq!(deadline, d(2025, 4, 1));
        assert!(events.is_empty());
    }

    #[test]
    fn opening_date_is_not_the_deadline() {
        let doc = Html::parse_document(
            "<p>Call for papers opens January 10, 2025. Submissions close March 1, 2025.</p>",
        );
        let data = extract(&doc);
        assert_eq!(data.cfp_close_date, d(2025, 3, 1));
        assert!(data.event_start_date.is_none());
    }

    #[test]
    fn open_and_close_in_one_sentence() {
        let doc = Html::parse_document(
            "<p>Submissions open January 10, 2025 and close March 1, 2025.</p>",
        );
        let data = extract(&doc);
        assert_eq!(data.cfp_close_date, d(2025, 3, 1));
    }

    #[test]
    fn bare_submissions_is_not_a_deadline_cue() {
        let text = "Submissions: see the form. Published 2025-02-01.";
        let lower = text.to_ascii_lowercase();
        let (deadline, _) = classify_dates(text, &lower);
        assert_eq!(deadline, None);
    }

    #[test]
    fn deadline_nearest_a_closing_word_wins() {
        let text = "Proposals reviewed from 2025-01-05 onward, final deadline 2025-02-15.";
        let lower = text.to_ascii_lowercase();
        let (deadline, _) = classify_dates(text, &lower);
        assert_eq!(deadline, d(2025, 2, 15));
    }

    #[test]
    fn conference_start_is_an_event_date() {
        let doc = Html::parse_document(
            "<p>The conference starts May 20-22, 2025.</p><p>CFP closes March 1, 2025.</p>",
        );
        let data = extract(&doc);
        assert_eq!(data.event_start_date, d(2025, 5, 20));
        assert_eq!(data.event_end_date, d(2025, 5, 22));
        assert_eq!(data.cfp_close_date, d(2025, 3, 1));
    }

    #[test]
    fn empty_page_is_none() {
        let data = extract(&Html::parse_document(""));
        assert_eq!(data.confidence, 0.0);
    }

    #[test]
    fn topic_words_need_boundaries() {
        assert!(contains_word("we love rust.", "rust"));
        assert!(!contains_word("trustworthy", "rust"));
    }
}
