//! Calendar-date recognition in free text.
//!
//! Four shapes are recognised: ISO (`2025-03-14`), `March 14, 2025`,
//! `14 March 2025`, and slash-numeric (`03/14/2025`, read as month-first
//! unless the first number cannot be a month). Day ranges sharing one year
//! (`May 20-22, 2025`, `20-22 May 2025`, `May 30 - June 2, 2025`) match as a
//! single date carrying its range end.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// Hyphen, en dash or em dash.
const DASH: &str = r"[-\x{2013}\x{2014}]";

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));

static MONTH_DAY_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .expect("valid regex")
});

static DAY_MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\.?,?\s+(\d{{4}})\b"
    ))
    .expect("valid regex")
});

static MONTH_DAY_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\s*{DASH}\s*(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .expect("valid regex")
});

static DAY_RANGE_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s*{DASH}\s*(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\.?,?\s+(\d{{4}})\b"
    ))
    .expect("valid regex")
});

static CROSS_MONTH_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\s*{DASH}\s*{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .expect("valid regex")
});

static SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid regex"));

/// A date found in text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMatch {
    pub date: NaiveDate,
    /// Last day when the match is a range (`May 20-22, 2025`).
    pub range_end: Option<NaiveDate>,
    pub start: usize,
    pub end: usize,
}

impl DateMatch {
    /// The date, followed by the range end if there is one.
    pub fn dates(self) -> impl Iterator<Item = NaiveDate> {
        std::iter::once(self.date).chain(self.range_end)
    }
}

/// Every date in `text`, in order of appearance. Overlapping matches keep
/// the earliest-starting one.
pub fn find_dates(text: &str) -> Vec<DateMatch> {
    let mut found = Vec::new();
    collect(&ISO_RE, text, &mut found, |c| {
        single(ymd(num(c, 1)?, num(c, 2)?, num(c, 3)?))
    });
    collect(&MONTH_DAY_YEAR_RE, text, &mut found, |c| {
        single(ymd(num(c, 3)?, month_number(&c[1])?, num(c, 2)?))
    });
    collect(&DAY_MONTH_YEAR_RE, text, &mut found, |c| {
        single(ymd(num(c, 3)?, month_number(&c[2])?, num(c, 1)?))
    });
    collect(&SLASH_RE, text, &mut found, |c| {
        let (a, b, year) = (num(c, 1)?, num(c, 2)?, num(c, 3)?);
        if a > 12 {
            single(ymd(year, b, a))
        } else {
            single(ymd(year, a, b))
        }
    });
    collect(&MONTH_DAY_RANGE_RE, text, &mut found, |c| {
        let (year, month) = (num(c, 4)?, month_number(&c[1])?);
        range(ymd(year, month, num(c, 2)?), ymd(year, month, num(c, 3)?))
    });
    collect(&DAY_RANGE_MONTH_RE, text, &mut found, |c| {
        let (year, month) = (num(c, 4)?, month_number(&c[3])?);
        range(ymd(year, month, num(c, 1)?), ymd(year, month, num(c, 2)?))
    });
    collect(&CROSS_MONTH_RANGE_RE, text, &mut found, |c| {
        let year = num(c, 5)?;
        range(
            ymd(year, month_number(&c[1])?, num(c, 2)?),
            ymd(year, month_number(&c[3])?, num(c, 4)?),
        )
    });

    found.sort_by_key(|m| (m.start, std::cmp::Reverse(m.end)));
    let mut result: Vec<DateMatch> = Vec::with_capacity(found.len());
    for m in found {
        if result.last().is_some_and(|prev| m.start < prev.end) {
            continue;
        }
        result.push(m);
    }
    result
}

/// Parse a single date value such as a JSON-LD `startDate`
/// (`2025-06-01`, `2025-06-01T09:00:00+02:00`, `June 1, 2025`).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(prefix) = value.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    find_dates(value).first().map(|m| m.date)
}

fn collect(
    re: &Regex,
    text: &str,
    out: &mut Vec<DateMatch>,
    build: impl Fn(&Captures<'_>) -> Option<(NaiveDate, Option<NaiveDate>)>,
) {
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if let Some((date, range_end)) = build(&caps) {
            out.push(DateMatch {
                date,
                range_end,
                start: whole.start(),
                end: whole.end(),
            });
        }
    }
}

fn single(date: Option<NaiveDate>) -> Option<(NaiveDate, Option<NaiveDate>)> {
    date.map(|d| (d, None))
}

/// A range keeps its start even when the end is impossible or earlier.
fn range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Option<(NaiveDate, Option<NaiveDate>)> {
    let start = start?;
    Some((start, end.filter(|e| *e > start)))
}

fn num(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Month number from an English month name or abbreviation.
pub fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let n = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}
