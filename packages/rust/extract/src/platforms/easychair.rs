//! EasyChair CFP listings (`easychair.org/cfp/...`).
//!
//! Listings are terse and often hand-edited, hence the low confidence.

use scraper::Html;

use cfpscout_shared::ExtractedData;

use crate::html::{all_texts, first_text};

use super::{Lines, PlatformParser, apply_location, date_range};

pub struct EasyChairParser;

impl PlatformParser for EasyChairParser {
    fn name(&self) -> &'static str {
        "easychair"
    }

    fn url_marker(&self) -> &'static str {
        "easychair.org"
    }

    fn confidence(&self) -> f64 {
        0.6
    }

    fn parse(&self, doc: &Html) -> ExtractedData {
        let lines = Lines::new(doc);
        let (start, end) = date_range(&lines.dates_after(&["conference dates", "dates:"]));

        let mut data = ExtractedData {
            name: first_text(doc, "h1").or_else(|| first_text(doc, "h2")),
            cfp_close_date: lines.date_after(&[
                "submission deadline",
                "paper submission",
                "abstract registration deadline",
            ]),
            event_start_date: start,
            event_end_date: end,
            topics: all_texts(doc, "ul.topics li"),
            ..ExtractedData::default()
        };
        apply_location(&mut data, lines.after(&["location", "venue"]));
        data
    }
}
