//! PaperCall.io event pages.

use scraper::Html;

use cfpscout_shared::ExtractedData;

use crate::html::{all_texts, first_text};

use super::{Lines, PlatformParser, apply_location, date_range};

pub struct PaperCallParser;

impl PlatformParser for PaperCallParser {
    fn name(&self) -> &'static str {
        "papercall"
    }

    fn url_marker(&self) -> &'static str {
        "papercall.io"
    }

    fn confidence(&self) -> f64 {
        0.85
    }

    fn parse(&self, doc: &Html) -> ExtractedData {
        let lines = Lines::new(doc);
        let (start, end) = date_range(&lines.dates_after(&["event dates", "event date"]));

        let mut data = ExtractedData {
            name: first_text(doc, ".event-header h1").or_else(|| first_text(doc, "h1")),
            description: first_text(doc, ".event-description p")
                .or_else(|| first_text(doc, ".event-description")),
            cfp_close_date: lines.date_after(&["cfp closes", "closes at", "closes on"]),
            event_start_date: start,
            event_end_date: end,
            topics: all_texts(doc, ".event-tags .tag"),
            ..ExtractedData::default()
        };
        apply_location(&mut data, lines.after(&["location"]));
        data
    }
}
