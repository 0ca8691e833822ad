//! pretalx call-for-participation pages (`/<event>/cfp`).

use scraper::Html;

use cfpscout_shared::ExtractedData;

use crate::html::first_text;

use super::{Lines, PlatformParser, all_dates, apply_location, date_range};

pub struct PretalxParser;

impl PlatformParser for PretalxParser {
    fn name(&self) -> &'static str {
        "pretalx"
    }

    fn url_marker(&self) -> &'static str {
        "pretalx.com"
    }

    fn confidence(&self) -> f64 {
        0.8
    }

    fn parse(&self, doc: &Html) -> ExtractedData {
        let lines = Lines::new(doc);

        // The header carries "<start> – <end>" under the event name.
        let header_dates = first_text(doc, "#event-header .event-date")
            .map(|text| all_dates(&text))
            .unwrap_or_default();
        let (start, end) = date_range(&header_dates);

        let mut data = ExtractedData {
            name: first_text(doc, "#event-header h1").or_else(|| first_text(doc, "h1")),
            description: first_text(doc, "#cfp-text p").or_else(|| first_text(doc, "main p")),
            cfp_close_date: lines.date_after(&["cfp ends", "cfp closes", "deadline"]),
            event_start_date: start,
            event_end_date: end,
            ..ExtractedData::default()
        };
        apply_location(&mut data, first_text(doc, "#event-header .event-location"));
        if data.is_online.is_none() && lines.mentions("online event") {
            data.is_online = Some(true);
        }
        data
    }
}
