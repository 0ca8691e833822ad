//! Sessionize call-for-speakers pages.
//!
//! Event details sit in `.ibox-content` as pairs of a muted label
//! (`event date`, `location`, `Call closes at 11:59 PM`) followed by a
//! heading holding the value.

use scraper::{ElementRef, Html, Selector};

use cfpscout_shared::ExtractedData;

use crate::dates::find_dates;
use crate::html::{clean_text, element_text, first_text};

use super::{Lines, PlatformParser, all_dates, apply_location, date_range};

pub struct SessionizeParser;

impl PlatformParser for SessionizeParser {
    fn name(&self) -> &'static str {
        "sessionize"
    }

    fn url_marker(&self) -> &'static str {
        "sessionize.com"
    }

    fn confidence(&self) -> f64 {
        0.9
    }

    fn parse(&self, doc: &Html) -> ExtractedData {
        let mut data = ExtractedData {
            name: first_text(doc, ".ibox-title h4").or_else(|| first_text(doc, "h4")),
            description: first_text(doc, ".ibox-content .sz-cssgrid__description")
                .or_else(|| first_text(doc, ".ibox-content p")),
            ..ExtractedData::default()
        };

        let mut location = None;
        for (label, value) in labelled_values(doc) {
            if label.contains("event date") {
                let dates = all_dates(&value);
                (data.event_start_date, data.event_end_date) = date_range(&dates);
            } else if label.contains("call closes") || label.contains("cfs closes") {
                data.cfp_close_date = find_dates(&value).first().map(|m| m.date);
            } else if label.contains("location") {
                location = Some(value);
            }
        }

        // Older layouts print the deadline inline.
        if data.cfp_close_date.is_none() {
            data.cfp_close_date =
                Lines::new(doc).date_after(&["call for speakers closes", "call closes"]);
        }

        apply_location(&mut data, location);
        data
    }
}

/// `(lowercased label, value)` for every `.text-muted` label whose next
/// element sibling carries text.
fn labelled_values(doc: &Html) -> Vec<(String, String)> {
    let Ok(sel) = Selector::parse(".ibox-content .text-muted") else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|label| {
            let value = label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find_map(element_text)?;
            Some((clean_text(&label.text().collect::<String>()).to_lowercase(), value))
        })
        .collect()
}
