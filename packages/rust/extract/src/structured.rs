//! Structured-metadata strategy.
//!
//! Three sub-sources in falling order of trust, each filling only the gaps
//! the previous ones left:
//!
//! | sub-source                       | confidence |
//! |----------------------------------|------------|
//! | JSON-LD `Event` blocks           | 0.8        |
//! | OpenGraph / Twitter card tags    | 0.5        |
//! | `<title>` + meta description     | 0.3        |
//!
//! The result carries the confidence of the most trusted sub-source that
//! contributed, and a method label naming every contributor.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use cfpscout_shared::ExtractedData;

use crate::dates::parse_date;
use crate::html::{clean_text, first_text, meta_content};

pub const METHOD: &str = "structured";

const JSON_LD_CONFIDENCE: f64 = 0.8;
const OPEN_GRAPH_CONFIDENCE: f64 = 0.5;
const META_CONFIDENCE: f64 = 0.3;

pub fn extract(doc: &Html) -> ExtractedData {
    let mut data = ExtractedData::none(METHOD);
    let mut sources: Vec<&str> = Vec::new();

    if let Some(event) = find_event(doc) {
        apply_event(&mut data, &event);
        if !data.is_empty() {
            data.confidence = JSON_LD_CONFIDENCE;
            sources.push("json-ld");
        }
    }

    let og_title = meta_content(doc, "og:title").or_else(|| meta_content(doc, "twitter:title"));
    let og_description = meta_content(doc, "og:description")
        .or_else(|| meta_content(doc, "twitter:description"));
    let named = fill(&mut data.name, og_title);
    let described = fill(&mut data.description, og_description);
    if named || described {
        sources.push("opengraph");
        if data.confidence < OPEN_GRAPH_CONFIDENCE {
            data.confidence = OPEN_GRAPH_CONFIDENCE;
        }
    }

    let title = first_text(doc, "title");
    let description = meta_content(doc, "description");
    let named = fill(&mut data.name, title);
    let described = fill(&mut data.description, description);
    if named || described {
        sources.push("meta");
        if data.confidence < META_CONFIDENCE {
            data.confidence = META_CONFIDENCE;
        }
    }

    if !sources.is_empty() {
        data.extraction_method = format!("{METHOD}:{}", sources.join(","));
    }
    data
}

/// Set `slot` from `value` if the slot is empty. Returns whether it was set.
fn fill(slot: &mut Option<String>, value: Option<String>) -> bool {
    if slot.is_none() {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            *slot = Some(v);
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// JSON-LD
// ---------------------------------------------------------------------------

/// First JSON-LD node typed as an event, searching arrays and `@graph`.
fn find_event(doc: &Html) -> Option<Value> {
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for script in doc.select(&sel) {
        let raw = script.text().collect::<String>();
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "skipping malformed JSON-LD block");
                continue;
            }
        };
        if let Some(event) = search_event(&value) {
            return Some(event.clone());
        }
    }
    None
}

fn search_event(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(search_event),
        Value::Object(map) => {
            if is_event_type(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph").and_then(search_event)
        }
        _ => None,
    }
}

fn is_event_type(ty: Option<&Value>) -> bool {
    match ty {
        Some(Value::String(s)) => s.ends_with("Event") || s == "Hackathon",
        Some(Value::Array(types)) => types.iter().any(|t| is_event_type(Some(t))),
        _ => false,
    }
}

fn apply_event(data: &mut ExtractedData, event: &Value) {
    data.name = str_field(event, "name");
    data.description = str_field(event, "description");
    data.event_start_date = str_field(event, "startDate").and_then(|s| parse_date(&s));
    data.event_end_date = str_field(event, "endDate").and_then(|s| parse_date(&s));

    if let Some(mode) = str_field(event, "eventAttendanceMode") {
        if mode.contains("Online") || mode.contains("Mixed") {
            data.is_online = Some(true);
        } else if mode.contains("Offline") {
            data.is_online = Some(false);
        }
    }

    match event.get("location") {
        Some(Value::Array(locations)) => {
            for loc in locations {
                apply_location(data, loc);
            }
        }
        Some(loc) => apply_location(data, loc),
        None => {}
    }

    data.topics = match event.get("keywords") {
        Some(Value::String(s)) => s
            .split(',')
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };
}

fn apply_location(data: &mut ExtractedData, loc: &Value) {
    match loc {
        Value::String(s) => {
            if data.location.is_none() {
                data.location = Some(clean_text(s));
            }
        }
        Value::Object(map) => {
            let ty = map.get("@type").and_then(Value::as_str).unwrap_or_default();
            if ty == "VirtualLocation" {
                data.is_online = Some(true);
                return;
            }

            let place = str_field(loc, "name");
            let mut city = None;
            let mut country = None;
            let mut street = None;
            match map.get("address") {
                Some(Value::String(s)) => street = Some(clean_text(s)),
                Some(addr @ Value::Object(_)) => {
                    city = str_field(addr, "addressLocality");
                    country = match addr.get("addressCountry") {
                        Some(Value::String(s)) => Some(clean_text(s)),
                        Some(c @ Value::Object(_)) => str_field(c, "name"),
                        _ => None,
                    };
                }
                _ => {}
            }

            if data.location.is_none() {
                let parts: Vec<String> = [place, street, city.clone(), country.clone()]
                    .into_iter()
                    .flatten()
                    .filter(|p| !p.is_empty())
                    .collect();
                if !parts.is_empty() {
                    data.location = Some(parts.join(", "));
                }
            }
            if data.city.is_none() {
                data.city = city;
            }
            if data.country.is_none() {
                data.country = country;
            }
        }
        _ => {}
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    let text = clean_text(value.get(key)?.as_str()?);
    (!text.is_empty()).then_some(text)
}
