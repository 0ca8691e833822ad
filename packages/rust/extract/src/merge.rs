//! Merge Engine: fold per-strategy results into one record.

use cfpscout_shared::ExtractedData;

/// Method label of the result when no input had anything to offer.
pub const NONE_METHOD: &str = "none";

/// Combine strategy outputs by confidence.
///
/// Zero-confidence inputs are dropped. The most confident input seeds the
/// result; every following input (in descending confidence) only fills
/// fields that are still empty. The method label lists each contributor once
/// in rank order, joined with `+`, and the confidence is the seed's.
pub fn merge(inputs: Vec<ExtractedData>) -> ExtractedData {
    let mut ranked: Vec<ExtractedData> = inputs
        .into_iter()
        .filter(|d| d.confidence > 0.0)
        .collect();
    if ranked.is_empty() {
        return ExtractedData::none(NONE_METHOD);
    }
    // Stable sort keeps caller order among equal confidences.
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut rest = ranked.into_iter();
    let Some(mut merged) = rest.next() else {
        return ExtractedData::none(NONE_METHOD);
    };
    let mut methods = vec![merged.extraction_method.clone()];

    for next in rest {
        if !methods.contains(&next.extraction_method) {
            methods.push(next.extraction_method.clone());
        }
        fill_gaps(&mut merged, next);
    }

    merged.extraction_method = methods.join("+");
    merged
}

fn fill_gaps(into: &mut ExtractedData, from: ExtractedData) {
    fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
        if slot.is_none() {
            *slot = value;
        }
    }

    fill(&mut into.name, from.name);
    fill(&mut into.description, from.description);
    fill(&mut into.cfp_close_date, from.cfp_close_date);
    fill(&mut into.event_start_date, from.event_start_date);
    fill(&mut into.event_end_date, from.event_end_date);
    fill(&mut into.city, from.city);
    fill(&mut into.country, from.country);
    fill(&mut into.location, from.location);
    fill(&mut into.is_online, from.is_online);
    fill(&mut into.full_text, from.full_text);
    if into.topics.is_empty() {
        into.topics = from.topics;
    }
}
