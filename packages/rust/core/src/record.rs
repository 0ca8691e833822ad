//! Conversion from a merged extraction to the domain record.

use chrono::{DateTime, Utc};

use cfpscout_shared::{CfpRecord, ExtractedData, StoredUrl, record_id};

/// Build the record for `entry` from its merged extraction.
///
/// The id depends only on the normalized URL, so re-extracting a page
/// yields the same record id. The name falls back to the store's display
/// name, then to the URL itself.
pub fn to_record(
    entry: &StoredUrl,
    data: ExtractedData,
    is_spa: bool,
    extracted_at: DateTime<Utc>,
) -> CfpRecord {
    let name = data
        .name
        .or_else(|| entry.display_name.clone())
        .unwrap_or_else(|| entry.url.clone());

    CfpRecord {
        id: record_id(&entry.url),
        url: entry.url.clone(),
        source: entry.source.clone(),
        submission_url: entry.submission_url.clone(),
        name,
        description: data.description,
        cfp_close_date: data.cfp_close_date,
        event_start_date: data.event_start_date,
        event_end_date: data.event_end_date,
        city: data.city,
        country: data.country,
        location: data.location,
        is_online: data.is_online.unwrap_or(false),
        topics: data.topics,
        extraction_method: data.extraction_method,
        confidence: data.confidence,
        is_spa,
        extracted_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> StoredUrl {
        let mut entry = StoredUrl::new("https://example.com/cfp", "test", Utc::now());
        entry.display_name = Some("Example Conf".into());
        entry.submission_url = Some("https://example.com/submit".into());
        entry
    }

    #[test]
    fn name_falls_back_to_display_name() {
        let data = ExtractedData {
            confidence: 0.4,
            ..ExtractedData::none("heuristic")
        };
        let record = to_record(&entry(), data, false, Utc::now());
        assert_eq!(record.name, "Example Conf");
        assert_eq!(record.submission_url.as_deref(), Some("https://example.com/submit"));
        assert!(!record.is_online);
    }

    #[test]
    fn extracted_fields_win() {
        let data = ExtractedData {
            name: Some("Found Name".into()),
            is_online: Some(true),
            topics: vec!["rust".into()],
            confidence: 0.8,
            ..ExtractedData::none("structured:json-ld")
        };
        let record = to_record(&entry(), data, true, Utc::now());
        assert_eq!(record.name, "Found Name");
        assert!(record.is_online);
        assert!(record.is_spa);
        assert_eq!(record.topics, ["rust"]);
        assert_eq!(record.extraction_method, "structured:json-ld");
    }

    #[test]
    fn id_is_stable() {
        let a = to_record(&entry(), ExtractedData::none("x"), false, Utc::now());
        let b = to_record(&entry(), ExtractedData::none("y"), true, Utc::now());
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, record_id("https://example.com/cfp/"));
    }
}
