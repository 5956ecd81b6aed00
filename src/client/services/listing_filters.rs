// Pure client-side refinement of search results
use crate::common::models::ListingRecord;

/// Stable ascending sort by the listing's date column (departure for travel,
/// ready-by for shipments). Missing or unparseable dates sort as epoch zero,
/// i.e. first.
pub fn sort_by_date(records: &[ListingRecord]) -> Vec<ListingRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.date_epoch_ms());
    sorted
}

/// Case-insensitive substring filter over the listing's text fields. An empty
/// (after trimming) query returns the input unchanged. Plain containment, no
/// tokenization or ranking.
pub fn filter_by_text(records: &[ListingRecord], query: &str) -> Vec<ListingRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| r.searchable_text().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::models::{ListingKind, LocationInfo, OwnerRef};

    fn listing(id: &str, title: &str, origin_name: &str, date: Option<&str>) -> ListingRecord {
        ListingRecord {
            id: id.into(),
            title: title.into(),
            description: "some description".into(),
            origin: LocationInfo {
                city: "New York".into(),
                name: origin_name.into(),
                code: "JFK".into(),
            },
            destination: LocationInfo {
                city: "Accra".into(),
                name: "Kotoka International".into(),
                code: "ACC".into(),
            },
            departure_date: date.map(String::from),
            ready_by: None,
            max_weight_kg: 5.0,
            price_per_kg: 10.0,
            currency: "USD".into(),
            verified: false,
            type_of_listing: ListingKind::Travel,
            urgency: None,
            owner: OwnerRef { id: "u1".into(), name: "Ama".into() },
        }
    }

    #[test]
    fn filtering_is_idempotent() {
        let records = vec![
            listing("1", "5kg spare", "New York (JFK)", None),
            listing("2", "Documents", "Boston (BOS)", None),
        ];
        let once = filter_by_text(&records, "jfk");
        let twice = filter_by_text(&once, "jfk");
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_query_is_identity() {
        let records = vec![
            listing("1", "first", "New York (JFK)", None),
            listing("2", "second", "Boston (BOS)", None),
        ];
        assert_eq!(filter_by_text(&records, ""), records);
        assert_eq!(filter_by_text(&records, "   "), records);
    }

    #[test]
    fn retains_server_matched_record() {
        // A backend hit on q=JFK must survive the client-side pass with the
        // same term.
        let records = vec![listing("1", "5kg spare", "New York (JFK)", None)];
        let kept = filter_by_text(&records, "JFK");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "1");
    }

    #[test]
    fn match_is_plain_substring() {
        let records = vec![listing("1", "5kg spare", "New York (JFK)", None)];
        assert_eq!(filter_by_text(&records, "york (jf").len(), 1);
        assert!(filter_by_text(&records, "lagos").is_empty());
    }

    #[test]
    fn sort_puts_missing_dates_first() {
        let records = vec![
            listing("dated", "a", "x", Some("2024-06-01T00:00:00Z")),
            listing("undated", "b", "y", None),
            listing("early", "c", "z", Some("2024-01-01T00:00:00Z")),
        ];
        let sorted = sort_by_date(&records);
        assert_eq!(sorted[0].id, "undated");
        assert_eq!(sorted[1].id, "early");
        assert_eq!(sorted[2].id, "dated");
    }

    #[test]
    fn sort_is_stable_for_equal_dates() {
        let records = vec![
            listing("a", "first", "x", Some("2024-06-01T00:00:00Z")),
            listing("b", "second", "y", Some("2024-06-01T00:00:00Z")),
        ];
        let sorted = sort_by_date(&records);
        assert_eq!(sorted[0].id, "a");
        assert_eq!(sorted[1].id, "b");
    }
}
