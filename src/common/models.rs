use serde::{Deserialize, Serialize};

/// Parse an ISO-8601 timestamp to epoch milliseconds. Unparseable or missing
/// values sort as epoch zero, i.e. first in ascending order.
pub fn parse_epoch_ms(ts: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Travel,
    Shipment,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Travel => "travel",
            ListingKind::Shipment => "shipment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "travel" => Some(ListingKind::Travel),
            "shipment" => Some(ListingKind::Shipment),
            _ => None,
        }
    }
}

/// UI-level partition of listings. `routes` maps to travel-capacity posts,
/// `items` to shipment requests, `all` applies no kind filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segment {
    Routes,
    Items,
    #[default]
    All,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Routes => "routes",
            Segment::Items => "items",
            Segment::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "routes" => Some(Segment::Routes),
            "items" => Some(Segment::Items),
            "all" => Some(Segment::All),
            _ => None,
        }
    }

    /// Server-side mapping: which listing kind this segment filters to.
    pub fn kind_filter(&self) -> Option<ListingKind> {
        match self {
            Segment::Routes => Some(ListingKind::Travel),
            Segment::Items => Some(ListingKind::Shipment),
            Segment::All => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub city: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: String,
    pub name: String,
}

/// A travel-capacity or shipment-request post in the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub origin: LocationInfo,
    pub destination: LocationInfo,
    /// Departure timestamp, set for travel listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<String>,
    /// Ready-by timestamp, set for shipment listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_by: Option<String>,
    pub max_weight_kg: f64,
    pub price_per_kg: f64,
    pub currency: String,
    pub verified: bool,
    pub type_of_listing: ListingKind,
    /// Only meaningful when `type_of_listing` is `shipment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    pub owner: OwnerRef,
}

impl ListingRecord {
    /// The date column relevant to this listing's kind.
    pub fn date_value(&self) -> Option<&str> {
        match self.type_of_listing {
            ListingKind::Travel => self.departure_date.as_deref(),
            ListingKind::Shipment => self.ready_by.as_deref(),
        }
    }

    pub fn date_epoch_ms(&self) -> i64 {
        self.date_value().map(parse_epoch_ms).unwrap_or(0)
    }

    /// Lower-cased concatenation of the text fields the client filters on.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {}",
            self.title,
            self.description,
            self.origin.city,
            self.origin.name,
            self.origin.code,
            self.destination.city,
            self.destination.name,
            self.destination.code
        )
        .to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub name: String,
}

/// A unit of conversation as it travels over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub user: MessageAuthor,
    pub created_at: String,
}

impl ChatMessage {
    pub fn created_at_epoch_ms(&self) -> i64 {
        parse_epoch_ms(&self.created_at)
    }
}

/// Persistence row shape accepted by the message store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub segment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub travellers: Vec<ListingRecord>,
    #[serde(default)]
    pub shipments: Vec<ListingRecord>,
    pub total: usize,
    pub took_ms: u64,
    pub params: SearchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHit {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationParams {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    #[serde(default)]
    pub data: Vec<LocationHit>,
    pub total: usize,
    pub took_ms: u64,
    pub params: LocationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_kind_mapping() {
        assert_eq!(Segment::Routes.kind_filter(), Some(ListingKind::Travel));
        assert_eq!(Segment::Items.kind_filter(), Some(ListingKind::Shipment));
        assert_eq!(Segment::All.kind_filter(), None);
    }

    #[test]
    fn parse_epoch_ms_falls_back_to_zero() {
        assert_eq!(parse_epoch_ms("not-a-date"), 0);
        assert_eq!(parse_epoch_ms(""), 0);
        assert!(parse_epoch_ms("2024-01-01T00:00:01Z") > parse_epoch_ms("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn listing_roundtrip_uses_camel_case() {
        let record = ListingRecord {
            id: "l1".into(),
            title: "3kg free to Accra".into(),
            description: "Direct flight".into(),
            origin: LocationInfo {
                city: "New York".into(),
                name: "New York (JFK)".into(),
                code: "JFK".into(),
            },
            destination: LocationInfo {
                city: "Accra".into(),
                name: "Kotoka Intl".into(),
                code: "ACC".into(),
            },
            departure_date: Some("2024-06-01T09:00:00Z".into()),
            ready_by: None,
            max_weight_kg: 3.0,
            price_per_kg: 12.5,
            currency: "USD".into(),
            verified: true,
            type_of_listing: ListingKind::Travel,
            urgency: None,
            owner: OwnerRef { id: "u1".into(), name: "Ama".into() },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["typeOfListing"], "travel");
        assert_eq!(json["departureDate"], "2024-06-01T09:00:00Z");
        assert_eq!(json["maxWeightKg"], 3.0);
        let back: ListingRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn searchable_text_covers_both_endpoints() {
        let record = ListingRecord {
            id: "l1".into(),
            title: "Spare capacity".into(),
            description: "desc".into(),
            origin: LocationInfo {
                city: "New York".into(),
                name: "New York (JFK)".into(),
                code: "JFK".into(),
            },
            destination: LocationInfo {
                city: "Accra".into(),
                name: "Kotoka Intl".into(),
                code: "ACC".into(),
            },
            departure_date: None,
            ready_by: None,
            max_weight_kg: 1.0,
            price_per_kg: 1.0,
            currency: "USD".into(),
            verified: false,
            type_of_listing: ListingKind::Travel,
            urgency: None,
            owner: OwnerRef { id: "u1".into(), name: "Ama".into() },
        };
        let text = record.searchable_text();
        assert!(text.contains("jfk"));
        assert!(text.contains("acc"));
        assert!(text.contains("spare capacity"));
    }
}
