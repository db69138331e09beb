use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain recorded when a fragment could not be turned into a hostname.
pub const UNPARSEABLE: &str = "unparseable";

/// Raw text recorded for an ad marker with no parseable sibling.
pub const NOT_FOUND: &str = "not found";

/// Position of entries produced by an extraction path that does not rank-order its matches.
pub const UNTRACKED_POSITION: i64 = -1;

// ── Device ────────────────────────────────────────────────────────────────────

/// Simulated client class. Decides which markup family holds organic listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Mobile,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Listings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Paid listings
    Sea,
    /// Organic listings
    Seo,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Sea => "sea",
            Bucket::Seo => "seo",
        }
    }
}

/// One ranked listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub position: i64,
    pub css_selector: String,
    pub raw: String,
    pub domain: String,
}

impl ResultEntry {
    pub fn is_unparseable(&self) -> bool {
        self.domain == UNPARSEABLE
    }

    pub fn is_ranked(&self) -> bool {
        self.position != UNTRACKED_POSITION
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Everything extracted from one results page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    pub keywords: String,
    pub url: String,
    pub user_agent: String,
    #[serde(rename = "mobile")]
    pub device: Device,
    pub seo: Vec<ResultEntry>,
    pub sea: Vec<ResultEntry>,
}

impl SearchResultSet {
    pub fn bucket(&self, bucket: Bucket) -> &[ResultEntry] {
        match bucket {
            Bucket::Sea => &self.sea,
            Bucket::Seo => &self.seo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_set_json_field_names() {
        let set = SearchResultSet {
            keywords: "train paris".into(),
            url: "http://www.google.com/search?q=train+paris".into(),
            user_agent: "Mozilla/5.0".into(),
            device: Device::Mobile,
            seo: vec![],
            sea: vec![ResultEntry {
                position: 0,
                css_selector: "span".into(),
                raw: "www.oui.sncf/".into(),
                domain: "www.oui.sncf".into(),
            }],
        };

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["mobile"], "mobile");
        assert_eq!(json["userAgent"], "Mozilla/5.0");
        assert_eq!(json["sea"][0]["cssSelector"], "span");
        assert_eq!(json["sea"][0]["raw"], "www.oui.sncf/");
        assert!(json.get("device").is_none());
    }

    #[test]
    fn test_entry_flags() {
        let entry = ResultEntry {
            position: UNTRACKED_POSITION,
            css_selector: "span".into(),
            raw: NOT_FOUND.into(),
            domain: UNPARSEABLE.into(),
        };
        assert!(entry.is_unparseable());
        assert!(!entry.is_ranked());
    }
}
