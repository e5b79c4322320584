// Canonical domain model the tiers exchange; provider DTOs are mapped into
// this shape by the parser and merged by the aggregator before persistence.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A metadata provider the engine can consult. Precedence (lower wins) drives
/// the aggregator's per-field merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderSource {
    GoogleBooks,
    OpenLibrary,
    Nyt,
    Longitood,
    Aggregated,
}

impl ProviderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderSource::GoogleBooks => "GOOGLE_BOOKS",
            ProviderSource::OpenLibrary => "OPEN_LIBRARY",
            ProviderSource::Nyt => "NYT",
            ProviderSource::Longitood => "LONGITOOD",
            ProviderSource::Aggregated => "AGGREGATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GOOGLE_BOOKS" => Some(ProviderSource::GoogleBooks),
            "OPEN_LIBRARY" => Some(ProviderSource::OpenLibrary),
            "NYT" => Some(ProviderSource::Nyt),
            "LONGITOOD" => Some(ProviderSource::Longitood),
            "AGGREGATED" => Some(ProviderSource::Aggregated),
            _ => None,
        }
    }

    /// Merge precedence, lower first. Longitood serves covers only and never
    /// contributes metadata fields.
    pub fn precedence(&self) -> u8 {
        match self {
            ProviderSource::GoogleBooks => 0,
            ProviderSource::OpenLibrary => 1,
            ProviderSource::Nyt => 2,
            ProviderSource::Longitood => 3,
            ProviderSource::Aggregated => 4,
        }
    }

    /// Sources consulted by the tiered resolver for metadata, in precedence
    /// order.
    pub fn metadata_sources() -> [ProviderSource; 3] {
        [
            ProviderSource::GoogleBooks,
            ProviderSource::OpenLibrary,
            ProviderSource::Nyt,
        ]
    }
}

impl std::fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the currently selected cover image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CoverSource {
    GoogleBooks,
    OpenLibrary,
    Longitood,
    S3Cache,
    LocalCache,
    None,
    #[default]
    Undefined,
    Mock,
}

impl CoverSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverSource::GoogleBooks => "GOOGLE_BOOKS",
            CoverSource::OpenLibrary => "OPEN_LIBRARY",
            CoverSource::Longitood => "LONGITOOD",
            CoverSource::S3Cache => "S3_CACHE",
            CoverSource::LocalCache => "LOCAL_CACHE",
            CoverSource::None => "NONE",
            CoverSource::Undefined => "UNDEFINED",
            CoverSource::Mock => "MOCK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GOOGLE_BOOKS" => Some(CoverSource::GoogleBooks),
            "OPEN_LIBRARY" => Some(CoverSource::OpenLibrary),
            "LONGITOOD" => Some(CoverSource::Longitood),
            "S3_CACHE" => Some(CoverSource::S3Cache),
            "LOCAL_CACHE" => Some(CoverSource::LocalCache),
            "NONE" => Some(CoverSource::None),
            "UNDEFINED" => Some(CoverSource::Undefined),
            "MOCK" => Some(CoverSource::Mock),
            _ => None,
        }
    }
}

/// Resolved cover state carried on the book row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverState {
    pub preferred_url: Option<String>,
    pub fallback_url: Option<String>,
    pub source: CoverSource,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub high_resolution: bool,
    pub storage_key: Option<String>,
}

/// Physical dimensions in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub height_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub thickness_cm: Option<f64>,
}

/// Canonical book record. `id` is set once the book has been persisted;
/// author order is significant (position = index).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<Uuid>,
    pub slug: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub page_count: Option<i32>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    /// Provider-side id of the source this record was parsed from (or the
    /// primary source after aggregation).
    pub external_id: Option<String>,
    pub source: Option<ProviderSource>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i32>,
    pub list_price: Option<f64>,
    pub currency_code: Option<String>,
    pub viewability: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    /// Candidate cover URLs keyed by image type (thumbnail, small, medium,
    /// large, extraLarge, smallThumbnail).
    pub image_links: BTreeMap<String, String>,
    pub cover: CoverState,
    pub dimensions: Option<Dimensions>,
    /// Tag key -> structured attributes (e.g. nytBestseller -> rank, weeks).
    pub qualifiers: BTreeMap<String, serde_json::Value>,
    /// Sources that contributed at least one field (aggregator provenance).
    pub contributing_sources: Vec<ProviderSource>,
    /// Primary source per differentiating field (aggregator provenance).
    pub field_sources: BTreeMap<String, ProviderSource>,
}

impl Book {
    pub fn with_title(title: impl Into<String>) -> Self {
        Book {
            title: title.into(),
            ..Book::default()
        }
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Best available cover candidate URL, largest type first.
    pub fn best_image_link(&self) -> Option<&str> {
        for key in [
            "extraLarge",
            "large",
            "medium",
            "small",
            "thumbnail",
            "smallThumbnail",
        ] {
            if let Some(url) = self.image_links.get(key) {
                return Some(url.as_str());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_source_round_trips_through_tag() {
        for source in [
            ProviderSource::GoogleBooks,
            ProviderSource::OpenLibrary,
            ProviderSource::Nyt,
            ProviderSource::Longitood,
            ProviderSource::Aggregated,
        ] {
            assert_eq!(ProviderSource::parse(source.as_str()), Some(source));
        }
    }

    #[test]
    fn precedence_orders_google_first() {
        let mut sources = vec![
            ProviderSource::Nyt,
            ProviderSource::GoogleBooks,
            ProviderSource::OpenLibrary,
        ];
        sources.sort_by_key(|s| s.precedence());
        assert_eq!(sources[0], ProviderSource::GoogleBooks);
        assert_eq!(sources[1], ProviderSource::OpenLibrary);
    }

    #[test]
    fn best_image_link_prefers_largest() {
        let mut book = Book::with_title("x");
        book.image_links
            .insert("thumbnail".into(), "http://t".into());
        book.image_links.insert("large".into(), "http://l".into());
        assert_eq!(book.best_image_link(), Some("http://l"));
    }
}
