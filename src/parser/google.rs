//! GoogleBooks volume DTOs and their mapping to the canonical book. The
//! cached canonical payload is GoogleBooks-shaped, so these structs also back
//! serialization of the canonical JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::dates;
use crate::domain::isbn;
use crate::domain::models::{Book, Dimensions, ProviderSource};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Volume {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "volumeInfo", default, skip_serializing_if = "Option::is_none")]
    pub volume_info: Option<VolumeInfo>,
    #[serde(rename = "saleInfo", default, skip_serializing_if = "Option::is_none")]
    pub sale_info: Option<SaleInfo>,
    #[serde(rename = "accessInfo", default, skip_serializing_if = "Option::is_none")]
    pub access_info: Option<AccessInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(rename = "publishedDate", skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "industryIdentifiers", skip_serializing_if = "Option::is_none")]
    pub industry_identifiers: Option<Vec<IndustryIdentifier>>,
    #[serde(rename = "pageCount", skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(rename = "averageRating", skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(rename = "ratingsCount", skip_serializing_if = "Option::is_none")]
    pub ratings_count: Option<i32>,
    #[serde(rename = "imageLinks", skip_serializing_if = "Option::is_none")]
    pub image_links: Option<ImageLinks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "previewLink", skip_serializing_if = "Option::is_none")]
    pub preview_link: Option<String>,
    #[serde(rename = "infoLink", skip_serializing_if = "Option::is_none")]
    pub info_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<VolumeDimensions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub id_type: Option<String>,
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageLinks {
    #[serde(rename = "smallThumbnail", skip_serializing_if = "Option::is_none")]
    pub small_thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
    #[serde(rename = "extraLarge", skip_serializing_if = "Option::is_none")]
    pub extra_large: Option<String>,
}

/// Google reports physical dimensions as strings like "24.0 cm".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeDimensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleInfo {
    #[serde(rename = "listPrice", skip_serializing_if = "Option::is_none")]
    pub list_price: Option<ListPrice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPrice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "currencyCode", skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewability: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    pub items: Option<Vec<Volume>>,
    #[serde(rename = "totalItems", default)]
    pub total_items: i64,
}

fn parse_cm(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|s| s.trim().trim_end_matches("cm").trim().parse::<f64>().ok())
}

fn format_cm(value: Option<f64>) -> Option<String> {
    value.map(|v| format!("{v} cm"))
}

pub fn volume_to_book(volume: Volume, source: ProviderSource) -> Book {
    let mut book = Book::default();
    if !volume.id.is_empty() {
        book.external_id = Some(volume.id);
    }
    book.source = Some(source);

    if let Some(info) = volume.volume_info {
        book.title = info.title;
        book.subtitle = info.subtitle;
        book.description = info.description;
        book.authors = info.authors.unwrap_or_default();
        book.categories = info.categories.unwrap_or_default();
        book.publisher = info.publisher;
        book.published_date = info
            .published_date
            .as_deref()
            .and_then(dates::parse_published_date);
        book.language = info.language;
        book.page_count = info.page_count;
        book.average_rating = info.average_rating;
        book.ratings_count = info.ratings_count;
        book.preview_link = info.preview_link;
        book.info_link = info.info_link;

        for identifier in info.industry_identifiers.unwrap_or_default() {
            let value = identifier
                .identifier
                .as_deref()
                .map(isbn::sanitize)
                .unwrap_or_default();
            match identifier.id_type.as_deref() {
                Some("ISBN_13") if value.len() == 13 => book.isbn13 = Some(value),
                Some("ISBN_10") if value.len() == 10 => book.isbn10 = Some(value),
                _ => {}
            }
        }

        if let Some(links) = info.image_links {
            book.image_links = image_links_to_map(&links);
        }

        if let Some(dims) = info.dimensions {
            let parsed = Dimensions {
                height_cm: parse_cm(&dims.height),
                width_cm: parse_cm(&dims.width),
                thickness_cm: parse_cm(&dims.thickness),
            };
            if parsed != Dimensions::default() {
                book.dimensions = Some(parsed);
            }
        }
    }

    if let Some(sale) = volume.sale_info {
        if let Some(price) = sale.list_price {
            book.list_price = price.amount;
            book.currency_code = price.currency_code;
        }
    }
    if let Some(access) = volume.access_info {
        book.viewability = access.viewability;
    }

    book
}

pub fn book_to_volume(book: &Book) -> Volume {
    let mut identifiers = Vec::new();
    if let Some(isbn13) = &book.isbn13 {
        identifiers.push(IndustryIdentifier {
            id_type: Some("ISBN_13".into()),
            identifier: Some(isbn13.clone()),
        });
    }
    if let Some(isbn10) = &book.isbn10 {
        identifiers.push(IndustryIdentifier {
            id_type: Some("ISBN_10".into()),
            identifier: Some(isbn10.clone()),
        });
    }

    let image_links = if book.image_links.is_empty() {
        None
    } else {
        Some(map_to_image_links(&book.image_links))
    };

    let dimensions = book.dimensions.map(|d| VolumeDimensions {
        height: format_cm(d.height_cm),
        width: format_cm(d.width_cm),
        thickness: format_cm(d.thickness_cm),
    });

    let volume_info = VolumeInfo {
        title: book.title.clone(),
        subtitle: book.subtitle.clone(),
        authors: if book.authors.is_empty() {
            None
        } else {
            Some(book.authors.clone())
        },
        publisher: book.publisher.clone(),
        published_date: book.published_date.map(|d| d.format("%Y-%m-%d").to_string()),
        description: book.description.clone(),
        industry_identifiers: if identifiers.is_empty() {
            None
        } else {
            Some(identifiers)
        },
        page_count: book.page_count,
        categories: if book.categories.is_empty() {
            None
        } else {
            Some(book.categories.clone())
        },
        average_rating: book.average_rating,
        ratings_count: book.ratings_count,
        image_links,
        language: book.language.clone(),
        preview_link: book.preview_link.clone(),
        info_link: book.info_link.clone(),
        dimensions,
    };

    let sale_info = if book.list_price.is_some() || book.currency_code.is_some() {
        Some(SaleInfo {
            list_price: Some(ListPrice {
                amount: book.list_price,
                currency_code: book.currency_code.clone(),
            }),
        })
    } else {
        None
    };

    let access_info = book.viewability.as_ref().map(|v| AccessInfo {
        viewability: Some(v.clone()),
    });

    Volume {
        id: book.external_id.clone().unwrap_or_default(),
        volume_info: Some(volume_info),
        sale_info,
        access_info,
    }
}

fn image_links_to_map(links: &ImageLinks) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let pairs = [
        ("smallThumbnail", &links.small_thumbnail),
        ("thumbnail", &links.thumbnail),
        ("small", &links.small),
        ("medium", &links.medium),
        ("large", &links.large),
        ("extraLarge", &links.extra_large),
    ];
    for (key, value) in pairs {
        if let Some(url) = value {
            map.insert(key.to_string(), url.clone());
        }
    }
    map
}

fn map_to_image_links(map: &BTreeMap<String, String>) -> ImageLinks {
    ImageLinks {
        small_thumbnail: map.get("smallThumbnail").cloned(),
        thumbnail: map.get("thumbnail").cloned(),
        small: map.get("small").cloned(),
        medium: map.get("medium").cloned(),
        large: map.get("large").cloned(),
        extra_large: map.get("extraLarge").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SHINING: &str = r#"{
        "id": "8VnJLu3AvvQC",
        "volumeInfo": {
            "title": "The Shining",
            "authors": ["Stephen King"],
            "publisher": "Anchor",
            "publishedDate": "2012-06-26",
            "description": "Jack Torrance's new job at the Overlook Hotel...",
            "industryIdentifiers": [
                {"type": "ISBN_13", "identifier": "9780307743657"},
                {"type": "ISBN_10", "identifier": "0307743659"}
            ],
            "pageCount": 688,
            "categories": ["Fiction"],
            "averageRating": 4.5,
            "ratingsCount": 1234,
            "imageLinks": {
                "thumbnail": "http://books.google.com/thumb.jpg",
                "large": "http://books.google.com/large.jpg"
            },
            "language": "en"
        },
        "saleInfo": {"listPrice": {"amount": 9.99, "currencyCode": "USD"}},
        "accessInfo": {"viewability": "PARTIAL"}
    }"#;

    #[test]
    fn maps_full_volume() {
        let volume: Volume = serde_json::from_str(SHINING).unwrap();
        let book = volume_to_book(volume, ProviderSource::GoogleBooks);
        assert_eq!(book.title, "The Shining");
        assert_eq!(book.external_id.as_deref(), Some("8VnJLu3AvvQC"));
        assert_eq!(book.isbn13.as_deref(), Some("9780307743657"));
        assert_eq!(book.isbn10.as_deref(), Some("0307743659"));
        assert_eq!(book.page_count, Some(688));
        assert_eq!(
            book.published_date,
            NaiveDate::from_ymd_opt(2012, 6, 26)
        );
        assert_eq!(book.list_price, Some(9.99));
        assert_eq!(book.viewability.as_deref(), Some("PARTIAL"));
        assert_eq!(
            book.image_links.get("large").map(String::as_str),
            Some("http://books.google.com/large.jpg")
        );
    }

    #[test]
    fn tolerates_missing_fields() {
        let volume: Volume = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        let book = volume_to_book(volume, ProviderSource::GoogleBooks);
        assert_eq!(book.external_id.as_deref(), Some("x"));
        assert!(book.title.is_empty());
        assert!(book.authors.is_empty());
    }

    #[test]
    fn dimension_strings_parse_and_format() {
        assert_eq!(parse_cm(&Some("24.0 cm".into())), Some(24.0));
        assert_eq!(parse_cm(&Some("bogus".into())), None);
        assert_eq!(format_cm(Some(24.0)).as_deref(), Some("24 cm"));
    }
}
