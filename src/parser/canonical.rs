//! The canonical payload shape persisted to the object cache and raw-data
//! rows: GoogleBooks-style `{id, volumeInfo, saleInfo, accessInfo}` with an
//! optional top-level `qualifiers` object, plus the `AGGREGATED` flavor that
//! lifts author/description to the top level.

use crate::domain::dates;
use crate::domain::models::{Book, ProviderSource};
use crate::error::{HydrateError, HydrateResult};

use super::google::{self, SearchResponse, Volume};

/// Serialize a book into the canonical payload.
pub fn to_canonical_json(book: &Book) -> serde_json::Value {
    let volume = google::book_to_volume(book);
    let mut value = serde_json::to_value(&volume).unwrap_or_default();
    if !book.qualifiers.is_empty() {
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "qualifiers".into(),
                serde_json::to_value(&book.qualifiers).unwrap_or_default(),
            );
        }
    }
    value
}

/// Parse a canonical payload back into a book. Inverse of
/// [`to_canonical_json`] for every field that shape carries.
pub fn from_canonical_json(value: &serde_json::Value, source: ProviderSource) -> Option<Book> {
    if value.get("volumeInfo").is_none() && value.get("title").is_some() {
        return parse_aggregated_flavor(value, source);
    }
    let volume: Volume = serde_json::from_value(value.clone()).ok()?;
    let mut book = google::volume_to_book(volume, source);
    if book.title.is_empty() && book.external_id.is_none() {
        return None;
    }
    if let Some(qualifiers) = value.get("qualifiers").and_then(|q| q.as_object()) {
        for (key, val) in qualifiers {
            book.qualifiers.insert(key.clone(), val.clone());
        }
    }
    Some(book)
}

/// One cached/raw payload value -> books. Handles search-response envelopes
/// (an `items` array), single volumes, and the aggregated flavor.
pub fn parse_payload_value(
    value: &serde_json::Value,
    source: ProviderSource,
) -> HydrateResult<Vec<Book>> {
    if value.get("items").is_some() || value.get("totalItems").is_some() {
        let response: SearchResponse = serde_json::from_value(value.clone())?;
        return Ok(response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|v| google::volume_to_book(v, source))
            .filter(|book| !book.title.is_empty() || book.external_id.is_some())
            .collect());
    }
    if let Some(array) = value.as_array() {
        let mut books = Vec::new();
        for item in array {
            if let Some(book) = from_canonical_json(item, source) {
                books.push(book);
            }
        }
        return Ok(books);
    }
    match from_canonical_json(value, source) {
        Some(book) => Ok(vec![book]),
        None => Err(HydrateError::Corrupt("unrecognized payload shape".into())),
    }
}

/// The `AGGREGATED` flavor: top-level title/author/description written by the
/// aggregator for composite rows.
fn parse_aggregated_flavor(value: &serde_json::Value, source: ProviderSource) -> Option<Book> {
    let title = value.get("title")?.as_str()?.to_string();
    let mut book = Book::with_title(title);
    book.source = Some(source);
    book.external_id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    if let Some(author) = value.get("author").and_then(|v| v.as_str()) {
        book.authors.push(author.to_string());
    }
    if let Some(authors) = value.get("authors").and_then(|v| v.as_array()) {
        for author in authors.iter().filter_map(|a| a.as_str()) {
            if !book.authors.iter().any(|existing| existing == author) {
                book.authors.push(author.to_string());
            }
        }
    }
    book.description = value
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    book.published_date = value
        .get("publishedDate")
        .and_then(|v| v.as_str())
        .and_then(dates::parse_published_date);
    Some(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn sample_book() -> Book {
        let mut image_links = BTreeMap::new();
        image_links.insert("thumbnail".to_string(), "http://img/t.jpg".to_string());
        image_links.insert("large".to_string(), "http://img/l.jpg".to_string());
        let mut qualifiers = BTreeMap::new();
        qualifiers.insert(
            "nytBestseller".to_string(),
            serde_json::json!({"rank": 3, "weeksOnList": 12}),
        );
        Book {
            title: "The Shining".into(),
            subtitle: Some("A Novel".into()),
            description: Some("Jack Torrance's new job...".into()),
            authors: vec!["Stephen King".into()],
            categories: vec!["Fiction".into(), "Horror".into()],
            publisher: Some("Anchor".into()),
            published_date: NaiveDate::from_ymd_opt(2012, 6, 26),
            language: Some("en".into()),
            page_count: Some(688),
            isbn10: Some("0307743659".into()),
            isbn13: Some("9780307743657".into()),
            external_id: Some("8VnJLu3AvvQC".into()),
            source: Some(ProviderSource::GoogleBooks),
            average_rating: Some(4.5),
            ratings_count: Some(1234),
            list_price: Some(9.99),
            currency_code: Some("USD".into()),
            viewability: Some("PARTIAL".into()),
            preview_link: Some("http://preview".into()),
            info_link: Some("http://info".into()),
            image_links,
            qualifiers,
            ..Book::default()
        }
    }

    #[test]
    fn canonical_round_trip_is_lossless() {
        let book = sample_book();
        let payload = to_canonical_json(&book);
        let parsed = from_canonical_json(&payload, ProviderSource::GoogleBooks).unwrap();
        assert_eq!(parsed, book);
    }

    #[test]
    fn canonical_shape_has_google_books_envelope() {
        let payload = to_canonical_json(&sample_book());
        assert_eq!(payload["id"], "8VnJLu3AvvQC");
        assert!(payload.get("volumeInfo").is_some());
        assert!(payload.get("saleInfo").is_some());
        assert!(payload.get("accessInfo").is_some());
    }

    #[test]
    fn parses_aggregated_flavor() {
        let value = serde_json::json!({
            "id": "agg-1",
            "title": "The Stand",
            "author": "Stephen King",
            "description": "After a plague...",
        });
        let books = parse_payload_value(&value, ProviderSource::Aggregated).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "The Stand");
        assert_eq!(books[0].authors, vec!["Stephen King".to_string()]);
    }

    #[test]
    fn parses_search_envelope() {
        let value = serde_json::json!({
            "totalItems": 2,
            "items": [
                {"id": "a", "volumeInfo": {"title": "A"}},
                {"id": "b", "volumeInfo": {"title": "B"}}
            ]
        });
        let books = parse_payload_value(&value, ProviderSource::GoogleBooks).unwrap();
        assert_eq!(books.len(), 2);
    }
}
