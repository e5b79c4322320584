//! OpenLibrary payloads: edition JSON (`/isbn/{isbn}.json`) and search docs
//! (`/search.json`). Both map onto the canonical book.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::dates;
use crate::domain::isbn;
use crate::domain::models::{Book, ProviderSource};
use crate::error::{HydrateError, HydrateResult};

const COVER_BASE_URL: &str = "https://covers.openlibrary.org";

#[derive(Debug, Deserialize)]
struct Edition {
    key: Option<String>,
    title: Option<String>,
    subtitle: Option<String>,
    #[serde(default)]
    description: Option<Description>,
    #[serde(default)]
    publishers: Vec<String>,
    publish_date: Option<String>,
    number_of_pages: Option<i32>,
    #[serde(default)]
    isbn_10: Vec<String>,
    #[serde(default)]
    isbn_13: Vec<String>,
    #[serde(default)]
    covers: Vec<i64>,
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(default)]
    authors: Vec<serde_json::Value>,
    #[serde(default)]
    languages: Vec<KeyRef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    Text(String),
    Nested { value: String },
}

impl Description {
    fn into_text(self) -> String {
        match self {
            Description::Text(s) => s,
            Description::Nested { value } => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeyRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
    #[serde(default)]
    isbn: Vec<String>,
    cover_i: Option<i64>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    publisher: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    number_of_pages_median: Option<i32>,
}

pub fn parse_payload_value(value: &serde_json::Value) -> HydrateResult<Vec<Book>> {
    if value.get("docs").is_some() {
        let response: SearchResponse = serde_json::from_value(value.clone())?;
        return Ok(response.docs.into_iter().filter_map(doc_to_book).collect());
    }
    if value.get("title").is_some() {
        let edition: Edition = serde_json::from_value(value.clone())?;
        return Ok(edition_to_book(edition).into_iter().collect());
    }
    Err(HydrateError::Corrupt(
        "unrecognized OpenLibrary payload shape".into(),
    ))
}

pub fn cover_url_for_isbn(isbn: &str) -> String {
    format!("{COVER_BASE_URL}/b/isbn/{isbn}-L.jpg")
}

fn cover_url_for_id(cover_id: i64) -> String {
    format!("{COVER_BASE_URL}/b/id/{cover_id}-L.jpg")
}

/// "/books/OL7353617M" -> "OL7353617M"
fn key_tail(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

fn edition_to_book(edition: Edition) -> Option<Book> {
    let mut book = Book::with_title(edition.title?);
    book.source = Some(ProviderSource::OpenLibrary);
    book.external_id = edition.key.as_deref().map(key_tail);
    book.subtitle = edition.subtitle;
    book.description = edition.description.map(Description::into_text);
    book.publisher = edition.publishers.into_iter().next();
    book.published_date = edition
        .publish_date
        .as_deref()
        .and_then(parse_openlibrary_date);
    book.page_count = edition.number_of_pages;
    book.categories = edition.subjects;
    book.language = edition
        .languages
        .first()
        .map(|l| language_code(&key_tail(&l.key)));

    for raw in edition.isbn_13 {
        let sanitized = isbn::sanitize(&raw);
        if sanitized.len() == 13 {
            book.isbn13 = Some(sanitized);
            break;
        }
    }
    for raw in edition.isbn_10 {
        let sanitized = isbn::sanitize(&raw);
        if sanitized.len() == 10 {
            book.isbn10 = Some(sanitized);
            break;
        }
    }

    // Author entries carry names only in some dumps; key-only refs would
    // need one request per author and are skipped.
    for author in edition.authors {
        if let Some(name) = author.get("name").and_then(|n| n.as_str()) {
            book.authors.push(name.to_string());
        }
    }

    if let Some(cover_id) = edition.covers.into_iter().find(|id| *id > 0) {
        book.image_links
            .insert("large".into(), cover_url_for_id(cover_id));
    }

    Some(book)
}

fn doc_to_book(doc: SearchDoc) -> Option<Book> {
    let mut book = Book::with_title(doc.title?);
    book.source = Some(ProviderSource::OpenLibrary);
    book.external_id = doc.key.as_deref().map(key_tail);
    book.authors = doc.author_name;
    book.categories = doc.subject;
    book.publisher = doc.publisher.into_iter().next();
    book.language = doc.language.first().map(|l| language_code(l));
    book.page_count = doc.number_of_pages_median;
    book.published_date = doc
        .first_publish_year
        .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));

    for raw in doc.isbn {
        match isbn::classify(&raw) {
            Some(isbn::Isbn::Thirteen(v)) if book.isbn13.is_none() => book.isbn13 = Some(v),
            Some(isbn::Isbn::Ten(v)) if book.isbn10.is_none() => book.isbn10 = Some(v),
            _ => {}
        }
        if book.isbn13.is_some() && book.isbn10.is_some() {
            break;
        }
    }

    if let Some(cover_id) = doc.cover_i.filter(|id| *id > 0) {
        book.image_links
            .insert("large".into(), cover_url_for_id(cover_id));
    }

    Some(book)
}

/// OpenLibrary language keys are ISO 639-2 ("eng"); books rows use 639-1.
fn language_code(raw: &str) -> String {
    match raw {
        "eng" => "en".to_string(),
        "fre" | "fra" => "fr".to_string(),
        "ger" | "deu" => "de".to_string(),
        "spa" => "es".to_string(),
        "ita" => "it".to_string(),
        "por" => "pt".to_string(),
        "rus" => "ru".to_string(),
        "jpn" => "ja".to_string(),
        other => other.to_string(),
    }
}

/// Edition publish dates range from "2012" to "June 26, 2012".
fn parse_openlibrary_date(raw: &str) -> Option<NaiveDate> {
    if let Some(date) = dates::parse_published_date(raw) {
        return Some(date);
    }
    for format in ["%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), format) {
            return Some(date);
        }
    }
    // "June 2012" expands to the first of the month.
    for format in ["%B %Y", "%b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {}", raw.trim()), &format!("%d {format}")) {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edition_payload() {
        let raw = serde_json::json!({
            "key": "/books/OL7353617M",
            "title": "The Shining",
            "publishers": ["Doubleday"],
            "publish_date": "June 26, 2012",
            "number_of_pages": 447,
            "isbn_10": ["0385121679"],
            "isbn_13": ["978-0-385-12167-5"],
            "covers": [11464254],
            "languages": [{"key": "/languages/eng"}],
            "description": {"type": "/type/text", "value": "A haunted hotel."},
            "authors": [{"key": "/authors/OL2162284A", "name": "Stephen King"}]
        });
        let books = parse_payload_value(&raw).unwrap();
        assert_eq!(books.len(), 1);
        let book = &books[0];
        assert_eq!(book.external_id.as_deref(), Some("OL7353617M"));
        assert_eq!(book.isbn13.as_deref(), Some("9780385121675"));
        assert_eq!(book.language.as_deref(), Some("en"));
        assert_eq!(book.description.as_deref(), Some("A haunted hotel."));
        assert_eq!(
            book.published_date,
            NaiveDate::from_ymd_opt(2012, 6, 26)
        );
        assert_eq!(
            book.image_links.get("large").map(String::as_str),
            Some("https://covers.openlibrary.org/b/id/11464254-L.jpg")
        );
    }

    #[test]
    fn parses_search_docs() {
        let raw = serde_json::json!({
            "numFound": 1,
            "docs": [{
                "key": "/works/OL81634W",
                "title": "The Stand",
                "author_name": ["Stephen King"],
                "first_publish_year": 1978,
                "isbn": ["9780307743688", "0307743683"],
                "cover_i": 123,
                "subject": ["Fiction"]
            }]
        });
        let books = parse_payload_value(&raw).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].authors, vec!["Stephen King".to_string()]);
        assert_eq!(books[0].isbn13.as_deref(), Some("9780307743688"));
        assert_eq!(books[0].isbn10.as_deref(), Some("0307743683"));
        assert_eq!(
            books[0].published_date,
            NaiveDate::from_ymd_opt(1978, 1, 1)
        );
    }

    #[test]
    fn cover_url_by_isbn() {
        assert_eq!(
            cover_url_for_isbn("9780307743657"),
            "https://covers.openlibrary.org/b/isbn/9780307743657-L.jpg"
        );
    }
}
