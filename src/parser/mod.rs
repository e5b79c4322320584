//! Provider JSON -> canonical [`Book`] values. Payloads arrive from caches
//! and providers in varying states of repair; structural cleaning runs first,
//! then a per-provider mapper, then deduplication.

pub mod canonical;
pub mod clean;
pub mod google;
pub mod nyt;
pub mod openlibrary;

use std::collections::BTreeMap;

use crate::domain::models::{Book, ProviderSource};
use crate::error::{HydrateError, HydrateResult};

/// Parse a raw payload from `source` into books. Individual corrupt chunks
/// are logged and skipped; the call fails only when nothing is salvageable.
pub fn parse_payload(source: ProviderSource, raw: &str) -> HydrateResult<Vec<Book>> {
    let chunks = clean::clean_payload(raw)?;
    let mut books = Vec::new();
    let mut corrupt = 0usize;
    for chunk in &chunks {
        match parse_value(source, chunk) {
            Ok(mut parsed) => books.append(&mut parsed),
            Err(err) => {
                corrupt += 1;
                let sample: String = chunk.to_string().chars().take(80).collect();
                tracing::warn!(%source, %err, sample, "skipping corrupt payload chunk");
            }
        }
    }
    if books.is_empty() && corrupt > 0 {
        return Err(HydrateError::Corrupt(format!(
            "{source}: all {corrupt} payload chunk(s) unparseable"
        )));
    }
    Ok(dedup_books(books))
}

fn parse_value(source: ProviderSource, value: &serde_json::Value) -> HydrateResult<Vec<Book>> {
    match source {
        ProviderSource::GoogleBooks | ProviderSource::Aggregated => {
            canonical::parse_payload_value(value, source)
        }
        ProviderSource::OpenLibrary => openlibrary::parse_payload_value(value),
        ProviderSource::Nyt => nyt::parse_payload_value(value),
        ProviderSource::Longitood => Err(HydrateError::Permanent(
            "LONGITOOD serves covers only".into(),
        )),
    }
}

/// Identity key used to deduplicate parsed books: ISBN-13, else ISBN-10,
/// else lowercased title + first author.
pub fn dedup_key(book: &Book) -> String {
    if let Some(isbn13) = &book.isbn13 {
        return format!("isbn13:{isbn13}");
    }
    if let Some(isbn10) = &book.isbn10 {
        return format!("isbn10:{isbn10}");
    }
    format!(
        "title:{}:{}",
        book.title.to_lowercase(),
        book.first_author().unwrap_or("").to_lowercase()
    )
}

pub fn dedup_books(books: Vec<Book>) -> Vec<Book> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(books.len());
    for book in books {
        if seen.insert(dedup_key(&book)) {
            out.push(book);
        }
    }
    out
}

/// Qualifier tokens recognized inside search queries.
const QUERY_QUALIFIERS: &[&str] = &["intitle", "inauthor", "subject", "isbn"];

/// Split `intitle:`/`inauthor:`/`subject:`/`isbn:` tokens out of a search
/// query. Returns the remaining free-text query and the extracted qualifiers.
pub fn extract_query_qualifiers(
    query: &str,
) -> (String, BTreeMap<String, serde_json::Value>) {
    let mut qualifiers = BTreeMap::new();
    let mut free_text = Vec::new();
    for token in query.split_whitespace() {
        match token.split_once(':') {
            Some((name, value))
                if !value.is_empty() && QUERY_QUALIFIERS.contains(&name.to_lowercase().as_str()) =>
            {
                qualifiers.insert(
                    name.to_lowercase(),
                    serde_json::Value::String(value.to_string()),
                );
            }
            _ => free_text.push(token),
        }
    }
    (free_text.join(" "), qualifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_objects_yield_two_books() {
        let raw = concat!(
            r#"{"id":"a","volumeInfo":{"title":"First Book","authors":["A One"]}}"#,
            r#"{"id":"b","volumeInfo":{"title":"Second Book","authors":["B Two"]}}"#
        );
        let books = parse_payload(ProviderSource::GoogleBooks, raw).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "First Book");
        assert_eq!(books[1].external_id.as_deref(), Some("b"));
    }

    #[test]
    fn duplicate_isbns_collapse() {
        let raw = concat!(
            r#"{"id":"a","volumeInfo":{"title":"Same","industryIdentifiers":[{"type":"ISBN_13","identifier":"9780307743657"}]}}"#,
            r#"{"id":"b","volumeInfo":{"title":"Same Again","industryIdentifiers":[{"type":"ISBN_13","identifier":"9780307743657"}]}}"#
        );
        let books = parse_payload(ProviderSource::GoogleBooks, raw).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Same");
    }

    #[test]
    fn title_author_key_is_case_insensitive() {
        let mut a = Book::with_title("The Stand");
        a.authors.push("Stephen King".into());
        let mut b = Book::with_title("the stand");
        b.authors.push("STEPHEN KING".into());
        assert_eq!(dedup_key(&a), dedup_key(&b));
    }

    #[test]
    fn all_corrupt_chunks_fail() {
        let err = parse_payload(ProviderSource::GoogleBooks, "{{{not json").unwrap_err();
        assert!(matches!(err, HydrateError::Corrupt(_)));
    }

    #[test]
    fn extracts_search_qualifiers() {
        let (rest, qualifiers) =
            extract_query_qualifiers("intitle:shining inauthor:king horror classics");
        assert_eq!(rest, "horror classics");
        assert_eq!(
            qualifiers.get("intitle"),
            Some(&serde_json::Value::String("shining".into()))
        );
        assert_eq!(
            qualifiers.get("inauthor"),
            Some(&serde_json::Value::String("king".into()))
        );
    }

    #[test]
    fn unknown_prefixes_stay_in_the_query() {
        let (rest, qualifiers) = extract_query_qualifiers("site:example.com dune");
        assert_eq!(rest, "site:example.com dune");
        assert!(qualifiers.is_empty());
    }
}
