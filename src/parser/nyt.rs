//! NYT bestseller overview payloads (`/lists/full-overview.json`). Each list
//! entry becomes a canonical book tagged with a `nytBestseller` qualifier;
//! the scheduler additionally consumes the per-list structure.

use serde::Deserialize;

use crate::domain::isbn;
use crate::domain::models::{Book, ProviderSource};
use crate::error::{HydrateError, HydrateResult};

#[derive(Debug, Deserialize)]
struct Overview {
    results: Option<OverviewResults>,
}

#[derive(Debug, Deserialize)]
struct OverviewResults {
    #[serde(default)]
    lists: Vec<ListPayload>,
}

#[derive(Debug, Deserialize)]
struct ListPayload {
    list_name_encoded: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    books: Vec<EntryPayload>,
}

#[derive(Debug, Deserialize)]
struct EntryPayload {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    publisher: Option<String>,
    primary_isbn13: Option<String>,
    primary_isbn10: Option<String>,
    rank: Option<i32>,
    weeks_on_list: Option<i32>,
    book_image: Option<String>,
    book_image_width: Option<i32>,
    book_image_height: Option<i32>,
}

/// One bestseller list with its hydrated entries.
#[derive(Debug)]
pub struct BestsellerList {
    pub list_code: String,
    pub display_name: String,
    pub books: Vec<Book>,
}

pub fn parse_payload_value(value: &serde_json::Value) -> HydrateResult<Vec<Book>> {
    Ok(parse_overview_value(value)?
        .into_iter()
        .flat_map(|list| list.books)
        .collect())
}

pub fn parse_overview_value(value: &serde_json::Value) -> HydrateResult<Vec<BestsellerList>> {
    let overview: Overview = serde_json::from_value(value.clone())?;
    let results = overview
        .results
        .ok_or_else(|| HydrateError::Corrupt("NYT overview without results".into()))?;

    let mut lists = Vec::new();
    for list in results.lists {
        let list_code = match list.list_name_encoded {
            Some(code) if !code.is_empty() => code,
            _ => continue,
        };
        let display_name = list
            .display_name
            .unwrap_or_else(|| list_code.replace('-', " "));
        let books = list
            .books
            .into_iter()
            .filter_map(|entry| entry_to_book(entry, &list_code))
            .collect();
        lists.push(BestsellerList {
            list_code,
            display_name,
            books,
        });
    }
    Ok(lists)
}

fn entry_to_book(entry: EntryPayload, list_code: &str) -> Option<Book> {
    let mut book = Book::with_title(entry.title?);
    book.source = Some(ProviderSource::Nyt);
    if let Some(author) = entry.author.filter(|a| !a.is_empty()) {
        book.authors.push(author);
    }
    book.description = entry.description.filter(|d| !d.is_empty());
    book.publisher = entry.publisher.filter(|p| !p.is_empty());
    book.isbn13 = entry
        .primary_isbn13
        .map(|raw| isbn::sanitize(&raw))
        .filter(|s| s.len() == 13);
    book.isbn10 = entry
        .primary_isbn10
        .map(|raw| isbn::sanitize(&raw))
        .filter(|s| s.len() == 10);

    if let Some(image) = entry.book_image {
        book.image_links.insert("large".into(), image);
        if let (Some(w), Some(h)) = (entry.book_image_width, entry.book_image_height) {
            book.cover.width = Some(w);
            book.cover.height = Some(h);
        }
    }

    book.qualifiers.insert(
        "nytBestseller".into(),
        serde_json::json!({
            "listCode": list_code,
            "rank": entry.rank,
            "weeksOnList": entry.weeks_on_list,
        }),
    );
    Some(book)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": {
                "lists": [{
                    "list_id": 704,
                    "list_name_encoded": "hardcover-fiction",
                    "display_name": "Hardcover Fiction",
                    "books": [{
                        "title": "THE SHINING",
                        "author": "Stephen King",
                        "publisher": "Doubleday",
                        "primary_isbn13": "9780307743657",
                        "primary_isbn10": "0307743659",
                        "rank": 1,
                        "weeks_on_list": 5,
                        "book_image": "https://nyt.com/shining.jpg",
                        "book_image_width": 328,
                        "book_image_height": 495
                    }]
                }]
            }
        })
    }

    #[test]
    fn parses_overview_lists() {
        let lists = parse_overview_value(&overview()).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].list_code, "hardcover-fiction");
        assert_eq!(lists[0].books.len(), 1);

        let book = &lists[0].books[0];
        assert_eq!(book.title, "THE SHINING");
        assert_eq!(book.isbn13.as_deref(), Some("9780307743657"));
        let qualifier = book.qualifiers.get("nytBestseller").unwrap();
        assert_eq!(qualifier["rank"], 1);
        assert_eq!(qualifier["weeksOnList"], 5);
        assert_eq!(qualifier["listCode"], "hardcover-fiction");
    }

    #[test]
    fn flattens_lists_for_the_parser() {
        let books = parse_payload_value(&overview()).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].cover.width, Some(328));
    }

    #[test]
    fn missing_results_is_corrupt() {
        let err = parse_overview_value(&serde_json::json!({"status": "ERROR"})).unwrap_err();
        assert!(matches!(err, HydrateError::Corrupt(_)));
    }
}
