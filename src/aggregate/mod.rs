//! Merge per-provider parses of the same book into one canonical record.
//! Field rules are positional: source precedence (GoogleBooks > OpenLibrary >
//! NYT) decides ties unless a rule says otherwise (longest description,
//! author/category union). Provenance lands on the output book.

use std::collections::BTreeMap;

use crate::domain::author_names::normalize_author;
use crate::domain::models::{Book, Dimensions, ProviderSource};
use crate::domain::slug::slugify;

/// Merge `inputs` (one parsed book per source) into a single canonical book.
/// `fallback_identifier` backs the title when no source supplied one.
pub fn aggregate(inputs: BTreeMap<ProviderSource, Book>, fallback_identifier: &str) -> Book {
    let mut ordered: Vec<(ProviderSource, Book)> = inputs.into_iter().collect();
    ordered.sort_by_key(|(source, _)| source.precedence());

    let mut out = Book::default();
    out.contributing_sources = ordered.iter().map(|(source, _)| *source).collect();
    out.source = match ordered.as_slice() {
        [(only, _)] => Some(*only),
        _ => Some(ProviderSource::Aggregated),
    };

    // Title: first non-empty by precedence, identifier as last resort.
    for (source, book) in &ordered {
        if !book.title.trim().is_empty() {
            out.title = book.title.clone();
            out.field_sources.insert("title".into(), *source);
            break;
        }
    }
    if out.title.is_empty() {
        out.title = fallback_identifier.to_string();
    }

    // Authors: union preserving first appearance, deduplicated by
    // normalized name.
    let mut seen_authors = std::collections::HashSet::new();
    for (_, book) in &ordered {
        for author in &book.authors {
            if seen_authors.insert(normalize_author(author)) {
                out.authors.push(author.clone());
            }
        }
    }

    // Description: longest non-empty wins regardless of precedence.
    for (source, book) in &ordered {
        if let Some(description) = &book.description {
            let longer = out
                .description
                .as_ref()
                .map(|current| description.len() > current.len())
                .unwrap_or(!description.is_empty());
            if longer {
                out.description = Some(description.clone());
                out.field_sources.insert("description".into(), *source);
            }
        }
    }

    // Canonical ISBN pair: highest-precedence source that has one. No
    // ISBN-13 is synthesised from an ISBN-10.
    for (source, book) in &ordered {
        if out.isbn13.is_none() {
            if let Some(isbn13) = &book.isbn13 {
                out.isbn13 = Some(isbn13.clone());
                out.field_sources.insert("isbn13".into(), *source);
            }
        }
        if out.isbn10.is_none() {
            if let Some(isbn10) = &book.isbn10 {
                out.isbn10 = Some(isbn10.clone());
                out.field_sources.insert("isbn10".into(), *source);
            }
        }
    }

    // Categories: union by normalized name.
    let mut seen_categories = std::collections::HashSet::new();
    for (_, book) in &ordered {
        for category in &book.categories {
            if seen_categories.insert(slugify(category)) {
                out.categories.push(category.clone());
            }
        }
    }

    // Scalar fields: first non-null by precedence. Ratings deliberately take
    // the highest-precedence source rather than averaging.
    for (source, book) in &ordered {
        coalesce(&mut out.subtitle, &book.subtitle, "subtitle", *source, &mut out.field_sources);
        coalesce(&mut out.publisher, &book.publisher, "publisher", *source, &mut out.field_sources);
        coalesce(&mut out.published_date, &book.published_date, "publishedDate", *source, &mut out.field_sources);
        coalesce(&mut out.language, &book.language, "language", *source, &mut out.field_sources);
        coalesce(&mut out.page_count, &book.page_count, "pageCount", *source, &mut out.field_sources);
        coalesce(&mut out.average_rating, &book.average_rating, "averageRating", *source, &mut out.field_sources);
        if out.average_rating.is_some() && out.ratings_count.is_none() {
            out.ratings_count = book.ratings_count;
        }
        coalesce(&mut out.list_price, &book.list_price, "listPrice", *source, &mut out.field_sources);
        if out.currency_code.is_none() {
            out.currency_code = book.currency_code.clone();
        }
        coalesce(&mut out.viewability, &book.viewability, "viewability", *source, &mut out.field_sources);
        if out.preview_link.is_none() {
            out.preview_link = book.preview_link.clone();
        }
        if out.info_link.is_none() {
            out.info_link = book.info_link.clone();
        }
        if out.external_id.is_none() {
            out.external_id = book.external_id.clone();
        }
    }

    // Cover candidates: collect everything; per image type the
    // highest-precedence URL wins. Selection happens downstream.
    for (_, book) in &ordered {
        for (image_type, url) in &book.image_links {
            out.image_links
                .entry(image_type.clone())
                .or_insert_with(|| url.clone());
        }
    }

    // Dimensions coalesce field-wise.
    for (_, book) in &ordered {
        if let Some(dims) = book.dimensions {
            let merged = out.dimensions.get_or_insert(Dimensions::default());
            if merged.height_cm.is_none() {
                merged.height_cm = dims.height_cm;
            }
            if merged.width_cm.is_none() {
                merged.width_cm = dims.width_cm;
            }
            if merged.thickness_cm.is_none() {
                merged.thickness_cm = dims.thickness_cm;
            }
        }
    }

    // Qualifiers: union, first writer per key wins.
    for (_, book) in &ordered {
        for (key, value) in &book.qualifiers {
            out.qualifiers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    out
}

fn coalesce<T: Clone>(
    target: &mut Option<T>,
    candidate: &Option<T>,
    field: &str,
    source: ProviderSource,
    field_sources: &mut BTreeMap<String, ProviderSource>,
) {
    if target.is_none() {
        if let Some(value) = candidate {
            *target = Some(value.clone());
            field_sources.insert(field.to_string(), source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(source: ProviderSource, book: Book) -> (ProviderSource, Book) {
        (source, book)
    }

    #[test]
    fn longest_description_wins() {
        let mut google = Book::with_title("T");
        google.description = Some("x".repeat(10));
        let mut openlibrary = Book::with_title("T");
        openlibrary.description = Some("y".repeat(500));
        let mut nyt = Book::with_title("T");
        nyt.description = Some("z".repeat(200));

        let merged = aggregate(
            BTreeMap::from([
                input(ProviderSource::GoogleBooks, google),
                input(ProviderSource::OpenLibrary, openlibrary),
                input(ProviderSource::Nyt, nyt),
            ]),
            "id",
        );
        assert_eq!(merged.description.unwrap().len(), 500);
        assert_eq!(
            merged.field_sources.get("description"),
            Some(&ProviderSource::OpenLibrary)
        );
    }

    #[test]
    fn authors_deduplicate_by_normalized_name() {
        let mut google = Book::with_title("T");
        google.authors = vec!["Stephen King".into()];
        let mut openlibrary = Book::with_title("T");
        openlibrary.authors = vec!["stephen king".into(), "Peter Straub".into()];

        let merged = aggregate(
            BTreeMap::from([
                input(ProviderSource::GoogleBooks, google),
                input(ProviderSource::OpenLibrary, openlibrary),
            ]),
            "id",
        );
        assert_eq!(
            merged.authors,
            vec!["Stephen King".to_string(), "Peter Straub".to_string()]
        );
    }

    #[test]
    fn title_falls_back_to_identifier() {
        let merged = aggregate(
            BTreeMap::from([input(ProviderSource::GoogleBooks, Book::default())]),
            "9780307743657",
        );
        assert_eq!(merged.title, "9780307743657");
    }

    #[test]
    fn isbn_pair_prefers_highest_precedence() {
        let mut google = Book::with_title("T");
        google.isbn13 = Some("9780307743657".into());
        let mut nyt = Book::with_title("T");
        nyt.isbn13 = Some("9999999999999".into());
        nyt.isbn10 = Some("0307743659".into());

        let merged = aggregate(
            BTreeMap::from([
                input(ProviderSource::GoogleBooks, google),
                input(ProviderSource::Nyt, nyt),
            ]),
            "id",
        );
        assert_eq!(merged.isbn13.as_deref(), Some("9780307743657"));
        // the ISBN-10 only existed on NYT and is kept, not synthesised
        assert_eq!(merged.isbn10.as_deref(), Some("0307743659"));
        assert_eq!(
            merged.field_sources.get("isbn10"),
            Some(&ProviderSource::Nyt)
        );
    }

    #[test]
    fn ratings_use_highest_precedence_not_average() {
        let mut google = Book::with_title("T");
        google.average_rating = Some(4.5);
        google.ratings_count = Some(100);
        let mut openlibrary = Book::with_title("T");
        openlibrary.average_rating = Some(2.0);

        let merged = aggregate(
            BTreeMap::from([
                input(ProviderSource::GoogleBooks, google),
                input(ProviderSource::OpenLibrary, openlibrary),
            ]),
            "id",
        );
        assert_eq!(merged.average_rating, Some(4.5));
        assert_eq!(merged.ratings_count, Some(100));
    }

    #[test]
    fn categories_union_by_normalized_name() {
        let mut google = Book::with_title("T");
        google.categories = vec!["Science Fiction".into()];
        let mut openlibrary = Book::with_title("T");
        openlibrary.categories = vec!["science fiction".into(), "Horror".into()];

        let merged = aggregate(
            BTreeMap::from([
                input(ProviderSource::GoogleBooks, google),
                input(ProviderSource::OpenLibrary, openlibrary),
            ]),
            "id",
        );
        assert_eq!(
            merged.categories,
            vec!["Science Fiction".to_string(), "Horror".to_string()]
        );
    }

    #[test]
    fn provenance_records_contributors_and_primary_source() {
        let mut google = Book::with_title("From Google");
        google.external_id = Some("vol1".into());
        let openlibrary = Book::with_title("From OpenLibrary");

        let merged = aggregate(
            BTreeMap::from([
                input(ProviderSource::GoogleBooks, google),
                input(ProviderSource::OpenLibrary, openlibrary),
            ]),
            "id",
        );
        assert_eq!(merged.source, Some(ProviderSource::Aggregated));
        assert_eq!(
            merged.contributing_sources,
            vec![ProviderSource::GoogleBooks, ProviderSource::OpenLibrary]
        );
        assert_eq!(
            merged.field_sources.get("title"),
            Some(&ProviderSource::GoogleBooks)
        );
    }

    #[test]
    fn single_source_keeps_its_tag() {
        let merged = aggregate(
            BTreeMap::from([input(ProviderSource::OpenLibrary, Book::with_title("T"))]),
            "id",
        );
        assert_eq!(merged.source, Some(ProviderSource::OpenLibrary));
    }
}
