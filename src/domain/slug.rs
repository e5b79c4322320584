//! URL-safe slug generation: lowercase ASCII with dashes, derived from
//! title + first author and truncated at word boundaries.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

const MAX_SLUG_LEN: usize = 100;

/// Lowercase, accent-stripped, non-alphanumerics collapsed to single dashes.
/// Idempotent.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true;
    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Base slug for a book: slugified title, then "-" + slugified first author
/// when present, truncated to a word (dash) boundary within 100 chars.
pub fn book_slug(title: &str, first_author: Option<&str>) -> String {
    let mut slug = slugify(title);
    if let Some(author) = first_author {
        let author_part = slugify(author);
        if !author_part.is_empty() {
            if !slug.is_empty() {
                slug.push('-');
            }
            slug.push_str(&author_part);
        }
    }
    truncate_at_word_boundary(&slug, MAX_SLUG_LEN)
}

fn truncate_at_word_boundary(slug: &str, max: usize) -> String {
    if slug.len() <= max {
        return slug.to_string();
    }
    match slug[..max].rfind('-') {
        Some(idx) if idx > 0 => slug[..idx].to_string(),
        _ => slug[..max].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("The Shining"), "the-shining");
        assert_eq!(slugify("  C++ for Kids!  "), "c-for-kids");
        assert_eq!(slugify("José García Márquez"), "jose-garcia-marquez");
    }

    #[test]
    fn slugify_is_idempotent() {
        for input in ["The Shining", "José García Márquez", "a--b--c"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn book_slug_joins_title_and_author() {
        assert_eq!(
            book_slug("The Shining", Some("Stephen King")),
            "the-shining-stephen-king"
        );
        assert_eq!(book_slug("Untitled", None), "untitled");
    }

    #[test]
    fn book_slug_truncates_at_word_boundary() {
        let long_title = "word ".repeat(40);
        let slug = book_slug(&long_title, Some("Author Name"));
        assert!(slug.len() <= 100);
        assert!(!slug.ends_with('-'));
        // cut happens between words, not inside one
        assert!(slug.split('-').all(|part| part == "word" || part.is_empty() || part == "author" || part == "name"));
    }
}
