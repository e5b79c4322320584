//! Author-name normalization used for deduplication: unicode-decomposed,
//! accent-stripped, lowercased, punctuation collapsed to spaces, with
//! "Last, First" rewritten to "first last" and common suffixes dropped.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Name suffixes and corporate titles that never distinguish two authors.
const DROPPED_SUFFIXES: &[&str] = &[
    "jr", "sr", "ii", "iii", "iv", "phd", "md", "esq", "inc", "llc", "ltd", "co",
];

pub fn normalize_author(name: &str) -> String {
    // "Last, First" -> "First Last" before stripping punctuation; names with
    // more than one comma are left in written order.
    let reordered = match name.match_indices(',').count() {
        1 => {
            let (last, first) = name.split_once(',').unwrap_or((name, ""));
            format!("{} {}", first.trim(), last.trim())
        }
        _ => name.to_string(),
    };

    let mut lowered = String::with_capacity(reordered.len());
    for c in reordered.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            for l in c.to_lowercase() {
                lowered.push(l);
            }
        } else {
            lowered.push(' ');
        }
    }

    lowered
        .split_whitespace()
        .filter(|word| !DROPPED_SUFFIXES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_last_comma_first() {
        assert_eq!(normalize_author("King, Stephen"), "stephen king");
        assert_eq!(normalize_author("Stephen King"), "stephen king");
    }

    #[test]
    fn strips_accents() {
        assert_eq!(
            normalize_author("José García Márquez"),
            "jose garcia marquez"
        );
    }

    #[test]
    fn drops_suffixes_and_corporate_titles() {
        assert_eq!(normalize_author("Martin Luther King, Jr."), "martin luther king");
        assert_eq!(normalize_author("Penguin Books Ltd."), "penguin books");
    }

    #[test]
    fn collapses_punctuation_and_whitespace() {
        assert_eq!(normalize_author("  J.R.R.   Tolkien "), "j r r tolkien");
    }

    #[test]
    fn is_idempotent() {
        for name in ["King, Stephen", "José García Márquez", "J.R.R. Tolkien"] {
            let once = normalize_author(name);
            assert_eq!(normalize_author(&once), once);
        }
    }
}
