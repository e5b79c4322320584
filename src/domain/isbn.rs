//! ISBN sanitization and validation. Sanitization strips everything but
//! digits, keeping a trailing X (check character) uppercased; it is
//! idempotent.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isbn {
    Ten(String),
    Thirteen(String),
}

impl Isbn {
    pub fn value(&self) -> &str {
        match self {
            Isbn::Ten(v) | Isbn::Thirteen(v) => v,
        }
    }
}

/// Strip non-digits, keeping a trailing x/X uppercased.
pub fn sanitize(input: &str) -> String {
    let trimmed = input.trim();
    let mut digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.ends_with('x') || trimmed.ends_with('X') {
        digits.push('X');
    }
    digits
}

/// Classify a sanitized identifier as ISBN-10 or ISBN-13 by shape alone.
pub fn classify(input: &str) -> Option<Isbn> {
    let s = sanitize(input);
    if s.len() == 13 && s.bytes().all(|b| b.is_ascii_digit()) {
        Some(Isbn::Thirteen(s))
    } else if s.len() == 10
        && s.bytes().take(9).all(|b| b.is_ascii_digit())
        && (s.as_bytes()[9].is_ascii_digit() || s.as_bytes()[9] == b'X')
    {
        Some(Isbn::Ten(s))
    } else {
        None
    }
}

/// ISBN-10 check digit: sum(digit_i * (10 - i)) mod 11 == 0, X = 10.
pub fn valid_isbn10(s: &str) -> bool {
    if s.len() != 10 {
        return false;
    }
    let mut sum: u32 = 0;
    for (i, c) in s.chars().enumerate() {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'X' if i == 9 => 10,
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

/// ISBN-13 check digit: alternating 1/3 weights, mod 10.
pub fn valid_isbn13(s: &str) -> bool {
    if s.len() != 13 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = s
        .bytes()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    sum % 10 == 0
}

/// Derive the 978-prefixed ISBN-13 for an ISBN-10.
pub fn isbn13_from_isbn10(isbn10: &str) -> Option<String> {
    if isbn10.len() != 10 {
        return None;
    }
    let core = format!("978{}", &isbn10[..9]);
    let sum: u32 = core
        .bytes()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - (sum % 10)) % 10;
    Some(format!("{core}{check}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_punctuation_and_keeps_check_char() {
        assert_eq!(sanitize("978-0-307-74365-7"), "9780307743657");
        assert_eq!(sanitize("0-8044-2957-x"), "080442957X");
        assert_eq!(sanitize(" 0306406152 "), "0306406152");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in ["978-0-307-74365-7", "0-8044-2957-x", "garbage123"] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn classify_by_shape() {
        assert_eq!(
            classify("9780307743657"),
            Some(Isbn::Thirteen("9780307743657".into()))
        );
        assert_eq!(
            classify("0-8044-2957-X"),
            Some(Isbn::Ten("080442957X".into()))
        );
        assert_eq!(classify("12345"), None);
    }

    #[test]
    fn check_digits() {
        assert!(valid_isbn13("9780307743657"));
        assert!(!valid_isbn13("9780307743658"));
        assert!(valid_isbn10("0306406152"));
        assert!(valid_isbn10("080442957X"));
        assert!(!valid_isbn10("0306406153"));
    }

    #[test]
    fn derives_isbn13_from_isbn10() {
        assert_eq!(
            isbn13_from_isbn10("0306406152").as_deref(),
            Some("9780306406157")
        );
    }
}
