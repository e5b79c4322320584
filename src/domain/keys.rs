use rand::Rng;
use uuid::Uuid;

const BASE62: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Mint a canonical book key: a v7 UUID, time-ordered so books sort by
/// creation.
pub fn canonical_key() -> Uuid {
    Uuid::now_v7()
}

/// True when the input is in canonical key format: 128-bit hex in the
/// standard 8-4-4-4-12 dashed form.
pub fn is_canonical_key(input: &str) -> bool {
    input.len() == 36
        && input.bytes().filter(|b| *b == b'-').count() == 4
        && Uuid::parse_str(input).is_ok()
}

/// Short base-62 token for join-table primary keys.
pub fn short_id() -> String {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_keys_are_time_ordered() {
        let a = canonical_key();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = canonical_key();
        assert!(a < b);
        assert!(is_canonical_key(&a.to_string()));
    }

    #[test]
    fn rejects_non_canonical_identifiers() {
        assert!(!is_canonical_key("9780307743657"));
        assert!(!is_canonical_key("the-shining-stephen-king"));
        assert!(!is_canonical_key("11111111111141118111111111111111"));
        assert!(is_canonical_key("11111111-1111-4111-8111-111111111111"));
    }

    #[test]
    fn short_ids_are_base62() {
        let id = short_id();
        assert_eq!(id.len(), 12);
        assert!(id.bytes().all(|b| BASE62.contains(&b)));
    }
}
