use rand::Rng;

/// Characters allowed in room codes (uppercase alphanumeric, excluding confusing chars)
/// Removed: 0, O, I, 1, L to avoid confusion
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LENGTH: usize = 6;

/// Generate a random 6-character room code (not yet checked for uniqueness)
#[must_use]
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..ROOM_CODE_CHARS.len());
            char::from(ROOM_CODE_CHARS[idx])
        })
        .collect()
}

/// Validate room code format (expects a normalized code)
#[must_use]
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH && code.bytes().all(|c| ROOM_CODE_CHARS.contains(&c))
}

/// Normalize room code (uppercase, trimmed)
#[must_use]
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_room_code_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), 6);
            assert!(is_valid_room_code(&code));
        }
    }

    #[test]
    fn test_room_code_uniqueness() {
        let codes: std::collections::HashSet<String> =
            (0..1000).map(|_| generate_room_code()).collect();
        // Should have very few collisions (likely none in 1000 codes)
        assert!(codes.len() > 990);
    }

    #[test]
    fn test_is_valid_room_code() {
        assert!(is_valid_room_code("ABC234"));
        assert!(!is_valid_room_code("abc234")); // not normalized
        assert!(!is_valid_room_code("ABC23")); // too short
        assert!(!is_valid_room_code("ABC2345")); // too long
        assert!(!is_valid_room_code("ABC10O")); // ambiguous chars
    }

    #[test]
    fn test_normalize_room_code() {
        assert_eq!(normalize_room_code("  abc234  "), "ABC234");
    }
}
