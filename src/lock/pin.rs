//! PIN format and comparison helpers

pub const PIN_DIGITS: usize = 4;

/// Exactly four ASCII digits
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_DIGITS && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Compare without branching on individual characters.
///
/// Lengths are checked first; equal-length inputs are XOR-accumulated over
/// every byte. PINs live in plaintext next to this code, so this only avoids
/// the obvious early exit, it is not a timing-attack defence.
pub fn pins_match(candidate: &str, stored: &str) -> bool {
    let (a, b) = (candidate.as_bytes(), stored.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_format() {
        assert!(is_valid_pin("0000"));
        assert!(is_valid_pin("1234"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin("12a4"));
        assert!(!is_valid_pin(""));
        // Non-ASCII digits are not accepted
        assert!(!is_valid_pin("١٢٣٤"));
    }

    #[test]
    fn test_pins_match_is_exact() {
        assert!(pins_match("1234", "1234"));
        assert!(!pins_match("1235", "1234"));
        assert!(!pins_match("123", "1234"));
        assert!(!pins_match("12340", "1234"));
        assert!(!pins_match("", "1234"));
    }
}
