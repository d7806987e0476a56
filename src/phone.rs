//! Phone number checks for outbound destinations

use once_cell::sync::Lazy;
use regex::Regex;

/// Optional `+`, no leading zero, 2 to 15 digits
static E164_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("Invalid E.164 regex"));

pub fn strip_whitespace(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Check a destination against E.164, ignoring embedded whitespace
pub fn is_e164(phone: &str) -> bool {
    E164_PATTERN.is_match(&strip_whitespace(phone))
}

/// Normalize phone number to E.164 format
pub fn normalize_phone(phone: &str) -> String {
    // Remove all non-digit characters except leading +
    let trimmed = phone.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if has_plus {
        format!("+{}", digits)
    } else if digits.len() == 10 {
        // Assume North American number
        format!("+1{}", digits)
    } else {
        format!("+{}", digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_e164_valid() {
        assert!(is_e164("+15551234567"));
        assert!(is_e164("15551234567"));
        assert!(is_e164("+447911123456"));
        assert!(is_e164("+1 555 123 4567"));
        assert!(is_e164("+12"));
    }

    #[test]
    fn test_is_e164_invalid() {
        assert!(!is_e164(""));
        assert!(!is_e164("+"));
        assert!(!is_e164("+0123456789"));
        assert!(!is_e164("555-123-4567"));
        assert!(!is_e164("(555) 123-4567"));
        assert!(!is_e164("+1234567890123456"));
        assert!(!is_e164("+1"));
        assert!(!is_e164("hello"));
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" +1 555\t123 4567 "), "+15551234567");
    }

    #[test]
    fn test_normalize_phone_e164() {
        assert_eq!(normalize_phone("+16175551234"), "+16175551234");
    }

    #[test]
    fn test_normalize_phone_with_spaces() {
        assert_eq!(normalize_phone("+1 617 555 1234"), "+16175551234");
    }

    #[test]
    fn test_normalize_phone_10_digit() {
        assert_eq!(normalize_phone("6175551234"), "+16175551234");
    }

    #[test]
    fn test_normalize_phone_11_digit() {
        assert_eq!(normalize_phone("16175551234"), "+16175551234");
    }

    #[test]
    fn test_normalize_phone_international() {
        assert_eq!(normalize_phone("+44 7911 123456"), "+447911123456");
    }
}
