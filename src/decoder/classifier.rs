// src/decoder/classifier.rs
//! Picks exactly one interpretation for a raw scan.

use crate::decoder::envelope::ENCODED_MARKER;

/// The four payload shapes a student QR code can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Base64 `Salted__` envelope holding an encrypted JSON claim
    Encrypted,
    /// Plain JSON object with the identity fields
    Json,
    /// Bare avatar image URL
    DirectUrl,
    /// `identifier|token`, resolved through the lookup service
    Legacy,
}

/// Classifies a raw scan by its first few characters.
///
/// First match wins:
/// 1. trimmed input starts with `U2FsdGVk` → `Encrypted`
/// 2. trimmed input starts with `{` → `Json`
/// 3. input starts with `http` (any case) → `DirectUrl`
/// 4. anything else → `Legacy`
///
/// Classification never looks at whether the chosen branch will succeed.
pub fn classify(raw: &str) -> PayloadFormat {
    let trimmed = raw.trim();

    if trimmed.starts_with(ENCODED_MARKER) {
        PayloadFormat::Encrypted
    } else if trimmed.starts_with('{') {
        PayloadFormat::Json
    } else if starts_with_ignore_ascii_case(raw, "http") {
        PayloadFormat::DirectUrl
    } else {
        PayloadFormat::Legacy
    }
}

fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(classify("U2FsdGVkX18BAgME"), PayloadFormat::Encrypted);
        assert_eq!(classify("  U2FsdGVkX18BAgME\n"), PayloadFormat::Encrypted);
        assert_eq!(classify(" {\"id\":\"S1\"}"), PayloadFormat::Json);
        assert_eq!(classify("http://example.com/photo.jpg"), PayloadFormat::DirectUrl);
        assert_eq!(classify("HTTPS://EXAMPLE.COM/A.PNG"), PayloadFormat::DirectUrl);
        assert_eq!(classify("S100|abc123"), PayloadFormat::Legacy);
    }

    #[test]
    fn test_url_check_is_not_trimmed() {
        assert_eq!(classify(" http://example.com"), PayloadFormat::Legacy);
    }

    #[test]
    fn test_short_and_empty_inputs() {
        assert_eq!(classify(""), PayloadFormat::Legacy);
        assert_eq!(classify("ht"), PayloadFormat::Legacy);
        assert_eq!(classify("{"), PayloadFormat::Json);
        // Multi-byte characters must not break the prefix slice.
        assert_eq!(classify("hé"), PayloadFormat::Legacy);
    }

    #[test]
    fn test_json_marker_beats_url() {
        assert_eq!(classify("{\"image\":\"http://x\"}"), PayloadFormat::Json);
    }
}
