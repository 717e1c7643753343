//! GSTIN format checks and state-code derivation
//!
//! None of these functions fail: malformed input yields `false` or `None`.
//! Callers that need a hard guarantee use [`require_valid_gstin`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{GstError, GstResult};

/// Length of a GSTIN
pub const GSTIN_LENGTH: usize = 15;

/// State code (2) + PAN (5 letters, 4 digits, 1 letter) + entity (1) + 'Z' + checksum (1)
static GSTIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").expect("Invalid GSTIN regex")
});

/// True iff `gstin` is a well-formed 15-character GSTIN
pub fn validate_format(gstin: &str) -> bool {
    GSTIN_PATTERN.is_match(gstin)
}

/// First two characters of the GSTIN, or `None` when shorter than two
pub fn state_code(gstin: &str) -> Option<&str> {
    gstin.get(..2)
}

/// Whether a supply between the two parties crosses state lines.
///
/// Returns `false` when either GSTIN is absent.
pub fn is_inter_state(seller_gstin: Option<&str>, buyer_gstin: Option<&str>) -> bool {
    match (seller_gstin, buyer_gstin) {
        (Some(seller), Some(buyer)) if !seller.is_empty() && !buyer.is_empty() => {
            state_code(seller) != state_code(buyer)
        }
        _ => false,
    }
}

/// Reject a malformed GSTIN with a validation error
pub fn require_valid_gstin(gstin: &str, field: &str) -> GstResult<()> {
    if validate_format(gstin) {
        Ok(())
    } else {
        Err(GstError::Validation(format!(
            "{field}: '{gstin}' is not a valid GSTIN"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_format() {
        assert!(validate_format("22AAAAA0000A1Z5"));
        assert!(validate_format("27ABCDE1234F1Z5"));
        assert!(!validate_format("22aaaaa0000a1z5"));
        assert!(!validate_format("22AAAAA0000A1Z"));
        assert!(!validate_format("22AAAAA0000A0Z5")); // entity digit cannot be 0
        assert!(!validate_format("22AAAAA0000A1X5")); // 14th char must be Z
        assert!(!validate_format(""));
    }

    #[test]
    fn test_state_code() {
        assert_eq!(state_code("27ABCDE1234F1Z5"), Some("27"));
        assert_eq!(state_code("2"), None);
        assert_eq!(state_code(""), None);
    }

    #[test]
    fn test_is_inter_state() {
        assert!(is_inter_state(
            Some("27ABCDE1234F1Z5"),
            Some("29ABCDE1234F1Z5")
        ));
        assert!(!is_inter_state(
            Some("27ABCDE1234F1Z5"),
            Some("27XYZAB5678C1Z9")
        ));
        assert!(!is_inter_state(Some("27ABCDE1234F1Z5"), None));
        assert!(!is_inter_state(None, Some("29ABCDE1234F1Z5")));
        assert!(!is_inter_state(Some(""), Some("29ABCDE1234F1Z5")));
    }

    #[test]
    fn test_require_valid_gstin() {
        assert!(require_valid_gstin("22AAAAA0000A1Z5", "business_gstin").is_ok());
        assert!(matches!(
            require_valid_gstin("bogus", "business_gstin"),
            Err(GstError::Validation(_))
        ));
    }
}
