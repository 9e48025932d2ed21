//! SQL-state class fallback used when a vendor code has no table entry.
//!
//! Only the two-character class of the five-character SQLSTATE is consulted.

use crate::category::ErrorCategory;

const BAD_SYNTAX_CLASSES: &[&str] = &["07", "21", "2A", "37", "42", "65"];
const DATA_INTEGRITY_CLASSES: &[&str] = &["01", "02", "22", "23", "27", "44"];
const CONNECTION_FAILURE_CLASSES: &[&str] = &["08", "53", "54", "57", "58"];
const PERMISSION_DENIED_CLASSES: &[&str] = &["28"];

/// Map a SQLSTATE onto a category by its class, if the class is known.
pub fn classify_sql_state(state: &str) -> Option<ErrorCategory> {
    let state = state.trim();
    let class = state.get(..2)?.to_ascii_uppercase();

    if BAD_SYNTAX_CLASSES.contains(&class.as_str()) {
        Some(ErrorCategory::BadSyntax)
    } else if DATA_INTEGRITY_CLASSES.contains(&class.as_str()) {
        Some(ErrorCategory::DataIntegrityViolation)
    } else if CONNECTION_FAILURE_CLASSES.contains(&class.as_str()) {
        Some(ErrorCategory::ConnectionFailure)
    } else if PERMISSION_DENIED_CLASSES.contains(&class.as_str()) {
        Some(ErrorCategory::PermissionDenied)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_classes() {
        for (state, expected) in [
            ("42000", ErrorCategory::BadSyntax),
            ("2a000", ErrorCategory::BadSyntax),
            ("22007", ErrorCategory::DataIntegrityViolation),
            ("23505", ErrorCategory::DataIntegrityViolation),
            ("08001", ErrorCategory::ConnectionFailure),
            ("57P01", ErrorCategory::ConnectionFailure),
            ("28000", ErrorCategory::PermissionDenied),
        ] {
            assert_eq!(classify_sql_state(state), Some(expected), "state {state}");
        }
    }

    #[test]
    fn unknown_or_short_states_fall_through() {
        assert_eq!(classify_sql_state("HY000"), None);
        assert_eq!(classify_sql_state("40001"), None);
        assert_eq!(classify_sql_state("4"), None);
        assert_eq!(classify_sql_state(""), None);
    }
}
