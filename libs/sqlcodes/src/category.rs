use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Abstract failure category a vendor error code maps onto.
///
/// The set is closed: every classification produced by this crate is one of
/// these variants, and unknown vendor codes land in [`ErrorCategory::Uncategorized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed statement, unknown or duplicate object, wrong value count.
    BadSyntax,
    /// Primary-key or unique constraint collision.
    DuplicateKey,
    /// Referential integrity or malformed data literal.
    DataIntegrityViolation,
    /// Insufficient privilege for the attempted operation.
    PermissionDenied,
    /// The database could not be reached or opened.
    ConnectionFailure,
    /// A result column was requested by a name or ordinal that does not exist.
    InvalidResultAccess,
    /// No table entry matched.
    Uncategorized,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::BadSyntax,
        ErrorCategory::DuplicateKey,
        ErrorCategory::DataIntegrityViolation,
        ErrorCategory::PermissionDenied,
        ErrorCategory::ConnectionFailure,
        ErrorCategory::InvalidResultAccess,
        ErrorCategory::Uncategorized,
    ];

    /// Stable snake_case name, identical to the serialized form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BadSyntax => "bad_syntax",
            ErrorCategory::DuplicateKey => "duplicate_key",
            ErrorCategory::DataIntegrityViolation => "data_integrity_violation",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::ConnectionFailure => "connection_failure",
            ErrorCategory::InvalidResultAccess => "invalid_result_access",
            ErrorCategory::Uncategorized => "uncategorized",
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// Only connection-level failures qualify; a duplicate key or a syntax
    /// error fails the same way every time.
    pub const fn is_transient(&self) -> bool {
        matches!(self, ErrorCategory::ConnectionFailure)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for ErrorCategory {
    type Err = UnknownCategory;

    /// Accepts the snake_case name in any letter case, with `-` allowed in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
