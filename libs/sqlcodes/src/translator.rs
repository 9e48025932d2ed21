//! Turns a raw execution failure into a [`ClassifiedError`].

use crate::category::ErrorCategory;
use crate::registry::ErrorCodeRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What the execution layer knows about a failed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Raw native code from the driver, never a re-wrapped one.
    pub vendor_code: i32,
    pub message: String,
    pub statement: Option<String>,
    pub sql_state: Option<String>,
}

impl FailureReport {
    pub fn new(vendor_code: i32, message: impl Into<String>) -> Self {
        Self {
            vendor_code,
            message: message.into(),
            statement: None,
            sql_state: None,
        }
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn with_sql_state(mut self, state: impl Into<String>) -> Self {
        self.sql_state = Some(state.into());
        self
    }
}

/// A failed operation after classification. Owned by whoever receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    category: ErrorCategory,
    vendor_code: i32,
    native_message: String,
    failed_statement: Option<String>,
    sql_state: Option<String>,
}

impl ClassifiedError {
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn vendor_code(&self) -> i32 {
        self.vendor_code
    }

    pub fn native_message(&self) -> &str {
        &self.native_message
    }

    pub fn failed_statement(&self) -> Option<&str> {
        self.failed_statement.as_deref()
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    pub fn is_transient(&self) -> bool {
        self.category.is_transient()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [vendor code {}]: {}",
            self.category, self.vendor_code, self.native_message
        )?;
        if let Some(stmt) = &self.failed_statement {
            write!(f, "; SQL [{stmt}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

/// Stateless classifier over one vendor registry. Cloning shares the registry.
#[derive(Debug, Clone)]
pub struct ExceptionTranslator {
    registry: Arc<ErrorCodeRegistry>,
}

impl ExceptionTranslator {
    pub fn new(registry: Arc<ErrorCodeRegistry>) -> Self {
        Self { registry }
    }

    /// Translator over a built-in table, matched by vendor or product name.
    pub fn for_vendor(name: &str) -> Option<Self> {
        crate::vendors::builtin(name).map(Self::new)
    }

    pub fn registry(&self) -> &ErrorCodeRegistry {
        &self.registry
    }

    pub fn translate(
        &self,
        vendor_code: i32,
        message: impl Into<String>,
        statement: Option<&str>,
    ) -> ClassifiedError {
        ClassifiedError {
            category: self.registry.lookup(vendor_code),
            vendor_code,
            native_message: message.into(),
            failed_statement: statement.map(str::to_owned),
            sql_state: None,
        }
    }

    /// Like [`translate`](Self::translate), falling back to the SQL-state
    /// class when the code itself is unmapped.
    pub fn translate_report(&self, report: FailureReport) -> ClassifiedError {
        let mut category = self.registry.lookup(report.vendor_code);
        if category == ErrorCategory::Uncategorized {
            if let Some(by_state) = report
                .sql_state
                .as_deref()
                .and_then(|s| self.registry.classify_sql_state(s))
            {
                category = by_state;
            }
        }

        ClassifiedError {
            category,
            vendor_code: report.vendor_code,
            native_message: report.message,
            failed_statement: report.statement,
            sql_state: report.sql_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ErrorCodeEntry;

    fn translator(sql_state_fallback: bool) -> ExceptionTranslator {
        let mut b = ErrorCodeRegistry::builder("Acme").sql_state_fallback(sql_state_fallback);
        b.insert(ErrorCodeEntry::new(301, ErrorCategory::DuplicateKey, ""))
            .unwrap();
        ExceptionTranslator::new(Arc::new(b.build()))
    }

    #[test]
    fn translate_keeps_message_and_statement() {
        let err = translator(false).translate(
            301,
            "unique constraint violated",
            Some("INSERT INTO T VALUES (1)"),
        );
        assert_eq!(err.category(), ErrorCategory::DuplicateKey);
        assert_eq!(err.vendor_code(), 301);
        assert_eq!(err.native_message(), "unique constraint violated");
        assert_eq!(err.failed_statement(), Some("INSERT INTO T VALUES (1)"));
        assert_eq!(err.sql_state(), None);
        assert!(!err.is_transient());
    }

    #[test]
    fn unknown_code_is_well_formed() {
        let err = translator(false).translate(99_999, "boom", None);
        assert_eq!(err.category(), ErrorCategory::Uncategorized);
        assert_eq!(err.failed_statement(), None);
        assert_eq!(err.to_string(), "uncategorized [vendor code 99999]: boom");
    }

    #[test]
    fn report_falls_back_to_sql_state_only_when_enabled() {
        let report = FailureReport::new(274, "inserted value too large").with_sql_state("22001");

        let off = translator(false).translate_report(report.clone());
        assert_eq!(off.category(), ErrorCategory::Uncategorized);
        assert_eq!(off.sql_state(), Some("22001"));

        let on = translator(true).translate_report(report);
        assert_eq!(on.category(), ErrorCategory::DataIntegrityViolation);
    }

    #[test]
    fn vendor_code_wins_over_sql_state() {
        let report = FailureReport::new(301, "dup")
            .with_sql_state("08001")
            .with_statement("INSERT");
        let err = translator(true).translate_report(report);
        assert_eq!(err.category(), ErrorCategory::DuplicateKey);
        assert_eq!(
            err.to_string(),
            "duplicate_key [vendor code 301]: dup; SQL [INSERT]"
        );
    }
}
