//! Immutable vendor-code → category registry.

use crate::category::ErrorCategory;
use crate::sql_state::classify_sql_state;
use crate::table::{ErrorCodeEntry, TableLoadError, VendorTable, VendorTableDef};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("vendor '{vendor}' code {code} is claimed by both {existing} and {incoming}")]
    ConflictingCode {
        vendor: String,
        code: i32,
        existing: ErrorCategory,
        incoming: ErrorCategory,
    },

    #[error("vendor '{vendor}' code {code} maps to 'uncategorized'; leave it out of the table instead")]
    UncategorizedEntry { vendor: String, code: i32 },

    #[error(transparent)]
    Load(#[from] TableLoadError),
}

/// Lookup table for one vendor. Read-only once built, so it can be shared
/// across threads without locking.
#[derive(Debug, Clone)]
pub struct ErrorCodeRegistry {
    vendor: String,
    version: String,
    product_names: Vec<String>,
    sql_state_fallback: bool,
    entries: HashMap<i32, ErrorCodeEntry>,
}

impl ErrorCodeRegistry {
    pub fn builder(vendor: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(vendor)
    }

    /// Build from a compile-time table.
    ///
    /// `declare_vendor_table!` rejects duplicate codes while compiling, so a
    /// conflict here means the definition was assembled by hand.
    pub fn from_def(def: &VendorTableDef) -> Self {
        let mut entries = HashMap::with_capacity(def.entries.len());
        for entry in def.entries {
            let previous = entries.insert(entry.code, entry.clone());
            debug_assert!(
                previous.is_none(),
                "duplicate code {} in vendor table {}",
                entry.code,
                def.vendor
            );
        }

        Self {
            vendor: def.vendor.to_string(),
            version: def.version.to_string(),
            product_names: def.product_names.iter().map(|s| s.to_string()).collect(),
            sql_state_fallback: def.sql_state_fallback,
            entries,
        }
    }

    pub fn from_table(table: &VendorTable) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new(table.vendor.clone());
        builder.extend_table(table)?;
        Ok(builder.build())
    }

    /// Category for a native vendor code. Total: unknown codes are `Uncategorized`.
    pub fn lookup(&self, code: i32) -> ErrorCategory {
        self.entries
            .get(&code)
            .map(|e| e.category)
            .unwrap_or(ErrorCategory::Uncategorized)
    }

    pub fn lookup_entry(&self, code: i32) -> Option<&ErrorCodeEntry> {
        self.entries.get(&code)
    }

    /// SQL-state class fallback; `None` when the table disables it or the class is unknown.
    pub fn classify_sql_state(&self, state: &str) -> Option<ErrorCategory> {
        if self.sql_state_fallback {
            classify_sql_state(state)
        } else {
            None
        }
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn product_names(&self) -> &[String] {
        &self.product_names
    }

    pub fn sql_state_fallback(&self) -> bool {
        self.sql_state_fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `name` is the vendor name or one of its product names (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.vendor.eq_ignore_ascii_case(name)
            || self
                .product_names
                .iter()
                .any(|p| p.eq_ignore_ascii_case(name))
    }

    /// All entries ordered by code.
    pub fn entries(&self) -> Vec<&ErrorCodeEntry> {
        let mut out: Vec<_> = self.entries.values().collect();
        out.sort_by_key(|e| e.code);
        out
    }

    /// Codes mapped to `category`, ascending.
    pub fn codes_for(&self, category: ErrorCategory) -> Vec<i32> {
        let mut codes: Vec<i32> = self
            .entries
            .values()
            .filter(|e| e.category == category)
            .map(|e| e.code)
            .collect();
        codes.sort_unstable();
        codes
    }

    pub fn to_table(&self) -> VendorTable {
        VendorTable {
            vendor: self.vendor.clone(),
            version: self.version.clone(),
            product_names: self.product_names.clone(),
            sql_state_fallback: self.sql_state_fallback,
            entries: self.entries().into_iter().cloned().collect(),
        }
    }
}

/// Assembles a registry from one or more tables plus explicit overrides.
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    vendor: String,
    version: String,
    product_names: Vec<String>,
    sql_state_fallback: bool,
    entries: HashMap<i32, ErrorCodeEntry>,
}

impl RegistryBuilder {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            version: String::new(),
            product_names: Vec::new(),
            sql_state_fallback: false,
            entries: HashMap::new(),
        }
    }

    /// Start from a compile-time table.
    pub fn from_def(def: &VendorTableDef) -> Self {
        let registry = ErrorCodeRegistry::from_def(def);
        Self {
            vendor: registry.vendor,
            version: registry.version,
            product_names: registry.product_names,
            sql_state_fallback: registry.sql_state_fallback,
            entries: registry.entries,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn product_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.product_names.contains(&name) {
            self.product_names.push(name);
        }
        self
    }

    pub fn sql_state_fallback(mut self, enabled: bool) -> Self {
        self.sql_state_fallback = enabled;
        self
    }

    /// Add one entry. Repeating a code with the same category is tolerated and
    /// logged; a different category for an existing code is rejected.
    pub fn insert(&mut self, entry: ErrorCodeEntry) -> Result<(), RegistryError> {
        if entry.category == ErrorCategory::Uncategorized {
            return Err(RegistryError::UncategorizedEntry {
                vendor: self.vendor.clone(),
                code: entry.code,
            });
        }

        match self.entries.get(&entry.code) {
            Some(existing) if existing.category == entry.category => {
                tracing::warn!(
                    vendor = %self.vendor,
                    code = entry.code,
                    category = %entry.category,
                    "duplicate vendor code entry ignored"
                );
                Ok(())
            }
            Some(existing) => Err(RegistryError::ConflictingCode {
                vendor: self.vendor.clone(),
                code: entry.code,
                existing: existing.category,
                incoming: entry.category,
            }),
            None => {
                self.entries.insert(entry.code, entry);
                Ok(())
            }
        }
    }

    /// Merge every entry of `table`; metadata fills in whatever is still unset.
    pub fn extend_table(&mut self, table: &VendorTable) -> Result<(), RegistryError> {
        if self.version.is_empty() {
            self.version = table.version.clone();
        }
        for name in &table.product_names {
            if !self.product_names.contains(name) {
                self.product_names.push(name.clone());
            }
        }
        self.sql_state_fallback |= table.sql_state_fallback;

        for entry in &table.entries {
            self.insert(entry.clone())?;
        }
        Ok(())
    }

    /// Replace whatever `code` maps to. `Uncategorized` removes the entry.
    pub fn override_code(&mut self, entry: ErrorCodeEntry) {
        tracing::debug!(
            vendor = %self.vendor,
            code = entry.code,
            category = %entry.category,
            "vendor code overridden"
        );
        if entry.category == ErrorCategory::Uncategorized {
            self.entries.remove(&entry.code);
        } else {
            self.entries.insert(entry.code, entry);
        }
    }

    pub fn build(self) -> ErrorCodeRegistry {
        ErrorCodeRegistry {
            vendor: self.vendor,
            version: self.version,
            product_names: self.product_names,
            sql_state_fallback: self.sql_state_fallback,
            entries: self.entries,
        }
    }
}
