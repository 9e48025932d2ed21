//! Vendor error-code tables: the static form emitted by `declare_vendor_table!`
//! and the owned form loaded from JSON or YAML files at runtime.

use crate::category::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// One row of a vendor table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorCodeEntry {
    /// Native numeric code exactly as reported by the driver.
    pub code: i32,
    pub category: ErrorCategory,
    /// Informational only; never consulted during classification.
    #[serde(default)]
    pub description: Cow<'static, str>,
}

impl ErrorCodeEntry {
    pub fn new(code: i32, category: ErrorCategory, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            category,
            description: description.into(),
        }
    }
}

/// Compile-time vendor table, produced by `declare_vendor_table!`.
#[derive(Debug)]
pub struct VendorTableDef {
    pub vendor: &'static str,
    pub version: &'static str,
    pub product_names: &'static [&'static str],
    pub sql_state_fallback: bool,
    pub entries: &'static [ErrorCodeEntry],
}

/// Owned vendor table, typically read from a versioned data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorTable {
    pub vendor: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub product_names: Vec<String>,
    #[serde(default)]
    pub sql_state_fallback: bool,
    #[serde(default)]
    pub entries: Vec<ErrorCodeEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum TableLoadError {
    #[error("failed to read vendor table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON vendor table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML vendor table: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported vendor table format: {} (expected .json, .yaml or .yml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("vendor table has an empty vendor name")]
    MissingVendor,
}

impl VendorTable {
    pub fn from_json_str(raw: &str) -> Result<Self, TableLoadError> {
        let table: VendorTable = serde_json::from_str(raw)?;
        table.validated()
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, TableLoadError> {
        let table: VendorTable = serde_yaml::from_str(raw)?;
        table.validated()
    }

    /// Load a table file, choosing the parser by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableLoadError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let read = || {
            std::fs::read_to_string(path).map_err(|source| TableLoadError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        match ext.as_str() {
            "json" => Self::from_json_str(&read()?),
            "yaml" | "yml" => Self::from_yaml_str(&read()?),
            _ => Err(TableLoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn validated(self) -> Result<Self, TableLoadError> {
        if self.vendor.trim().is_empty() {
            return Err(TableLoadError::MissingVendor);
        }
        Ok(self)
    }
}

impl From<&VendorTableDef> for VendorTable {
    fn from(def: &VendorTableDef) -> Self {
        Self {
            vendor: def.vendor.to_string(),
            version: def.version.to_string(),
            product_names: def.product_names.iter().map(|s| s.to_string()).collect(),
            sql_state_fallback: def.sql_state_fallback,
            entries: def.entries.to_vec(),
        }
    }
}
