//! Built-in vendor tables, embedded from `tables/*.json` at compile time.

use crate::registry::ErrorCodeRegistry;
use crate::table::VendorTableDef;
use once_cell::sync::Lazy;
use sqlcodes_macro::declare_vendor_table;
use std::sync::Arc;

declare_vendor_table!(path = "tables/hdb.json", name = "HDB", vis = "pub");
declare_vendor_table!(path = "tables/sqlite.json", name = "SQLITE", vis = "pub");

pub static BUILTIN_TABLES: &[&VendorTableDef] = &[&HDB, &SQLITE];

static REGISTRIES: Lazy<Vec<Arc<ErrorCodeRegistry>>> = Lazy::new(|| {
    BUILTIN_TABLES
        .iter()
        .map(|def| Arc::new(ErrorCodeRegistry::from_def(def)))
        .collect()
});

/// Process-wide registry for a built-in vendor, by vendor or product name.
pub fn builtin(name: &str) -> Option<Arc<ErrorCodeRegistry>> {
    REGISTRIES.iter().find(|r| r.matches(name)).cloned()
}

/// Compile-time definition for a built-in vendor, by vendor or product name.
pub fn builtin_def(name: &str) -> Option<&'static VendorTableDef> {
    let name = name.trim();
    BUILTIN_TABLES.iter().copied().find(|def| {
        def.vendor.eq_ignore_ascii_case(name)
            || def.product_names.iter().any(|p| p.eq_ignore_ascii_case(name))
    })
}

pub fn builtin_vendors() -> impl Iterator<Item = &'static str> {
    BUILTIN_TABLES.iter().map(|def| def.vendor)
}
