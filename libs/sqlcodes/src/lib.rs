//! Data-driven classification of vendor SQL error codes.
//!
//! A vendor table maps native error codes onto a closed set of
//! [`ErrorCategory`] values. [`ErrorCodeRegistry`] holds one table,
//! immutable once built; [`ExceptionTranslator`] turns a failed statement's
//! code and message into a [`ClassifiedError`] the caller can branch on.
//!
//! # Example
//! ```
//! use sqlcodes::{ErrorCategory, ExceptionTranslator};
//!
//! let translator = ExceptionTranslator::for_vendor("SAP HANA").unwrap();
//! let err = translator.translate(
//!     301,
//!     "unique constraint violated",
//!     Some("INSERT INTO T VALUES (1, 'x')"),
//! );
//! assert_eq!(err.category(), ErrorCategory::DuplicateKey);
//! ```

// Lets `declare_vendor_table!` output name `::sqlcodes::...` from inside this crate.
extern crate self as sqlcodes;

pub mod category;
pub mod registry;
pub mod sql_state;
pub mod table;
pub mod translator;
pub mod vendors;

pub use category::{ErrorCategory, UnknownCategory};
pub use registry::{ErrorCodeRegistry, RegistryBuilder, RegistryError};
pub use sql_state::classify_sql_state;
pub use table::{ErrorCodeEntry, TableLoadError, VendorTable, VendorTableDef};
pub use translator::{ClassifiedError, ExceptionTranslator, FailureReport};

pub use sqlcodes_macro::declare_vendor_table;
