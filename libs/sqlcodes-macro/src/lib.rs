//! Proc-macro that embeds a vendor error-code table from JSON.
//!
//! The table is read and validated while compiling: a malformed file, an
//! unknown category, or a code listed twice fails the build instead of
//! surfacing at runtime.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use serde::Deserialize;
use std::collections::HashMap;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, LitStr, Token};

/// Category names accepted in a table file, paired with the enum variant.
const CATEGORIES: &[(&str, &str)] = &[
    ("bad_syntax", "BadSyntax"),
    ("duplicate_key", "DuplicateKey"),
    ("data_integrity_violation", "DataIntegrityViolation"),
    ("permission_denied", "PermissionDenied"),
    ("connection_failure", "ConnectionFailure"),
    ("invalid_result_access", "InvalidResultAccess"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    vendor: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    product_names: Vec<String>,
    #[serde(default)]
    sql_state_fallback: bool,
    entries: Vec<EntryFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryFile {
    code: i32,
    category: String,
    #[serde(default)]
    description: String,
}

/// Parsed macro input
struct DeclareTableInput {
    path: String,
    name: String,
    vis: syn::Visibility,
}

impl Parse for DeclareTableInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut path = None;
        let mut name = None;
        let mut vis = syn::Visibility::Inherited;

        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match key.to_string().as_str() {
                "path" => {
                    let lit: LitStr = input.parse()?;
                    path = Some(lit.value());
                }
                "name" => {
                    let lit: LitStr = input.parse()?;
                    name = Some(lit.value());
                }
                "vis" => {
                    let lit: LitStr = input.parse()?;
                    vis = match lit.value().as_str() {
                        "pub" => syn::Visibility::Public(syn::token::Pub::default()),
                        _ => syn::Visibility::Inherited,
                    };
                }
                _ => return Err(syn::Error::new(key.span(), "Unknown parameter")),
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(DeclareTableInput {
            path: path.ok_or_else(|| input.error("Missing 'path' parameter"))?,
            name: name.ok_or_else(|| input.error("Missing 'name' parameter"))?,
            vis,
        })
    }
}

/// Declare a `static` `VendorTableDef` from a JSON table file.
///
/// ```ignore
/// declare_vendor_table!(path = "tables/hdb.json", name = "HDB", vis = "pub");
/// ```
///
/// `path` is relative to the invoking crate's `CARGO_MANIFEST_DIR`.
#[proc_macro]
pub fn declare_vendor_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeclareTableInput);

    match generate_table(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_table(input: &DeclareTableInput) -> syn::Result<TokenStream2> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map_err(|_| syn::Error::new(Span::call_site(), "CARGO_MANIFEST_DIR not set"))?;
    let json_path = std::path::Path::new(&manifest_dir).join(&input.path);

    let json_content = std::fs::read_to_string(&json_path).map_err(|e| {
        syn::Error::new(
            Span::call_site(),
            format!("Failed to read vendor table at {}: {}", json_path.display(), e),
        )
    })?;

    let table: TableFile = serde_json::from_str(&json_content).map_err(|e| {
        syn::Error::new(
            Span::call_site(),
            format!(
                "Failed to parse vendor table JSON at {}: {}",
                json_path.display(),
                e
            ),
        )
    })?;

    let variants = validate_table(&table).map_err(|msg| syn::Error::new(Span::call_site(), msg))?;

    let ident = syn::Ident::new(&input.name, Span::call_site());
    let vis = &input.vis;
    let json_file_path = &input.path;
    let vendor = &table.vendor;
    let version = &table.version;
    let product_names = &table.product_names;
    let sql_state_fallback = table.sql_state_fallback;
    let entries = generate_entries(&table.entries, &variants);
    let doc = format!("Vendor error-code table for {vendor} (from `{json_file_path}`).");

    Ok(quote! {
        // Force Cargo to rebuild if the table file changes
        const _: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/", #json_file_path));

        #[doc = #doc]
        #vis static #ident: ::sqlcodes::VendorTableDef = ::sqlcodes::VendorTableDef {
            vendor: #vendor,
            version: #version,
            product_names: &[#(#product_names),*],
            sql_state_fallback: #sql_state_fallback,
            entries: &[#(#entries),*],
        };
    })
}

/// Check the table and resolve each entry's category to its enum variant.
fn validate_table(table: &TableFile) -> Result<Vec<&'static str>, String> {
    if table.vendor.trim().is_empty() {
        return Err("Vendor table has an empty 'vendor' name".to_string());
    }

    let mut seen: HashMap<i32, &str> = HashMap::new();
    let mut variants = Vec::with_capacity(table.entries.len());
    for entry in &table.entries {
        let Some(variant) = category_variant(&entry.category) else {
            return Err(format!(
                "Unknown category '{}' for {} code {}",
                entry.category, table.vendor, entry.code
            ));
        };
        variants.push(variant);

        if let Some(previous) = seen.insert(entry.code, &entry.category) {
            return Err(format!(
                "Duplicate {} code {}: listed as '{}' and '{}'",
                table.vendor, entry.code, previous, entry.category
            ));
        }
    }

    Ok(variants)
}

fn category_variant(name: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, variant)| *variant)
}

fn generate_entries(entries: &[EntryFile], variants: &[&'static str]) -> Vec<TokenStream2> {
    entries
        .iter()
        .zip(variants)
        .map(|(e, variant)| {
            let variant = syn::Ident::new(variant, Span::call_site());
            let code = code_literal(e.code);
            let description = &e.description;

            quote! {
                ::sqlcodes::ErrorCodeEntry {
                    code: #code,
                    category: ::sqlcodes::ErrorCategory::#variant,
                    description: ::std::borrow::Cow::Borrowed(#description),
                }
            }
        })
        .collect()
}

/// Negative codes are emitted as `-` followed by an unsigned literal.
fn code_literal(code: i32) -> TokenStream2 {
    let magnitude = proc_macro2::Literal::u32_unsuffixed(code.unsigned_abs());
    if code < 0 {
        quote!(-#magnitude)
    } else {
        quote!(#magnitude)
    }
}
