use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use sqlcodes::{
    vendors, ErrorCategory, ErrorCodeEntry, ErrorCodeRegistry, ExceptionTranslator,
    RegistryBuilder, VendorTable,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Environment prefix; `SQLCODES__CLASSIFICATION__VENDOR=HDB` maps to `classification.vendor`.
pub const ENV_PREFIX: &str = "SQLCODES__";

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Which vendor table to classify with, plus local adjustments.
    #[serde(default)]
    pub classification: ClassificationConfig,
    /// Database used by `exec` (optional).
    pub database: Option<DatabaseConfig>,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationConfig {
    /// Built-in vendor or product name ("HDB", "SAP HANA", "SQLite").
    pub vendor: String,
    /// JSON or YAML table merged over the built-in one. When `vendor` is not
    /// built in, this file is the whole table.
    #[serde(default)]
    pub table_file: Option<String>,
    /// Native code → category, applied last. Keys are strings because they
    /// arrive as YAML map keys or environment variable names.
    #[serde(default)]
    pub overrides: BTreeMap<String, ErrorCategory>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g., "sqlite://./app.db", "sqlite::memory:").
    pub url: String,
    /// Maximum number of connections in the pool (optional, defaults to 4).
    pub max_conns: Option<u32>,
    /// SQLite busy timeout in milliseconds (optional, defaults to 5000).
    pub busy_timeout_ms: Option<u32>,
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/sqlcodes.log"; empty disables the file
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>, // How many rotated files to keep
    #[serde(default)]
    pub max_size_mb: Option<u64>, // Max size of the file in MB
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            vendor: vendors::SQLITE.vendor.to_string(),
            table_file: None,
            overrides: BTreeMap::new(),
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "warn".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classification: ClassificationConfig::default(),
            database: Some(DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_conns: Some(4),
                busy_timeout_ms: Some(5000),
            }),
            logging: Some(default_logging_config()),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        // Optional sections stay None unless YAML/ENV provide them
        let base = AppConfig {
            classification: ClassificationConfig::default(),
            database: None,
            logging: None,
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(figment)
    }

    /// Load configuration from file, or defaults plus environment when no file is given.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let figment = Figment::new()
                    .merge(Serialized::defaults(Self::default()))
                    .merge(Env::prefixed(ENV_PREFIX).split("__"));
                Self::from_figment(figment)
            }
        }
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(vendor) = &args.vendor {
            self.classification.vendor = vendor.clone();
        }

        // Set logging level based on verbose flags for "default" section.
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }

    /// Build the registry described by the `classification` section:
    /// built-in table, then `table_file`, then `overrides`.
    pub fn build_registry(&self) -> Result<ErrorCodeRegistry> {
        let c = &self.classification;

        let table = c
            .table_file
            .as_deref()
            .map(|file| {
                VendorTable::load(file)
                    .with_context(|| format!("Failed to load vendor table '{file}'"))
            })
            .transpose()?;

        let mut builder = match (vendors::builtin_def(&c.vendor), &table) {
            (Some(def), Some(t)) if !names_vendor(&t.vendor, def.vendor, def.product_names) => {
                bail!(
                    "Vendor table '{}' is for '{}', not '{}'",
                    c.table_file.as_deref().unwrap_or_default(),
                    t.vendor,
                    def.vendor
                )
            }
            (Some(def), _) => RegistryBuilder::from_def(def),
            (None, Some(t)) if names_vendor(&c.vendor, &t.vendor, t.product_names.as_slice()) => {
                RegistryBuilder::new(t.vendor.clone())
            }
            (None, Some(t)) => bail!(
                "Vendor '{}' does not match table file vendor '{}'",
                c.vendor,
                t.vendor
            ),
            (None, None) => bail!(
                "Unknown vendor '{}' (built in: {}); set classification.table_file",
                c.vendor,
                vendors::builtin_vendors().collect::<Vec<_>>().join(", ")
            ),
        };

        if let Some(t) = &table {
            builder
                .extend_table(t)
                .with_context(|| format!("Vendor table for '{}' conflicts with built-in codes", t.vendor))?;
        }

        for (code, category) in &c.overrides {
            let code: i32 = code
                .trim()
                .parse()
                .with_context(|| format!("Override key '{code}' is not a numeric vendor code"))?;
            builder.override_code(ErrorCodeEntry::new(code, *category, "configured override"));
        }

        Ok(builder.build())
    }

    /// Translator for the configured vendor. Without local adjustments the
    /// process-wide built-in registry is shared.
    pub fn translator(&self) -> Result<ExceptionTranslator> {
        let c = &self.classification;
        if c.table_file.is_none() && c.overrides.is_empty() {
            if let Some(shared) = vendors::builtin(&c.vendor) {
                return Ok(ExceptionTranslator::new(shared));
            }
        }
        Ok(ExceptionTranslator::new(Arc::new(self.build_registry()?)))
    }
}

fn names_vendor<S: AsRef<str>>(name: &str, vendor: &str, product_names: &[S]) -> bool {
    let name = name.trim();
    vendor.eq_ignore_ascii_case(name)
        || product_names
            .iter()
            .any(|p| p.as_ref().eq_ignore_ascii_case(name))
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub vendor: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_structure() {
        let config = AppConfig::default();

        assert_eq!(config.classification.vendor, "SQLite");
        assert!(config.classification.table_file.is_none());
        assert!(config.classification.overrides.is_empty());

        let db = config.database.as_ref().unwrap();
        assert_eq!(db.url, "sqlite::memory:");
        assert_eq!(db.max_conns, Some(4));

        let logging = config.logging.as_ref().unwrap();
        let default_section = &logging["default"];
        assert_eq!(default_section.console_level, "warn");
        assert_eq!(default_section.file, "");
    }

    #[test]
    fn test_load_layered_reads_all_sections() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");

        let yaml = r#"
classification:
  vendor: "SAP HANA"
  overrides:
    274: data_integrity_violation

database:
  url: "sqlite://./app.db"
  max_conns: 2

logging:
  default:
    console_level: debug
    file: "logs/default.log"
"#;
        fs::write(&cfg_path, yaml).unwrap();

        let config = AppConfig::load_layered(&cfg_path).unwrap();

        assert_eq!(config.classification.vendor, "SAP HANA");
        assert_eq!(
            config.classification.overrides.get("274"),
            Some(&ErrorCategory::DataIntegrityViolation)
        );

        let db = config.database.as_ref().unwrap();
        assert_eq!(db.url, "sqlite://./app.db");
        assert_eq!(db.max_conns, Some(2));
        assert_eq!(db.busy_timeout_ms, None);

        let def = &config.logging.as_ref().unwrap()["default"];
        assert_eq!(def.console_level, "debug");
        assert_eq!(def.file, "logs/default.log");
    }

    #[test]
    fn test_minimal_yaml_config() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");
        fs::write(&cfg_path, "classification:\n  vendor: HDB\n").unwrap();

        let config = AppConfig::load_layered(&cfg_path).unwrap();
        assert_eq!(config.classification.vendor, "HDB");

        // Optional sections default to None
        assert!(config.database.is_none());
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_serialized_provider_layers_over_defaults() {
        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Serialized::default("classification.vendor", "HDB"))
            .merge(Serialized::default("classification.overrides", serde_json::json!({ "131": "connection_failure" })));

        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.classification.vendor, "HDB");
        assert!(config.database.is_some());

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.lookup(131), ErrorCategory::ConnectionFailure);
        assert_eq!(registry.lookup(301), ErrorCategory::DuplicateKey);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();

        let args = CliArgs {
            vendor: Some("HDB".into()),
            verbose: 2, // trace
            ..CliArgs::default()
        };

        config.apply_cli_overrides(&args);

        assert_eq!(config.classification.vendor, "HDB");
        let default_section = &config.logging.as_ref().unwrap()["default"];
        assert_eq!(default_section.console_level, "trace");
    }

    #[test]
    fn test_cli_verbose_levels_matrix() {
        for (verbose_level, expected_log_level) in [
            (0, "warn"), // unchanged from default
            (1, "debug"),
            (2, "trace"),
            (3, "trace"), // cap at trace
        ] {
            let mut config = AppConfig::default();
            let args = CliArgs {
                verbose: verbose_level,
                ..CliArgs::default()
            };

            config.apply_cli_overrides(&args);

            let default_section = &config.logging.as_ref().unwrap()["default"];
            assert_eq!(default_section.console_level, expected_log_level);
        }
    }

    #[test]
    fn test_build_registry_layers_table_file_and_overrides() {
        let tmp = tempdir().unwrap();
        let table_path = tmp.path().join("sqlite-extra.yaml");
        fs::write(
            &table_path,
            r#"
vendor: SQLite
entries:
  - code: 275
    category: data_integrity_violation
    description: CHECK constraint failed
"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.classification.table_file = Some(table_path.to_string_lossy().into_owned());
        config
            .classification
            .overrides
            .insert("1555".into(), ErrorCategory::DataIntegrityViolation);
        config
            .classification
            .overrides
            .insert("25".into(), ErrorCategory::Uncategorized);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.lookup(275), ErrorCategory::DataIntegrityViolation);
        assert_eq!(registry.lookup(1555), ErrorCategory::DataIntegrityViolation);
        assert_eq!(registry.lookup(25), ErrorCategory::Uncategorized);
        assert_eq!(registry.lookup(787), ErrorCategory::DataIntegrityViolation);
    }

    #[test]
    fn test_custom_vendor_from_table_file_only() {
        let tmp = tempdir().unwrap();
        let table_path = tmp.path().join("acme.json");
        fs::write(
            &table_path,
            r#"{ "vendor": "Acme", "product_names": ["Acme DB"], "entries": [ { "code": 42, "category": "permission_denied" } ] }"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.classification.vendor = "acme db".into();
        config.classification.table_file = Some(table_path.to_string_lossy().into_owned());

        let translator = config.translator().unwrap();
        assert_eq!(translator.registry().vendor(), "Acme");
        assert_eq!(
            translator.translate(42, "nope", None).category(),
            ErrorCategory::PermissionDenied
        );
    }

    #[test]
    fn test_unknown_vendor_and_bad_override_are_errors() {
        let mut config = AppConfig::default();
        config.classification.vendor = "Oracle".into();
        let err = config.build_registry().unwrap_err();
        assert!(err.to_string().contains("Unknown vendor 'Oracle'"), "{err}");

        let mut config = AppConfig::default();
        config
            .classification
            .overrides
            .insert("not-a-code".into(), ErrorCategory::BadSyntax);
        assert!(config.build_registry().is_err());
    }

    #[test]
    fn test_table_file_for_other_vendor_is_rejected() {
        let tmp = tempdir().unwrap();
        let table_path = tmp.path().join("hdb.json");
        fs::write(&table_path, r#"{ "vendor": "HDB", "entries": [] }"#).unwrap();

        let mut config = AppConfig::default();
        config.classification.table_file = Some(table_path.to_string_lossy().into_owned());
        assert!(config.build_registry().is_err());
    }

    #[test]
    fn test_translator_shares_builtin_without_adjustments() {
        let config = AppConfig::default();
        let a = config.translator().unwrap();
        let b = config.translator().unwrap();
        assert!(std::ptr::eq(a.registry(), b.registry()));
    }

    #[test]
    fn test_to_yaml_roundtrip_basic() {
        let mut config = AppConfig::default();
        config
            .classification
            .overrides
            .insert("275".into(), ErrorCategory::DataIntegrityViolation);
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("classification:"));
        assert!(yaml.contains("database:"));
        assert!(yaml.contains("logging:"));
        assert!(yaml.contains("data_integrity_violation"));

        let roundtrip: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(roundtrip.classification.overrides, config.classification.overrides);
    }

    #[test]
    fn test_invalid_yaml_unknown_field() {
        let invalid_yaml = r#"
classification:
  vendor: SQLite
  vendr: HDB
"#;
        let result: Result<AppConfig, _> = serde_yaml::from_str(invalid_yaml);
        assert!(result.is_err());
    }
}
