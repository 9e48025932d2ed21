use crate::config::{LoggingConfig, Section};
use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{filter::Targets, fmt};

use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};

const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

// -------- level helpers --------
fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

fn level_filter(s: &str) -> LevelFilter {
    parse_tracing_level(s).map_or(LevelFilter::OFF, LevelFilter::from_level)
}

/// Returns true if target == prefix or target starts with "prefix::"
fn matches_crate_prefix(target: &str, prefix: &str) -> bool {
    target == prefix
        || (target.starts_with(prefix) && target[prefix.len()..].starts_with("::"))
}

// -------- rotating writer for files --------
#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendCount>>>);

impl RotWriter {
    fn handle(&self) -> RotWriterHandle {
        RotWriterHandle(self.0.clone())
    }
}

struct RotWriterHandle(Arc<Mutex<FileRotate<AppendCount>>>);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // A panic mid-write only loses that record; keep logging
        let mut file = self.0.lock().unwrap_or_else(|e| e.into_inner());
        file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self.0.lock().unwrap_or_else(|e| e.into_inner());
        file.flush()
    }
}

// A writer handle that may be None (drops writes)
struct RoutedWriterHandle(Option<RotWriterHandle>);

impl Write for RoutedWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-subsystem files by target prefix, falling back to
/// the default file. The longest matching prefix wins.
struct MultiFileRouter {
    default: Option<RotWriter>,
    by_prefix: HashMap<String, RotWriter>,
}

impl MultiFileRouter {
    fn resolve_for(&self, target: &str) -> Option<&RotWriter> {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| matches_crate_prefix(target, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, w)| w)
            .or(self.default.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for MultiFileRouter {
    type Writer = RoutedWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriterHandle(self.default.as_ref().map(RotWriter::handle))
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RoutedWriterHandle(self.resolve_for(meta.target()).map(RotWriter::handle))
    }
}

// -------- config split --------

struct ConfigData<'a> {
    default_section: Option<&'a Section>,
    subsystem_sections: Vec<(&'a str, &'a Section)>,
}

fn extract_config_data(cfg: &LoggingConfig) -> ConfigData<'_> {
    let subsystem_sections = cfg
        .iter()
        .filter(|(k, _)| k.as_str() != "default")
        .map(|(k, v)| (k.as_str(), v))
        .collect();

    ConfigData {
        default_section: cfg.get("default"),
        subsystem_sections,
    }
}

// -------- path resolution helpers --------

/// Absolute paths are kept as-is; relative paths are joined with `base_dir`.
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Create a rotating writer, ensuring the parent directory exists.
fn create_rotating_writer_at_path(
    log_path: &Path,
    max_bytes: usize,
    max_backups: usize,
) -> std::io::Result<RotWriter> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let rot = FileRotate::new(
        log_path,
        AppendCount::new(max_backups),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None, // file permissions (Unix only)
    );

    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

fn create_file_writer(name: &str, section: &Section, base_dir: &Path) -> Option<RotWriter> {
    if section.file.trim().is_empty() {
        return None;
    }

    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let max_backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);
    let log_path = resolve_log_path(&section.file, base_dir);

    match create_rotating_writer_at_path(&log_path, max_bytes as usize, max_backups) {
        Ok(writer) => Some(writer),
        Err(e) => {
            // No subscriber exists yet, so this cannot go through tracing
            eprintln!(
                "Failed to init log file for '{}': {} ({})",
                name,
                log_path.display(),
                e
            );
            None
        }
    }
}

// -------- filters --------

/// Console filter: the default section sets the catch-all level, explicit
/// subsystems override it for their own targets.
fn build_console_targets(config: &ConfigData) -> Targets {
    let default = config
        .default_section
        .map_or(LevelFilter::OFF, |s| level_filter(&s.console_level));

    config
        .subsystem_sections
        .iter()
        .fold(Targets::new().with_default(default), |t, (name, section)| {
            t.with_target(*name, level_filter(&section.console_level))
        })
}

/// File filter: subsystems without a file of their own are kept out of the
/// default file.
fn build_file_targets(config: &ConfigData, router: &MultiFileRouter) -> Targets {
    let default = match (config.default_section, &router.default) {
        (Some(s), Some(_)) => level_filter(&s.file_level),
        _ => LevelFilter::OFF,
    };

    config
        .subsystem_sections
        .iter()
        .fold(Targets::new().with_default(default), |t, (name, section)| {
            let level = if router.by_prefix.contains_key(*name) {
                level_filter(&section.file_level)
            } else {
                LevelFilter::OFF
            };
            t.with_target(*name, level)
        })
}

fn build_file_router(config: &ConfigData, base_dir: &Path) -> MultiFileRouter {
    let default = config
        .default_section
        .and_then(|s| create_file_writer("default", s, base_dir));

    let by_prefix = config
        .subsystem_sections
        .iter()
        .filter_map(|(name, section)| {
            create_file_writer(name, section, base_dir).map(|w| (name.to_string(), w))
        })
        .collect();

    MultiFileRouter { default, by_prefix }
}

// -------- public init --------

/// Initialize logging from a configuration.
/// - `cfg`: LoggingConfig containing the logging sections
/// - `base_dir`: directory used to resolve relative log file paths
///
/// Console output goes to stderr so command output on stdout stays clean.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

    // Bridge `log` → `tracing` *before* installing the subscriber
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        init_default_logging();
        return;
    }

    let config_data = extract_config_data(cfg);
    let console_targets = build_console_targets(&config_data);
    let file_router = build_file_router(&config_data, base_dir);
    let file_targets = build_file_targets(&config_data, &file_router);

    let ansi = atty::is(atty::Stream::Stderr);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let file_layer = (!file_router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(file_router)
            .with_filter(file_targets)
    });

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn init_default_logging() {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::WARN)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .try_init();
}

// =================== tests ===================
