use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs};
use serde::Serialize;
use sqlcodes::{
    ClassifiedError, ErrorCategory, ErrorCodeRegistry, ExceptionTranslator, FailureReport,
    VendorTable,
};
use sqlcodes_db::{ConnectOpts, DbError, SqlTemplate};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Exit status when `exec` ran but the statement failed.
const EXIT_STATEMENT_FAILED: u8 = 2;

/// sqlcodes - classify vendor SQL error codes
#[derive(Parser)]
#[command(name = "sqlcodes")]
#[command(about = "sqlcodes - classify vendor SQL error codes into portable categories")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Vendor or product name (overrides config)
    #[arg(long, global = true)]
    vendor: Option<String>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a native vendor error code
    Classify {
        /// Native error code as reported by the driver
        #[arg(allow_negative_numbers = true)]
        code: i32,
        /// Driver message to carry along
        #[arg(short, long, default_value = "")]
        message: String,
        /// Statement that failed
        #[arg(short, long)]
        statement: Option<String>,
        /// SQLSTATE, consulted when the code itself is unmapped
        #[arg(long)]
        sql_state: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the effective vendor table
    List {
        /// Only codes in this category
        #[arg(long)]
        category: Option<ErrorCategory>,
        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a vendor table file (JSON or YAML)
    Check { file: PathBuf },
    /// Run a statement against the configured database and classify any failure
    Exec {
        sql: String,
        /// Database URL (overrides config)
        #[arg(long)]
        database: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        vendor: cli.vendor.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    if let Some(path) = &cli.config {
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
    }
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    // Relative log paths resolve next to the config file
    let base_dir = cli
        .config
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, &base_dir);
    tracing::debug!(vendor = %config.classification.vendor, "sqlcodes starting");

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        bail!("No command given; try --help");
    };

    match command {
        Commands::Classify {
            code,
            message,
            statement,
            sql_state,
            json,
        } => {
            let translator = config.translator()?;
            let mut report = FailureReport::new(code, message);
            if let Some(stmt) = statement {
                report = report.with_statement(stmt);
            }
            if let Some(state) = sql_state {
                report = report.with_sql_state(state);
            }
            let err = translator.translate_report(report);
            print_classified(translator.registry(), &err, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { category, json } => {
            let translator = config.translator()?;
            list_table(translator.registry(), category, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { file } => check_table(&file),
        Commands::Exec {
            sql,
            database,
            json,
        } => exec_statement(&config, &sql, database.as_deref(), json).await,
    }
}

#[derive(Serialize)]
struct ClassificationOutput<'a> {
    vendor: &'a str,
    transient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(flatten)]
    error: &'a ClassifiedError,
}

fn print_classified(registry: &ErrorCodeRegistry, err: &ClassifiedError, json: bool) -> Result<()> {
    let description = registry
        .lookup_entry(err.vendor_code())
        .map(|e| e.description.as_ref())
        .filter(|d| !d.is_empty());

    if json {
        let out = ClassificationOutput {
            vendor: registry.vendor(),
            transient: err.is_transient(),
            description,
            error: err,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", err.category());
        println!("{err}");
        if let Some(d) = description {
            println!("{} code {}: {}", registry.vendor(), err.vendor_code(), d);
        }
    }
    Ok(())
}

fn list_table(registry: &ErrorCodeRegistry, category: Option<ErrorCategory>, json: bool) -> Result<()> {
    if json {
        let mut table = registry.to_table();
        if let Some(c) = category {
            table.entries.retain(|e| e.category == c);
        }
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!(
        "# {} {} ({} codes)",
        registry.vendor(),
        registry.version(),
        registry.len()
    );
    for entry in registry
        .entries()
        .into_iter()
        .filter(|e| category.map_or(true, |c| e.category == c))
    {
        if entry.description.is_empty() {
            println!("{}\t{}", entry.code, entry.category);
        } else {
            println!("{}\t{}\t{}", entry.code, entry.category, entry.description);
        }
    }
    Ok(())
}

fn check_table(file: &Path) -> Result<ExitCode> {
    let table = VendorTable::load(file)
        .with_context(|| format!("Invalid vendor table {}", file.display()))?;
    let registry = ErrorCodeRegistry::from_table(&table)
        .with_context(|| format!("Inconsistent vendor table {}", file.display()))?;

    println!(
        "ok: {} table with {} codes ({})",
        registry.vendor(),
        registry.len(),
        ErrorCategory::ALL
            .iter()
            .filter(|c| **c != ErrorCategory::Uncategorized)
            .map(|c| format!("{}={}", c, registry.codes_for(*c).len()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(ExitCode::SUCCESS)
}

async fn exec_statement(
    config: &AppConfig,
    sql: &str,
    database: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let translator: ExceptionTranslator = config.translator()?;
    let db_config = config.database.as_ref();
    let url = database
        .map(str::to_owned)
        .or_else(|| db_config.map(|d| d.url.clone()))
        .context("No database configured; pass --database or set database.url")?;

    let mut opts = ConnectOpts {
        acquire_timeout: Some(Duration::from_secs(5)),
        ..ConnectOpts::default()
    };
    if let Some(db) = db_config {
        if let Some(n) = db.max_conns {
            opts.max_conns = Some(n);
        }
        if let Some(ms) = db.busy_timeout_ms {
            opts.busy_timeout = Some(Duration::from_millis(u64::from(ms)));
        }
    }

    let template = match SqlTemplate::connect_with(&url, opts, translator.clone()).await {
        Ok(t) => t,
        Err(DbError::Classified(err)) => {
            print_classified(translator.registry(), &err, json)?;
            return Ok(ExitCode::from(EXIT_STATEMENT_FAILED));
        }
        Err(e) => return Err(e).context("Failed to open database"),
    };

    tracing::debug!(dsn = template.dsn(), "executing statement");
    let outcome = template.execute(sql).await;
    template.close().await;

    match outcome {
        Ok(rows) => {
            println!("ok: {rows} row(s) affected");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_classified(translator.registry(), &err, json)?;
            Ok(ExitCode::from(EXIT_STATEMENT_FAILED))
        }
    }
}
