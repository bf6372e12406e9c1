//! barcode-store CLI - bulk TSV import into MySQL and the barcode lookup API.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use barcode_store::{
    table_summaries, Config, ImportOptions, ImportResult, Importer, LookupStore, MemoryStore,
    MysqlStore, StoreError,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "barcode-store")]
#[command(about = "Bulk TSV import into MySQL and barcode lookup API")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a tab-delimited file into a new table
    Import {
        /// Override the input file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Override the target table
        #[arg(long)]
        table: Option<String>,

        /// Override rows per committed batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Dry run: parse and count against an in-memory store without touching MySQL
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the lookup API until Ctrl-C
    Serve {
        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List tables in the database with their row counts
    Tables,

    /// Drop a table so it can be imported again
    DropTable {
        /// Table to drop
        name: String,
    },

    /// Look up a single value by key
    Lookup {
        table: String,
        key_column: String,
        value_column: String,
        key: String,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), StoreError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(StoreError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Import {
            file,
            table,
            batch_size,
            dry_run,
        } => {
            let import = config.import.as_mut().ok_or_else(|| {
                StoreError::Config("configuration has no 'import' section".to_string())
            })?;

            // Apply overrides
            if let Some(f) = file {
                import.file = Some(f);
            }
            if let Some(t) = table {
                import.table = t;
            }
            if let Some(b) = batch_size {
                import.batch_size = b;
            }

            let path = import.file.clone().ok_or_else(|| {
                StoreError::Config("no input file: set import.file or pass --file".to_string())
            })?;
            let options = ImportOptions::from_config(import)?;

            // Fail before connecting when there is nothing to read
            if !path.exists() {
                return Err(StoreError::InputNotFound(path));
            }

            let result = if dry_run {
                let mut store = MemoryStore::new();
                Importer::new(&mut store, options).run_file(&path).await?
            } else {
                let store = MysqlStore::connect(&config.database).await?;
                let mut session = store.session().await?;
                let outcome = Importer::new(&mut session, options).run_file(&path).await;
                if let Err(e) = session.close().await {
                    warn!("Failed to close import session: {}", e);
                }
                if let Err(e) = store.disconnect().await {
                    warn!("Failed to disconnect: {}", e);
                }
                outcome?
            };

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_import_summary(&result, dry_run);
            }
        }

        Commands::Serve { host, port } => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            let store = MysqlStore::connect(&config.database).await?;
            barcode_store::server::serve(Arc::new(store), config.server).await?;
        }

        Commands::Tables => {
            let store = MysqlStore::connect(&config.database).await?;
            let tables = table_summaries(&store).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                println!("Tables in {}:", config.database.database);
                for summary in &tables {
                    println!("  {} ({} rows)", summary.table, summary.rows);
                }
            }
        }

        Commands::DropTable { name } => {
            let store = MysqlStore::connect(&config.database).await?;
            store.drop_table(&name).await?;
            println!("Dropped table '{}'", name);
        }

        Commands::Lookup {
            table,
            key_column,
            value_column,
            key,
        } => {
            let store = MysqlStore::connect(&config.database).await?;
            let value = store
                .lookup(&table, &value_column, &key_column, &key)
                .await?
                .ok_or_else(|| {
                    StoreError::NotFound(format!("{} = '{}' in {}", key_column, key, table))
                })?;

            if cli.output_json {
                let body = serde_json::json!({
                    "table": table,
                    "key": key,
                    value_column: value,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", value);
            }
        }

        Commands::HealthCheck => {
            let started = Instant::now();
            let store = MysqlStore::connect(&config.database).await?;
            let version = store.health_check().await?;
            let latency_ms = started.elapsed().as_millis() as u64;

            if cli.output_json {
                let body = serde_json::json!({
                    "healthy": true,
                    "server": config.database.display_url(),
                    "version": version,
                    "latency_ms": latency_ms,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  MySQL {}: OK ({}ms, server {})",
                    config.database.display_url(),
                    latency_ms,
                    version
                );
            }
        }
    }

    Ok(())
}

fn print_import_summary(result: &ImportResult, dry_run: bool) {
    let status_msg = if dry_run {
        "Dry run completed!"
    } else {
        "Import completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Table: {}", result.table);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Rows accepted: {}", result.rows_accepted);
    println!("  Rows skipped: {}", result.rows_skipped);
    println!("  Duplicates ignored: {}", result.duplicates_ignored());
    println!("  Values truncated: {}", result.fields_truncated);
    println!("  Batches: {}", result.batches_flushed);
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json leaves stdout clean
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().try_init().map_err(|e| e.to_string())
    } else {
        subscriber.try_init().map_err(|e| e.to_string())
    }
}
