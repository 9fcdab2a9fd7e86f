//! ora-pg-sync CLI - table copy and sequence sync between Oracle and PostgreSQL.

mod console;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ora_pg_sync::config::{parse_replace_query, parse_table_list};
use ora_pg_sync::{
    Config, DestinationStore, Direction, LoadMode, OracleStore, Orchestrator, PgStore, SourceStore,
    SyncError,
};
use tracing::info;

use console::{ConsoleProgress, PromptConfirmation};

#[derive(Parser)]
#[command(name = "ora-pg-sync")]
#[command(about = "Copy tables and sync sequences between Oracle and PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log file, rotated to a timestamped name before each run
    #[arg(long, default_value = "ora-pg-sync.log")]
    log_file: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    #[command(flatten)]
    tables: TableArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Worklist overrides shared by every command.
#[derive(Args, Default)]
struct TableArgs {
    /// Comma separated tables to process
    #[arg(short = 'l', long, global = true)]
    table_list: Option<String>,

    /// Comma separated tables to leave out of the source catalog
    #[arg(short = 'x', long, global = true)]
    exclude_list: Option<String>,

    /// Per-table query override, as TABLE[query] (repeatable)
    #[arg(long, global = true)]
    replace_query: Vec<String>,
}

#[derive(Args, Default)]
struct CopyArgs {
    /// Column to load as binary (repeatable)
    #[arg(long = "binary-col")]
    binary_col: Vec<String>,

    /// Rows per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Load through COPY instead of bound inserts
    #[arg(long)]
    use_copy: bool,

    /// Escape worker threads for COPY mode
    #[arg(long)]
    processes: Option<usize>,

    /// Truncate destination tables before copying
    #[arg(short = 'z', long)]
    truncate_tables: bool,

    /// Disable destination triggers during the copy
    #[arg(short = 't', long)]
    disable_triggers: bool,

    /// Disable destination foreign keys during the copy
    #[arg(long)]
    disable_foreign_keys: bool,

    /// Don't ask for confirmation, just do
    #[arg(long)]
    force: bool,

    /// Don't count rows before copying
    #[arg(long)]
    skip_count: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy table rows from the source to the destination
    Copy(CopyArgs),

    /// Move destination sequences forward to the source values and exit
    SeqFix,

    /// Drop destination foreign keys of the listed tables and exit
    FkDrop,

    /// Compare source and destination row counts
    Cmp,

    /// Compare the table list with the source catalog
    CmpTabList,

    /// Test database connections
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

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    logging::setup(&cli.log_file, &cli.verbosity, &cli.log_format)?;
    info!("{}", std::env::args().collect::<Vec<_>>().join(" "));

    let mut config = Config::load(&cli.config)?;
    apply_overrides(&mut config, &cli.tables, &cli.command)?;
    info!("Loaded configuration from {:?}", cli.config);

    match config.direction {
        Direction::OraToPg => {
            let source = OracleStore::connect(&config.oracle).await?;
            let destination = PgStore::connect(&config.postgres).await?;
            execute(Orchestrator::new(config, source, destination)?, &cli).await
        }
        Direction::PgToOra => {
            let source = PgStore::connect(&config.postgres).await?;
            let destination = OracleStore::connect(&config.oracle).await?;
            execute(Orchestrator::new(config, source, destination)?, &cli).await
        }
    }
}

/// Fold command line flags into the file configuration and re-validate.
fn apply_overrides(config: &mut Config, tables: &TableArgs, command: &Commands) -> Result<(), SyncError> {
    let copy = &mut config.copy;
    if let Some(list) = &tables.table_list {
        copy.tables = parse_table_list(list);
        copy.exclude_tables.clear();
    }
    if let Some(list) = &tables.exclude_list {
        copy.exclude_tables = parse_table_list(list);
        copy.tables.clear();
    }
    if !tables.replace_query.is_empty() {
        copy.replace_query.extend(parse_replace_query(&tables.replace_query)?);
    }

    if let Commands::Copy(args) = command {
        copy.binary_columns.extend(args.binary_col.iter().cloned());
        if let Some(n) = args.batch_size {
            copy.batch_size = n;
        }
        if args.use_copy {
            copy.load_mode = LoadMode::Copy;
        }
        if let Some(n) = args.processes {
            copy.workers = n;
        }
        copy.truncate |= args.truncate_tables;
        copy.disable_triggers |= args.disable_triggers;
        copy.disable_foreign_keys |= args.disable_foreign_keys;
        copy.force |= args.force;
        copy.skip_count |= args.skip_count;
    }

    copy.normalize();
    config.validate()
}

async fn execute<S, D>(orchestrator: Orchestrator<S, D>, cli: &Cli) -> Result<(), SyncError>
where
    S: SourceStore,
    D: DestinationStore,
{
    match &cli.command {
        Commands::Copy(_) => {
            let progress = ConsoleProgress::default();
            let result = orchestrator.copy(&progress, &PromptConfirmation).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nCopy completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables: {}", result.tables.len());
                println!("  Rows processed: {}", result.rows_attempted);
                println!("  Rows loaded: {}", result.rows_loaded);
                println!("  Rows rejected: {}", result.rows_failed);
                if !result.skipped_tables.is_empty() {
                    println!("  Skipped tables: {:?}", result.skipped_tables);
                }
            }
        }

        Commands::SeqFix => {
            let adjusted = orchestrator.reconcile_sequences().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&adjusted)?);
            } else {
                for seq in &adjusted {
                    println!(
                        "{}: {} -> {}",
                        seq.name,
                        seq.destination_last,
                        seq.source_last + 1
                    );
                }
                println!("{} sequences adjusted", adjusted.len());
            }
        }

        Commands::FkDrop => {
            let dropped = orchestrator.drop_foreign_keys().await?;
            for (table, constraint) in &dropped {
                println!("{}: dropped {}", table, constraint);
            }
            println!("{} foreign keys dropped", dropped.len());
        }

        Commands::Cmp => {
            let counts = orchestrator.compare_counts().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                println!("{}", "*".repeat(40));
                for cmp in counts.iter().filter(|c| !c.matches()) {
                    println!("{}", cmp);
                }
                println!("cmp done.");
            }
        }

        Commands::CmpTabList => {
            let cmp = orchestrator.compare_table_list().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&cmp)?);
            } else {
                for table in &cmp.extra {
                    println!("extra: {}", table);
                }
                println!("not in list: {}", cmp.not_listed.join(" "));
            }
        }

        Commands::HealthCheck => {
            let result = orchestrator.health_check().await;
            let direction = orchestrator.config().direction;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    direction.source(),
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Destination ({}): {} ({}ms)",
                    direction.destination(),
                    if result.destination_connected { "OK" } else { "FAILED" },
                    result.destination_latency_ms
                );
                if let Some(ref err) = result.destination_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(SyncError::connection("store", "Health check failed"));
            }
        }
    }

    Ok(())
}
