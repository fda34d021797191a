mod display;
mod export;
mod input;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use precatorio_store::DuckStore;
use precatorio_sync::http::DEFAULT_BASE_URL;
use precatorio_sync::{ApiClient, ApiConfig, DEFAULT_BATCH_SIZE, IngestConfig, Ingestor, plan, unresolved};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "precatorio", version, about = "Precatório ingestion and reporting")]
struct Cli {
    /// DuckDB database file.
    #[arg(long, global = true, env = "PRECATORIO_DB", default_value = "precatorios.duckdb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the cases listed in a spreadsheet and store the new ones
    Ingest {
        /// CSV or Excel file with a `numero` column
        file: PathBuf,

        #[command(flatten)]
        api: ApiArgs,

        /// Case numbers per chunk
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Concurrent fetches per chunk (defaults to the batch size)
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
    /// Attach precatório details from a spreadsheet to stored cases
    Details {
        /// CSV or Excel file with `numero` plus details columns
        file: PathBuf,
    },
    /// Write tribunal exports as CSV files
    Export {
        kind: ExportKind,

        /// Tribunal sigla, e.g. TJSP
        sigla: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Drop repeated rows (by raw `numero`) from a spreadsheet
    Dedupe {
        input: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
    /// Show a stored case with its sources and parties
    Show {
        /// Case number in CNJ format
        numero: String,
    },
    /// Row counts for every table
    Stats,
}

#[derive(Args)]
struct ApiArgs {
    /// Escavador API token
    #[arg(long, env = "ESCAVADOR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Case endpoint base URL
    #[arg(long, env = "ESCAVADOR_API_BASE", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    /// Callix creditor list (credores + advogados)
    Creditors,
    /// Claimants and their attorneys (requerentes + advogados)
    Parties,
    /// Precatório report with the imported details (credores + advogados)
    Precatorios,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest {
            file,
            api,
            batch_size,
            max_concurrency,
        } => {
            cmd_ingest(
                &cli.db,
                &file,
                api,
                IngestConfig {
                    batch_size,
                    max_concurrency,
                },
            )
            .await
        }
        Command::Details { file } => cmd_details(&cli.db, &file),
        Command::Export { kind, sigla, out } => cmd_export(&cli.db, kind, &sigla, &out),
        Command::Dedupe { input, out } => cmd_dedupe(&input, &out),
        Command::Show { numero } => cmd_show(&cli.db, &numero),
        Command::Stats => cmd_stats(&cli.db),
    }
}

fn open_store(db: &Path) -> anyhow::Result<DuckStore> {
    DuckStore::open_persistent(db).with_context(|| format!("opening {}", db.display()))
}

async fn cmd_ingest(db: &Path, file: &Path, api: ApiArgs, config: IngestConfig) -> anyhow::Result<()> {
    let api_config = ApiConfig::new(api.api_key, api.base_url)
        .context("configuring the Escavador client")?
        .with_timeout(Duration::from_secs(api.timeout_secs));
    let raw = input::read_numbers(file)?;
    let store = open_store(db)?;

    let planned = plan(&store, &raw)?;
    if planned.pending.is_empty() {
        println!(
            "no new precatórios; {} already stored",
            planned.already_stored.len()
        );
        return Ok(());
    }
    println!(
        "{} to fetch, {} already stored",
        planned.pending.len(),
        planned.already_stored.len()
    );

    let client = ApiClient::new(api_config);
    let summary = Ingestor::new(&client, &store, config).run(&planned.pending).await;

    println!(
        "persisted {} of {} in {} chunk(s); {} stored meanwhile",
        summary.persisted, summary.requested, summary.chunks, summary.already_stored
    );
    let failed = unresolved(&summary);
    if !failed.is_empty() {
        println!("{} number(s) not stored:", failed.len());
        for numero in &failed {
            println!("  {numero}");
        }
    }
    Ok(())
}

fn cmd_details(db: &Path, file: &Path) -> anyhow::Result<()> {
    let rows = input::read_details(file)?;
    let store = open_store(db)?;
    let report = store.import_details(&rows)?;
    println!(
        "inserted {} details row(s); {} without a stored case, {} already present",
        report.inserted,
        report.missing.len(),
        report.duplicate.len()
    );
    Ok(())
}

fn cmd_export(db: &Path, kind: ExportKind, sigla: &str, out: &Path) -> anyhow::Result<()> {
    let store = open_store(db)?;
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let now = chrono::Local::now();
    let paths = match kind {
        ExportKind::Creditors => {
            export::export_creditors(&store, sigla, out, &now.format("%Y%m%d%H%M%S").to_string())?
        }
        ExportKind::Parties => {
            export::export_parties(&store, sigla, out, &now.format("%Y%m%d_%H%M%S").to_string())?
        }
        ExportKind::Precatorios => {
            export::export_precatorios(&store, sigla, out, &now.format("%Y%m%d%H%M%S").to_string())?
        }
    };
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_dedupe(file: &Path, out: &Path) -> anyhow::Result<()> {
    let (read, written) = input::dedupe(file, out)?;
    println!(
        "{written} of {read} row(s) kept, written to {}",
        out.display()
    );
    Ok(())
}

fn cmd_show(db: &Path, numero: &str) -> anyhow::Result<()> {
    let store = open_store(db)?;
    let numero = precatorio_core::format_cnj(numero);
    let overview = store
        .case_overview(&numero)
        .with_context(|| format!("case {numero} not found"))?;
    display::print_case(&overview)
}

fn cmd_stats(db: &Path) -> anyhow::Result<()> {
    let store = open_store(db)?;
    println!("{}", db.display());
    display::print_counts(&store.table_counts()?);
    Ok(())
}
