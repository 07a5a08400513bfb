mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use foodinspect_core::{InspectionId, PipelineConfig};
use foodinspect_extract::{Provenance, extract_document};
use foodinspect_fetch::{DEFAULT_ENDPOINT, Fetcher, HttpOptions, HttpTransport};
use foodinspect_pipeline::{CandidateFeed, Pipeline, read_id_column};
use foodinspect_store::{FsDocumentCache, TableFormat, TableStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "foodinspect")]
#[command(version, about = "Scrape food establishment inspection reports into tabular exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, extract, and merge every candidate identifier
    Run(RunArgs),

    /// Extract one cached report and print the record
    Extract {
        /// Cached report file
        file: PathBuf,

        /// Inspection identifier; defaults to the file's parent directory name
        #[arg(long)]
        id: Option<u64>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Directory holding the exports and the liveness ledger
    #[arg(long, env = "FOODINSPECT_OUT")]
    out: PathBuf,

    /// Document cache root
    #[arg(long, env = "FOODINSPECT_CACHE")]
    cache: PathBuf,

    /// Read-only cache root consulted after the primary one
    #[arg(long, env = "FOODINSPECT_FALLBACK_CACHE")]
    fallback_cache: Option<PathBuf>,

    /// CSV of identifiers from the portal listing (`inspection_id` column)
    #[arg(long)]
    links: Option<PathBuf>,

    /// CSV of identifiers confirmed valid elsewhere
    #[arg(long)]
    known_valid: Option<PathBuf>,

    /// Also enumerate every identifier from 1 through this value
    #[arg(long)]
    through: Option<u64>,

    /// Explicit identifiers, comma separated
    #[arg(long, value_delimiter = ',')]
    ids: Vec<u64>,

    /// Re-resolve identifiers already recorded dead
    #[arg(long)]
    retry_dead: bool,

    #[arg(long, value_enum, default_value_t = ExportFormat::Csv, env = "FOODINSPECT_FORMAT")]
    format: ExportFormat,

    /// Skip TLS certificate validation
    #[arg(long, env = "FOODINSPECT_INSECURE")]
    insecure: bool,

    /// Report URL template; `{id}` is replaced by the identifier
    #[arg(long, default_value = DEFAULT_ENDPOINT, env = "FOODINSPECT_ENDPOINT")]
    endpoint: String,

    #[arg(long, default_value_t = 40, env = "FOODINSPECT_FETCH_CONCURRENCY")]
    fetch_concurrency: usize,

    #[arg(long, default_value_t = 7, env = "FOODINSPECT_EXTRACT_CONCURRENCY")]
    extract_concurrency: usize,

    #[arg(long, default_value_t = 2000, env = "FOODINSPECT_CHUNK_SIZE")]
    chunk_size: usize,

    #[arg(long, default_value_t = 30, env = "FOODINSPECT_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Parquet,
}

impl From<ExportFormat> for TableFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Csv => TableFormat::Csv,
            ExportFormat::Parquet => TableFormat::Parquet,
        }
    }
}

impl RunArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            fetch_concurrency: self.fetch_concurrency,
            extract_concurrency: self.extract_concurrency,
            chunk_size: self.chunk_size,
            request_timeout: Duration::from_secs(self.timeout_secs),
            retry_dead: self.retry_dead,
        }
    }

    fn feed(&self) -> anyhow::Result<CandidateFeed> {
        let explicit = self
            .ids
            .iter()
            .map(|&n| InspectionId::new(n).with_context(|| format!("invalid identifier {n}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut feed = CandidateFeed::new().with_ids(explicit);
        if let Some(path) = &self.links {
            feed = feed.with_listed(read_id_column(path)?);
        }
        if let Some(path) = &self.known_valid {
            feed = feed.with_confirmed(read_id_column(path)?);
        }
        if let Some(max) = self.through {
            feed = feed.through(max);
        }
        Ok(feed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Extract { file, id } => extract_file(&file, id),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    tracing::info!("foodinspect v{}", env!("CARGO_PKG_VERSION"));
    let config = args.config();
    let feed = args.feed()?;

    let mut cache = FsDocumentCache::open(&args.cache)
        .with_context(|| format!("failed to open cache {}", args.cache.display()))?;
    if let Some(fallback) = &args.fallback_cache {
        cache = cache.with_fallback(fallback);
    }
    let transport = HttpTransport::new(HttpOptions {
        endpoint: args.endpoint.clone(),
        timeout: config.request_timeout,
        accept_invalid_certs: args.insecure,
        ..HttpOptions::default()
    })
    .context("failed to build HTTP transport")?;
    let fetcher = Fetcher::new(transport, Arc::new(cache), config.request_timeout);
    let store = TableStore::open(&args.out, args.format.into())
        .with_context(|| format!("failed to open output directory {}", args.out.display()))?;

    let report = Pipeline::new(fetcher, store, config)
        .run(&feed)
        .await
        .context("run aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display::print_run_report(&report);
    }
    Ok(())
}

fn extract_file(file: &Path, id: Option<u64>) -> anyhow::Result<()> {
    let raw = match id {
        Some(n) => n,
        None => id_from_cache_path(file).with_context(|| {
            format!("cannot infer an identifier from {}; pass --id", file.display())
        })?,
    };
    let id = InspectionId::new(raw).with_context(|| format!("invalid identifier {raw}"))?;
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let record = match extract_document(&bytes, id, &Provenance::default()) {
        Ok(record) => record,
        Err(e) => bail!("{id} rejected ({}): {e}", e.reason()),
    };
    display::print_inspection(&record)
}

/// The cache stores each report as `<root>/<id>/inspection.html`.
fn id_from_cache_path(file: &Path) -> Option<u64> {
    file.parent()?.file_name()?.to_str()?.parse().ok()
}
