use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harvester::client::ApiClient;
use harvester::config::{
    self, Config, Credentials, Endpoints, RetryPolicy, DEFAULT_BACKOFF_UNIT_SECS,
    PARTICIPANT_COLUMNS,
};
use harvester::enrich::Enricher;
use harvester::exhibitors::DirectoryScraper;
use harvester::fetch::ParticipantFetcher;
use harvester::models::{updated_columns, ParticipantRecord};
use harvester::page::{ExhibitorEntryParser, FlatRecord, PageParser, PartnerPageParser};
use harvester::sink::{read_rows, TabularSink, WriteMode};
use harvester::stats::RunStats;
use harvester::transport::HttpTransport;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Scrape event participants and exhibitors into CSV")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every participant page and write the participant CSV
    Fetch(FetchArgs),
    /// Enrich an existing participant CSV with per-participant details
    Update(UpdateArgs),
    /// Scrape an HTML exhibitor directory
    Exhibitors(ExhibitorsArgs),
    /// Scrape partner pages listed in a CSV column
    Partners(PartnersArgs),
}

/// Request behaviour shared by every subcommand
#[derive(Args)]
struct NetArgs {
    /// Attach the PHPSESSID/token session cookie to API requests
    #[arg(long)]
    auth: bool,

    #[arg(long, env = "PHPSESSID", hide_env_values = true)]
    phpsessid: Option<String>,

    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Attempts per request before it is skipped
    #[arg(long, default_value_t = config::DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Backoff unit in seconds (waits are unit * 2^attempt)
    #[arg(long, default_value_t = DEFAULT_BACKOFF_UNIT_SECS)]
    backoff_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl NetArgs {
    fn apply(&self, config: &mut Config) {
        config.auth = self.auth;
        config.credentials = match (&self.phpsessid, &self.token) {
            (Some(session_id), Some(token)) => Some(Credentials {
                session_id: session_id.clone(),
                token: token.clone(),
            }),
            _ => None,
        };
        config.retry = RetryPolicy {
            max_retries: self.max_retries,
            unit: Duration::from_secs(self.backoff_secs),
        };
        config.request_timeout = self.timeout_secs.map(Duration::from_secs);
    }
}

#[derive(Args)]
struct FetchArgs {
    /// Paginated participant API endpoint
    #[arg(long, env = "BASE_URL")]
    base_url: String,

    /// Prefix for participant profile URLs
    #[arg(long, env = "PARTICIPANT_BASE_URL", default_value = "")]
    participant_base_url: String,

    #[arg(short, long, default_value = config::DEFAULT_PARTICIPANTS_FILE)]
    output: PathBuf,

    #[arg(long, default_value_t = config::DEFAULT_TOTAL_PAGES)]
    total_pages: u32,

    /// Participants per page
    #[arg(long, default_value_t = config::DEFAULT_PAGE_LIMIT)]
    limit: u32,

    /// Pages fetched concurrently per round
    #[arg(long, default_value_t = config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Truncate the output instead of appending to it
    #[arg(long)]
    fresh: bool,

    #[command(flatten)]
    net: NetArgs,
}

#[derive(Args)]
struct UpdateArgs {
    /// Participant CSV produced by `fetch`
    #[arg(short, long, default_value = config::DEFAULT_PARTICIPANTS_FILE)]
    input: PathBuf,

    #[arg(short, long, default_value = config::DEFAULT_UPDATED_FILE)]
    output: PathBuf,

    #[arg(long, env = "INFO_URL")]
    info_url: String,

    #[arg(long, env = "INTERESTS_URL")]
    interests_url: String,

    #[arg(long, env = "ACTIVITIES_URL")]
    activities_url: String,

    /// Records enriched at once (unbounded when omitted)
    #[arg(long)]
    enrich_concurrency: Option<usize>,

    #[command(flatten)]
    net: NetArgs,
}

#[derive(Args)]
struct ExhibitorsArgs {
    /// Directory listing page
    #[arg(long)]
    listing_url: String,

    /// Site root that entry links are resolved against
    #[arg(long)]
    site_url: String,

    #[arg(short, long, default_value = config::DEFAULT_EXHIBITORS_FILE)]
    output: PathBuf,

    /// Entry pages fetched concurrently per round
    #[arg(long, default_value_t = config::DEFAULT_PAGE_CONCURRENCY)]
    concurrency: usize,

    #[command(flatten)]
    net: NetArgs,
}

#[derive(Args)]
struct PartnersArgs {
    /// CSV listing partner page URLs
    #[arg(short, long)]
    input: PathBuf,

    /// Column holding the page URLs
    #[arg(long, default_value = "Company Event URL")]
    column: String,

    /// Rebuild each URL from its last path segment under this base
    #[arg(long)]
    partner_base_url: Option<String>,

    #[arg(short, long, default_value = config::DEFAULT_PARTNERS_FILE)]
    output: PathBuf,

    #[arg(long, default_value_t = config::DEFAULT_PAGE_CONCURRENCY)]
    concurrency: usize,

    #[command(flatten)]
    net: NetArgs,
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("harvester-worker")
        .enable_io()
        .enable_time()
        .build()
        .context("Failed to start async runtime")
}

fn client(config: Config, stats: &Arc<RunStats>) -> Result<ApiClient<HttpTransport>> {
    config.validate()?;
    let transport = HttpTransport::new(config.request_timeout)?;
    Ok(ApiClient::new(transport, Arc::new(config), Arc::clone(stats)))
}

fn run_fetch(args: FetchArgs, stats: &Arc<RunStats>) -> Result<()> {
    let mut config = Config {
        endpoints: Endpoints {
            pages: args.base_url,
            ..Endpoints::default()
        },
        participant_base_url: args.participant_base_url,
        total_pages: args.total_pages,
        page_limit: args.limit,
        chunk_size: args.chunk_size,
        ..Config::default()
    };
    args.net.apply(&mut config);
    let client = client(config, stats)?;

    let participants = runtime()?.block_on(ParticipantFetcher::new(&client).fetch_all());

    let mut sink = TabularSink::new(&PARTICIPANT_COLUMNS);
    sink.extend(&participants);
    let mode = if args.fresh {
        WriteMode::Fresh
    } else {
        WriteMode::Append
    };
    sink.write(&args.output, mode)?;
    Ok(())
}

fn run_update(args: UpdateArgs, stats: &Arc<RunStats>) -> Result<()> {
    let mut config = Config {
        endpoints: Endpoints {
            info: args.info_url,
            interests: args.interests_url,
            activities: args.activities_url,
            ..Endpoints::default()
        },
        enrich_concurrency: args.enrich_concurrency,
        ..Config::default()
    };
    args.net.apply(&mut config);
    let client = client(config, stats)?;

    let (headers, rows) = read_rows(&args.input)?;
    let records: Vec<ParticipantRecord> = rows.iter().map(ParticipantRecord::from_row).collect();
    let unidentified = records.iter().filter(|r| !r.has_identifier()).count();
    if unidentified > 0 {
        warn!(
            rows = unidentified,
            "Rows without a Delegate ID are written back unenriched"
        );
    }
    info!(records = records.len(), input = %args.input.display(), "Loaded participants");

    let enricher = Enricher::with_default_sources(&client)?;
    let enriched = runtime()?.block_on(enricher.enrich_all(records));

    let mut sink = TabularSink::new(&updated_columns(&headers));
    sink.extend(&enriched);
    sink.write(&args.output, WriteMode::Fresh)?;
    Ok(())
}

fn write_pages(
    records: &[FlatRecord],
    parser: &dyn PageParser,
    output: &Path,
) -> Result<()> {
    let mut sink = TabularSink::new(parser.columns());
    sink.extend(records);
    sink.write(output, WriteMode::Fresh)
}

fn run_exhibitors(args: ExhibitorsArgs, stats: &Arc<RunStats>) -> Result<()> {
    let mut config = Config::default();
    args.net.apply(&mut config);
    let client = client(config, stats)?;
    let scraper = DirectoryScraper::new(&client, args.concurrency);
    let parser = ExhibitorEntryParser;

    let records =
        runtime()?.block_on(scraper.scrape(&args.listing_url, &args.site_url, &parser))?;
    write_pages(&records, &parser, &args.output)
}

fn run_partners(args: PartnersArgs, stats: &Arc<RunStats>) -> Result<()> {
    let mut config = Config::default();
    args.net.apply(&mut config);
    let client = client(config, stats)?;
    let scraper = DirectoryScraper::new(&client, args.concurrency);
    let parser = PartnerPageParser;

    let records = runtime()?.block_on(scraper.scrape_urls(
        &args.input,
        &args.column,
        args.partner_base_url.as_deref(),
        &parser,
    ))?;
    write_pages(&records, &parser, &args.output)
}

fn print_summary(stats: &RunStats, elapsed: Duration) {
    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", elapsed.as_secs_f64());
    println!();
    println!("Pages fetched:      {}", stats.pages());
    println!("Pages skipped:      {}", stats.skipped_pages());
    println!("Records extracted:  {}", stats.records());
    println!("Records enriched:   {}", stats.enriched());
    println!("Entries parsed:     {}", stats.entries());
    println!("Retries:            {}", stats.retry_count());
    println!("Requests skipped:   {}", stats.skipped_requests());
}

fn main() -> ExitCode {
    // Endpoints and credentials may live in a .env file next to the outputs
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable environment file"),
    }

    let stats = Arc::new(RunStats::new());
    let start = Instant::now();
    let result = match cli.command {
        Commands::Fetch(args) => run_fetch(args, &stats),
        Commands::Update(args) => run_update(args, &stats),
        Commands::Exhibitors(args) => run_exhibitors(args, &stats),
        Commands::Partners(args) => run_partners(args, &stats),
    };

    match result {
        Ok(()) => {
            print_summary(&stats, start.elapsed());
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
