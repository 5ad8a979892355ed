use std::{
    fs::File,
    io::{IsTerminal, Read},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use flow_ingest::{
    AddressPolicy, DEFAULT_BATCH_SIZE, DEFAULT_HOST, DEFAULT_WORKERS, Error, ListStore,
    MaxMindLookup, Pipeline, PipelineConfig, RedisStore, setup_logging,
};
use tracing::info;

/// Pushes nfdump pipe exports into a Redis list as JSON documents.
#[derive(Parser, Debug)]
#[command(name = "flow-ingest", version, about)]
struct Cli {
    /// Name of the Redis list the documents are appended to
    list_key: String,

    /// nfdump export in pipe format, `-` reads from standard input
    input: String,

    /// Redis server as host:port
    #[arg(long, default_value = "127.0.0.1:6379")]
    redis_server: String,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    /// Number of pipelined writes per flush
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = positive)]
    batch_size: usize,

    /// Number of parallel workers, each with its own Redis connection
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, value_parser = positive)]
    workers: usize,

    /// Host label written into every document
    #[arg(long, default_value = DEFAULT_HOST)]
    hostname: String,

    /// Do not enrich addresses with geographic data
    #[arg(long)]
    no_geo: bool,

    /// MaxMind database used for geographic enrichment
    #[arg(long, default_value = "data/GeoLite2-Country.mmdb")]
    geo_db: PathBuf,

    /// Keep records with undecodable addresses, leaving the address empty
    #[arg(long)]
    lenient_addresses: bool,

    /// Delete the list before importing
    #[arg(long)]
    flush: bool,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let input = open_input(&cli.input)
        .with_context(|| format!("Error encountered while reading input {:?}", cli.input))?;

    let mut pipeline = Pipeline::new(config(&cli))?;
    if !cli.no_geo {
        let lookup = MaxMindLookup::open(&cli.geo_db)
            .with_context(|| format!("cannot open geographic database {}", cli.geo_db.display()))?;
        info!("Using geographic database: {}", lookup.describe());
        pipeline = pipeline.with_enricher(Arc::new(lookup));
    }

    let store = RedisStore::open(&cli.redis_server, cli.redis_password.as_deref())?;
    store
        .ping()
        .with_context(|| format!("cannot reach Redis at {}", cli.redis_server))?;

    if cli.flush {
        store
            .clear(&cli.list_key)
            .with_context(|| format!("Key {:?} could not be deleted", cli.list_key))?;
        info!("Key {:?} has been deleted.", cli.list_key);
    }

    let summary = pipeline.run(input, &store, handle_line_error)?;
    info!(
        "Done! {} entries appended, {} lost, {} errors.",
        summary.appended, summary.lost, summary.failed
    );

    let count = store.len(&cli.list_key).context("LLEN failed")?;
    info!("List {:?} has now {count} entries!", cli.list_key);
    Ok(())
}

fn positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn config(cli: &Cli) -> PipelineConfig {
    let address_policy = if cli.lenient_addresses {
        AddressPolicy::Lenient
    } else {
        AddressPolicy::Strict
    };
    PipelineConfig::new(&cli.list_key)
        .with_host(&cli.hostname)
        .with_batch_size(cli.batch_size)
        .with_workers(cli.workers)
        .with_address_policy(address_policy)
}

fn open_input(input: &str) -> Result<Box<dyn Read + Send>> {
    if input == "-" {
        let stdin = std::io::stdin();
        // we want a pipe or a file, not somebody typing
        if stdin.is_terminal() {
            bail!("stdin must be a pipe or a file");
        }
        return Ok(Box::new(stdin));
    }
    Ok(Box::new(File::open(input)?))
}

// Skipped lines are only logged, the import goes on
fn handle_line_error(error: Error) {
    tracing::warn!("Error processing entry: {error}")
}
