//! CLI binary for metasearch.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use futures_util::StreamExt;
use metasearch::{MetasearchConfig, build_context};
use metasearch_core::{DeliveryMode, SafeSearch, SearchResponse, TimeRange};
use tracing_subscriber::EnvFilter;

/// Query many search backends at once and print the combined answer as JSON.
#[derive(Parser)]
#[command(name = "metasearch", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "METASEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Delivery mode: normal, stream or merged.
    #[arg(short, long)]
    mode: Option<String>,

    /// Category whose backends are queried when none are named.
    #[arg(long)]
    category: Option<String>,

    /// Backend to query (repeatable).
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Extension to run (repeatable).
    #[arg(short, long = "extension")]
    extensions: Vec<String>,

    /// Maximum results per backend (0 for unlimited).
    #[arg(short, long)]
    limit: Option<usize>,

    /// Result page, starting at 1.
    #[arg(short, long)]
    page: Option<u32>,

    /// Safe search level 0 to 2.
    #[arg(long)]
    safesearch: Option<u8>,

    /// Time range: day, week, month, year or none.
    #[arg(long)]
    time_range: Option<String>,

    /// Print the discovery report and exit.
    #[arg(long)]
    list: bool,

    /// Search query.
    #[arg(required_unless_present = "list")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(MetasearchConfig::default_config_path);
    let from_file = cli.config.is_some() || path.exists();
    let config = if from_file {
        MetasearchConfig::load_from_file(&path)?
    } else {
        MetasearchConfig::default()
    };

    // stdout carries JSON only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging_level.as_str())),
        )
        .init();

    if from_file {
        tracing::info!(path = %path.display(), "loaded configuration");
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
    }

    let (ctx, report) = build_context(&config)?;
    if cli.list {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut request = config.default_request(cli.query.join(" "))?;
    if let Some(mode) = &cli.mode {
        request.mode = mode.parse::<DeliveryMode>()?;
    }
    if let Some(category) = cli.category {
        request.category = Some(category);
    }
    if !cli.backends.is_empty() {
        request.backends = cli.backends;
    }
    if !cli.extensions.is_empty() {
        request.extensions = Some(cli.extensions);
    }
    if let Some(limit) = cli.limit {
        request.params.result_limit = (limit > 0).then_some(limit);
    }
    if let Some(page) = cli.page {
        request.params.page = page;
    }
    if let Some(level) = cli.safesearch {
        request.params.safesearch = SafeSearch::try_from(level)?;
    }
    if let Some(range) = &cli.time_range {
        request.params.time_range = TimeRange::parse_optional(range)?;
    }

    tracing::debug!(mode = %request.mode, "dispatching search");
    match metasearch_core::run(&ctx, request).await? {
        SearchResponse::Batch(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        SearchResponse::Merged(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        SearchResponse::Stream(mut events) => {
            let mut stdout = std::io::stdout().lock();
            while let Some(event) = events.next().await {
                serde_json::to_writer(&mut stdout, &event)?;
                writeln!(stdout)?;
                stdout.flush()?;
            }
        }
    }

    Ok(())
}
