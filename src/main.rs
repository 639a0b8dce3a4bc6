mod config;
mod error;
mod geo;
mod models;
mod pipeline;
mod regions;
mod scrapers;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use config::Config;
use error::ScoutError;
use geo::{GeoEnricher, GoogleGeocoder};
use models::{ListingKind, UrlVariant};
use pipeline::{FlushMode, Pipeline, PipelineOptions};
use regions::DistrictResolver;
use scrapers::{
    ChromePageSource, HttpPageSource, PageExtractor, PageRange, PageSource, PostingSelectors, RenderTiming,
    ScrapeTarget,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use store::{local::DEFAULT_CSV, LocalTable, SupabaseStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Fetcher {
    /// Headless Chrome, renders and scrolls each page
    Chrome,
    /// Plain HTTP GET, no script execution
    Http,
}

/// Scrape Belo Horizonte property listings into a CSV and a Supabase table
#[derive(Debug, Parser)]
#[command(name = "imovel-scout", version)]
struct Cli {
    /// First results page (1-based)
    start: u32,

    /// Stop before this page; only `start` is scraped when omitted
    end: Option<u32>,

    /// Listing kind
    #[arg(long, default_value = "buy")]
    kind: ListingKind,

    /// Results variant: normal or last-day
    #[arg(long, default_value = "normal")]
    variant: UrlVariant,

    /// Fill region and coordinates for new listings
    #[arg(long)]
    geocode: bool,

    /// When to dedupe and write: per-page or batch
    #[arg(long, default_value = "per-page")]
    flush: FlushMode,

    #[arg(long, value_enum, default_value_t = Fetcher::Chrome)]
    fetcher: Fetcher,

    /// Local CSV table
    #[arg(long, default_value = DEFAULT_CSV)]
    csv: PathBuf,

    /// District → region table (JSON); the built-in Belo Horizonte table otherwise
    #[arg(long)]
    districts: Option<PathBuf>,

    /// Seconds to wait after navigation
    #[arg(long, default_value_t = 6)]
    initial_wait: u64,

    #[arg(long, default_value_t = 17)]
    scroll_steps: u32,

    #[arg(long, default_value_t = 350)]
    scroll_px: u32,

    /// Milliseconds between scroll steps
    #[arg(long, default_value_t = 500)]
    step_wait: u64,
}

impl Cli {
    fn timing(&self) -> RenderTiming {
        RenderTiming {
            initial_wait: Duration::from_secs(self.initial_wait),
            scroll_steps: self.scroll_steps,
            scroll_px: self.scroll_px,
            step_wait: Duration::from_millis(self.step_wait),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<ScoutError>() {
                Some(ScoutError::Configuration(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Everything that can be rejected up front is checked before any network activity
    let pages = PageRange::new(cli.start, cli.end)?;
    let config = Config::from_env()?;
    let geocoding_key = if cli.geocode { Some(config.geocoding_key()?) } else { None };

    let owned_resolver = match &cli.districts {
        Some(path) => Some(DistrictResolver::from_path(path)?),
        None => None,
    };
    let resolver = DistrictResolver::or_embedded(owned_resolver.as_ref());

    let remote = SupabaseStore::new(&config.supabase_url, config.supabase_key.clone())
        .context("Failed to build Supabase client")?;
    let target = ScrapeTarget::default();
    let extractor = PageExtractor::new(PostingSelectors::default(), &target.base_url)?;

    let source: Box<dyn PageSource> = match cli.fetcher {
        Fetcher::Chrome => Box::new(ChromePageSource::new(cli.timing())?),
        Fetcher::Http => Box::new(HttpPageSource::new()?),
    };

    let geocoder = geocoding_key.map(GoogleGeocoder::new).transpose()?;

    let options = PipelineOptions {
        pages,
        kind: cli.kind,
        variant: cli.variant,
        flush: cli.flush,
    };

    let mut pipeline = Pipeline::new(
        options,
        source.as_ref(),
        extractor,
        LocalTable::new(cli.csv.clone()),
        &remote,
        config.tables(cli.kind),
    )
    .with_target(target);
    if let Some(geocoder) = &geocoder {
        pipeline = pipeline.with_enricher(GeoEnricher::new(geocoder, resolver));
    }

    let summary = pipeline.run().await?;

    info!("✅ Scraped pages {} ({} {})", summary.pages, summary.listing_kind, summary.url_variant);
    info!("💾 {} new rows stored", summary.rows_added);
    if let Some(err) = &summary.error {
        info!("⚠️  {}", err);
    }

    Ok(())
}
