use anyhow::Context;
use clap::Parser;
use news_aggregator::{AggregateOptions, AggregatorConfig, Locations, NewsAggregator};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "news-aggregator", about = "Collect and rank local news for the Long Island Korean community")]
struct Cli {
    /// Location to search for; repeat or separate with commas. Defaults to the configured list.
    #[arg(short, long = "location")]
    locations: Vec<String>,

    /// Fetch and extract the full text of the top articles
    #[arg(long)]
    full: bool,

    /// How many articles to extract with --full
    #[arg(long, default_value_t = 5)]
    max_full: usize,

    /// TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the aggregation as JSON instead of the prompt text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = AggregatorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let aggregator = NewsAggregator::new(config).context("failed to build the aggregator")?;

    let locations: Vec<String> = cli
        .locations
        .iter()
        .flat_map(|l| Locations::from(l.as_str()).as_slice().to_vec())
        .collect();

    let options = AggregateOptions {
        extract_full_articles: cli.full,
        max_full_articles: cli.max_full,
    };

    let result = aggregator
        .aggregate(locations, options)
        .await
        .context("aggregation failed")?;

    for failure in &result.feed_failures {
        warn!("{} ({}): {}", failure.source, failure.url, failure.error);
    }
    info!(
        "Run {}: {} articles selected from {}",
        result.run_id, result.selected_articles, result.total_articles
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", aggregator.format_for_prompt(&result));
    }

    Ok(())
}
