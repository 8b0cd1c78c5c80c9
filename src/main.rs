//! Reputation lists CLI.

use anyhow::Result;
use clap::Parser;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use reputation_lists::{
    AddressListItem, Config, ReqwestClient, SystemResolver, UrlTester, UrlTesterChain,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reputation-lists")]
#[command(about = "Check hosts and URLs against DNSBLs, HTTP list APIs and local host collections")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "reputation-lists.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Treat values as hosts instead of URLs
    #[arg(long)]
    hosts: bool,

    /// URLs (or hosts, with --hosts) to check
    values: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging; stdout is reserved for matches
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let resolver = Arc::new(SystemResolver::new());
    let http = Arc::new(ReqwestClient::new(Duration::from_millis(
        config.settings.timeout_ms,
    ))?);
    let chain = UrlTesterChain::from_config(&config, resolver, http)?;

    let values: Vec<&str> = args.values.iter().map(String::as_str).collect();
    let items: BoxStream<'_, _> = if args.hosts {
        chain.lookup_hosts(&values)
    } else {
        chain.lookup_matching(&values)
    };

    let count = print_matches(items).await?;
    info!(values = values.len(), matches = count, "Check complete");

    Ok(())
}

/// Print each match as it arrives: value, source and tags separated by tabs.
async fn print_matches(
    mut items: BoxStream<'_, reputation_lists::Result<AddressListItem>>,
) -> Result<usize> {
    let mut count = 0;
    while let Some(item) = items.try_next().await? {
        let tags: Vec<&str> = item.classification.iter().map(String::as_str).collect();
        println!("{}\t{}\t{}", item.value, item.source, tags.join(","));
        count += 1;
    }
    Ok(count)
}
