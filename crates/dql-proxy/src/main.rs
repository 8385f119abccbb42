use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dql_proxy::{AppState, Config, ConfigArgs};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dql-proxy")]
#[command(author, version, about = "Grail DQL proxy for Grafana", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = Config::resolve(&cli.config)?;

    print_banner(&config);

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        "Query timeout {}s, cache TTL {}s",
        config.query_timeout_secs, config.cache_ttl_secs
    );

    dql_proxy::run(state, &config.listen_addr()).await
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "dql_proxy=debug,dql_executor=debug,dql_cache=debug"
    } else {
        "dql_proxy=info,dql_executor=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn print_banner(config: &Config) {
    println!(
        "{} {}",
        "DQL Proxy".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_yellow()
    );
    let upstream = config.dt_url.as_deref().unwrap_or("<not configured>");
    println!("{} {}", "Upstream:".bright_black(), upstream);
    println!(
        "{} {}\n",
        "Listening:".bright_black(),
        config.listen_addr().bright_green()
    );
}
