//! Screenfolio entry point.
//!
//! Loads configuration, initialises structured logging, and runs one
//! collect → score → allocate → commit pass against the screener.
//! Scheduling is external; runs must not overlap.

use anyhow::Result;
use tracing::info;

use screenfolio::collector::http::HttpPageSource;
use screenfolio::collector::TableCollector;
use screenfolio::config::AppConfig;
use screenfolio::engine;
use screenfolio::storage::CsvPortfolioStore;
use screenfolio::strategy::PortfolioBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::resolve_path();
    let cfg = AppConfig::load_or_default(&config_path)?;

    init_logging();

    info!(
        config = %config_path.display(),
        url = %cfg.source.url,
        portfolio_dir = %cfg.portfolio.dir.display(),
        max_holdings = cfg.portfolio.max_holdings,
        "Screenfolio starting"
    );

    let source = HttpPageSource::new(&cfg.source)?;
    let collector = TableCollector::from_config(&cfg.source)?;
    let builder = PortfolioBuilder::from_config(&cfg.scoring, &cfg.portfolio);
    let store = CsvPortfolioStore::new(&cfg.portfolio.dir, cfg.portfolio.default_capital);

    let report = engine::run_once(
        &source,
        &collector,
        &builder,
        &store,
        &cfg.scoring.price_column,
    )
    .await?;

    report.log_summary();
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("screenfolio=info"));

    if std::env::var("SCREENFOLIO_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
