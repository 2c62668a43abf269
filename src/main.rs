//! Smart Scanner entry point.
//!
//! Loads configuration, initialises structured logging, wires the
//! marketplace, oracle and secondary-market clients into a scanner and
//! polls until Ctrl+C.

use anyhow::Result;
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use smart_scanner::config::{self, AppConfig};
use smart_scanner::engine::scanner::{Collaborators, SmartScanner};
use smart_scanner::oracle::predictor::HttpFairPriceOracle;
use smart_scanner::oracle::FairPriceOracle;
use smart_scanner::platforms::marketplace::MarketplaceClient;
use smart_scanner::platforms::secondary::HttpQuoteClient;
use smart_scanner::platforms::{Purchaser, QuoteSource};

const BANNER: &str = r#"
  ==============================================
   SMART SCANNER  v0.1.0
   Marketplace arbitrage scanning and decisions
  ==============================================
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&path)?;

    init_logging();

    println!("{BANNER}");
    info!(config = %path, game = %cfg.scanner.game_id, dry_run = cfg.scanner.dry_run, "Smart scanner starting up");

    let mut scanner = SmartScanner::new(cfg.scanner.clone(), build_collaborators(&cfg)?)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering scan loop. Press Ctrl+C to stop.");

    // A page cut short by shutdown is left uncommitted.
    tokio::select! {
        _ = scanner.run_continuous(None) => {}
        _ = &mut shutdown => {
            info!("Shutdown signal received.");
        }
    }

    let stats = scanner.get_stats();
    info!(
        scans = stats.scans_completed,
        analyzed = stats.items_analyzed,
        skipped = stats.total_skipped(),
        opportunities = stats.opportunities_found,
        purchases = stats.purchases_made,
        failed = stats.purchases_failed,
        "Smart scanner shut down cleanly."
    );
    println!("{stats}");

    Ok(())
}

/// Build the HTTP clients named in the config.
fn build_collaborators(cfg: &AppConfig) -> Result<Collaborators> {
    let game = cfg.scanner.validate()?;

    let api_key = AppConfig::resolve_env(&cfg.marketplace.api_key_env)?;
    let marketplace = Arc::new(MarketplaceClient::new(
        &cfg.marketplace.base_url,
        Secret::new(api_key),
        Duration::from_secs(cfg.marketplace.timeout_secs),
        cfg.marketplace.max_retries,
    )?);

    let oracle = match &cfg.oracle {
        Some(oc) => Some(Arc::new(HttpFairPriceOracle::new(
            &oc.url,
            oc.max_deviation_percent,
            Duration::from_secs(oc.timeout_secs),
        )?) as Arc<dyn FairPriceOracle>),
        None => {
            if cfg.scanner.ai_enabled {
                warn!("ai_enabled is set but no [oracle] section is configured");
            }
            None
        }
    };

    let quotes = match &cfg.secondary {
        Some(sc) => Some(Arc::new(secondary_client(sc, game)?) as Arc<dyn QuoteSource>),
        None => None,
    };

    let purchaser = if cfg.scanner.dry_run {
        None
    } else {
        Some(marketplace.clone() as Arc<dyn Purchaser>)
    };

    Ok(Collaborators {
        feed: marketplace,
        oracle,
        quotes,
        purchaser,
    })
}

fn secondary_client(
    sc: &config::SecondaryConfig,
    game: smart_scanner::types::GameId,
) -> Result<HttpQuoteClient> {
    // A missing key degrades to the public, rate-limited tier.
    let api_key = sc.api_key_env.as_deref().and_then(|env| match AppConfig::resolve_env(env) {
        Ok(key) => Some(Secret::new(key)),
        Err(e) => {
            warn!(error = %e, "Secondary market key not set, using public tier");
            None
        }
    });
    HttpQuoteClient::new(
        &sc.url,
        api_key,
        game,
        sc.min_liquidity,
        Duration::from_secs(sc.timeout_secs),
    )
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smart_scanner=info"));

    if std::env::var("SCANNER_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
