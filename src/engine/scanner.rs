//! Smart scanner: the poll → filter → evaluate → execute loop.
//!
//! Drives the paginated listing feed, runs every listing through the
//! lock policy, the delta filter and the evaluator, and hands buy
//! decisions to the executor. Owns the cursor, the delta filter and the
//! stats for one scanner instance; none of it is shared.
//!
//! Failure handling:
//! - feed errors fail the page (logged, cursor unchanged, retried next
//!   iteration). No local retries; the feed owns its retry policy.
//! - oracle errors skip the item; quote errors drop the quote.
//! - purchase errors are counted and logged.
//!
//! A page is committed as a unit: the next cursor, the delta-filter
//! entries and the analysis counters are applied only after its last
//! listing is handled. A page dropped midway leaves them as they were,
//! so it is rescanned in full. Purchase counters record actions already
//! taken and are applied as each purchase returns.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::engine::delta::DeltaFilter;
use crate::engine::evaluator::{self, LockVerdict};
use crate::engine::executor::Executor;
use crate::oracle::FairPriceOracle;
use crate::platforms::{FeedQuery, ListingFeed, Purchaser, QuoteSource};
use crate::types::{opportunities, GameId, ListingSnapshot, ScanDecision, ScanStats, ScannerError};

/// How many opportunities to list in the per-iteration log line.
const REPORT_TOP_N: usize = 5;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External services the scanner talks to. Shared through `Arc` so
/// several scanner instances can use the same clients.
#[derive(Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn ListingFeed>,
    pub oracle: Option<Arc<dyn FairPriceOracle>>,
    pub quotes: Option<Arc<dyn QuoteSource>>,
    pub purchaser: Option<Arc<dyn Purchaser>>,
}

// ---------------------------------------------------------------------------
// Stop handle
// ---------------------------------------------------------------------------

/// Cloneable handle to stop a running scanner from another task.
///
/// The flag is checked once per iteration; a page in flight always
/// completes. Stopping also cuts the inter-iteration sleep short.
#[derive(Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Changes staged while one page is analyzed.
struct PageTally {
    stats: ScanStats,
    /// Listings first seen on this page.
    fresh: DeltaFilter,
}

impl PageTally {
    fn new(listings: usize) -> Self {
        Self {
            stats: ScanStats::default(),
            fresh: DeltaFilter::new(listings),
        }
    }
}

pub struct SmartScanner {
    config: ScannerConfig,
    game: GameId,
    feed: Arc<dyn ListingFeed>,
    oracle: Option<Arc<dyn FairPriceOracle>>,
    quotes: Option<Arc<dyn QuoteSource>>,
    executor: Executor,
    filter: DeltaFilter,
    stats: ScanStats,
    cursor: Option<String>,
    stop: StopHandle,
}

impl SmartScanner {
    /// Build a scanner. Configuration problems are reported here and
    /// never later.
    pub fn new(config: ScannerConfig, collaborators: Collaborators) -> Result<Self, ScannerError> {
        let game = config.validate()?;

        if config.ai_enabled && collaborators.oracle.is_none() {
            return Err(ScannerError::Config(
                "ai_enabled requires a fair-price oracle".to_string(),
            ));
        }
        if !config.dry_run && collaborators.purchaser.is_none() {
            return Err(ScannerError::Config(
                "live mode (dry_run = false) requires a purchase endpoint".to_string(),
            ));
        }

        info!(
            game = %game,
            min_profit = %config.min_profit_percent,
            max_lock_days = config.max_lock_days,
            allow_locked = config.allow_locked,
            ai_enabled = config.ai_enabled,
            secondary = collaborators.quotes.is_some(),
            dry_run = config.dry_run,
            "Smart scanner configured"
        );

        Ok(Self {
            filter: DeltaFilter::new(config.delta_filter_size),
            executor: Executor::new(collaborators.purchaser, config.dry_run),
            game,
            feed: collaborators.feed,
            oracle: collaborators.oracle,
            quotes: collaborators.quotes,
            stats: ScanStats::default(),
            cursor: None,
            stop: StopHandle::default(),
            config,
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Cursor the next `run_continuous` iteration will resume from.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Snapshot of the running counters.
    pub fn get_stats(&self) -> ScanStats {
        self.stats.clone()
    }

    /// Zero the counters and restart coverage from the beginning of the
    /// catalog with an empty delta filter.
    pub fn reset_stats(&mut self) {
        self.stats = ScanStats::default();
        self.filter.clear();
        self.cursor = None;
        info!("Scanner stats reset");
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask `run_continuous` to exit after the current page.
    pub fn stop(&self) {
        self.stop.stop();
    }

    // -- Scanning --------------------------------------------------------

    /// Scan one page starting at `cursor` and return the decisions in
    /// listing order. Never fails: a feed error yields an empty list.
    pub async fn scan_once(&mut self, cursor: Option<&str>) -> Vec<ScanDecision> {
        self.scan_page(cursor).await.unwrap_or_default()
    }

    /// `None` when the feed failed.
    async fn scan_page(&mut self, cursor: Option<&str>) -> Option<Vec<ScanDecision>> {
        let query = FeedQuery {
            game: self.game,
            limit: self.config.scan_limit,
            price_ceiling: self.config.price_ceiling,
            cursor: cursor.map(str::to_string),
        };

        let page = match self.feed.fetch(&query).await {
            Ok(page) => page,
            Err(e) => {
                self.stats.pages_failed += 1;
                warn!(error = %e, cursor = ?cursor, "Feed page failed, will retry next iteration");
                return None;
            }
        };

        let mut tally = PageTally::new(page.listings.len());
        let mut decisions = Vec::with_capacity(page.listings.len());
        for listing in &page.listings {
            match self.analyze(listing, &mut tally).await {
                Ok(Some(decision)) => {
                    if decision.should_buy {
                        self.act_on(&decision).await;
                    }
                    decisions.push(decision);
                }
                Ok(None) => {}
                Err(e) => {
                    // Let the listing be picked up again on a later pass.
                    tally.fresh.forget(listing);
                    warn!(item_id = %listing.item_id, error = %e, "Item analysis failed, skipping");
                }
            }
        }

        // Commit. No await past this point.
        for listing in &page.listings {
            if tally.fresh.contains(listing) {
                self.filter.insert(listing);
            }
        }
        tally.stats.scans_completed += 1;
        self.stats.merge(&tally.stats);
        self.cursor = page.next_cursor.clone();
        info!(
            listings = page.listings.len(),
            decisions = decisions.len(),
            buys = decisions.iter().filter(|d| d.should_buy).count(),
            end_of_catalog = self.cursor.is_none(),
            "Page scanned"
        );

        Some(decisions)
    }

    /// Run one listing through the staged pipeline. `Ok(None)` means the
    /// listing was filtered out before evaluation.
    async fn analyze(
        &self,
        listing: &ListingSnapshot,
        tally: &mut PageTally,
    ) -> Result<Option<ScanDecision>> {
        if !evaluator::has_valid_price(listing) {
            debug!(item_id = %listing.item_id, price = %listing.price, "Malformed price, discarded");
            return Ok(None);
        }
        tally.stats.items_analyzed += 1;

        let lock_days = match evaluator::check_lock(listing, &self.config) {
            LockVerdict::Allowed { lock_days } => lock_days,
            verdict => {
                tally.stats.items_skipped_lock += 1;
                debug!(item_id = %listing.item_id, verdict = ?verdict, "Skipped: trade lock");
                return Ok(None);
            }
        };

        if self.filter.contains(listing) || !tally.fresh.is_new(listing) {
            tally.stats.items_skipped_duplicate += 1;
            debug!(item_id = %listing.item_id, "Skipped: unchanged since last seen");
            return Ok(None);
        }

        let oracle_fair = match (&self.oracle, self.config.ai_enabled) {
            (Some(oracle), true) => oracle
                .predict_with_guard(
                    &listing.title,
                    listing.price,
                    listing.float_value,
                    listing.stat_trak,
                )
                .await
                .context("Fair-price oracle failed")?,
            _ => None,
        };

        if evaluator::is_ai_veto(&self.config, lock_days, oracle_fair) {
            tally.stats.items_skipped_ai += 1;
            debug!(item_id = %listing.item_id, lock_days, "Skipped: AI veto on locked item");
            return Ok(Some(evaluator::evaluate(listing, &self.config, None, None)));
        }

        let quote = match (&self.quotes, lock_days) {
            (Some(quotes), 0) => match quotes.lookup(&listing.title).await {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(item_id = %listing.item_id, error = %e, "Secondary quote failed, ignoring");
                    None
                }
            },
            _ => None,
        };

        Ok(Some(evaluator::evaluate(
            listing,
            &self.config,
            oracle_fair,
            quote.as_ref(),
        )))
    }

    async fn act_on(&mut self, decision: &ScanDecision) {
        info!(
            item_id = %decision.item_id,
            title = %decision.title,
            price = format!("${:.2}", decision.market_price),
            profit = format!("${:.2} ({:.1}%)", decision.profit_amount, decision.profit_percent),
            reason = %decision.reason,
            "Opportunity found"
        );

        let outcome = self.executor.execute(decision).await;
        self.stats.opportunities_found += 1;
        if outcome.is_purchase() {
            self.stats.purchases_made += 1;
        } else if outcome.is_failure() {
            self.stats.purchases_failed += 1;
        }
    }

    // -- Continuous mode -------------------------------------------------

    /// Poll page after page, resuming from the remembered cursor and
    /// wrapping to the start at the end of the catalog.
    ///
    /// Exits after `max_iterations` pages (attempted, failed ones
    /// included), when stopped, or when the future is dropped. Dropping
    /// it mid-page discards that page's uncommitted progress; the next
    /// run starts again from the same cursor.
    pub async fn run_continuous(&mut self, max_iterations: Option<u64>) -> ScanStats {
        let session = uuid::Uuid::new_v4();
        info!(
            session = %session,
            max_iterations = ?max_iterations,
            delay_ms = self.config.scan_delay_ms,
            "Continuous scan started"
        );

        let mut iteration: u64 = 0;
        loop {
            if self.stop.is_stopped() {
                info!(session = %session, "Stop requested");
                break;
            }
            if max_iterations.is_some_and(|max| iteration >= max) {
                break;
            }

            let cursor = self.cursor.clone();
            let page = self.scan_page(cursor.as_deref()).await;
            iteration += 1;

            if let Some(decisions) = page {
                let top = opportunities(&decisions, REPORT_TOP_N);
                for (rank, decision) in top.iter().enumerate() {
                    info!(rank = rank + 1, "{decision}");
                }

                if self.cursor.is_none() {
                    self.filter.clear();
                    info!(session = %session, iteration, "End of catalog, wrapping to start");
                }
            }

            if max_iterations.is_some_and(|max| iteration >= max) || self.stop.is_stopped() {
                continue;
            }

            let wake = self.stop.wake.notified();
            tokio::pin!(wake);
            wake.as_mut().enable();
            if self.stop.is_stopped() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_delay()) => {}
                _ = &mut wake => {}
            }
        }

        self.stop.reset();
        info!(session = %session, iterations = iteration, stats = %self.stats, "Continuous scan finished");
        self.get_stats()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
