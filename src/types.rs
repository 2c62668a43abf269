//! Shared types for the Smart Scanner.
//!
//! These types form the data model used across all modules.
//! Listings are normalized by the platform adapters before they reach
//! the engine, so everything here is already in canonical form.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// Games supported by the marketplace feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameId {
    Csgo,
    Dota2,
    Tf2,
    Rust,
}

impl GameId {
    /// Identifier the marketplace API expects in the `gameId` parameter.
    pub fn api_id(&self) -> &'static str {
        match self {
            GameId::Csgo => "a8db",
            GameId::Dota2 => "9a92",
            GameId::Tf2 => "tf2",
            GameId::Rust => "rust",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameId::Csgo => write!(f, "csgo"),
            GameId::Dota2 => write!(f, "dota2"),
            GameId::Tf2 => write!(f, "tf2"),
            GameId::Rust => write!(f, "rust"),
        }
    }
}

/// Parse a game name or raw API id (case-insensitive).
impl std::str::FromStr for GameId {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csgo" | "cs2" | "a8db" => Ok(GameId::Csgo),
            "dota2" | "dota" | "9a92" => Ok(GameId::Dota2),
            "tf2" => Ok(GameId::Tf2),
            "rust" => Ok(GameId::Rust),
            _ => Err(ScannerError::UnknownGame(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A single marketplace offer as seen in one poll of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub item_id: String,
    pub title: String,
    /// Asking price in USD.
    pub price: Decimal,
    /// Wear value (0.0–1.0) for skins that have one.
    pub float_value: Option<f64>,
    pub stat_trak: bool,
    /// Remaining trade-lock in seconds (0 = tradable now).
    pub lock_seconds: u64,
    /// Offer id used for purchasing. May be empty for some listings.
    pub offer_id: String,
}

impl fmt::Display for ListingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ ${:.2} [{}]", self.title, self.price, self.item_id)?;
        if self.lock_seconds > 0 {
            write!(f, " (locked {}s)", self.lock_seconds)?;
        }
        Ok(())
    }
}


/// One page of the listing feed.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub listings: Vec<ListingSnapshot>,
    /// Cursor for the next page. `None` means the end of the catalog.
    pub next_cursor: Option<String>,
}

impl FeedPage {
    /// Build a page, normalizing an empty cursor string to `None`.
    pub fn new(listings: Vec<ListingSnapshot>, next_cursor: Option<String>) -> Self {
        Self {
            listings,
            next_cursor: next_cursor.filter(|c| !c.is_empty()),
        }
    }
}

/// Price quote from the secondary marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondaryQuote {
    /// Gross sale price in USD, before the platform fee.
    pub price: Decimal,
    /// Number of active listings backing the quote.
    pub liquidity: u32,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Buy/skip verdict for one analyzed listing, with its rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDecision {
    pub item_id: String,
    pub title: String,
    pub market_price: Decimal,
    pub oracle_fair_price: Option<Decimal>,
    pub secondary_price: Option<Decimal>,
    pub profit_amount: Decimal,
    pub profit_percent: Decimal,
    pub lock_days: u64,
    pub should_buy: bool,
    pub reason: String,
    pub offer_id: String,
}

impl fmt::Display for ScanDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.should_buy { "BUY" } else { "SKIP" };
        write!(
            f,
            "{verdict} {} @ ${:.2} | profit ${:.2} ({:.1}%) | lock {}d | {}",
            self.title,
            self.market_price,
            self.profit_amount,
            self.profit_percent,
            self.lock_days,
            self.reason,
        )
    }
}

impl ScanDecision {
    /// Identifier to hand to the purchase endpoint.
    pub fn purchase_id(&self) -> &str {
        if self.offer_id.is_empty() {
            &self.item_id
        } else {
            &self.offer_id
        }
    }
}

/// The first `n` buy decisions, in listing order.
pub fn opportunities(decisions: &[ScanDecision], n: usize) -> Vec<&ScanDecision> {
    decisions.iter().filter(|d| d.should_buy).take(n).collect()
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running counters for one scanner instance. Monotonic until reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub scans_completed: u64,
    pub items_analyzed: u64,
    pub items_skipped_lock: u64,
    pub items_skipped_duplicate: u64,
    pub items_skipped_ai: u64,
    pub opportunities_found: u64,
    pub purchases_made: u64,
    pub purchases_failed: u64,
    pub pages_failed: u64,
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scans={} analyzed={} skipped(lock={} dup={} ai={}) opportunities={} purchases={} (failed {}) pages_failed={}",
            self.scans_completed,
            self.items_analyzed,
            self.items_skipped_lock,
            self.items_skipped_duplicate,
            self.items_skipped_ai,
            self.opportunities_found,
            self.purchases_made,
            self.purchases_failed,
            self.pages_failed,
        )
    }
}

impl ScanStats {
    /// Total items rejected by policy (lock, duplicate, AI veto).
    pub fn total_skipped(&self) -> u64 {
        self.items_skipped_lock + self.items_skipped_duplicate + self.items_skipped_ai
    }

    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &ScanStats) {
        self.scans_completed += other.scans_completed;
        self.items_analyzed += other.items_analyzed;
        self.items_skipped_lock += other.items_skipped_lock;
        self.items_skipped_duplicate += other.items_skipped_duplicate;
        self.items_skipped_ai += other.items_skipped_ai;
        self.opportunities_found += other.opportunities_found;
        self.purchases_made += other.purchases_made;
        self.purchases_failed += other.purchases_failed;
        self.pages_failed += other.pages_failed;
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Record of a purchase (real or simulated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub reference: String,
    pub item_id: String,
    pub price: Decimal,
    pub dry_run: bool,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for PurchaseReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.dry_run { "DRY RUN" } else { "LIVE" };
        write!(
            f,
            "[{mode}] {} @ ${:.2} [{}]",
            self.item_id, self.price, self.reference
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Configuration and construction errors. Collaborator failures are
/// reported through `anyhow` and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("Unknown game id: {0}")]
    UnknownGame(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
