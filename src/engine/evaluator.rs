//! Decision evaluator.
//!
//! Pure buy/skip logic. The scanner runs the stages in order:
//!
//! 1. price sanity (`has_valid_price`)
//! 2. lock policy (`check_lock`)
//! 3. dedup (owned by the scanner's `DeltaFilter`)
//! 4. oracle fair price and 5. secondary quote (`evaluate`)
//!
//! Nothing here performs I/O; the scanner gathers the oracle and quote
//! results and hands them in.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::ScannerConfig;
use crate::types::{ListingSnapshot, ScanDecision, SecondaryQuote};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Share of the sale price the secondary marketplace pays out (6% fee).
pub const SECONDARY_FEE_MULTIPLIER: Decimal = dec!(0.94);

const SECONDS_PER_DAY: u64 = 86_400;

pub const REASON_AI_LOCK_VETO: &str = "AI rejected (locked item requires validation)";
pub const REASON_NO_SIGNAL: &str = "No profitable signal";

// ---------------------------------------------------------------------------
// Stage 1–2: sanity and lock policy
// ---------------------------------------------------------------------------

/// Listings with a zero or negative price are malformed and dropped silently.
pub fn has_valid_price(listing: &ListingSnapshot) -> bool {
    listing.price > Decimal::ZERO
}

/// Whole days of trade-lock remaining (floored).
pub fn lock_days(lock_seconds: u64) -> u64 {
    lock_seconds / SECONDS_PER_DAY
}

/// Outcome of the lock policy stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockVerdict {
    Allowed { lock_days: u64 },
    /// Lock longer than `max_lock_days` while locked items are not allowed.
    TooLong { lock_days: u64 },
    /// Locked items are allowed, but only with AI validation, and AI is off.
    RequiresAi { lock_days: u64 },
}


/// Apply the lock policy.
///
/// A locked item cannot be resold right away, so when locked items are
/// allowed the AI guard is mandatory. This is not configurable.
pub fn check_lock(listing: &ListingSnapshot, config: &ScannerConfig) -> LockVerdict {
    let days = lock_days(listing.lock_seconds);

    if !config.allow_locked && days > config.max_lock_days {
        return LockVerdict::TooLong { lock_days: days };
    }
    if config.allow_locked && days > 0 && !config.ai_enabled {
        return LockVerdict::RequiresAi { lock_days: days };
    }
    LockVerdict::Allowed { lock_days: days }
}

// ---------------------------------------------------------------------------
// Stage 4–5: signal fusion
// ---------------------------------------------------------------------------

/// Profit of selling at `proceeds` after buying at `cost`, in percent of cost.
pub fn profit_percent(cost: Decimal, proceeds: Decimal) -> Decimal {
    if cost <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (proceeds - cost) / cost * dec!(100)
}

/// Net proceeds of selling on the secondary marketplace.
pub fn secondary_net(quote: &SecondaryQuote) -> Decimal {
    quote.price * SECONDARY_FEE_MULTIPLIER
}

/// Whether the oracle's silence vetoes this listing outright.
pub fn is_ai_veto(config: &ScannerConfig, lock_days: u64, oracle_fair: Option<Decimal>) -> bool {
    config.ai_enabled && lock_days > 0 && oracle_fair.is_none()
}

/// Fuse the oracle and secondary signals into one decision.
///
/// `oracle_fair` is ignored when AI is disabled. `quote` is only
/// considered for unlocked listings. The secondary source replaces the
/// oracle's verdict only when it clears the threshold and is strictly
/// more profitable than what the oracle stage recorded.
pub fn evaluate(
    listing: &ListingSnapshot,
    config: &ScannerConfig,
    oracle_fair: Option<Decimal>,
    quote: Option<&SecondaryQuote>,
) -> ScanDecision {
    let price = listing.price;
    let days = lock_days(listing.lock_seconds);
    let oracle_fair = if config.ai_enabled { oracle_fair } else { None };

    let mut decision = ScanDecision {
        item_id: listing.item_id.clone(),
        title: listing.title.clone(),
        market_price: price,
        oracle_fair_price: oracle_fair,
        secondary_price: None,
        profit_amount: Decimal::ZERO,
        profit_percent: Decimal::ZERO,
        lock_days: days,
        should_buy: false,
        reason: REASON_NO_SIGNAL.to_string(),
        offer_id: listing.offer_id.clone(),
    };

    if is_ai_veto(config, days, oracle_fair) {
        decision.reason = REASON_AI_LOCK_VETO.to_string();
        return decision;
    }

    // Stage 4: oracle
    let mut oracle_percent: Option<Decimal> = None;
    if let Some(fair) = oracle_fair {
        let pct = profit_percent(price, fair);
        decision.profit_amount = fair - price;
        decision.profit_percent = pct;
        oracle_percent = Some(pct);

        if pct >= config.min_profit_percent {
            decision.should_buy = true;
            decision.reason = format!("AI: +{pct:.1}%");
        } else {
            decision.reason = format!("AI profit too low: {pct:.1}%");
        }
    }

    // Stage 5: secondary market, unlocked items only
    if days > 0 {
        return decision;
    }
    if let Some(quote) = quote {
        let net = secondary_net(quote);
        let cross_pct = profit_percent(price, net);
        decision.secondary_price = Some(quote.price);

        let beats_oracle = oracle_percent.map_or(true, |ai| cross_pct > ai);
        if cross_pct >= config.min_profit_percent && beats_oracle {
            decision.should_buy = true;
            decision.profit_amount = net - price;
            decision.profit_percent = cross_pct;
            decision.reason = format!("Secondary: +{cross_pct:.1}% (net ${net:.2})");
        }
    }

    decision
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
