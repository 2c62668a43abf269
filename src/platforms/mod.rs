//! Marketplace integrations.
//!
//! Defines the collaborator traits the scanner consumes and provides
//! HTTP implementations for:
//! - the primary marketplace (listing feed + purchase endpoint)
//! - the secondary marketplace (cross-market price quotes)

pub mod marketplace;
pub mod secondary;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{FeedPage, GameId, SecondaryQuote};

/// Parameters for one page request against the listing feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub game: GameId,
    pub limit: u32,
    pub price_ceiling: Option<Decimal>,
    /// `None` starts from the beginning of the catalog.
    pub cursor: Option<String>,
}

/// Paginated listing feed of the primary marketplace.
///
/// Implementations own their retry and backoff policy; the scanner
/// treats any error as "this page failed".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingFeed: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<FeedPage>;
}

/// Cross-market price lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Current quote for an item title, if the secondary market lists it.
    async fn lookup(&self, title: &str) -> Result<Option<SecondaryQuote>>;
}

/// Purchase endpoint of the primary marketplace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Purchaser: Send + Sync {
    /// Buy an offer (or item) at the given price. `Ok(false)` means the
    /// marketplace declined, e.g. the offer was already sold.
    async fn buy(&self, purchase_id: &str, price: Decimal) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Payload normalization
// ---------------------------------------------------------------------------

/// Price as it appears in marketplace payloads.
///
/// The primary marketplace sends `{ "USD": "1234" }` in cents; other
/// endpoints send plain dollar amounts as numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Cents(HashMap<String, serde_json::Value>),
    Number(f64),
    Text(String),
}

impl RawPrice {
    /// Normalize to a USD amount. `None` if the payload is unusable.
    pub fn to_usd(&self) -> Option<Decimal> {
        match self {
            RawPrice::Cents(map) => {
                let cents = match map.get("USD")? {
                    serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok()?,
                    serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok()?,
                    _ => return None,
                };
                Some(cents / Decimal::ONE_HUNDRED)
            }
            RawPrice::Number(n) => Decimal::from_f64(*n).map(|d| d.round_dp(2)),
            RawPrice::Text(s) => Decimal::from_str(s.trim()).ok(),
        }
    }
}
