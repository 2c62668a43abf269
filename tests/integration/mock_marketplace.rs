//! In-memory collaborators for integration testing.
//!
//! `MockMarketplace` serves a fixed catalog as cursor-paginated pages
//! and sells offers against a balance. `MockOracle` and `MockQuotes`
//! answer from lookup tables keyed by item title. No network access.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use smart_scanner::oracle::{apply_guard, FairPriceOracle};
use smart_scanner::platforms::{FeedQuery, ListingFeed, Purchaser, QuoteSource};
use smart_scanner::types::{FeedPage, ListingSnapshot, SecondaryQuote};

pub const DAY: u64 = 86_400;

pub fn listing(id: &str, title: &str, price: Decimal, lock_days: u64) -> ListingSnapshot {
    ListingSnapshot {
        item_id: id.to_string(),
        title: title.to_string(),
        price,
        float_value: Some(0.2),
        stat_trak: title.contains("StatTrak"),
        lock_seconds: lock_days * DAY,
        offer_id: format!("offer-{id}"),
    }
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

/// Cursor-paginated catalog with a purchase endpoint.
///
/// Cursors are page indices as strings; the last page has no next
/// cursor. Bought offers disappear from the catalog.
pub struct MockMarketplace {
    pages: Arc<Mutex<Vec<Vec<ListingSnapshot>>>>,
    balance: Arc<Mutex<Decimal>>,
    purchases: Arc<Mutex<Vec<String>>>,
    queries: Arc<Mutex<Vec<FeedQuery>>>,
    /// If set, every fetch fails with this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockMarketplace {
    pub fn new(pages: Vec<Vec<ListingSnapshot>>, balance: Decimal) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages)),
            balance: Arc::new(Mutex::new(balance)),
            purchases: Arc::default(),
            queries: Arc::default(),
            force_error: Arc::default(),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn balance(&self) -> Decimal {
        *self.balance.lock().unwrap()
    }

    /// Offer ids bought so far, in order.
    pub fn purchases(&self) -> Vec<String> {
        self.purchases.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<FeedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingFeed for MockMarketplace {
    async fn fetch(&self, query: &FeedQuery) -> Result<FeedPage> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }

        let index: usize = match &query.cursor {
            Some(c) => c.parse().map_err(|_| anyhow!("Bad cursor: {c}"))?,
            None => 0,
        };
        let pages = self.pages.lock().unwrap();
        let listings: Vec<ListingSnapshot> = pages
            .get(index)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|l| query.price_ceiling.map_or(true, |max| l.price <= max))
            .take(query.limit as usize)
            .collect();
        let next = (index + 1 < pages.len()).then(|| (index + 1).to_string());

        Ok(FeedPage::new(listings, next))
    }
}

#[async_trait]
impl Purchaser for MockMarketplace {
    async fn buy(&self, purchase_id: &str, price: Decimal) -> Result<bool> {
        let mut pages = self.pages.lock().unwrap();
        let Some(page) = pages
            .iter_mut()
            .find(|p| p.iter().any(|l| l.offer_id == purchase_id))
        else {
            // Already sold
            return Ok(false);
        };

        let mut balance = self.balance.lock().unwrap();
        if *balance < price {
            return Err(anyhow!(
                "Insufficient balance: need ${price:.2}, have ${:.2}",
                *balance
            ));
        }
        *balance -= price;
        page.retain(|l| l.offer_id != purchase_id);
        self.purchases.lock().unwrap().push(purchase_id.to_string());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Fair prices by title, passed through the standard guard band.
pub struct MockOracle {
    fair: HashMap<String, Decimal>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockOracle {
    pub fn new(fair: &[(&str, Decimal)]) -> Self {
        Self {
            fair: fair.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            calls: Arc::default(),
        }
    }

    /// Titles the oracle was asked about.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FairPriceOracle for MockOracle {
    async fn predict_with_guard(
        &self,
        title: &str,
        price: Decimal,
        _float_value: Option<f64>,
        _stat_trak: bool,
    ) -> Result<Option<Decimal>> {
        self.calls.lock().unwrap().push(title.to_string());
        Ok(self
            .fair
            .get(title)
            .and_then(|fair| apply_guard(price, *fair, dec!(50))))
    }
}

// ---------------------------------------------------------------------------
// Secondary market
// ---------------------------------------------------------------------------

pub struct MockQuotes {
    quotes: HashMap<String, SecondaryQuote>,
}

impl MockQuotes {
    pub fn new(quotes: &[(&str, Decimal, u32)]) -> Self {
        Self {
            quotes: quotes
                .iter()
                .map(|(t, price, liquidity)| {
                    (t.to_string(), SecondaryQuote { price: *price, liquidity: *liquidity })
                })
                .collect(),
        }
    }
}

#[async_trait]
impl QuoteSource for MockQuotes {
    async fn lookup(&self, title: &str) -> Result<Option<SecondaryQuote>> {
        Ok(self.quotes.get(title).copied())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use smart_scanner::types::GameId;

    fn query(cursor: Option<&str>) -> FeedQuery {
        FeedQuery {
            game: GameId::Csgo,
            limit: 100,
            price_ceiling: None,
            cursor: cursor.map(str::to_string),
        }
    }

    fn market() -> MockMarketplace {
        MockMarketplace::new(
            vec![
                vec![listing("a", "A", dec!(1), 0), listing("b", "B", dec!(2), 0)],
                vec![listing("c", "C", dec!(3), 0)],
            ],
            dec!(10),
        )
    }

    #[tokio::test]
    async fn test_mock_pagination() {
        let market = market();
        let first = market.fetch(&query(None)).await.unwrap();
        assert_eq!(first.listings.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("1"));

        let last = market.fetch(&query(Some("1"))).await.unwrap();
        assert_eq!(last.listings.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_mock_price_ceiling() {
        let market = market();
        let mut q = query(None);
        q.price_ceiling = Some(dec!(1.5));
        let page = market.fetch(&q).await.unwrap();
        assert_eq!(page.listings.len(), 1);
        assert_eq!(page.listings[0].item_id, "a");
    }

    #[tokio::test]
    async fn test_mock_buy_removes_offer() {
        let market = market();
        assert!(market.buy("offer-b", dec!(2)).await.unwrap());
        assert_eq!(market.balance(), dec!(8));
        assert!(!market.buy("offer-b", dec!(2)).await.unwrap());

        let page = market.fetch(&query(None)).await.unwrap();
        assert_eq!(page.listings.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_insufficient_balance() {
        let market = MockMarketplace::new(vec![vec![listing("a", "A", dec!(50), 0)]], dec!(10));
        let err = market.buy("offer-a", dec!(50)).await.unwrap_err();
        assert!(err.to_string().contains("Insufficient"));
        assert!(market.purchases().is_empty());
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let market = market();
        market.set_error("502 Bad Gateway");
        assert!(market.fetch(&query(None)).await.is_err());
        market.clear_error();
        assert!(market.fetch(&query(None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_oracle_guard() {
        let oracle = MockOracle::new(&[("A", dec!(12)), ("B", dec!(40))]);
        assert_eq!(
            oracle.predict_with_guard("A", dec!(10), None, false).await.unwrap(),
            Some(dec!(12))
        );
        assert_eq!(oracle.predict_with_guard("B", dec!(10), None, false).await.unwrap(), None);
        assert_eq!(oracle.predict_with_guard("Z", dec!(10), None, false).await.unwrap(), None);
        assert_eq!(oracle.calls().len(), 3);
    }
}
