//! Scanner sessions against the in-memory marketplace.
//!
//! Catalog used throughout (min profit 5%, oracle band 50%):
//!
//! | page | item   | price | lock | oracle | secondary      | expected            |
//! |------|--------|-------|------|--------|----------------|---------------------|
//! | 0    | redline| 10    | 0    | 12     |                | buy (AI +20%)       |
//! | 0    | asiimov| 50    | 0    | 51     |                | skip (AI +2%)       |
//! | 0    | howl   | 100   | 0    | 400    | 120 x10        | buy (secondary)     |
//! | 1    | karam. | 200   | 3d   | 230    |                | lock policy         |
//! | 1    | deagle | 20    | 2d   | none   |                | lock policy / veto  |
//! | 1    | glock  | 5     | 0    | none   |                | skip (no signal)    |
//! | 1    | usp    | 0     | 0    |        |                | discarded           |

#[cfg(test)]
mod tests {
    use crate::mock_marketplace::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    use smart_scanner::config::ScannerConfig;
    use smart_scanner::engine::evaluator::REASON_AI_LOCK_VETO;
    use smart_scanner::engine::scanner::{Collaborators, SmartScanner};
    use smart_scanner::oracle::FairPriceOracle;
    use smart_scanner::platforms::{Purchaser, QuoteSource};
    use smart_scanner::types::{opportunities, GameId};

    const REDLINE: &str = "AK-47 | Redline (Field-Tested)";
    const ASIIMOV: &str = "AWP | Asiimov (Field-Tested)";
    const HOWL: &str = "M4A4 | Howl (Minimal Wear)";
    const KARAMBIT: &str = "★ Karambit | Doppler (Factory New)";
    const DEAGLE: &str = "Desert Eagle | Blaze (Factory New)";
    const GLOCK: &str = "Glock-18 | Fade (Factory New)";
    const USP: &str = "USP-S | Kill Confirmed (Minimal Wear)";

    fn catalog() -> Vec<Vec<smart_scanner::types::ListingSnapshot>> {
        vec![
            vec![
                listing("redline", REDLINE, dec!(10), 0),
                listing("asiimov", ASIIMOV, dec!(50), 0),
                listing("howl", HOWL, dec!(100), 0),
            ],
            vec![
                listing("karambit", KARAMBIT, dec!(200), 3),
                listing("deagle", DEAGLE, dec!(20), 2),
                listing("glock", GLOCK, dec!(5), 0),
                listing("usp", USP, Decimal::ZERO, 0),
            ],
        ]
    }

    fn oracle() -> Arc<MockOracle> {
        Arc::new(MockOracle::new(&[
            (REDLINE, dec!(12)),
            (ASIIMOV, dec!(51)),
            (HOWL, dec!(400)),
            (KARAMBIT, dec!(230)),
        ]))
    }

    fn quotes() -> Arc<MockQuotes> {
        Arc::new(MockQuotes::new(&[(HOWL, dec!(120), 10)]))
    }

    fn config() -> ScannerConfig {
        ScannerConfig {
            game_id: "csgo".into(),
            min_profit_percent: dec!(5),
            scan_delay_ms: 0,
            ..Default::default()
        }
    }

    fn scanner(
        cfg: ScannerConfig,
        market: &Arc<MockMarketplace>,
        oracle: &Arc<MockOracle>,
        live: bool,
    ) -> SmartScanner {
        SmartScanner::new(
            cfg,
            Collaborators {
                feed: market.clone(),
                oracle: Some(oracle.clone() as Arc<dyn FairPriceOracle>),
                quotes: Some(quotes() as Arc<dyn QuoteSource>),
                purchaser: live.then(|| market.clone() as Arc<dyn Purchaser>),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_catalog_pass() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let mut scanner = scanner(config(), &market, &oracle, false);

        let stats = scanner.run_continuous(Some(2)).await;

        assert_eq!(stats.scans_completed, 2);
        assert_eq!(stats.items_analyzed, 6);
        assert_eq!(stats.items_skipped_lock, 2);
        assert_eq!(stats.opportunities_found, 2);
        assert_eq!(stats.purchases_made, 0);
        assert!(market.purchases().is_empty());
        assert_eq!(market.balance(), dec!(1000));
        // Locked items never reach the oracle
        assert!(!oracle.calls().iter().any(|t| t == KARAMBIT || t == DEAGLE));
        // Wrapped back to the start
        assert!(scanner.cursor().is_none());
    }

    #[tokio::test]
    async fn test_scan_once_page_decisions() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let mut scanner = scanner(config(), &market, &oracle, false);

        let decisions = scanner.scan_once(None).await;
        assert_eq!(decisions.len(), 3);

        let redline = &decisions[0];
        assert!(redline.should_buy);
        assert_eq!(redline.reason, "AI: +20.0%");
        assert_eq!(redline.profit_amount, dec!(2));

        assert!(!decisions[1].should_buy);
        assert!(decisions[1].reason.starts_with("AI profit too low"));

        let howl = &decisions[2];
        assert!(howl.should_buy);
        assert_eq!(howl.oracle_fair_price, None);
        assert_eq!(howl.secondary_price, Some(dec!(120)));
        assert_eq!(howl.reason, "Secondary: +12.8% (net $112.80)");

        let top = opportunities(&decisions, 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].item_id, "redline");

        assert_eq!(scanner.cursor(), Some("1"));
        assert_eq!(market.queries()[0].game, GameId::Csgo);
    }

    #[tokio::test]
    async fn test_live_session_with_locked_items() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let cfg = ScannerConfig {
            allow_locked: true,
            dry_run: false,
            ..config()
        };
        let mut scanner = scanner(cfg, &market, &oracle, true);

        let first = scanner.scan_once(None).await;
        let second = scanner.scan_once(Some("1")).await;

        let deagle = second.iter().find(|d| d.item_id == "deagle").unwrap();
        assert!(!deagle.should_buy);
        assert_eq!(deagle.reason, REASON_AI_LOCK_VETO);
        assert!(second.iter().any(|d| d.item_id == "karambit" && d.should_buy));
        assert_eq!(first.len() + second.len(), 6);

        let stats = scanner.get_stats();
        assert_eq!(stats.items_skipped_ai, 1);
        assert_eq!(stats.opportunities_found, 3);
        assert_eq!(stats.purchases_made, 3);
        assert_eq!(
            market.purchases(),
            vec!["offer-redline", "offer-howl", "offer-karambit"]
        );
        assert_eq!(market.balance(), dec!(690));
    }

    #[tokio::test]
    async fn test_bought_listings_leave_catalog() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let cfg = ScannerConfig {
            dry_run: false,
            ..config()
        };
        let mut scanner = scanner(cfg, &market, &oracle, true);

        // Page 0, page 1, wrap, page 0 again
        let stats = scanner.run_continuous(Some(3)).await;

        assert_eq!(stats.purchases_made, 2);
        assert_eq!(stats.opportunities_found, 2);
        assert_eq!(stats.purchases_failed, 0);
        assert_eq!(market.balance(), dec!(890));
        // Only the asiimov is left on page 0 and it is re-analyzed after the wrap
        assert_eq!(stats.items_analyzed, 7);
        assert_eq!(stats.items_skipped_duplicate, 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_counts_failures() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(50)));
        let oracle = oracle();
        let cfg = ScannerConfig {
            allow_locked: true,
            dry_run: false,
            ..config()
        };
        let mut scanner = scanner(cfg, &market, &oracle, true);

        let stats = scanner.run_continuous(Some(2)).await;

        assert_eq!(stats.opportunities_found, 3);
        assert_eq!(stats.purchases_made, 1);
        assert_eq!(stats.purchases_failed, 2);
        assert_eq!(market.balance(), dec!(40));
    }

    #[tokio::test]
    async fn test_feed_outage_and_recovery() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let mut scanner = scanner(config(), &market, &oracle, false);

        scanner.scan_once(None).await;
        assert_eq!(scanner.cursor(), Some("1"));

        market.set_error("503 Service Unavailable");
        let stats = scanner.run_continuous(Some(2)).await;
        assert_eq!(stats.pages_failed, 2);
        assert_eq!(stats.scans_completed, 1);
        // Retries the same page
        assert_eq!(scanner.cursor(), Some("1"));
        let cursors: Vec<Option<String>> =
            market.queries().into_iter().map(|q| q.cursor).collect();
        assert_eq!(cursors, vec![None, Some("1".into()), Some("1".into())]);

        market.clear_error();
        let stats = scanner.run_continuous(Some(1)).await;
        assert_eq!(stats.scans_completed, 2);
        assert_eq!(stats.items_skipped_lock, 2);
        assert!(scanner.cursor().is_none());
    }

    #[tokio::test]
    async fn test_price_ceiling_and_limit_reach_feed() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let cfg = ScannerConfig {
            price_ceiling: Some(dec!(60)),
            scan_limit: 2,
            ..config()
        };
        let mut scanner = scanner(cfg, &market, &oracle, false);

        let decisions = scanner.scan_once(None).await;
        let ids: Vec<&str> = decisions.iter().map(|d| d.item_id.as_str()).collect();
        assert_eq!(ids, vec!["redline", "asiimov"]);

        let query = &market.queries()[0];
        assert_eq!(query.limit, 2);
        assert_eq!(query.price_ceiling, Some(dec!(60)));
    }

    #[tokio::test]
    async fn test_repeat_scan_is_deduplicated_until_reset() {
        let market = Arc::new(MockMarketplace::new(catalog(), dec!(1000)));
        let oracle = oracle();
        let mut scanner = scanner(config(), &market, &oracle, false);

        assert_eq!(scanner.scan_once(None).await.len(), 3);
        assert!(scanner.scan_once(None).await.is_empty());
        assert_eq!(scanner.get_stats().items_skipped_duplicate, 3);

        scanner.reset_stats();
        assert_eq!(scanner.scan_once(None).await.len(), 3);
        assert_eq!(scanner.get_stats().opportunities_found, 2);
    }
}
