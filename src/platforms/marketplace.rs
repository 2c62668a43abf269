//! Primary marketplace REST integration.
//!
//! Implements the listing feed and the purchase endpoint. Raw payloads
//! are normalized here into `ListingSnapshot` so the engine never sees
//! marketplace-specific shapes.
//!
//! Auth: `X-Api-Key` header. Request signing is handled by the gateway
//! in front of the marketplace and is not done here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{FeedQuery, ListingFeed, Purchaser, RawPrice};
use crate::types::{FeedPage, ListingSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ITEMS_PATH: &str = "/exchange/v1/market/items";
const BUY_PATH: &str = "/exchange/v1/offers-buy";

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

const STAT_TRAK_MARKER: &str = "StatTrak";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MarketItemsResponse {
    #[serde(default)]
    objects: Vec<MarketItem>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketItem {
    item_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: Option<RawPrice>,
    #[serde(default)]
    extra: MarketItemExtra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketItemExtra {
    #[serde(default)]
    float_value: Option<f64>,
    /// Remaining trade lock in seconds.
    #[serde(default)]
    trade_lock_duration: Option<u64>,
    #[serde(default)]
    offer_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct BuyRequest<'a> {
    offers: Vec<BuyOffer<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyOffer<'a> {
    offer_id: &'a str,
    price: BuyPrice,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct BuyPrice {
    /// Amount in cents, as a string.
    amount: String,
    currency: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuyResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    order_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Marketplace REST client.
pub struct MarketplaceClient {
    http: Client,
    base_url: String,
    api_key: Secret<String>,
    max_retries: u32,
}

impl MarketplaceClient {
    pub fn new(
        base_url: &str,
        api_key: Secret<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("smart-scanner/0.1.0")
            .build()
            .context("Failed to build HTTP client for marketplace")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("X-Api-Key", self.api_key.expose_secret())
    }

    /// Send with bounded retries on transport errors, 429 and 5xx.
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(status = %status, attempt, what, "Retryable marketplace error");
                        last_error = Some(format!("HTTP {status}: {body}"));
                        continue;
                    }
                    anyhow::bail!("Marketplace {what} error {status}: {body}");
                }
                Err(e) => {
                    warn!(error = %e, attempt, what, "Marketplace request failed");
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        anyhow::bail!(
            "Marketplace {what} failed after {} retries: {}",
            self.max_retries,
            last_error.unwrap_or_default()
        )
    }

    /// Build the query string for a page request.
    fn items_params(query: &FeedQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("gameId", query.game.api_id().to_string()),
            ("limit", query.limit.to_string()),
            ("currency", "USD".to_string()),
            ("orderBy", "updated".to_string()),
            ("orderDir", "desc".to_string()),
        ];
        if let Some(ceiling) = query.price_ceiling {
            let cents = (ceiling * Decimal::ONE_HUNDRED).round();
            params.push(("priceTo", cents.to_string()));
        }
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }
        params
    }

    /// Convert a raw item into a listing snapshot. Unparseable prices
    /// become zero, which the engine discards as malformed.
    fn convert_item(item: MarketItem) -> ListingSnapshot {
        let price = item
            .price
            .as_ref()
            .and_then(RawPrice::to_usd)
            .unwrap_or(Decimal::ZERO);
        let stat_trak = item.title.contains(STAT_TRAK_MARKER);

        ListingSnapshot {
            item_id: item.item_id,
            title: item.title,
            price,
            float_value: item.extra.float_value,
            stat_trak,
            lock_seconds: item.extra.trade_lock_duration.unwrap_or(0),
            offer_id: item.extra.offer_id.unwrap_or_default(),
        }
    }

    fn convert_page(resp: MarketItemsResponse) -> FeedPage {
        let listings = resp.objects.into_iter().map(Self::convert_item).collect();
        FeedPage::new(listings, resp.cursor)
    }
}

/// Delay before retry number `attempt` (1-based): 500ms doubling, capped.
fn backoff(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

#[async_trait]
impl ListingFeed for MarketplaceClient {
    async fn fetch(&self, query: &FeedQuery) -> Result<FeedPage> {
        let params = Self::items_params(query);
        debug!(game = %query.game, cursor = ?query.cursor, "Fetching marketplace page");

        let response = self
            .send_with_retry("items", || self.request(Method::GET, ITEMS_PATH).query(&params))
            .await?;
        let body: MarketItemsResponse = response
            .json()
            .await
            .context("Failed to parse marketplace items response")?;

        let page = Self::convert_page(body);
        debug!(
            listings = page.listings.len(),
            has_next = page.next_cursor.is_some(),
            "Marketplace page fetched"
        );
        Ok(page)
    }
}

#[async_trait]
impl Purchaser for MarketplaceClient {
    async fn buy(&self, purchase_id: &str, price: Decimal) -> Result<bool> {
        let request = BuyRequest {
            offers: vec![BuyOffer {
                offer_id: purchase_id,
                price: BuyPrice {
                    amount: (price * Decimal::ONE_HUNDRED).round().to_string(),
                    currency: "USD",
                },
                kind: "dmarket",
            }],
        };

        // Purchases are not idempotent, so no retry here.
        let response = self
            .request(Method::PATCH, BUY_PATH)
            .json(&request)
            .send()
            .await
            .context("Marketplace buy request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Marketplace buy error {status}: {body}");
        }

        let body: BuyResponse = response
            .json()
            .await
            .context("Failed to parse marketplace buy response")?;

        let accepted = matches!(body.status.as_str(), "TxPending" | "TxSuccess");
        info!(
            purchase_id,
            price = %price,
            status = %body.status,
            order_id = ?body.order_id,
            "Marketplace buy response"
        );
        Ok(accepted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
