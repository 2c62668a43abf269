//! Secondary marketplace price quotes.
//!
//! Looks up the lowest live ask for an item title on the secondary
//! market. Prices on this API are integers in thousandths of a dollar.
//! Quotes backed by too few listings are treated as absent.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::QuoteSource;
use crate::types::{GameId, SecondaryQuote};

const PRICES_PATH: &str = "/v1/prices";
const MILLS_PER_DOLLAR: i64 = 1000;

#[derive(Debug, Deserialize)]
struct PricesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    items: Vec<PriceItem>,
}

#[derive(Debug, Deserialize)]
struct PriceItem {
    name: String,
    /// Lowest ask in thousandths of a dollar.
    #[serde(default)]
    min: i64,
    #[serde(default)]
    count: u32,
}

pub struct HttpQuoteClient {
    http: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    game: GameId,
    min_liquidity: u32,
}

impl HttpQuoteClient {
    pub fn new(
        base_url: &str,
        api_key: Option<Secret<String>>,
        game: GameId,
        min_liquidity: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("smart-scanner/0.1.0")
            .build()
            .context("Failed to build HTTP client for secondary market")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            game,
            min_liquidity,
        })
    }

    /// Pick the quote matching `title` exactly, if liquid enough.
    fn select_quote(resp: PricesResponse, title: &str, min_liquidity: u32) -> Option<SecondaryQuote> {
        if !resp.success {
            return None;
        }
        let item = resp.items.into_iter().find(|i| i.name == title)?;
        if item.min <= 0 || item.count < min_liquidity {
            return None;
        }
        Some(SecondaryQuote {
            price: Decimal::new(item.min, 0) / Decimal::new(MILLS_PER_DOLLAR, 0),
            liquidity: item.count,
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteClient {
    async fn lookup(&self, title: &str) -> Result<Option<SecondaryQuote>> {
        let mut url = format!(
            "{}{PRICES_PATH}?game={}&name={}",
            self.base_url,
            self.game,
            urlencoding::encode(title)
        );
        if let Some(key) = &self.api_key {
            url.push_str(&format!("&api={}", urlencoding::encode(key.expose_secret())));
        }

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Secondary market request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Secondary market error {status}: {body}");
        }

        let body: PricesResponse = resp
            .json()
            .await
            .context("Failed to parse secondary market prices")?;

        let quote = Self::select_quote(body, title, self.min_liquidity);
        debug!(title, quote = ?quote, "Secondary quote");
        Ok(quote)
    }
}
