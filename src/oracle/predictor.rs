//! HTTP client for the fair-price prediction service.
//!
//! The service runs the trained price model and its own anomaly
//! filtering; this client posts the item features, reads back the raw
//! prediction and applies the guard band.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{apply_guard, FairPriceOracle};

const PREDICT_PATH: &str = "/predict";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    title: &'a str,
    price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    float_value: Option<f64>,
    stat_trak: bool,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    /// Raw model output in USD. Absent when the model has no opinion.
    #[serde(default)]
    fair_price: Option<f64>,
    /// Set by the service's anomaly filter.
    #[serde(default)]
    rejected: bool,
}

pub struct HttpFairPriceOracle {
    http: Client,
    base_url: String,
    max_deviation_percent: Decimal,
}

impl HttpFairPriceOracle {
    pub fn new(base_url: &str, max_deviation_percent: Decimal, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for price oracle")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_deviation_percent,
        })
    }

    fn interpret(&self, market_price: Decimal, resp: &PredictResponse) -> Option<Decimal> {
        if resp.rejected {
            return None;
        }
        let predicted = Decimal::from_f64(resp.fair_price?)?.round_dp(2);
        apply_guard(market_price, predicted, self.max_deviation_percent)
    }
}

#[async_trait]
impl FairPriceOracle for HttpFairPriceOracle {
    async fn predict_with_guard(
        &self,
        title: &str,
        price: Decimal,
        float_value: Option<f64>,
        stat_trak: bool,
    ) -> Result<Option<Decimal>> {
        let request = PredictRequest {
            title,
            price: price.to_f64().unwrap_or_default(),
            float_value,
            stat_trak,
        };

        let resp = self
            .http
            .post(format!("{}{PREDICT_PATH}", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Price oracle request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Price oracle error {status}: {body}");
        }

        let body: PredictResponse = resp
            .json()
            .await
            .context("Failed to parse price oracle response")?;

        let fair = self.interpret(price, &body);
        debug!(title, price = %price, raw = ?body.fair_price, fair = ?fair, "Oracle prediction");
        Ok(fair)
    }
}
