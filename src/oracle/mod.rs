//! Fair-price oracle integration.
//!
//! Defines the `FairPriceOracle` trait and the guard band that every
//! implementation applies before returning a price. A returned fair
//! price always exceeds the market price by no more than the configured
//! deviation, so the evaluator can trust it as-is.

pub mod predictor;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Guarded fair-price prediction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FairPriceOracle: Send + Sync {
    /// Predict a fair price for the item. `Ok(None)` means the oracle
    /// declined: no prediction, or a prediction outside the guard band.
    async fn predict_with_guard(
        &self,
        title: &str,
        price: Decimal,
        float_value: Option<f64>,
        stat_trak: bool,
    ) -> Result<Option<Decimal>>;
}

/// Accept a raw prediction only if it is above the market price and the
/// premium does not exceed `max_deviation_percent`.
///
/// Predictions far above the market are far more likely to be model
/// errors than real mispricings.
pub fn apply_guard(
    market_price: Decimal,
    predicted: Decimal,
    max_deviation_percent: Decimal,
) -> Option<Decimal> {
    if market_price <= Decimal::ZERO || predicted <= market_price {
        return None;
    }
    let deviation = (predicted - market_price) / market_price * dec!(100);
    if deviation > max_deviation_percent {
        debug!(
            market = %market_price,
            predicted = %predicted,
            deviation = %deviation.round_dp(1),
            "Prediction outside guard band"
        );
        return None;
    }
    Some(predicted)
}
