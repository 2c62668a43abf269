//! Purchase executor.
//!
//! Applies the execution policy to buy decisions. In dry-run mode it
//! only logs and hands back a simulated receipt; live mode calls the
//! purchase endpoint. Errors never propagate: a failed purchase is an
//! outcome, not a reason to stop scanning.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::platforms::Purchaser;
use crate::types::{PurchaseReceipt, ScanDecision};

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Logged only. Counts as an opportunity, never as a purchase.
    DryRun(PurchaseReceipt),
    Purchased(PurchaseReceipt),
    /// The marketplace answered but did not accept the order.
    Declined,
    Failed(String),
}

impl ExecutionOutcome {
    pub fn is_purchase(&self) -> bool {
        matches!(self, ExecutionOutcome::Purchased(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionOutcome::Declined | ExecutionOutcome::Failed(_))
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    purchaser: Option<Arc<dyn Purchaser>>,
    dry_run: bool,
}

impl Executor {
    pub fn new(purchaser: Option<Arc<dyn Purchaser>>, dry_run: bool) -> Self {
        Self { purchaser, dry_run }
    }

    /// Execute one buy decision.
    pub async fn execute(&self, decision: &ScanDecision) -> ExecutionOutcome {
        let purchase_id = decision.purchase_id();

        if self.dry_run {
            info!(
                item_id = %decision.item_id,
                title = %decision.title,
                price = format!("${:.2}", decision.market_price),
                profit = format!("{:.1}%", decision.profit_percent),
                reason = %decision.reason,
                "[DRY RUN] Would buy"
            );
            return ExecutionOutcome::DryRun(PurchaseReceipt::dry_run(
                &decision.item_id,
                decision.market_price,
            ));
        }

        let Some(purchaser) = &self.purchaser else {
            warn!(item_id = %decision.item_id, "Live mode without a purchase endpoint");
            return ExecutionOutcome::Failed("no purchase endpoint configured".to_string());
        };

        match purchaser.buy(purchase_id, decision.market_price).await {
            Ok(true) => {
                info!(
                    item_id = %decision.item_id,
                    purchase_id,
                    price = format!("${:.2}", decision.market_price),
                    "Purchase completed"
                );
                ExecutionOutcome::Purchased(PurchaseReceipt {
                    reference: purchase_id.to_string(),
                    item_id: decision.item_id.clone(),
                    price: decision.market_price,
                    dry_run: false,
                    timestamp: Utc::now(),
                })
            }
            Ok(false) => {
                warn!(item_id = %decision.item_id, purchase_id, "Purchase declined");
                ExecutionOutcome::Declined
            }
            Err(e) => {
                warn!(item_id = %decision.item_id, purchase_id, error = %e, "Purchase failed");
                ExecutionOutcome::Failed(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PurchaseReceipt helpers
// ---------------------------------------------------------------------------

impl PurchaseReceipt {
    /// Create a dry-run receipt (no real execution).
    pub fn dry_run(item_id: &str, price: Decimal) -> Self {
        Self {
            reference: format!("dry-run-{}", uuid::Uuid::new_v4()),
            item_id: item_id.to_string(),
            price,
            dry_run: true,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
