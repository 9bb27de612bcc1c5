use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AffiliateSaleId, OrderId, OrderItemId, WithdrawalId, WithdrawalStatus,
};

/// Result of a successful withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub withdrawal_id: WithdrawalId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    /// Sales consumed to cover the request, oldest first.
    pub consumed_sales: Vec<AffiliateSaleId>,
    pub requested_at: Timestamp,
}

/// Per-order outcome of a commission release run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The commission was credited to the affiliate's wallet in this run.
    Credited { amount: Decimal },
    /// A durable marker showed the commission was credited previously.
    AlreadyCredited,
    /// The sale exists but its holdback has not elapsed yet.
    NotYetAvailable { available_at: Timestamp },
    /// The order is not eligible (not delivered, or no attribution).
    Skipped,
    /// Processing this order failed; the rest of the batch continued.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub outcomes: Vec<(OrderId, ReleaseOutcome)>,
}

impl ReleaseReport {
    pub fn credited_total(&self) -> Decimal {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                ReleaseOutcome::Credited { amount } => *amount,
                _ => Decimal::ZERO,
            })
            .sum()
    }
}

/// One order line with its computed commission figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: crate::ProductId,
    pub seller_id: Option<crate::SellerId>,
    pub item_type: crate::ItemType,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub seller_revenue: Decimal,
    pub supplier_cost: Option<Decimal>,
}

/// Read-only structural findings for operator dashboards.
///
/// The auditor never mutates anything; remediation is a separate,
/// explicit operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuditReport {
    /// Orders sitting in processing beyond the expected window.
    pub stuck_processing: i64,
    pub missing_buyer: i64,
    pub missing_shipping_address: i64,
    pub missing_fraud_status: i64,
    /// Dropshipping lines that never resolved to a seller.
    pub dropship_items_without_seller: i64,
    pub orders_without_items: i64,
    /// Accounts whose ledger chain fails verification.
    pub broken_ledger_chains: i64,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}
