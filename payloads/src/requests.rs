use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AccountOwner, AccountStatus, AffiliateId, BuyerId, ItemType, OrderId,
    OrderItemId, PayoutDestination, ProductId, SellerId, WithdrawalId,
};

pub const DESCRIPTION_MAX_LEN: usize = 255;

/// Provision the digital account for a newly approved seller or affiliate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub owner: AccountOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAccountStatus {
    pub owner: AccountOwner,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccount {
    pub owner: AccountOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountEntries {
    pub owner: AccountOwner,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePayoutDestination {
    pub owner: AccountOwner,
    pub destination: PayoutDestination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestWithdrawal {
    pub affiliate_id: AffiliateId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWithdrawals {
    pub affiliate_id: AffiliateId,
}

/// Mirror of an order as reported by order-management.
///
/// The settlement engine does not own order state; it records the narrow
/// slice it needs to settle and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOrder {
    pub order_id: OrderId,
    pub buyer_id: Option<BuyerId>,
    pub shipping_address: Option<String>,
    pub fraud_status: Option<String>,
    pub affiliate_id: Option<AffiliateId>,
    /// Commission promised to the attributed affiliate, if any.
    pub affiliate_commission: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOrderItem {
    pub order_id: OrderId,
    /// Present for updates; omitted to create a new line.
    pub item_id: Option<OrderItemId>,
    pub product_id: ProductId,
    pub seller_id: Option<SellerId>,
    pub item_type: ItemType,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Supplier cost basis; required for dropshipping items.
    pub cost_price: Option<Decimal>,
    /// The seller's active commission rate, percent in [0, 100].
    pub commission_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleOrderPayment {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkOrderProcessing {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkOrderDelivered {
    pub order_id: OrderId,
    /// Delivery time reported by order-management; defaults to now.
    pub delivered_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCommissions {
    /// Restrict the run to these orders; `None` processes the full
    /// eligible set.
    pub order_ids: Option<Vec<OrderId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveWithdrawal {
    pub withdrawal_id: WithdrawalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectWithdrawal {
    pub withdrawal_id: WithdrawalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkWithdrawalPaid {
    pub withdrawal_id: WithdrawalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAudit {
    /// Orders in processing for longer than this many hours are flagged
    /// as stuck. Defaults to 72.
    pub stuck_after_hours: Option<i64>,
}
