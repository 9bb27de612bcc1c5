//! Shared types for the settlement engine API.
//!
//! These types cross the wire between the API and its callers (operator
//! tooling, the storefront backend, and the integration tests). Database
//! deserialization is available behind the `use-sqlx` feature so that
//! clients without a database dependency can still use the crate.

use derive_more::Display;
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::{
    APIClient, ClientError, SERVICE_TOKEN_HEADER, ok_body, ok_empty,
};

#[cfg(feature = "use-sqlx")]
use jiff_sqlx::Timestamp as SqlxTs;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct AccountId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct LedgerEntryId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct SellerId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct AffiliateId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct BuyerId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct OrderId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct OrderItemId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct ProductId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct AffiliateSaleId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct WithdrawalId(pub Uuid);

/// Wrapper for decoding nullable timestamp columns via
/// `#[sqlx(try_from = "OptionalTimestamp")]`.
#[cfg(feature = "use-sqlx")]
#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct OptionalTimestamp(pub Option<SqlxTs>);

#[cfg(feature = "use-sqlx")]
impl From<OptionalTimestamp> for Option<Timestamp> {
    fn from(x: OptionalTimestamp) -> Option<Timestamp> {
        x.0.map(|x| x.to_jiff())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "account_owner_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AccountOwnerType {
    Seller,
    Affiliate,
}

/// The party a digital account belongs to.
///
/// Sellers and affiliates each get exactly one account, created when the
/// owner is approved on the platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum AccountOwner {
    Seller(SellerId),
    Affiliate(AffiliateId),
}

impl AccountOwner {
    pub fn owner_type(&self) -> AccountOwnerType {
        match self {
            Self::Seller(_) => AccountOwnerType::Seller,
            Self::Affiliate(_) => AccountOwnerType::Affiliate,
        }
    }

    pub fn owner_id(&self) -> Uuid {
        match self {
            Self::Seller(id) => id.0,
            Self::Affiliate(id) => id.0,
        }
    }

    pub fn from_parts(owner_type: AccountOwnerType, owner_id: Uuid) -> Self {
        match owner_type {
            AccountOwnerType::Seller => Self::Seller(SellerId(owner_id)),
            AccountOwnerType::Affiliate => {
                Self::Affiliate(AffiliateId(owner_id))
            }
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "account_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Blocked,
}

/// Kinds of balance-affecting ledger entries.
///
/// The type determines the sign of the posted amount; callers only ever
/// supply positive magnitudes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "entry_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Sale,
    Commission,
    Withdrawal,
    Refund,
    Bonus,
    AdjustmentCredit,
    AdjustmentDebit,
    Chargeback,
    Fee,
    TransferIn,
    TransferOut,
}

impl EntryType {
    /// Whether entries of this type remove funds from an account owned by
    /// the given party.
    ///
    /// Commission is the one context-dependent case: it credits an
    /// affiliate's wallet but is the platform's deduction on a seller's
    /// account.
    pub fn is_debit_for(&self, owner: AccountOwnerType) -> bool {
        match self {
            Self::Commission => owner == AccountOwnerType::Seller,
            Self::Withdrawal
            | Self::Refund
            | Self::AdjustmentDebit
            | Self::Chargeback
            | Self::Fee
            | Self::TransferOut => true,
            Self::Sale
            | Self::Bonus
            | Self::AdjustmentCredit
            | Self::TransferIn => false,
        }
    }

    /// Apply this type's sign to a positive magnitude.
    pub fn signed_for(
        &self,
        owner: AccountOwnerType,
        magnitude: Decimal,
    ) -> Decimal {
        if self.is_debit_for(owner) {
            -magnitude
        } else {
            magnitude
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "entry_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Pending,
    Failed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PaymentConfirmed,
    Processing,
    Shipped,
    Delivered,
    Canceled,
}

impl OrderStatus {
    /// Item edits are only allowed before payment is confirmed.
    pub fn is_pre_payment(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "item_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Dropshipping,
    Stock,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "sale_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Confirmed,
    Paid,
    Rejected,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "withdrawal_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "pix_key_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PixKeyType {
    Cpf,
    Cnpj,
    Email,
    Phone,
    Random,
}

/// Where fund transfers for a withdrawal should land.
///
/// Structured on purpose: the destination is validated when it is written,
/// not when the payout service eventually tries to use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutDestination {
    Pix {
        key_type: PixKeyType,
        key: String,
    },
    BankAccount {
        bank_code: String,
        branch: String,
        account_number: String,
        holder_name: String,
        holder_document: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutDestinationError {
    #[error("Pix key must not be empty")]
    EmptyPixKey,
    #[error("Pix key has the wrong shape for its declared type")]
    MalformedPixKey,
    #[error("Bank account field '{0}' must not be empty")]
    EmptyBankField(&'static str),
}

impl PayoutDestination {
    /// Validate at write time so a withdrawal can never reference a
    /// destination that the payout service cannot use.
    pub fn validate(&self) -> Result<(), PayoutDestinationError> {
        match self {
            Self::Pix { key_type, key } => {
                if key.trim().is_empty() {
                    return Err(PayoutDestinationError::EmptyPixKey);
                }
                let digits = key.chars().filter(|c| c.is_ascii_digit()).count();
                let well_formed = match key_type {
                    PixKeyType::Cpf => digits == 11,
                    PixKeyType::Cnpj => digits == 14,
                    PixKeyType::Email => key.contains('@'),
                    PixKeyType::Phone => digits >= 10,
                    // random keys are UUIDs issued by the central bank
                    PixKeyType::Random => key.len() == 36,
                };
                if !well_formed {
                    return Err(PayoutDestinationError::MalformedPixKey);
                }
                Ok(())
            }
            Self::BankAccount {
                bank_code,
                branch,
                account_number,
                holder_name,
                holder_document,
            } => {
                let fields = [
                    ("bank_code", bank_code),
                    ("branch", branch),
                    ("account_number", account_number),
                    ("holder_name", holder_name),
                    ("holder_document", holder_document),
                ];
                for (name, value) in fields {
                    if value.trim().is_empty() {
                        return Err(PayoutDestinationError::EmptyBankField(
                            name,
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

/// A seller digital account or affiliate wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: AccountOwner,
    pub status: AccountStatus,
    pub balance: Decimal,
    pub blocked_balance: Decimal,
    pub total_received: Decimal,
    pub total_withdrawn: Decimal,
    pub payout_destination: Option<PayoutDestination>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One immutable balance-affecting record in an account's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    /// Monotonic posting order. `created_at` can tie when several entries
    /// post in one transaction, so ordering goes by this instead.
    pub posting_seq: i64,
    pub account_id: AccountId,
    pub entry_type: EntryType,
    /// Signed amount; debit types carry negative values.
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    /// Originating order item / affiliate sale / withdrawal, when any.
    /// `(reference_id, entry_type)` is unique, which is what makes posting
    /// idempotent.
    pub reference_id: Option<Uuid>,
    pub status: EntryStatus,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "OptionalTimestamp"))]
    pub processed_at: Option<Timestamp>,
}

/// A commission owed to an affiliate for one delivered order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct AffiliateSale {
    pub id: AffiliateSaleId,
    pub affiliate_id: AffiliateId,
    pub order_id: OrderId,
    pub commission_amount: Decimal,
    pub status: SaleStatus,
    /// Holdback expiry; the commission is withdrawable from this point on.
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub available_at: Timestamp,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "OptionalTimestamp"))]
    pub credited_at: Option<Timestamp>,
    pub withdrawal_id: Option<WithdrawalId>,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

/// A request to move matured commission out of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateWithdrawal {
    pub id: WithdrawalId,
    pub affiliate_id: AffiliateId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    /// Snapshot of the destination at request time.
    pub destination: PayoutDestination,
    pub requested_at: Timestamp,
    pub approved_at: Option<Timestamp>,
    pub rejected_at: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
}

/// Commission figures for one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub seller_revenue: Decimal,
    /// Total owed to the supplier; dropshipping lines only.
    pub supplier_cost: Option<Decimal>,
}
