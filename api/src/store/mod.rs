//! Database store for the settlement engine.
//!
//! ## Design Decisions
//!
//! ### Single choke point for balances
//! - Account balances and lifetime totals are only ever written by
//!   `ledger::post_entry_tx`. Every other module goes through it; nothing
//!   else touches the balance-bearing columns.
//!
//! ### Time Source Dependency
//! - Functions that need current time accept a `TimeSource` parameter
//!   instead of creating their own, so holdback maturity and settlement
//!   timing can be mocked during tests.
//!
//! ### Database Triggers
//! - `updated_at` columns are maintained by database triggers; application
//!   code never sets them manually.
//!
//! ### Type Safety
//! - All id types implement `sqlx::Type` transparently, so they bind
//!   directly in queries without unwrapping the inner UUID.

use derive_more::Display;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTs;
use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use payloads::{
    Account, AccountId, AccountOwner, AccountOwnerType, AccountStatus,
    AffiliateId, BuyerId, OptionalTimestamp, OrderId, OrderItemId,
    PayoutDestination, PayoutDestinationError, PixKeyType, ProductId,
    SellerId, WithdrawalId, WithdrawalStatus,
};

use crate::commission::CommissionError;
use crate::time::TimeSource;

pub mod audit;
pub mod ledger;
pub mod orders;
pub mod withdrawal;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Account not found")]
    AccountNotFound,
    #[error("Order not found")]
    OrderNotFound,
    #[error("Order item not found")]
    OrderItemNotFound,
    #[error("Affiliate sale not found")]
    AffiliateSaleNotFound,
    #[error("Withdrawal not found")]
    WithdrawalNotFound,
    #[error("Account is not eligible for this operation")]
    AccountNotEligible,
    #[error("No payout destination is configured")]
    PayoutDestinationMissing,
    #[error("Requested amount is below the platform minimum of {minimum}")]
    BelowMinimumAmount { minimum: Decimal },
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Available balance {available} does not cover the request")]
    InsufficientAvailableBalance { available: Decimal },
    #[error("Amount must be positive")]
    AmountMustBePositive,
    #[error("Field too long")]
    FieldTooLong,
    #[error("Order is no longer editable")]
    OrderNotEditable,
    #[error("Order cannot be settled from its current state")]
    OrderNotSettleable,
    #[error("Withdrawal cannot move from {from} to {to}")]
    InvalidWithdrawalTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },
    #[error("Stored payout destination columns are inconsistent")]
    InvalidPayoutDestinationColumns,
    #[error(transparent)]
    InvalidPayoutDestination(#[from] PayoutDestinationError),
    #[error(transparent)]
    Commission(#[from] CommissionError),
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}

/// Discriminant for the structured payout destination columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, sqlx::Type,
)]
#[sqlx(type_name = "payout_kind", rename_all = "snake_case")]
pub enum PayoutKind {
    Pix,
    BankAccount,
}

/// The payout destination spread over nullable columns, as stored on both
/// accounts and withdrawal snapshots.
#[derive(Debug, Clone, Default, FromRow)]
pub struct DestinationColumns {
    pub payout_kind: Option<PayoutKind>,
    pub pix_key_type: Option<PixKeyType>,
    pub pix_key: Option<String>,
    pub bank_code: Option<String>,
    pub branch: Option<String>,
    pub account_number: Option<String>,
    pub holder_name: Option<String>,
    pub holder_document: Option<String>,
}

impl DestinationColumns {
    pub fn from_destination(destination: &PayoutDestination) -> Self {
        match destination {
            PayoutDestination::Pix { key_type, key } => Self {
                payout_kind: Some(PayoutKind::Pix),
                pix_key_type: Some(*key_type),
                pix_key: Some(key.clone()),
                ..Self::default()
            },
            PayoutDestination::BankAccount {
                bank_code,
                branch,
                account_number,
                holder_name,
                holder_document,
            } => Self {
                payout_kind: Some(PayoutKind::BankAccount),
                bank_code: Some(bank_code.clone()),
                branch: Some(branch.clone()),
                account_number: Some(account_number.clone()),
                holder_name: Some(holder_name.clone()),
                holder_document: Some(holder_document.clone()),
                ..Self::default()
            },
        }
    }

    pub fn into_destination(
        self,
    ) -> Result<Option<PayoutDestination>, StoreError> {
        let Some(kind) = self.payout_kind else {
            return Ok(None);
        };
        let destination = match kind {
            PayoutKind::Pix => PayoutDestination::Pix {
                key_type: self
                    .pix_key_type
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
                key: self
                    .pix_key
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
            },
            PayoutKind::BankAccount => PayoutDestination::BankAccount {
                bank_code: self
                    .bank_code
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
                branch: self
                    .branch
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
                account_number: self
                    .account_number
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
                holder_name: self
                    .holder_name
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
                holder_document: self
                    .holder_document
                    .ok_or(StoreError::InvalidPayoutDestinationColumns)?,
            },
        };
        Ok(Some(destination))
    }
}

/// Database-level account struct that matches the accounts table schema.
#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: AccountId,
    pub owner_type: AccountOwnerType,
    pub owner_id: Uuid,
    pub status: AccountStatus,
    pub balance: Decimal,
    pub blocked_balance: Decimal,
    pub total_received: Decimal,
    pub total_withdrawn: Decimal,
    #[sqlx(flatten)]
    pub destination: DestinationColumns,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl TryFrom<DbAccount> for Account {
    type Error = StoreError;

    fn try_from(db: DbAccount) -> Result<Self, Self::Error> {
        Ok(Account {
            id: db.id,
            owner: AccountOwner::from_parts(db.owner_type, db.owner_id),
            status: db.status,
            balance: db.balance,
            blocked_balance: db.blocked_balance,
            total_received: db.total_received,
            total_withdrawn: db.total_withdrawn,
            payout_destination: db.destination.into_destination()?,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Create the digital account for a newly approved seller or affiliate.
pub async fn create_account(
    owner: AccountOwner,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Account, StoreError> {
    let now = time_source.now();

    let db_account = sqlx::query_as::<_, DbAccount>(
        r#"
        INSERT INTO accounts (owner_type, owner_id, created_at, updated_at)
        VALUES ($1, $2, $3, $3)
        RETURNING *
        "#,
    )
    .bind(owner.owner_type())
    .bind(owner.owner_id())
    .bind(now.to_sqlx())
    .fetch_one(pool)
    .await?;

    db_account.try_into()
}

/// Get account by owner within a transaction.
pub(crate) async fn get_account_tx(
    owner: AccountOwner,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<DbAccount, StoreError> {
    sqlx::query_as::<_, DbAccount>(
        "SELECT * FROM accounts WHERE owner_type = $1 AND owner_id = $2",
    )
    .bind(owner.owner_type())
    .bind(owner.owner_id())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::AccountNotFound)
}

/// Get account by owner and lock for update.
///
/// Locks the account row using SELECT FOR UPDATE, preventing concurrent
/// modifications until the transaction commits. Must be called inside a
/// transaction. This is what serializes all balance changes and withdrawal
/// requests for one owner.
pub(crate) async fn get_account_for_update_tx(
    owner: AccountOwner,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<DbAccount, StoreError> {
    sqlx::query_as::<_, DbAccount>(
        r#"
        SELECT * FROM accounts
        WHERE owner_type = $1 AND owner_id = $2
        FOR UPDATE
        "#,
    )
    .bind(owner.owner_type())
    .bind(owner.owner_id())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::AccountNotFound)
}

/// Lock an account row by id.
pub(crate) async fn get_account_by_id_for_update_tx(
    account_id: &AccountId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<DbAccount, StoreError> {
    sqlx::query_as::<_, DbAccount>(
        "SELECT * FROM accounts WHERE id = $1 FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::AccountNotFound)
}

/// Get account by owner.
pub async fn get_account(
    owner: AccountOwner,
    pool: &PgPool,
) -> Result<Account, StoreError> {
    let mut tx = pool.begin().await?;
    let account = get_account_tx(owner, &mut tx).await?;
    account.try_into()
}

/// Replace the owner's payout destination, validating it at write time.
pub async fn update_payout_destination(
    owner: AccountOwner,
    destination: &PayoutDestination,
    pool: &PgPool,
) -> Result<(), StoreError> {
    destination.validate()?;
    let columns = DestinationColumns::from_destination(destination);

    let updated = sqlx::query(
        r#"
        UPDATE accounts
        SET payout_kind = $1,
            pix_key_type = $2,
            pix_key = $3,
            bank_code = $4,
            branch = $5,
            account_number = $6,
            holder_name = $7,
            holder_document = $8
        WHERE owner_type = $9 AND owner_id = $10
        "#,
    )
    .bind(columns.payout_kind)
    .bind(columns.pix_key_type)
    .bind(&columns.pix_key)
    .bind(&columns.bank_code)
    .bind(&columns.branch)
    .bind(&columns.account_number)
    .bind(&columns.holder_name)
    .bind(&columns.holder_document)
    .bind(owner.owner_type())
    .bind(owner.owner_id())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound);
    }
    Ok(())
}

/// Administrative status change. Accounts are never deleted; suspension is
/// the off switch.
pub async fn set_account_status(
    owner: AccountOwner,
    status: AccountStatus,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let updated =
        sqlx::query(
            "UPDATE accounts SET status = $1 WHERE owner_type = $2 AND owner_id = $3",
        )
        .bind(status)
        .bind(owner.owner_type())
        .bind(owner.owner_id())
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound);
    }
    Ok(())
}

/// Order mirror row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub status: payloads::OrderStatus,
    pub buyer_id: Option<BuyerId>,
    pub shipping_address: Option<String>,
    pub fraud_status: Option<String>,
    pub affiliate_id: Option<AffiliateId>,
    pub affiliate_commission: Option<Decimal>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub settled_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub paid_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub delivered_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

/// A commission-bearing order line as stored.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub seller_id: Option<SellerId>,
    pub item_type: payloads::ItemType,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub seller_revenue: Decimal,
    pub supplier_cost: Option<Decimal>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl From<OrderItem> for payloads::responses::OrderItem {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            order_id: item.order_id,
            product_id: item.product_id,
            seller_id: item.seller_id,
            item_type: item.item_type,
            quantity: item.quantity,
            unit_price: item.unit_price,
            cost_price: item.cost_price,
            commission_rate: item.commission_rate,
            commission_amount: item.commission_amount,
            seller_revenue: item.seller_revenue,
            supplier_cost: item.supplier_cost,
        }
    }
}

/// Withdrawal row with its destination snapshot columns.
#[derive(Debug, Clone, FromRow)]
pub struct DbWithdrawal {
    pub id: WithdrawalId,
    pub affiliate_id: AffiliateId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    #[sqlx(flatten)]
    pub destination: DestinationColumns,
    #[sqlx(try_from = "SqlxTs")]
    pub requested_at: Timestamp,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub approved_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub rejected_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub paid_at: Option<Timestamp>,
}

impl TryFrom<DbWithdrawal> for payloads::AffiliateWithdrawal {
    type Error = StoreError;

    fn try_from(db: DbWithdrawal) -> Result<Self, Self::Error> {
        let destination = db
            .destination
            .into_destination()?
            .ok_or(StoreError::InvalidPayoutDestinationColumns)?;

        Ok(Self {
            id: db.id,
            affiliate_id: db.affiliate_id,
            amount: db.amount,
            status: db.status,
            destination,
            requested_at: db.requested_at,
            approved_at: db.approved_at,
            rejected_at: db.rejected_at,
            paid_at: db.paid_at,
        })
    }
}
