//! Withdrawal request processing.
//!
//! A withdrawal converts matured affiliate sales into a pending payout.
//! The whole request runs in one transaction that starts by locking the
//! affiliate's account row, so two concurrent requests from the same
//! affiliate are strictly serialized: the second one re-reads sale
//! availability only after the first has committed, and can never select a
//! sale the first already consumed.

use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::PgPool;

use payloads::{
    AccountOwner, AccountStatus, AffiliateId, AffiliateSale, AffiliateSaleId,
    EntryType, WithdrawalId, WithdrawalStatus, responses,
};

use super::{DbWithdrawal, StoreError, ledger};
use crate::time::TimeSource;

/// Pick sales to cover `requested`, oldest maturity first.
///
/// The final selected sale is consumed in full even when only part of its
/// commission is needed to reach the requested total. Returns `None` when
/// the matured sales cannot cover the request.
pub fn select_sales_fifo(
    sales: &[(AffiliateSaleId, Decimal)],
    requested: Decimal,
) -> Option<Vec<AffiliateSaleId>> {
    let mut selected = Vec::new();
    let mut covered = Decimal::ZERO;

    for (sale_id, amount) in sales {
        if covered >= requested {
            break;
        }
        selected.push(*sale_id);
        covered += *amount;
    }

    (covered >= requested).then_some(selected)
}

/// Validate and execute a withdrawal request.
///
/// Checks run in order: account eligibility, payout destination, platform
/// minimum, then FIFO coverage. On success, atomically: the withdrawal row
/// is created pending with a snapshot of the destination, the selected
/// sales are marked paid, and the WITHDRAWAL debit is posted.
#[tracing::instrument(skip(time_source, pool))]
pub async fn request_withdrawal(
    affiliate_id: &AffiliateId,
    amount: Decimal,
    minimum: Decimal,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::WithdrawalReceipt, StoreError> {
    if amount <= Decimal::ZERO {
        return Err(StoreError::AmountMustBePositive);
    }

    let mut tx = pool.begin().await?;

    // Serializes concurrent requests for this affiliate.
    let account = super::get_account_for_update_tx(
        AccountOwner::Affiliate(*affiliate_id),
        &mut tx,
    )
    .await?;

    if account.status != AccountStatus::Active {
        return Err(StoreError::AccountNotEligible);
    }
    let destination = account
        .destination
        .clone()
        .into_destination()?
        .ok_or(StoreError::PayoutDestinationMissing)?;
    if amount < minimum {
        return Err(StoreError::BelowMinimumAmount { minimum });
    }

    let now = time_source.now();

    // Matured, credited, still-unconsumed sales, oldest first. Uncredited
    // sales are excluded: their amounts are not in the wallet balance yet.
    // Locked so the release job cannot touch them mid-request.
    let matured: Vec<AffiliateSale> = sqlx::query_as(
        r#"
        SELECT * FROM affiliate_sales
        WHERE affiliate_id = $1
          AND status = 'confirmed'
          AND credited_at IS NOT NULL
          AND available_at <= $2
        ORDER BY available_at, id
        FOR UPDATE
        "#,
    )
    .bind(affiliate_id)
    .bind(now.to_sqlx())
    .fetch_all(&mut *tx)
    .await?;

    let available: Decimal =
        matured.iter().map(|sale| sale.commission_amount).sum();

    let candidates: Vec<(AffiliateSaleId, Decimal)> = matured
        .iter()
        .map(|sale| (sale.id, sale.commission_amount))
        .collect();

    let selected = select_sales_fifo(&candidates, amount)
        .ok_or(StoreError::InsufficientAvailableBalance { available })?;

    let columns = super::DestinationColumns::from_destination(&destination);
    let withdrawal: DbWithdrawal = sqlx::query_as(
        r#"
        INSERT INTO affiliate_withdrawals (
            affiliate_id, amount, status,
            payout_kind, pix_key_type, pix_key, bank_code, branch,
            account_number, holder_name, holder_document,
            requested_at
        )
        VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(affiliate_id)
    .bind(amount)
    .bind(columns.payout_kind)
    .bind(columns.pix_key_type)
    .bind(&columns.pix_key)
    .bind(&columns.bank_code)
    .bind(&columns.branch)
    .bind(&columns.account_number)
    .bind(&columns.holder_name)
    .bind(&columns.holder_document)
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await?;

    // Consume the selected sales so no concurrent request can pick them.
    sqlx::query(
        r#"
        UPDATE affiliate_sales
        SET status = 'paid', withdrawal_id = $1
        WHERE id = ANY($2)
        "#,
    )
    .bind(withdrawal.id)
    .bind(
        selected
            .iter()
            .map(|sale_id| sale_id.0)
            .collect::<Vec<uuid::Uuid>>(),
    )
    .execute(&mut *tx)
    .await?;

    ledger::post_entry_tx(
        &account.id,
        EntryType::Withdrawal,
        amount,
        &format!("Withdrawal request {}", withdrawal.id),
        Some(withdrawal.id.0),
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    Ok(responses::WithdrawalReceipt {
        withdrawal_id: withdrawal.id,
        amount: withdrawal.amount,
        status: withdrawal.status,
        consumed_sales: selected,
        requested_at: withdrawal.requested_at,
    })
}

async fn get_withdrawal_for_update_tx(
    withdrawal_id: &WithdrawalId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<DbWithdrawal, StoreError> {
    sqlx::query_as::<_, DbWithdrawal>(
        "SELECT * FROM affiliate_withdrawals WHERE id = $1 FOR UPDATE",
    )
    .bind(withdrawal_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::WithdrawalNotFound)
}

/// Operator approval; the payout service picks up approved withdrawals.
pub async fn approve_withdrawal(
    withdrawal_id: &WithdrawalId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<payloads::AffiliateWithdrawal, StoreError> {
    let mut tx = pool.begin().await?;

    let withdrawal = get_withdrawal_for_update_tx(withdrawal_id, &mut tx).await?;
    if withdrawal.status != WithdrawalStatus::Pending {
        return Err(StoreError::InvalidWithdrawalTransition {
            from: withdrawal.status,
            to: WithdrawalStatus::Approved,
        });
    }

    let updated: DbWithdrawal = sqlx::query_as(
        r#"
        UPDATE affiliate_withdrawals
        SET status = 'approved', approved_at = $1
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(time_source.now().to_sqlx())
    .bind(withdrawal_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    updated.try_into()
}

/// Operator rejection: the consumed sales become available again and the
/// withheld amount is returned to the wallet with an explicit adjustment
/// entry, keeping the ledger append-only.
pub async fn reject_withdrawal(
    withdrawal_id: &WithdrawalId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<payloads::AffiliateWithdrawal, StoreError> {
    let mut tx = pool.begin().await?;

    let withdrawal = get_withdrawal_for_update_tx(withdrawal_id, &mut tx).await?;
    if withdrawal.status != WithdrawalStatus::Pending {
        return Err(StoreError::InvalidWithdrawalTransition {
            from: withdrawal.status,
            to: WithdrawalStatus::Rejected,
        });
    }

    let account = super::get_account_for_update_tx(
        AccountOwner::Affiliate(withdrawal.affiliate_id),
        &mut tx,
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE affiliate_sales
        SET status = 'confirmed', withdrawal_id = NULL
        WHERE withdrawal_id = $1
        "#,
    )
    .bind(withdrawal_id)
    .execute(&mut *tx)
    .await?;

    ledger::post_entry_tx(
        &account.id,
        EntryType::AdjustmentCredit,
        withdrawal.amount,
        &format!("Reversal of rejected withdrawal {}", withdrawal.id),
        Some(withdrawal.id.0),
        time_source,
        &mut tx,
    )
    .await?;

    let updated: DbWithdrawal = sqlx::query_as(
        r#"
        UPDATE affiliate_withdrawals
        SET status = 'rejected', rejected_at = $1
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(time_source.now().to_sqlx())
    .bind(withdrawal_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    updated.try_into()
}

/// The payout service reports the transfer went out.
pub async fn mark_withdrawal_paid(
    withdrawal_id: &WithdrawalId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<payloads::AffiliateWithdrawal, StoreError> {
    let mut tx = pool.begin().await?;

    let withdrawal = get_withdrawal_for_update_tx(withdrawal_id, &mut tx).await?;
    if withdrawal.status != WithdrawalStatus::Approved {
        return Err(StoreError::InvalidWithdrawalTransition {
            from: withdrawal.status,
            to: WithdrawalStatus::Paid,
        });
    }

    let updated: DbWithdrawal = sqlx::query_as(
        r#"
        UPDATE affiliate_withdrawals
        SET status = 'paid', paid_at = $1
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(time_source.now().to_sqlx())
    .bind(withdrawal_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    updated.try_into()
}

/// Withdrawal history for an affiliate, newest first.
pub async fn list_withdrawals(
    affiliate_id: &AffiliateId,
    pool: &PgPool,
) -> Result<Vec<payloads::AffiliateWithdrawal>, StoreError> {
    let rows: Vec<DbWithdrawal> = sqlx::query_as(
        r#"
        SELECT * FROM affiliate_withdrawals
        WHERE affiliate_id = $1
        ORDER BY requested_at DESC, id
        "#,
    )
    .bind(affiliate_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}
