//! Ledger posting and balance maintenance.
//!
//! Every balance change on an account flows through `post_entry_tx`. The
//! entry carries a snapshot of the balance before and after the posting, so
//! for any account the completed entries form a chain: each entry's
//! `balance_before` equals the previous entry's `balance_after`, and
//! `balance_after = balance_before + amount`.
//!
//! Posting order is recorded durably in `posting_seq`. `created_at` cannot
//! serve as the order: several entries posted in one transaction share a
//! timestamp.
//!
//! Postings are serialized per account by locking the account row, and made
//! idempotent by the `(reference_id, entry_type)` unique constraint: posting
//! the same settlement twice returns the original entry instead of crediting
//! again.

use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use payloads::{
    AccountId, EntryStatus, EntryType, LedgerEntry, requests,
};

use super::StoreError;
use crate::time::TimeSource;

/// Post a completed ledger entry and update the account's denormalized
/// balance, atomically within the caller's transaction.
///
/// Callers pass a positive magnitude; the entry type (together with the
/// account's owner type) determines the sign. This is the single code path
/// allowed to write balance-bearing fields.
///
/// A debit that would push the spendable balance (balance minus
/// blocked_balance) below zero fails with `InsufficientBalance` and posts
/// nothing.
pub(crate) async fn post_entry_tx(
    account_id: &AccountId,
    entry_type: EntryType,
    magnitude: Decimal,
    description: &str,
    reference_id: Option<Uuid>,
    time_source: &TimeSource,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<LedgerEntry, StoreError> {
    if magnitude <= Decimal::ZERO {
        return Err(StoreError::AmountMustBePositive);
    }
    if description.len() > requests::DESCRIPTION_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }

    // Serialize postings for this account. The balance read below must not
    // interleave with another posting's write.
    let account = super::get_account_by_id_for_update_tx(account_id, tx).await?;

    // Idempotency: a posting tied to a source record happens once. Checked
    // under the account lock so a concurrent duplicate waits for the first
    // to commit and then finds its entry here.
    if let Some(reference) = reference_id {
        let existing = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT * FROM ledger_entries
            WHERE reference_id = $1 AND entry_type = $2
            "#,
        )
        .bind(reference)
        .bind(entry_type)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(entry) = existing {
            return Ok(entry);
        }
    }

    let amount = entry_type.signed_for(account.owner_type, magnitude);
    let balance_before = account.balance;
    let balance_after = balance_before + amount;

    if amount < Decimal::ZERO
        && account.balance - account.blocked_balance < magnitude
    {
        return Err(StoreError::InsufficientBalance);
    }

    let now = time_source.now();

    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO ledger_entries (
            account_id,
            entry_type,
            amount,
            balance_before,
            balance_after,
            description,
            reference_id,
            status,
            created_at,
            processed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(entry_type)
    .bind(amount)
    .bind(balance_before)
    .bind(balance_after)
    .bind(description)
    .bind(reference_id)
    .bind(EntryStatus::Completed)
    .bind(now.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;

    // Lifetime totals: sales feed total_received, withdrawals feed
    // total_withdrawn.
    let received_delta = match entry_type {
        EntryType::Sale => magnitude,
        _ => Decimal::ZERO,
    };
    let withdrawn_delta = match entry_type {
        EntryType::Withdrawal => magnitude,
        _ => Decimal::ZERO,
    };

    sqlx::query(
        r#"
        UPDATE accounts
        SET balance = $1,
            total_received = total_received + $2,
            total_withdrawn = total_withdrawn + $3
        WHERE id = $4
        "#,
    )
    .bind(balance_after)
    .bind(received_delta)
    .bind(withdrawn_delta)
    .bind(account_id)
    .execute(&mut **tx)
    .await?;

    Ok(entry)
}

/// Post a single entry in its own transaction.
pub async fn post_entry(
    account_id: &AccountId,
    entry_type: EntryType,
    magnitude: Decimal,
    description: &str,
    reference_id: Option<Uuid>,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<LedgerEntry, StoreError> {
    let mut tx = pool.begin().await?;
    let entry = post_entry_tx(
        account_id,
        entry_type,
        magnitude,
        description,
        reference_id,
        time_source,
        &mut tx,
    )
    .await?;
    tx.commit().await?;
    Ok(entry)
}

/// Transaction history for an account, newest first.
pub async fn list_entries(
    account_id: &AccountId,
    limit: i64,
    offset: i64,
    pool: &PgPool,
) -> Result<Vec<LedgerEntry>, StoreError> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT * FROM ledger_entries
        WHERE account_id = $1
        ORDER BY posting_seq DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Verify the balance chain for one account.
///
/// Walks completed entries in posting order and checks that consecutive
/// balance snapshots line up and that each entry's arithmetic holds, ending
/// with the account's denormalized balance. Used by the auditor and by
/// tests; performs no mutation.
pub async fn verify_account_chain(
    account_id: &AccountId,
    pool: &PgPool,
) -> Result<bool, StoreError> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT * FROM ledger_entries
        WHERE account_id = $1 AND status = 'completed'
        ORDER BY posting_seq
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    let balance: Decimal =
        sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(pool)
            .await?
            .ok_or(StoreError::AccountNotFound)?;

    let mut previous_after = Decimal::ZERO;
    for entry in &entries {
        if entry.balance_before != previous_after {
            return Ok(false);
        }
        if entry.balance_after != entry.balance_before + entry.amount {
            return Ok(false);
        }
        previous_after = entry.balance_after;
    }

    Ok(previous_after == balance)
}

/// Count accounts whose entry chain fails verification.
pub(crate) async fn broken_chain_count(
    pool: &PgPool,
) -> Result<i64, StoreError> {
    let account_ids: Vec<AccountId> =
        sqlx::query_scalar("SELECT id FROM accounts")
            .fetch_all(pool)
            .await?;

    let mut broken = 0;
    for account_id in &account_ids {
        if !verify_account_chain(account_id, pool).await? {
            broken += 1;
        }
    }
    Ok(broken)
}
