//! Commission release: the background job that turns delivered, attributed
//! orders into affiliate wallet credits.
//!
//! ```text
//!  payment confirmed          delivered              available_at
//!        v                        v                       v
//! |--------------|----------------|---- holdback period --|------>
//!        ^                        ^                       ^
//!        | seller SALE pair       | affiliate_sale row    | COMMISSION
//!        | posted                 | created (confirmed)   | credit posted
//! ```
//!
//! The job runs in two phases per order. On delivery it materializes the
//! `affiliate_sales` row with `available_at = delivered_at + holdback`; once
//! the holdback has elapsed it posts the COMMISSION credit and stamps
//! `credited_at`. Both phases are idempotent, so re-running the job over
//! already-processed orders changes nothing.

use jiff::{Span, Timestamp};
use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time;

use payloads::{
    AccountOwner, AffiliateSale, EntryType, OrderId, OrderStatus,
    responses::{ReleaseOutcome, ReleaseReport},
};

use crate::store::{self, StoreError, ledger};
use crate::telemetry::log_error;
use crate::time::TimeSource;

/// Periodically sweeps delivered orders for commissions ready to release.
pub struct Scheduler {
    pool: PgPool,
    time_source: TimeSource,
    tick_interval: Duration,
    holdback: Span,
}

impl Scheduler {
    pub fn new(
        pool: PgPool,
        time_source: TimeSource,
        tick_interval: Duration,
        holdback: Span,
    ) -> Self {
        Self {
            pool,
            time_source,
            tick_interval,
            holdback,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            let _ = release_affiliate_commissions(
                &self.pool,
                &self.time_source,
                self.holdback,
                None,
            )
            .await
            .map_err(log_error);
        }
    }
}

/// Release affiliate commissions for delivered orders.
///
/// With `scope = None`, sweeps every delivered order that still has an
/// uncredited attribution. With an explicit scope, processes exactly those
/// orders and reports an outcome for each, including the ones that are not
/// ready. Failures on one order never stop the batch.
#[tracing::instrument(skip(pool, time_source))]
pub async fn release_affiliate_commissions(
    pool: &PgPool,
    time_source: &TimeSource,
    holdback: Span,
    scope: Option<&[OrderId]>,
) -> Result<ReleaseReport, StoreError> {
    let candidates: Vec<OrderId> = match scope {
        Some(order_ids) => order_ids.to_vec(),
        None => {
            sqlx::query_scalar(
                r#"
                SELECT o.id FROM orders o
                WHERE o.status = 'delivered'
                  AND o.affiliate_id IS NOT NULL
                  AND NOT EXISTS (
                      SELECT 1 FROM affiliate_sales s
                      WHERE s.order_id = o.id
                        AND s.credited_at IS NOT NULL
                  )
                ORDER BY o.delivered_at
                "#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    let mut outcomes = Vec::with_capacity(candidates.len());
    for order_id in candidates {
        let outcome =
            release_one_order(&order_id, pool, time_source, holdback).await;
        outcomes.push((order_id, outcome));
    }

    Ok(ReleaseReport { outcomes })
}

/// Take the per-order advisory lock and process the order, converting
/// errors into a `Failed` outcome so the batch keeps going.
async fn release_one_order(
    order_id: &OrderId,
    pool: &PgPool,
    time_source: &TimeSource,
    holdback: Span,
) -> ReleaseOutcome {
    // This transaction is ONLY used to hold the advisory lock for
    // coordination. It prevents re-entry by other scheduler instances.
    let mut coordination_tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            return ReleaseOutcome::Failed {
                message: e.to_string(),
            };
        }
    };

    let locked: Result<bool, sqlx::Error> = sqlx::query_scalar(
        r#"
        SELECT pg_try_advisory_xact_lock(
            hashtextextended('commission_release:' || $1::text, 0)
        )
        "#,
    )
    .bind(order_id)
    .fetch_one(&mut *coordination_tx)
    .await;

    match locked {
        // Another instance holds this order right now.
        Ok(false) => return ReleaseOutcome::Skipped,
        Ok(true) => {}
        Err(e) => {
            return ReleaseOutcome::Failed {
                message: e.to_string(),
            };
        }
    }

    // The work happens in its own transaction, not the coordination one.
    let outcome =
        match process_locked_order(order_id, pool, time_source, holdback)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "Failed to release commission for order {order_id}: {e:#}"
                );
                ReleaseOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };

    // Release the lock.
    let _ = coordination_tx.commit().await;

    outcome
}

async fn process_locked_order(
    order_id: &OrderId,
    pool: &PgPool,
    time_source: &TimeSource,
    holdback: Span,
) -> Result<ReleaseOutcome, StoreError> {
    let mut tx = pool.begin().await?;

    let order = store::orders::get_order_for_update_tx(order_id, &mut tx)
        .await?;

    if order.status != OrderStatus::Delivered {
        return Ok(ReleaseOutcome::Skipped);
    }
    let Some(affiliate_id) = order.affiliate_id else {
        return Ok(ReleaseOutcome::Skipped);
    };
    let Some(delivered_at) = order.delivered_at else {
        return Ok(ReleaseOutcome::Skipped);
    };
    let commission = match order.affiliate_commission {
        Some(amount) if amount > Decimal::ZERO => amount,
        // Attribution without a commission figure is a data error upstream.
        _ => {
            return Ok(ReleaseOutcome::Failed {
                message: format!(
                    "order {order_id} has an affiliate but no commission amount"
                ),
            });
        }
    };

    let available_at = delivered_at
        .checked_add(holdback)
        .map_err(|e| StoreError::UnexpectedError(e.into()))?;

    let now = time_source.now();
    let sale = get_or_create_sale(
        &order,
        affiliate_id,
        commission,
        available_at,
        now,
        &mut tx,
    )
    .await?;

    if sale.credited_at.is_some()
        || sale.status == payloads::SaleStatus::Paid
    {
        tx.commit().await?;
        return Ok(ReleaseOutcome::AlreadyCredited);
    }

    if sale.available_at > now {
        tx.commit().await?;
        return Ok(ReleaseOutcome::NotYetAvailable {
            available_at: sale.available_at,
        });
    }

    let account = store::get_account_tx(
        AccountOwner::Affiliate(affiliate_id),
        &mut tx,
    )
    .await?;

    ledger::post_entry_tx(
        &account.id,
        EntryType::Commission,
        sale.commission_amount,
        &format!("Affiliate commission for order {}", order.id),
        Some(sale.id.0),
        time_source,
        &mut tx,
    )
    .await?;

    sqlx::query(
        "UPDATE affiliate_sales SET credited_at = $1 WHERE id = $2",
    )
    .bind(now.to_sqlx())
    .bind(sale.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ReleaseOutcome::Credited {
        amount: sale.commission_amount,
    })
}

/// Materialize the sale row for a delivered order, or fetch the existing
/// one. The `order_id` unique constraint makes concurrent creation safe;
/// the row keeps its original `available_at` once created.
async fn get_or_create_sale(
    order: &store::Order,
    affiliate_id: payloads::AffiliateId,
    commission: Decimal,
    available_at: Timestamp,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<AffiliateSale, StoreError> {
    let existing: Option<AffiliateSale> = sqlx::query_as(
        "SELECT * FROM affiliate_sales WHERE order_id = $1 FOR UPDATE",
    )
    .bind(order.id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(sale) = existing {
        return Ok(sale);
    }

    let sale: AffiliateSale = sqlx::query_as(
        r#"
        INSERT INTO affiliate_sales (
            order_id, affiliate_id, commission_amount, status, available_at,
            created_at
        )
        VALUES ($1, $2, $3, 'confirmed', $4, $5)
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(affiliate_id)
    .bind(commission)
    .bind(available_at.to_sqlx())
    .bind(now.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;

    Ok(sale)
}
