//! Read-only consistency checks across orders and the ledger.
//!
//! The auditor never mutates anything. It counts orders and items that look
//! wrong so operators can chase them down, and re-verifies every account's
//! balance chain.

use sqlx::PgPool;

use payloads::responses::AuditReport;

use super::{StoreError, ledger};

pub const DEFAULT_STUCK_AFTER_HOURS: i64 = 72;

/// Run every audit check and collect the counts.
#[tracing::instrument(skip(pool))]
pub async fn run_audit(
    stuck_after_hours: Option<i64>,
    pool: &PgPool,
) -> Result<AuditReport, StoreError> {
    let stuck_after = stuck_after_hours.unwrap_or(DEFAULT_STUCK_AFTER_HOURS);

    let stuck_processing: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE status = 'processing'
          AND updated_at < now() - INTERVAL '1 hour' * $1
        "#,
    )
    .bind(stuck_after)
    .fetch_one(pool)
    .await?;

    let missing_buyer: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE buyer_id IS NULL",
    )
    .fetch_one(pool)
    .await?;

    let missing_shipping_address: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE shipping_address IS NULL OR shipping_address = ''
        "#,
    )
    .fetch_one(pool)
    .await?;

    let missing_fraud_status: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE fraud_status IS NULL OR fraud_status = ''
        "#,
    )
    .fetch_one(pool)
    .await?;

    let dropship_items_without_seller: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM order_items
        WHERE item_type = 'dropshipping' AND seller_id IS NULL
        "#,
    )
    .fetch_one(pool)
    .await?;

    let orders_without_items: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders o
        WHERE NOT EXISTS (
            SELECT 1 FROM order_items i WHERE i.order_id = o.id
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    let broken_ledger_chains = ledger::broken_chain_count(pool).await?;

    Ok(AuditReport {
        stuck_processing,
        missing_buyer,
        missing_shipping_address,
        missing_fraud_status,
        dropship_items_without_seller,
        orders_without_items,
        broken_ledger_chains,
    })
}
