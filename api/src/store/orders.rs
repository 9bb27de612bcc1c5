//! Order mirror and the payment settlement boundary.
//!
//! Order-management owns the order lifecycle; this module records the
//! narrow slice the settlement engine needs and reacts to two events:
//! payment confirmation (post the seller's SALE/deduction pair per item)
//! and delivery (which makes the order a candidate for the affiliate
//! commission release job).

use jiff::Timestamp;
use jiff_sqlx::ToSqlx;
use sqlx::PgPool;

use payloads::{
    AccountOwner, EntryType, ItemType, OrderId, OrderStatus, requests,
};

use super::{Order, OrderItem, StoreError, ledger};
use crate::commission;
use crate::time::TimeSource;

pub(crate) async fn get_order_for_update_tx(
    order_id: &OrderId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Order, StoreError> {
    sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::OrderNotFound)
}

pub async fn get_order(
    order_id: &OrderId,
    pool: &PgPool,
) -> Result<Order, StoreError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::OrderNotFound)
}

/// Record or refresh the mirror row for an order.
///
/// The mirror fields (buyer, shipping, fraud status, affiliate
/// attribution) can be refreshed at any time; they carry no money. Status
/// transitions happen only through the settlement/delivery operations
/// below.
pub async fn record_order(
    details: &requests::RecordOrder,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let now = time_source.now();

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, buyer_id, shipping_address, fraud_status,
            affiliate_id, affiliate_commission, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        ON CONFLICT (id) DO UPDATE SET
            buyer_id = EXCLUDED.buyer_id,
            shipping_address = EXCLUDED.shipping_address,
            fraud_status = EXCLUDED.fraud_status,
            affiliate_id = EXCLUDED.affiliate_id,
            affiliate_commission = EXCLUDED.affiliate_commission
        "#,
    )
    .bind(details.order_id)
    .bind(details.buyer_id)
    .bind(&details.shipping_address)
    .bind(&details.fraud_status)
    .bind(details.affiliate_id)
    .bind(details.affiliate_commission)
    .bind(now.to_sqlx())
    .execute(pool)
    .await?;

    Ok(())
}

/// Create or reprice an order line.
///
/// Commission figures are computed here, and recomputed on every edit of
/// price, quantity, or product identity. Once the order has left the
/// pre-payment state the line is frozen and edits fail with
/// `OrderNotEditable`.
pub async fn upsert_order_item(
    details: &requests::UpsertOrderItem,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<payloads::responses::OrderItem, StoreError> {
    let mut tx = pool.begin().await?;

    let order = get_order_for_update_tx(&details.order_id, &mut tx).await?;
    if !order.status.is_pre_payment() {
        return Err(StoreError::OrderNotEditable);
    }

    let breakdown = commission::price_line(
        details.unit_price,
        details.quantity,
        details.commission_rate,
        details.item_type,
        details.cost_price,
    )?;

    let now = time_source.now();

    let item = match details.item_id {
        None => {
            sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, seller_id, item_type, quantity,
                    unit_price, cost_price, commission_rate,
                    commission_amount, seller_revenue, supplier_cost,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
                RETURNING *
                "#,
            )
            .bind(details.order_id)
            .bind(details.product_id)
            .bind(details.seller_id)
            .bind(details.item_type)
            .bind(details.quantity)
            .bind(details.unit_price)
            .bind(details.cost_price)
            .bind(breakdown.commission_rate)
            .bind(breakdown.commission_amount)
            .bind(breakdown.seller_revenue)
            .bind(breakdown.supplier_cost)
            .bind(now.to_sqlx())
            .fetch_one(&mut *tx)
            .await?
        }
        Some(item_id) => {
            sqlx::query_as::<_, OrderItem>(
                r#"
                UPDATE order_items SET
                    product_id = $1,
                    seller_id = $2,
                    item_type = $3,
                    quantity = $4,
                    unit_price = $5,
                    cost_price = $6,
                    commission_rate = $7,
                    commission_amount = $8,
                    seller_revenue = $9,
                    supplier_cost = $10
                WHERE id = $11 AND order_id = $12
                RETURNING *
                "#,
            )
            .bind(details.product_id)
            .bind(details.seller_id)
            .bind(details.item_type)
            .bind(details.quantity)
            .bind(details.unit_price)
            .bind(details.cost_price)
            .bind(breakdown.commission_rate)
            .bind(breakdown.commission_amount)
            .bind(breakdown.seller_revenue)
            .bind(breakdown.supplier_cost)
            .bind(item_id)
            .bind(details.order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderItemNotFound)?
        }
    };

    tx.commit().await?;

    Ok(item.into())
}

pub async fn list_order_items(
    order_id: &OrderId,
    pool: &PgPool,
) -> Result<Vec<OrderItem>, StoreError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

async fn list_order_items_tx(
    order_id: &OrderId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Vec<OrderItem>, StoreError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(items)
}

/// Settle an order whose payment was confirmed.
///
/// For every line with a resolved seller, posts the seller's ledger pair:
/// a SALE credit of the gross line revenue, plus a deduction entry. Stock
/// lines are deducted the platform COMMISSION; dropshipping lines are
/// deducted the supplier FEE, since the platform's cut already came out of
/// the supplier margin. Entry references are the item ids, so re-settling
/// a paid order posts nothing new.
#[tracing::instrument(skip(time_source, pool))]
pub async fn settle_order_payment(
    order_id: &OrderId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let order = get_order_for_update_tx(order_id, &mut tx).await?;
    match order.status {
        OrderStatus::Pending
        | OrderStatus::PaymentConfirmed
        | OrderStatus::Processing
        | OrderStatus::Shipped
        | OrderStatus::Delivered => {}
        OrderStatus::Canceled => return Err(StoreError::OrderNotSettleable),
    }

    let now = time_source.now();

    for item in list_order_items_tx(order_id, &mut tx).await? {
        let Some(seller_id) = item.seller_id else {
            // Unresolved dropshipping line; the auditor surfaces these.
            continue;
        };

        let seller_account =
            super::get_account_tx(AccountOwner::Seller(seller_id), &mut tx)
                .await?;

        let gross =
            item.unit_price * rust_decimal::Decimal::from(item.quantity);
        ledger::post_entry_tx(
            &seller_account.id,
            EntryType::Sale,
            gross,
            &format!("Sale revenue for order {}", order.id),
            Some(item.id.0),
            time_source,
            &mut tx,
        )
        .await?;

        let (deduction_type, deduction) = match item.item_type {
            ItemType::Stock => {
                (EntryType::Commission, item.commission_amount)
            }
            ItemType::Dropshipping => (
                EntryType::Fee,
                item.supplier_cost.unwrap_or_default(),
            ),
        };
        if deduction > rust_decimal::Decimal::ZERO {
            ledger::post_entry_tx(
                &seller_account.id,
                deduction_type,
                deduction,
                &format!("Deduction for order {}", order.id),
                Some(item.id.0),
                time_source,
                &mut tx,
            )
            .await?;
        }
    }

    sqlx::query(
        r#"
        UPDATE orders
        SET status = CASE WHEN status = 'pending'
                          THEN 'payment_confirmed'::order_status
                          ELSE status END,
            paid_at = COALESCE(paid_at, $1),
            settled_at = COALESCE(settled_at, $1)
        WHERE id = $2
        "#,
    )
    .bind(now.to_sqlx())
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Record delivery, making the order a release-job candidate.
///
/// The delivery time is taken from the event when provided. Calling this
/// again for an already-delivered order is a no-op.
pub async fn mark_order_delivered(
    order_id: &OrderId,
    delivered_at: Option<Timestamp>,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let order = get_order_for_update_tx(order_id, &mut tx).await?;
    if order.status == OrderStatus::Canceled {
        return Err(StoreError::OrderNotSettleable);
    }
    if order.status == OrderStatus::Delivered {
        return Ok(());
    }

    let delivered = delivered_at.unwrap_or_else(|| time_source.now());

    sqlx::query(
        r#"
        UPDATE orders
        SET status = 'delivered', delivered_at = $1
        WHERE id = $2
        "#,
    )
    .bind(delivered.to_sqlx())
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Move an order into processing; used by order-management while a
/// supplier works the order. Exists mainly so the auditor's stuck-order
/// scan has something to measure against.
pub async fn mark_order_processing(
    order_id: &OrderId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE orders SET status = 'processing'
        WHERE id = $1 AND status <> 'canceled'
        "#,
    )
    .bind(order_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::OrderNotFound);
    }
    Ok(())
}
