use payloads::{ItemType, ProductId, requests};
use rust_decimal::dec;
use test_helpers::spawn_app;
use uuid::Uuid;

#[tokio::test]
async fn complete_orders_produce_a_clean_report() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;
    app.add_stock_item(order_id, seller_id, dec!(100), 1, dec!(10))
        .await?;
    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;

    let report = app
        .client
        .run_audit(&requests::RunAudit {
            stuck_after_hours: None,
        })
        .await?;

    assert!(report.is_clean());
    Ok(())
}

#[tokio::test]
async fn incomplete_mirror_fields_are_counted() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let order_id = payloads::OrderId(Uuid::new_v4());
    app.client
        .record_order(&requests::RecordOrder {
            order_id,
            buyer_id: None,
            shipping_address: None,
            fraud_status: None,
            affiliate_id: None,
            affiliate_commission: None,
        })
        .await?;

    let report = app
        .client
        .run_audit(&requests::RunAudit {
            stuck_after_hours: None,
        })
        .await?;

    assert_eq!(report.missing_buyer, 1);
    assert_eq!(report.missing_shipping_address, 1);
    assert_eq!(report.missing_fraud_status, 1);
    assert_eq!(report.orders_without_items, 1);
    assert_eq!(report.broken_ledger_chains, 0);

    Ok(())
}

#[tokio::test]
async fn unresolved_dropshipping_lines_are_counted() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let order_id = app.record_plain_order().await?;
    app.client
        .upsert_order_item(&requests::UpsertOrderItem {
            order_id,
            item_id: None,
            product_id: ProductId(Uuid::new_v4()),
            seller_id: None,
            item_type: ItemType::Dropshipping,
            quantity: 1,
            unit_price: dec!(50),
            cost_price: Some(dec!(30)),
            commission_rate: dec!(10),
        })
        .await?;

    let report = app
        .client
        .run_audit(&requests::RunAudit {
            stuck_after_hours: None,
        })
        .await?;

    assert_eq!(report.dropship_items_without_seller, 1);
    Ok(())
}

#[tokio::test]
async fn orders_stuck_in_processing_are_flagged() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let order_id = app.record_plain_order().await?;
    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;
    app.client
        .mark_order_processing(&requests::MarkOrderProcessing { order_id })
        .await?;

    // within the default window the order is not stuck yet
    let report = app
        .client
        .run_audit(&requests::RunAudit {
            stuck_after_hours: None,
        })
        .await?;
    assert_eq!(report.stuck_processing, 0);

    // with a zero-hour window it is
    let report = app
        .client
        .run_audit(&requests::RunAudit {
            stuck_after_hours: Some(0),
        })
        .await?;
    assert_eq!(report.stuck_processing, 1);

    Ok(())
}
