use payloads::{AccountOwner, ItemType, ProductId, requests};
use reqwest::StatusCode;
use rust_decimal::dec;
use test_helpers::{assert_status_code, spawn_app};
use uuid::Uuid;

#[tokio::test]
async fn stock_line_is_priced_on_creation() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;

    let item = app
        .add_stock_item(order_id, seller_id, dec!(100), 3, dec!(12))
        .await?;

    assert_eq!(item.commission_amount, dec!(36));
    assert_eq!(item.seller_revenue, dec!(264));
    assert_eq!(item.supplier_cost, None);

    Ok(())
}

#[tokio::test]
async fn dropshipping_line_is_priced_from_cost_margin() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;

    let item = app
        .add_dropshipping_item(
            order_id,
            seller_id,
            dec!(150),
            dec!(100),
            2,
            dec!(10),
        )
        .await?;

    assert_eq!(item.commission_amount, dec!(20));
    assert_eq!(item.seller_revenue, dec!(120));
    assert_eq!(item.supplier_cost, Some(dec!(180)));

    Ok(())
}

#[tokio::test]
async fn editing_a_line_reprices_it() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;
    let item = app
        .add_stock_item(order_id, seller_id, dec!(100), 1, dec!(10))
        .await?;
    assert_eq!(item.commission_amount, dec!(10));

    let updated = app
        .client
        .upsert_order_item(&requests::UpsertOrderItem {
            order_id,
            item_id: Some(item.id),
            product_id: item.product_id,
            seller_id: item.seller_id,
            item_type: item.item_type,
            quantity: 2,
            unit_price: item.unit_price,
            cost_price: item.cost_price,
            commission_rate: item.commission_rate,
        })
        .await?;

    assert_eq!(updated.id, item.id);
    assert_eq!(updated.commission_amount, dec!(20));
    assert_eq!(updated.seller_revenue, dec!(180));

    Ok(())
}

#[tokio::test]
async fn lines_freeze_once_payment_is_settled() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;
    let item = app
        .add_stock_item(order_id, seller_id, dec!(100), 1, dec!(10))
        .await?;

    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;

    let result = app
        .client
        .upsert_order_item(&requests::UpsertOrderItem {
            order_id,
            item_id: Some(item.id),
            product_id: item.product_id,
            seller_id: item.seller_id,
            item_type: item.item_type,
            quantity: 5,
            unit_price: item.unit_price,
            cost_price: item.cost_price,
            commission_rate: item.commission_rate,
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn settlement_posts_the_sale_and_deduction_pair() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;
    app.add_stock_item(order_id, seller_id, dec!(100), 3, dec!(12))
        .await?;

    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;

    let owner = AccountOwner::Seller(seller_id);
    let account = app
        .client
        .get_account(&requests::GetAccount { owner })
        .await?;
    assert_eq!(account.balance, dec!(264));
    assert_eq!(app.entry_count(owner).await?, 2);

    let entries = app
        .client
        .get_account_entries(&requests::GetAccountEntries {
            owner,
            limit: 10,
            offset: 0,
        })
        .await?;
    assert_eq!(entries.len(), 2);
    let amounts: Vec<_> = entries.iter().map(|e| e.amount).collect();
    assert!(amounts.contains(&dec!(300)));
    assert!(amounts.contains(&dec!(-36)));

    Ok(())
}

#[tokio::test]
async fn dropshipping_settlement_deducts_the_supplier_fee()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;
    app.add_dropshipping_item(
        order_id,
        seller_id,
        dec!(150),
        dec!(100),
        2,
        dec!(10),
    )
    .await?;

    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;

    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Seller(seller_id),
        })
        .await?;
    // 300 gross minus 180 owed to the supplier
    assert_eq!(account.balance, dec!(120));

    Ok(())
}

#[tokio::test]
async fn resettling_a_paid_order_changes_nothing() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;
    app.add_stock_item(order_id, seller_id, dec!(100), 3, dec!(12))
        .await?;

    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;
    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;

    let owner = AccountOwner::Seller(seller_id);
    let account = app
        .client
        .get_account(&requests::GetAccount { owner })
        .await?;
    assert_eq!(account.balance, dec!(264));
    assert_eq!(app.entry_count(owner).await?, 2);

    Ok(())
}

#[tokio::test]
async fn settling_an_unknown_order_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app
        .client
        .settle_order_payment(&requests::SettleOrderPayment {
            order_id: payloads::OrderId(Uuid::new_v4()),
        })
        .await;

    assert_status_code(result, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn dropshipping_line_requires_a_cost_basis() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let order_id = app.record_plain_order().await?;

    let result = app
        .client
        .upsert_order_item(&requests::UpsertOrderItem {
            order_id,
            item_id: None,
            product_id: ProductId(Uuid::new_v4()),
            seller_id: Some(seller_id),
            item_type: ItemType::Dropshipping,
            quantity: 1,
            unit_price: dec!(50),
            cost_price: None,
            commission_rate: dec!(10),
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}
