use jiff::Span;
use payloads::{AccountOwner, requests, responses::ReleaseOutcome};
use rust_decimal::dec;
use test_helpers::spawn_app;
use uuid::Uuid;

#[tokio::test]
async fn commission_is_not_credited_before_holdback() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let order_id = app
        .delivered_attributed_order(affiliate_id, dec!(25), None)
        .await?;

    let report = app.release_all_commissions().await?;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].0, order_id);
    assert!(matches!(
        report.outcomes[0].1,
        ReleaseOutcome::NotYetAvailable { .. }
    ));

    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Affiliate(affiliate_id),
        })
        .await?;
    assert_eq!(account.balance, dec!(0));

    Ok(())
}

#[tokio::test]
async fn matured_commission_is_credited_exactly_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    app.delivered_attributed_order(affiliate_id, dec!(25), None)
        .await?;
    // creates the sale row with its availability date
    app.release_all_commissions().await?;

    app.advance_past_holdback();
    let report = app.release_all_commissions().await?;
    assert_eq!(report.credited_total(), dec!(25));

    // second sweep finds the durable marker
    let report = app.release_all_commissions().await?;
    assert_eq!(report.credited_total(), dec!(0));

    let owner = AccountOwner::Affiliate(affiliate_id);
    let account = app
        .client
        .get_account(&requests::GetAccount { owner })
        .await?;
    assert_eq!(account.balance, dec!(25));
    assert_eq!(app.entry_count(owner).await?, 1);

    Ok(())
}

#[tokio::test]
async fn backdated_delivery_credits_immediately() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let delivered_at = app.time_source.now() - Span::new().hours(8 * 24);
    app.delivered_attributed_order(affiliate_id, dec!(15), Some(delivered_at))
        .await?;

    let report = app.release_all_commissions().await?;
    assert_eq!(report.credited_total(), dec!(15));

    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Affiliate(affiliate_id),
        })
        .await?;
    assert_eq!(account.balance, dec!(15));

    Ok(())
}

#[tokio::test]
async fn scoped_release_processes_only_the_named_orders()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let delivered_at = app.time_source.now() - Span::new().hours(8 * 24);
    let first = app
        .delivered_attributed_order(affiliate_id, dec!(10), Some(delivered_at))
        .await?;
    let second = app
        .delivered_attributed_order(affiliate_id, dec!(20), Some(delivered_at))
        .await?;

    let report = app
        .client
        .release_commissions(&requests::ReleaseCommissions {
            order_ids: Some(vec![first]),
        })
        .await?;
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.credited_total(), dec!(10));

    // the unscoped sweep still picks up the other order
    let report = app.release_all_commissions().await?;
    assert_eq!(report.credited_total(), dec!(20));
    assert!(
        report
            .outcomes
            .iter()
            .any(|(id, outcome)| *id == second
                && matches!(outcome, ReleaseOutcome::Credited { .. }))
    );

    Ok(())
}

#[tokio::test]
async fn unattributed_orders_are_not_swept() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let order_id = app.record_plain_order().await?;
    app.client
        .settle_order_payment(&requests::SettleOrderPayment { order_id })
        .await?;
    app.client
        .mark_order_delivered(&requests::MarkOrderDelivered {
            order_id,
            delivered_at: None,
        })
        .await?;

    let report = app.release_all_commissions().await?;
    assert!(report.outcomes.is_empty());

    Ok(())
}

#[tokio::test]
async fn undelivered_orders_are_skipped_when_scoped() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let order_id = app
        .record_attributed_order(affiliate_id, dec!(30))
        .await?;

    let report = app
        .client
        .release_commissions(&requests::ReleaseCommissions {
            order_ids: Some(vec![order_id]),
        })
        .await?;

    assert_eq!(report.outcomes, vec![(order_id, ReleaseOutcome::Skipped)]);
    Ok(())
}

#[tokio::test]
async fn attribution_without_a_commission_amount_fails() -> anyhow::Result<()>
{
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let order_id = payloads::OrderId(Uuid::new_v4());
    app.client
        .record_order(&requests::RecordOrder {
            order_id,
            buyer_id: Some(payloads::BuyerId(Uuid::new_v4())),
            shipping_address: Some("1 Test Street".into()),
            fraud_status: Some("approved".into()),
            affiliate_id: Some(affiliate_id),
            affiliate_commission: None,
        })
        .await?;
    app.client
        .mark_order_delivered(&requests::MarkOrderDelivered {
            order_id,
            delivered_at: None,
        })
        .await?;

    let report = app.release_all_commissions().await?;

    assert_eq!(report.outcomes.len(), 1);
    assert!(matches!(
        report.outcomes[0].1,
        ReleaseOutcome::Failed { .. }
    ));

    Ok(())
}

#[tokio::test]
async fn batch_continues_past_a_failing_order() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let delivered_at = app.time_source.now() - Span::new().hours(8 * 24);

    // broken order: attribution without a commission amount
    let broken = payloads::OrderId(Uuid::new_v4());
    app.client
        .record_order(&requests::RecordOrder {
            order_id: broken,
            buyer_id: Some(payloads::BuyerId(Uuid::new_v4())),
            shipping_address: Some("1 Test Street".into()),
            fraud_status: Some("approved".into()),
            affiliate_id: Some(affiliate_id),
            affiliate_commission: None,
        })
        .await?;
    app.client
        .mark_order_delivered(&requests::MarkOrderDelivered {
            order_id: broken,
            delivered_at: Some(delivered_at),
        })
        .await?;

    let good = app
        .delivered_attributed_order(affiliate_id, dec!(40), Some(delivered_at))
        .await?;

    let report = app.release_all_commissions().await?;

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.credited_total(), dec!(40));
    assert!(report.outcomes.iter().any(|(id, outcome)| *id == good
        && matches!(outcome, ReleaseOutcome::Credited { .. })));
    assert!(report.outcomes.iter().any(|(id, outcome)| *id == broken
        && matches!(outcome, ReleaseOutcome::Failed { .. })));

    Ok(())
}
