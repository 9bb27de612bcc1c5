use jiff::Span;
use payloads::{
    AccountOwner, AccountStatus, AffiliateId, WithdrawalStatus, requests,
};
use reqwest::StatusCode;
use rust_decimal::{Decimal, dec};
use test_helpers::{TestApp, assert_status_code, spawn_app};

/// Seed an affiliate with matured, credited commissions of the given
/// amounts, oldest first.
async fn affiliate_with_credited_sales(
    app: &TestApp,
    amounts: &[Decimal],
) -> anyhow::Result<AffiliateId> {
    let affiliate_id = app.create_affiliate().await?;
    let base = app.time_source.now() - Span::new().hours(30 * 24);
    for (i, amount) in amounts.iter().enumerate() {
        let delivered_at = base + Span::new().hours(i as i64);
        app.delivered_attributed_order(
            affiliate_id,
            *amount,
            Some(delivered_at),
        )
        .await?;
    }
    app.release_all_commissions().await?;
    Ok(affiliate_id)
}

#[tokio::test]
async fn withdrawal_consumes_matured_sales_oldest_first()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = affiliate_with_credited_sales(
        &app,
        &[dec!(30), dec!(40), dec!(40)],
    )
    .await?;

    let receipt = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(50),
        })
        .await?;

    assert_eq!(receipt.amount, dec!(50));
    assert_eq!(receipt.status, WithdrawalStatus::Pending);
    // 30 + 40 covers the request; the margin sale is consumed in full
    assert_eq!(receipt.consumed_sales.len(), 2);

    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Affiliate(affiliate_id),
        })
        .await?;
    assert_eq!(account.balance, dec!(60));
    assert_eq!(account.total_withdrawn, dec!(50));

    Ok(())
}

#[tokio::test]
async fn requests_below_the_minimum_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id =
        affiliate_with_credited_sales(&app, &[dec!(100)]).await?;

    let result = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(49.99),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    // exactly the minimum goes through
    app.client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: test_helpers::MINIMUM_WITHDRAWAL,
        })
        .await?;

    Ok(())
}

#[tokio::test]
async fn unmatured_sales_do_not_cover_withdrawals() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    // delivered today; holdback still running
    app.delivered_attributed_order(affiliate_id, dec!(80), None)
        .await?;
    app.release_all_commissions().await?;

    let result = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(50),
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn withdrawal_requires_a_payout_destination() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate_without_destination().await?;

    let result = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(50),
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn suspended_accounts_cannot_withdraw() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id =
        affiliate_with_credited_sales(&app, &[dec!(100)]).await?;
    app.client
        .set_account_status(&requests::SetAccountStatus {
            owner: AccountOwner::Affiliate(affiliate_id),
            status: AccountStatus::Suspended,
        })
        .await?;

    let result = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(50),
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_cannot_double_spend() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id =
        affiliate_with_credited_sales(&app, &[dec!(30), dec!(40)]).await?;

    // 70 available; only one request of 50 can be covered
    let first_request = requests::RequestWithdrawal {
        affiliate_id,
        amount: dec!(50),
    };
    let second_request = requests::RequestWithdrawal {
        affiliate_id,
        amount: dec!(50),
    };
    let (first, second) = tokio::join!(
        app.client.request_withdrawal(&first_request),
        app.client.request_withdrawal(&second_request),
    );

    let successes =
        [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Affiliate(affiliate_id),
        })
        .await?;
    assert_eq!(account.total_withdrawn, dec!(50));

    Ok(())
}

#[tokio::test]
async fn rejection_restores_the_consumed_sales() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = affiliate_with_credited_sales(
        &app,
        &[dec!(30), dec!(40), dec!(40)],
    )
    .await?;

    let receipt = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(50),
        })
        .await?;

    let rejected = app
        .client
        .reject_withdrawal(&requests::RejectWithdrawal {
            withdrawal_id: receipt.withdrawal_id,
        })
        .await?;
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert!(rejected.rejected_at.is_some());

    // the reversal restored the wallet and the sales
    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Affiliate(affiliate_id),
        })
        .await?;
    assert_eq!(account.balance, dec!(110));

    // everything is available again
    let receipt = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(110),
        })
        .await?;
    assert_eq!(receipt.consumed_sales.len(), 3);

    Ok(())
}

#[tokio::test]
async fn lifecycle_transitions_are_enforced() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id =
        affiliate_with_credited_sales(&app, &[dec!(100)]).await?;
    let receipt = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(60),
        })
        .await?;
    let withdrawal_id = receipt.withdrawal_id;

    // paying an unapproved withdrawal is refused
    let result = app
        .client
        .mark_withdrawal_paid(&requests::MarkWithdrawalPaid {
            withdrawal_id,
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let approved = app
        .client
        .approve_withdrawal(&requests::ApproveWithdrawal { withdrawal_id })
        .await?;
    assert_eq!(approved.status, WithdrawalStatus::Approved);

    // approving twice is refused
    let result = app
        .client
        .approve_withdrawal(&requests::ApproveWithdrawal { withdrawal_id })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let paid = app
        .client
        .mark_withdrawal_paid(&requests::MarkWithdrawalPaid {
            withdrawal_id,
        })
        .await?;
    assert_eq!(paid.status, WithdrawalStatus::Paid);
    assert!(paid.paid_at.is_some());

    // rejecting a paid withdrawal is refused
    let result = app
        .client
        .reject_withdrawal(&requests::RejectWithdrawal { withdrawal_id })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn history_lists_newest_first() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = affiliate_with_credited_sales(
        &app,
        &[dec!(60), dec!(60)],
    )
    .await?;

    let first = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(50),
        })
        .await?;
    app.time_source.advance(Span::new().hours(1));
    let second = app
        .client
        .request_withdrawal(&requests::RequestWithdrawal {
            affiliate_id,
            amount: dec!(60),
        })
        .await?;

    let withdrawals = app
        .client
        .get_withdrawals(&requests::GetWithdrawals { affiliate_id })
        .await?;

    assert_eq!(withdrawals.len(), 2);
    assert_eq!(withdrawals[0].id, second.withdrawal_id);
    assert_eq!(withdrawals[1].id, first.withdrawal_id);

    Ok(())
}
