use payloads::{AccountOwner, AccountStatus, requests};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use test_helpers::{assert_status_code, bank_destination, spawn_app};
use uuid::Uuid;

#[tokio::test]
async fn new_account_starts_empty_and_active() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;

    let account = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Seller(seller_id),
        })
        .await?;

    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(account.blocked_balance, Decimal::ZERO);
    assert_eq!(account.total_received, Decimal::ZERO);
    assert_eq!(account.total_withdrawn, Decimal::ZERO);
    assert_eq!(account.payout_destination, None);

    Ok(())
}

#[tokio::test]
async fn one_account_per_owner() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;

    let result = app
        .client
        .create_account(&requests::CreateAccount {
            owner: AccountOwner::Seller(seller_id),
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unknown_owner_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app
        .client
        .get_account(&requests::GetAccount {
            owner: AccountOwner::Seller(payloads::SellerId(Uuid::new_v4())),
        })
        .await;

    assert_status_code(result, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn payout_destination_round_trips() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;
    let owner = AccountOwner::Seller(seller_id);

    app.client
        .update_payout_destination(&requests::UpdatePayoutDestination {
            owner,
            destination: bank_destination(),
        })
        .await?;

    let account = app
        .client
        .get_account(&requests::GetAccount { owner })
        .await?;
    assert_eq!(account.payout_destination, Some(bank_destination()));

    Ok(())
}

#[tokio::test]
async fn malformed_pix_key_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seller_id = app.create_seller().await?;

    // a cpf key must be exactly eleven digits
    let result = app
        .client
        .update_payout_destination(&requests::UpdatePayoutDestination {
            owner: AccountOwner::Seller(seller_id),
            destination: payloads::PayoutDestination::Pix {
                key_type: payloads::PixKeyType::Cpf,
                key: "not-a-cpf".into(),
            },
        })
        .await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn status_change_round_trips() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let affiliate_id = app.create_affiliate().await?;
    let owner = AccountOwner::Affiliate(affiliate_id);

    app.client
        .set_account_status(&requests::SetAccountStatus {
            owner,
            status: AccountStatus::Suspended,
        })
        .await?;

    let account = app
        .client
        .get_account(&requests::GetAccount { owner })
        .await?;
    assert_eq!(account.status, AccountStatus::Suspended);

    Ok(())
}

#[tokio::test]
async fn service_endpoints_require_the_token() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let anonymous = payloads::APIClient {
        address: app.client.address.clone(),
        inner_client: reqwest::Client::new(),
        service_token: None,
    };
    let result = anonymous
        .create_account(&requests::CreateAccount {
            owner: AccountOwner::Seller(payloads::SellerId(Uuid::new_v4())),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    let wrong_token = payloads::APIClient {
        address: app.client.address.clone(),
        inner_client: reqwest::Client::new(),
        service_token: Some("wrong-token".into()),
    };
    let result = wrong_token
        .create_account(&requests::CreateAccount {
            owner: AccountOwner::Seller(payloads::SellerId(Uuid::new_v4())),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}
