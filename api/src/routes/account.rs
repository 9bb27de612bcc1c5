use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::AppSettings;
use crate::store;

use super::{APIError, require_service_token};

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/create_account")]
pub async fn create_account(
    req: HttpRequest,
    details: web::Json<requests::CreateAccount>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let account =
        store::create_account(details.owner, &time_source, &pool).await?;

    Ok(HttpResponse::Ok().json(account))
}

#[tracing::instrument(skip(req, pool, settings), ret)]
#[post("/set_account_status")]
pub async fn set_account_status(
    req: HttpRequest,
    details: web::Json<requests::SetAccountStatus>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    store::set_account_status(details.owner, details.status, &pool).await?;

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(pool), ret)]
#[post("/get_account")]
pub async fn get_account(
    details: web::Json<requests::GetAccount>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let account = store::get_account(details.owner, &pool).await?;

    Ok(HttpResponse::Ok().json(account))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/get_account_entries")]
pub async fn get_account_entries(
    details: web::Json<requests::GetAccountEntries>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let account = store::get_account(details.owner, &pool).await?;
    let entries = store::ledger::list_entries(
        &account.id,
        details.limit,
        details.offset,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(entries))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/update_payout_destination")]
pub async fn update_payout_destination(
    details: web::Json<requests::UpdatePayoutDestination>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    store::update_payout_destination(
        details.owner,
        &details.destination,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().finish())
}
