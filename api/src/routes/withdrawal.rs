use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::AppSettings;
use crate::store;

use super::{APIError, require_service_token};

#[tracing::instrument(skip(pool, settings, time_source), ret)]
#[post("/request_withdrawal")]
pub async fn request_withdrawal(
    details: web::Json<requests::RequestWithdrawal>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    let receipt = store::withdrawal::request_withdrawal(
        &details.affiliate_id,
        details.amount,
        settings.minimum_withdrawal,
        &time_source,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(receipt))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/get_withdrawals")]
pub async fn get_withdrawals(
    details: web::Json<requests::GetWithdrawals>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let withdrawals =
        store::withdrawal::list_withdrawals(&details.affiliate_id, &pool)
            .await?;

    Ok(HttpResponse::Ok().json(withdrawals))
}

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/approve_withdrawal")]
pub async fn approve_withdrawal(
    req: HttpRequest,
    details: web::Json<requests::ApproveWithdrawal>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let withdrawal = store::withdrawal::approve_withdrawal(
        &details.withdrawal_id,
        &time_source,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(withdrawal))
}

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/reject_withdrawal")]
pub async fn reject_withdrawal(
    req: HttpRequest,
    details: web::Json<requests::RejectWithdrawal>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let withdrawal = store::withdrawal::reject_withdrawal(
        &details.withdrawal_id,
        &time_source,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(withdrawal))
}

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/mark_withdrawal_paid")]
pub async fn mark_withdrawal_paid(
    req: HttpRequest,
    details: web::Json<requests::MarkWithdrawalPaid>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let withdrawal = store::withdrawal::mark_withdrawal_paid(
        &details.withdrawal_id,
        &time_source,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(withdrawal))
}
