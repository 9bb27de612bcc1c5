//! Order event intake from order-management.

use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::AppSettings;
use crate::store;

use super::{APIError, require_service_token};

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/record_order")]
pub async fn record_order(
    req: HttpRequest,
    details: web::Json<requests::RecordOrder>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    store::orders::record_order(&details, &time_source, &pool).await?;

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/upsert_order_item")]
pub async fn upsert_order_item(
    req: HttpRequest,
    details: web::Json<requests::UpsertOrderItem>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let item =
        store::orders::upsert_order_item(&details, &time_source, &pool)
            .await?;

    Ok(HttpResponse::Ok().json(item))
}

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/settle_order_payment")]
pub async fn settle_order_payment(
    req: HttpRequest,
    details: web::Json<requests::SettleOrderPayment>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    store::orders::settle_order_payment(
        &details.order_id,
        &time_source,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(req, pool, settings), ret)]
#[post("/mark_order_processing")]
pub async fn mark_order_processing(
    req: HttpRequest,
    details: web::Json<requests::MarkOrderProcessing>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    store::orders::mark_order_processing(&details.order_id, &pool).await?;

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/mark_order_delivered")]
pub async fn mark_order_delivered(
    req: HttpRequest,
    details: web::Json<requests::MarkOrderDelivered>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    store::orders::mark_order_delivered(
        &details.order_id,
        details.delivered_at,
        &time_source,
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().finish())
}
