//! On-demand commission release and consistency audits. Both also run on
//! schedules; these endpoints exist for operators and for order-management
//! to force a pass over specific orders.

use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::AppSettings;
use crate::settlement::release_affiliate_commissions;
use crate::store;

use super::{APIError, require_service_token};

#[tracing::instrument(skip(req, pool, settings, time_source), ret)]
#[post("/release_commissions")]
pub async fn release_commissions(
    req: HttpRequest,
    details: web::Json<requests::ReleaseCommissions>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
    time_source: web::Data<crate::time::TimeSource>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let report = release_affiliate_commissions(
        &pool,
        &time_source,
        settings.holdback,
        details.order_ids.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(report))
}

#[tracing::instrument(skip(req, pool, settings), ret)]
#[post("/run_audit")]
pub async fn run_audit(
    req: HttpRequest,
    details: web::Json<requests::RunAudit>,
    pool: web::Data<PgPool>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, APIError> {
    require_service_token(&req, &settings)?;

    let report =
        store::audit::run_audit(details.stuck_after_hours, &pool).await?;

    Ok(HttpResponse::Ok().json(report))
}
