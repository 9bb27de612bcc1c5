pub mod account;
pub mod orders;
pub mod settlement;
pub mod withdrawal;

use actix_web::{
    HttpRequest, HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, web,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use crate::AppSettings;
use crate::store::StoreError;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(account::create_account)
        .service(account::set_account_status)
        .service(account::get_account)
        .service(account::get_account_entries)
        .service(account::update_payout_destination)
        .service(orders::record_order)
        .service(orders::upsert_order_item)
        .service(orders::settle_order_payment)
        .service(orders::mark_order_processing)
        .service(orders::mark_order_delivered)
        .service(settlement::release_commissions)
        .service(settlement::run_audit)
        .service(withdrawal::request_withdrawal)
        .service(withdrawal::get_withdrawals)
        .service(withdrawal::approve_withdrawal)
        .service(withdrawal::reject_withdrawal)
        .service(withdrawal::mark_withdrawal_paid)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::AuthError(e) => {
                HttpResponse::Unauthorized().body(format!("{self}: {e}"))
            }
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) => APIError::UnexpectedError(e.into()),
            StoreError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::AccountNotFound => APIError::NotFound(e.into()),
            StoreError::OrderNotFound => APIError::NotFound(e.into()),
            StoreError::OrderItemNotFound => APIError::NotFound(e.into()),
            StoreError::AffiliateSaleNotFound => APIError::NotFound(e.into()),
            StoreError::WithdrawalNotFound => APIError::NotFound(e.into()),
            // Business rejections surface as bad requests with the reason.
            _ => APIError::BadRequest(e.into()),
        }
    }
}

/// Authenticate a service endpoint call against the shared secret.
///
/// Comparing digests instead of the raw strings keeps the comparison
/// independent of where the strings first differ.
fn require_service_token(
    req: &HttpRequest,
    settings: &AppSettings,
) -> Result<(), APIError> {
    let provided = req
        .headers()
        .get(payloads::SERVICE_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            APIError::AuthError(anyhow::anyhow!("Missing service token"))
        })?;

    let expected =
        Sha256::digest(settings.service_token.expose_secret().as_bytes());
    let provided = Sha256::digest(provided.as_bytes());
    if expected != provided {
        return Err(APIError::AuthError(anyhow::anyhow!(
            "Invalid service token"
        )));
    }
    Ok(())
}
