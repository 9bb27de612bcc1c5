use reqwest::StatusCode;
use serde::Serialize;

use crate::{Account, AffiliateWithdrawal, LedgerEntry, requests, responses};

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// Header carrying the shared-secret credential for service endpoints.
pub const SERVICE_TOKEN_HEADER: &str = "X-Service-Token";

/// An API client for interfacing with the settlement engine.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
    /// Shared secret attached to service endpoint calls, if configured.
    pub service_token: Option<String>,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn service_post(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> ReqwestResult {
        let mut request =
            self.inner_client.post(self.format_url(path)).json(body);
        if let Some(token) = &self.service_token {
            request = request.header(SERVICE_TOKEN_HEADER, token);
        }
        request.send().await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }
}

/// Methods on the settlement API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn get_account(
        &self,
        details: &requests::GetAccount,
    ) -> Result<Account, ClientError> {
        let response = self.post("get_account", details).await?;
        ok_body(response).await
    }

    pub async fn get_account_entries(
        &self,
        details: &requests::GetAccountEntries,
    ) -> Result<Vec<LedgerEntry>, ClientError> {
        let response = self.post("get_account_entries", details).await?;
        ok_body(response).await
    }

    pub async fn update_payout_destination(
        &self,
        details: &requests::UpdatePayoutDestination,
    ) -> Result<(), ClientError> {
        let response = self.post("update_payout_destination", details).await?;
        ok_empty(response).await
    }

    pub async fn request_withdrawal(
        &self,
        details: &requests::RequestWithdrawal,
    ) -> Result<responses::WithdrawalReceipt, ClientError> {
        let response = self.post("request_withdrawal", details).await?;
        ok_body(response).await
    }

    pub async fn get_withdrawals(
        &self,
        details: &requests::GetWithdrawals,
    ) -> Result<Vec<AffiliateWithdrawal>, ClientError> {
        let response = self.post("get_withdrawals", details).await?;
        ok_body(response).await
    }

    // Service endpoints, authenticated by the shared-secret header.

    pub async fn create_account(
        &self,
        details: &requests::CreateAccount,
    ) -> Result<Account, ClientError> {
        let response = self.service_post("create_account", details).await?;
        ok_body(response).await
    }

    pub async fn set_account_status(
        &self,
        details: &requests::SetAccountStatus,
    ) -> Result<(), ClientError> {
        let response =
            self.service_post("set_account_status", details).await?;
        ok_empty(response).await
    }

    pub async fn record_order(
        &self,
        details: &requests::RecordOrder,
    ) -> Result<(), ClientError> {
        let response = self.service_post("record_order", details).await?;
        ok_empty(response).await
    }

    pub async fn upsert_order_item(
        &self,
        details: &requests::UpsertOrderItem,
    ) -> Result<responses::OrderItem, ClientError> {
        let response = self.service_post("upsert_order_item", details).await?;
        ok_body(response).await
    }

    pub async fn settle_order_payment(
        &self,
        details: &requests::SettleOrderPayment,
    ) -> Result<(), ClientError> {
        let response =
            self.service_post("settle_order_payment", details).await?;
        ok_empty(response).await
    }

    pub async fn mark_order_processing(
        &self,
        details: &requests::MarkOrderProcessing,
    ) -> Result<(), ClientError> {
        let response =
            self.service_post("mark_order_processing", details).await?;
        ok_empty(response).await
    }

    pub async fn mark_order_delivered(
        &self,
        details: &requests::MarkOrderDelivered,
    ) -> Result<(), ClientError> {
        let response =
            self.service_post("mark_order_delivered", details).await?;
        ok_empty(response).await
    }

    pub async fn release_commissions(
        &self,
        details: &requests::ReleaseCommissions,
    ) -> Result<responses::ReleaseReport, ClientError> {
        let response =
            self.service_post("release_commissions", details).await?;
        ok_body(response).await
    }

    pub async fn approve_withdrawal(
        &self,
        details: &requests::ApproveWithdrawal,
    ) -> Result<AffiliateWithdrawal, ClientError> {
        let response =
            self.service_post("approve_withdrawal", details).await?;
        ok_body(response).await
    }

    pub async fn reject_withdrawal(
        &self,
        details: &requests::RejectWithdrawal,
    ) -> Result<AffiliateWithdrawal, ClientError> {
        let response = self.service_post("reject_withdrawal", details).await?;
        ok_body(response).await
    }

    pub async fn mark_withdrawal_paid(
        &self,
        details: &requests::MarkWithdrawalPaid,
    ) -> Result<AffiliateWithdrawal, ClientError> {
        let response =
            self.service_post("mark_withdrawal_paid", details).await?;
        ok_body(response).await
    }

    pub async fn run_audit(
        &self,
        details: &requests::RunAudit,
    ) -> Result<responses::AuditReport, ClientError> {
        let response = self.service_post("run_audit", details).await?;
        ok_body(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
