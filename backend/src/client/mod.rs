//! HTTP client for the shop stock API
//!
//! Used by dashboards and by the notification coordinator. Reads retry on
//! transient network errors. Mutations do not retry blindly: transfer
//! creation only retries when it carries a request key, and accept, decline
//! and acknowledge report `NotFound` like any other error so callers can
//! treat it as already resolved.

mod sse;

use reqwest::{header::ACCEPT, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    ConfirmOutcome, ConfirmTransferInput, CreateTransferInput, CreatedTransfer, ItemDetails,
    ItemDetailsQuery, ShopNotifications, ShopSession, StockMovementQuery, StockMovements,
    TransferListQuery, TransferRequest,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::services::TransferEvent;

const NO_QUERY: &[(&str, &str)] = &[];

/// Errors seen by API callers
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Safe to retry for reads
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    fn from_code(code: &str, status: u16, message: String) -> Self {
        match code {
            "VALIDATION_ERROR" | "INVALID_DESTINATION" | "INVALID_STATE_TRANSITION" => {
                ClientError::Validation(message)
            }
            "INSUFFICIENT_STOCK" => ClientError::InsufficientStock(message),
            "CONFLICT" => ClientError::Conflict(message),
            "NOT_FOUND" => ClientError::NotFound(message),
            "FORBIDDEN" => ClientError::Forbidden(message),
            "UNAUTHORIZED" => ClientError::Unauthorized(message),
            _ => ClientError::Server { status, message },
        }
    }
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::InsufficientStock { .. } | AppError::Conflict { .. } => 409,
            _ => 500,
        };
        ClientError::from_code(err.code(), status, err.to_string())
    }
}

async fn error_from(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => ClientError::from_code(&parsed.error.code, status, parsed.error.message),
        Err(_) => match status {
            401 => ClientError::Unauthorized(body),
            403 => ClientError::Forbidden(body),
            404 => ClientError::NotFound(body),
            409 => ClientError::Conflict(body),
            400 | 422 => ClientError::Validation(body),
            _ => ClientError::Server {
                status,
                message: body,
            },
        },
    }
}

/// Shop stock API client, acting as one shop session
#[derive(Clone)]
pub struct StockApiClient {
    client: Client,
    base_url: String,
    session: ShopSession,
    max_retries: u32,
    retry_delay: Duration,
}

impl StockApiClient {
    pub fn new(base_url: impl Into<String>, session: ShopSession) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, session: ShopSession) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            max_retries: 3,
            retry_delay: Duration::from_millis(250),
        }
    }

    /// Retry policy for reads and keyed creations
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn session(&self) -> &ShopSession {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .bearer_auth(&self.session.credential)
            .send()
            .await
            .map_err(ClientError::Network)?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Run `attempt` again after transient failures, with linear backoff
    async fn retrying<T, F, Fut>(&self, what: &str, mut attempt: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        let mut tries = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_transient() && tries < self.max_retries => {
                    tries += 1;
                    tracing::warn!("{} failed ({}), retry {}/{}", what, e, tries, self.max_retries);
                    tokio::time::sleep(self.retry_delay * tries).await;
                }
                other => return other,
            }
        }
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.retrying(path, || self.send(self.client.get(&url).query(query)))
            .await
    }

    /// Create a transfer. Only retried on network errors when `request_key` is set.
    pub async fn create_transfer(
        &self,
        input: &CreateTransferInput,
    ) -> Result<CreatedTransfer, ClientError> {
        let url = self.url("/stock-transfer");
        let request = || self.send(self.client.post(&url).json(input));
        if input.request_key.is_some() {
            self.retrying("create transfer", request).await
        } else {
            request().await
        }
    }

    pub async fn list_transfers(
        &self,
        query: &TransferListQuery,
    ) -> Result<Vec<TransferRequest>, ClientError> {
        self.get("/shop-to-shop-transfers", query).await
    }

    pub async fn get_transfer(&self, id: Uuid) -> Result<TransferRequest, ClientError> {
        self.get(&format!("/shop-to-shop-transfers/{}", id), NO_QUERY)
            .await
    }

    pub async fn confirm_transfer(
        &self,
        id: Uuid,
        input: &ConfirmTransferInput,
    ) -> Result<ConfirmOutcome, ClientError> {
        let url = self.url(&format!("/confirm-transfer/{}", id));
        self.send(self.client.post(&url).json(input)).await
    }

    pub async fn accept(&self, id: Uuid) -> Result<ConfirmOutcome, ClientError> {
        self.confirm_transfer(id, &ConfirmTransferInput::accept())
            .await
    }

    pub async fn decline(&self, id: Uuid, note: &str) -> Result<ConfirmOutcome, ClientError> {
        self.confirm_transfer(id, &ConfirmTransferInput::decline(note))
            .await
    }

    pub async fn acknowledge(&self, id: Uuid) -> Result<ConfirmOutcome, ClientError> {
        let url = self.url(&format!("/acknowledge-notification/{}", id));
        self.send(self.client.post(&url)).await
    }

    pub async fn notifications(&self) -> Result<ShopNotifications, ClientError> {
        self.get("/notifications/transfers", NO_QUERY).await
    }

    pub async fn stock_movement(
        &self,
        query: &StockMovementQuery,
    ) -> Result<StockMovements, ClientError> {
        self.get("/stock-movement", query).await
    }

    pub async fn item_details(&self, query: &ItemDetailsQuery) -> Result<ItemDetails, ClientError> {
        self.get("/shop-itemdetailsv2", query).await
    }

    /// Open the transfer event stream of the session shop.
    ///
    /// Events are forwarded from a background task until the server closes
    /// the stream or the receiver is dropped.
    pub async fn subscribe_events(&self) -> Result<mpsc::Receiver<TransferEvent>, ClientError> {
        let mut response = self
            .client
            .get(self.url("/transfer-events"))
            .bearer_auth(&self.session.credential)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(ClientError::Network)?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut parser = sse::EventParser::default();
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        for event in parser.push(&chunk) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("Transfer event stream closed by server");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!("Transfer event stream failed: {}", e);
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_client_errors() {
        assert!(matches!(
            ClientError::from_code("INSUFFICIENT_STOCK", 409, "x".into()),
            ClientError::InsufficientStock(_)
        ));
        assert!(matches!(
            ClientError::from_code("INVALID_DESTINATION", 400, "x".into()),
            ClientError::Validation(_)
        ));
        assert!(matches!(
            ClientError::from_code("DATABASE_ERROR", 500, "x".into()),
            ClientError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn test_app_errors_convert_by_code() {
        let err: ClientError = AppError::NotFound("Transfer".to_string()).into();
        assert!(err.is_not_found());

        let err: ClientError = AppError::Conflict {
            resource: "batch_stock".to_string(),
            message: "lost race".to_string(),
        }
        .into();
        assert!(matches!(err, ClientError::Conflict(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_base_url_trailing_slash_is_ignored() {
        let session = ShopSession::new(Uuid::new_v4(), Uuid::new_v4(), "token");
        let client = StockApiClient::new("http://localhost:3000/", session);
        assert_eq!(client.url("/health"), "http://localhost:3000/api/v1/health");
    }
}
