//! Expo push API client
//!
//! This module provides a client for the Expo push service HTTP API. Messages
//! are sent in batches to `/push/send`; each accepted message yields a ticket
//! id that can later be exchanged for a delivery receipt at
//! `/push/getReceipts`.
//!
//! The main component is the `ExpoPushClient` struct, which implements the
//! [`PushProvider`] trait used by the dispatcher and the receipt reconciler.

use civic_common::{
    BoxFuture, CivicError, PushErrorCode, PushMessage, PushProvider, PushTicket, ReceiptStatus,
};
use civic_config::PushConfig;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when talking to the push API
#[derive(Error, Debug)]
pub enum PushError {
    /// Error during the HTTP request, including timeouts
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Push API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The API answered with a body we could not interpret
    #[error("Unexpected push API response: {0}")]
    DecodeError(String),

    /// Missing or invalid configuration
    #[error("Push configuration error: {0}")]
    ConfigError(String),
}

impl PushError {
    /// Whether the outcome is unknown and the work may be retried on a later run
    pub fn is_transient(&self) -> bool {
        match self {
            PushError::RequestError(_) | PushError::DecodeError(_) => true,
            PushError::ApiError { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            PushError::ConfigError(_) => false,
        }
    }
}

impl From<PushError> for CivicError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::RequestError(e) if e.is_timeout() => CivicError::TimeoutError(e.to_string()),
            PushError::ConfigError(msg) => CivicError::ConfigError(msg),
            other => CivicError::ExternalServiceError {
                service_name: "push".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Response of `/push/send`
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    data: Vec<ApiTicket>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ApiTicket {
    Ok {
        id: String,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        details: Option<ErrorDetails>,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReceiptsRequest<'a> {
    ids: &'a [String],
}

/// Response of `/push/getReceipts`
#[derive(Debug, Deserialize)]
struct ReceiptsResponse {
    #[serde(default)]
    data: HashMap<String, ApiReceipt>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ApiReceipt {
    Ok {},
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        details: Option<ErrorDetails>,
    },
}

fn error_code(details: Option<ErrorDetails>) -> PushErrorCode {
    details
        .and_then(|d| d.error)
        .map(|code| PushErrorCode::from_provider(&code))
        .unwrap_or_else(|| PushErrorCode::Other("Unknown".to_string()))
}

/// Whether `token` looks like an Expo push token, e.g. `ExponentPushToken[xxxx]`
pub fn is_expo_push_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["]
        .iter()
        .find_map(|prefix| token.strip_prefix(prefix))
        .and_then(|rest| rest.strip_suffix(']'))
        .map(|inner| !inner.is_empty())
        .unwrap_or(false)
}

/// Client for the Expo push API
#[derive(Debug, Clone)]
pub struct ExpoPushClient {
    client: Client,
    config: PushConfig,
}

impl ExpoPushClient {
    /// Creates a new client; requests time out after `request_timeout_secs`.
    pub fn new(config: PushConfig) -> Result<Self, PushError> {
        if config.api_url.trim().is_empty() {
            return Err(PushError::ConfigError("push.api_url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(self.endpoint(path))
            .header(header::ACCEPT, "application/json");

        match self.config.access_token.as_deref() {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }

    /// Sends one batch and returns one ticket per message, in order.
    ///
    /// # Errors
    ///
    /// Fails as a whole when the request fails, the API answers with a
    /// non-success status, or the number of tickets does not match.
    pub async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = messages.len(), "Sending push batch");

        let response = self.request("push/send").json(messages).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| PushError::DecodeError(e.to_string()))?;

        if parsed.data.len() != messages.len() {
            return Err(PushError::DecodeError(format!(
                "expected {} tickets, got {}",
                messages.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed
            .data
            .into_iter()
            .map(|ticket| match ticket {
                ApiTicket::Ok { id } => PushTicket::Accepted { receipt_id: id },
                ApiTicket::Error { message, details } => PushTicket::Rejected {
                    code: error_code(details),
                    message,
                },
            })
            .collect())
    }

    /// Looks up delivery receipts. Ids the service has no receipt for yet are absent.
    pub async fn get_receipts(
        &self,
        receipt_ids: &[String],
    ) -> Result<HashMap<String, ReceiptStatus>, PushError> {
        if receipt_ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(count = receipt_ids.len(), "Fetching push receipts");

        let response = self
            .request("push/getReceipts")
            .json(&ReceiptsRequest { ids: receipt_ids })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ReceiptsResponse = response
            .json()
            .await
            .map_err(|e| PushError::DecodeError(e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|(id, receipt)| {
                let status = match receipt {
                    ApiReceipt::Ok {} => ReceiptStatus::Ok,
                    ApiReceipt::Error { message, details } => {
                        let code = error_code(details);
                        warn!(receipt_id = %id, code = code.as_str(), "Push receipt reported an error");
                        ReceiptStatus::Error { code, message }
                    }
                };
                (id, status)
            })
            .collect())
    }
}

impl PushProvider for ExpoPushClient {
    fn max_batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    fn max_receipt_batch_size(&self) -> usize {
        self.config.receipt_batch_size.max(1)
    }

    fn is_valid_token(&self, token: &str) -> bool {
        is_expo_push_token(token)
    }

    fn send<'a>(&'a self, messages: &'a [PushMessage]) -> BoxFuture<'a, Vec<PushTicket>, CivicError> {
        Box::pin(async move { self.send_batch(messages).await.map_err(CivicError::from) })
    }

    fn check_receipts<'a>(
        &'a self,
        receipt_ids: &'a [String],
    ) -> BoxFuture<'a, HashMap<String, ReceiptStatus>, CivicError> {
        Box::pin(async move { self.get_receipts(receipt_ids).await.map_err(CivicError::from) })
    }
}
