//! Binance Futures REST Client
//!
//! Implements [`ExchangePort`] against the USDⓈ-M futures REST API:
//!
//! - `POST /fapi/v1/listenKey`: create a listen key
//! - `PUT /fapi/v1/listenKey`: extend it by 60 minutes
//! - `DELETE /fapi/v1/order`: cancel by `origClientOrderId` (signed)
//!
//! Calls are never retried here. A failed cancel is reported to the caller
//! and a failed renewal is picked up again by the next timer tick.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};

use super::messages::{BinanceErrorResponse, ListenKeyResponse};
use super::signing::{API_KEY_HEADER, RequestSigner};
use crate::application::ports::{CancelError, ExchangePort, ListenKey, SessionError};

const LISTEN_KEY_PATH: &str = "/fapi/v1/listenKey";
const ORDER_PATH: &str = "/fapi/v1/order";

/// Errors building the REST client.
#[derive(Debug, thiserror::Error)]
pub enum RestClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// REST client for the futures API.
#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    client: Client,
    base_url: String,
    signer: RequestSigner,
}

impl BinanceRestClient {
    /// Create a client for `base_url` (e.g. `https://fapi.binance.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        signer: RequestSigner,
        timeout: Duration,
    ) -> Result<Self, RestClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    async fn send(&self, method: Method, path_and_query: &str) -> reqwest::Result<Response> {
        self.client
            .request(method, format!("{}{path_and_query}", self.base_url))
            .header(API_KEY_HEADER, self.signer.api_key())
            .send()
            .await
    }
}

#[async_trait]
impl ExchangePort for BinanceRestClient {
    async fn obtain_stream_credential(&self) -> Result<ListenKey, SessionError> {
        let response = self
            .send(Method::POST, LISTEN_KEY_PATH)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ListenKeyResponse = serde_json::from_str(&body)
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
        Ok(ListenKey::new(parsed.listen_key))
    }

    async fn renew_stream_credential(&self, key: &ListenKey) -> Result<(), SessionError> {
        let path = format!("{LISTEN_KEY_PATH}?listenKey={}", key.as_str());
        let response = self
            .send(Method::PUT, &path)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SessionError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn cancel_order(&self, symbol: &str, client_order_id: &str) -> Result<(), CancelError> {
        let query = self
            .signer
            .signed_query(&[("symbol", symbol), ("origClientOrderId", client_order_id)])
            .map_err(|e| CancelError::Signing(e.to_string()))?;

        let response = self
            .send(Method::DELETE, &format!("{ORDER_PATH}?{query}"))
            .await
            .map_err(|e| CancelError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<BinanceErrorResponse>(&body) {
            Ok(err) => CancelError::Rejected {
                code: err.code,
                msg: err.msg,
            },
            Err(_) => CancelError::Http {
                status: status.as_u16(),
                body,
            },
        })
    }
}
