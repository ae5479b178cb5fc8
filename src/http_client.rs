// 🌐 HTTP Backend - REST client for PIN, transfer and rate endpoints
//
// Non-2xx responses carry `{ "message": ..., "code": ... }`; both are kept on
// ApiError::Status so classification can use them.

use crate::api::{
    PinService, PinStatus, RateQuote, RateSource, SendMoneyRequest, TransferReceipt,
    TransferService, WithdrawRequest,
};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::pin::Pin;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    valid: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PinBody<'a> {
    pin: &'a Pin,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePinBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    current_pin: Option<&'a Pin>,
    new_pin: &'a Pin,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpBackend {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        let backend = Self::new(&config.api_base_url, config.request_timeout())?;
        Ok(match &config.api_token {
            Some(token) => backend.with_token(token),
            None => backend,
        })
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.authorized(self.client.get(self.url(path)));
        let response = request.send().await.map_err(transport_error)?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self.authorized(self.client.post(self.url(path)).json(body));
        let response = request.send().await.map_err(transport_error)?;
        decode(response).await
    }

    async fn post_empty<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self.authorized(self.client.post(self.url(path)).json(body));
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await.map(|_| ())
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
    let (message, code) = match body {
        Some(body) => (body.message.or(body.error), body.code),
        None => (Some(text).filter(|t| !t.trim().is_empty()), None),
    };

    debug!(status = status.as_u16(), ?code, "backend returned error");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
        code,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| ApiError::Status {
        status,
        message: Some(format!("Malformed response: {}", e)),
        code: None,
    })
}

impl PinService for HttpBackend {
    async fn pin_status(&self) -> Result<PinStatus, ApiError> {
        self.get_json("/api/pin/status").await
    }

    async fn setup_pin(&self, pin: &Pin) -> Result<(), ApiError> {
        self.post_empty("/api/pin/setup", &PinBody { pin }).await
    }

    async fn verify_pin(&self, pin: &Pin) -> Result<bool, ApiError> {
        let response: VerifyResponse = self.post_json("/api/pin/verify", &PinBody { pin }).await?;
        Ok(response.valid)
    }

    async fn change_pin(&self, current: Option<&Pin>, new_pin: &Pin) -> Result<(), ApiError> {
        let body = ChangePinBody {
            current_pin: current,
            new_pin,
        };
        self.post_empty("/api/pin/change", &body).await
    }
}

impl TransferService for HttpBackend {
    async fn send_money(&self, request: &SendMoneyRequest) -> Result<TransferReceipt, ApiError> {
        self.post_json("/api/transactions/send", request).await
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> Result<TransferReceipt, ApiError> {
        self.post_json("/api/transactions/withdraw", request).await
    }
}

impl RateSource for HttpBackend {
    async fn rate(&self, currency: &str) -> Result<f64, ApiError> {
        let path = format!("/api/rates/{}", urlencoding::encode(currency));
        let quote: RateQuote = self.get_json(&path).await?;
        Ok(quote.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let backend = HttpBackend::new("http://localhost:8787/", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8787");
        assert_eq!(backend.url("/api/pin/status"), "http://localhost:8787/api/pin/status");
    }

    #[test]
    fn test_change_body_omits_missing_current_pin() {
        let new_pin = Pin::parse("4321").unwrap();
        let body = ChangePinBody {
            current_pin: None,
            new_pin: &new_pin,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"newPin":"4321"}"#);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = backend.pin_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_) | ApiError::Timeout));
    }
}
