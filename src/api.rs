// 🔌 Backend Contracts - PIN, transfer and rate services
// Wire types are camelCase JSON; implementations live in http_client and in tests

use crate::error::ApiError;
use crate::pin::Pin;
use crate::transfer::{TransferCategory, TransferKind};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinStatus {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMoneyRequest {
    pub recipient_phone: String,
    pub recipient_name: String,
    pub amount: f64,
    pub currency: String,
    pub recipient_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TransferCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub pin: Pin,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub account_number: String,
    pub bank_code: String,
    pub account_name: String,
    pub amount: f64,
    pub currency: String,
    pub recipient_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub pin: Pin,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub kind: Option<TransferKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub currency: String,
    pub rate: f64,
}

// ============================================================================
// SERVICE TRAITS
// ============================================================================

pub trait PinService: Send + Sync {
    fn pin_status(&self) -> impl Future<Output = Result<PinStatus, ApiError>> + Send;

    fn setup_pin(&self, pin: &Pin) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `Ok(false)` means the backend answered and the PIN was wrong
    fn verify_pin(&self, pin: &Pin) -> impl Future<Output = Result<bool, ApiError>> + Send;

    fn change_pin(
        &self,
        current: Option<&Pin>,
        new_pin: &Pin,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

pub trait TransferService: Send + Sync {
    fn send_money(
        &self,
        request: &SendMoneyRequest,
    ) -> impl Future<Output = Result<TransferReceipt, ApiError>> + Send;

    fn withdraw(
        &self,
        request: &WithdrawRequest,
    ) -> impl Future<Output = Result<TransferReceipt, ApiError>> + Send;
}

/// Exchange rate from the input currency into `currency`
pub trait RateSource: Send + Sync {
    fn rate(&self, currency: &str) -> impl Future<Output = Result<f64, ApiError>> + Send;
}

// Shared handles delegate to the inner service

impl<T: PinService> PinService for Arc<T> {
    async fn pin_status(&self) -> Result<PinStatus, ApiError> {
        (**self).pin_status().await
    }

    async fn setup_pin(&self, pin: &Pin) -> Result<(), ApiError> {
        (**self).setup_pin(pin).await
    }

    async fn verify_pin(&self, pin: &Pin) -> Result<bool, ApiError> {
        (**self).verify_pin(pin).await
    }

    async fn change_pin(&self, current: Option<&Pin>, new_pin: &Pin) -> Result<(), ApiError> {
        (**self).change_pin(current, new_pin).await
    }
}

impl<T: TransferService> TransferService for Arc<T> {
    async fn send_money(&self, request: &SendMoneyRequest) -> Result<TransferReceipt, ApiError> {
        (**self).send_money(request).await
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> Result<TransferReceipt, ApiError> {
        (**self).withdraw(request).await
    }
}

impl<T: RateSource> RateSource for Arc<T> {
    async fn rate(&self, currency: &str) -> Result<f64, ApiError> {
        (**self).rate(currency).await
    }
}
