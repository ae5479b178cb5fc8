// In-memory backend double shared by the flow tests

use crate::api::{
    PinService, PinStatus, RateSource, SendMoneyRequest, TransferReceipt, TransferService,
    WithdrawRequest,
};
use crate::error::ApiError;
use crate::pin::Pin;
use crate::transfer::TransferKind;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PinCall {
    Status,
    Setup(String),
    Verify(String),
    Change(Option<String>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferCall {
    Send {
        phone: String,
        amount: f64,
        converted_amount: Option<f64>,
        pin: String,
    },
    Withdraw {
        account_number: String,
        bank_code: String,
        amount: f64,
    },
}

pub struct MockBackend {
    pin_enabled: bool,
    valid_pin: String,
    verify_error: Option<ApiError>,
    commit_error: Option<ApiError>,
    transfer_error: Option<ApiError>,
    latency: Option<Duration>,
    rates: Mutex<HashMap<String, f64>>,
    rate_error: Mutex<Option<ApiError>>,
    pin_calls: Mutex<Vec<PinCall>>,
    transfer_calls: Mutex<Vec<TransferCall>>,
    rate_calls: Mutex<usize>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend {
            pin_enabled: true,
            valid_pin: "1234".to_string(),
            verify_error: None,
            commit_error: None,
            transfer_error: None,
            latency: None,
            rates: Mutex::new(HashMap::new()),
            rate_error: Mutex::new(None),
            pin_calls: Mutex::new(Vec::new()),
            transfer_calls: Mutex::new(Vec::new()),
            rate_calls: Mutex::new(0),
        }
    }

    pub fn with_pin_enabled(mut self, enabled: bool) -> Self {
        self.pin_enabled = enabled;
        self
    }

    pub fn with_valid_pin(mut self, pin: &str) -> Self {
        self.valid_pin = pin.to_string();
        self
    }

    pub fn with_verify_error(mut self, err: ApiError) -> Self {
        self.verify_error = Some(err);
        self
    }

    pub fn with_commit_error(mut self, err: ApiError) -> Self {
        self.commit_error = Some(err);
        self
    }

    pub fn with_transfer_error(mut self, err: ApiError) -> Self {
        self.transfer_error = Some(err);
        self
    }

    /// Delay PIN status and transfer responses by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_rate(self, currency: &str, rate: f64) -> Self {
        self.set_rate(currency, rate);
        self
    }

    pub fn set_rate(&self, currency: &str, rate: f64) {
        self.rates.lock().unwrap().insert(currency.to_string(), rate);
    }

    pub fn set_rate_error(&self, err: Option<ApiError>) {
        *self.rate_error.lock().unwrap() = err;
    }

    pub fn pin_calls(&self) -> Vec<PinCall> {
        self.pin_calls.lock().unwrap().clone()
    }

    pub fn transfer_calls(&self) -> Vec<TransferCall> {
        self.transfer_calls.lock().unwrap().clone()
    }

    pub fn rate_calls(&self) -> usize {
        *self.rate_calls.lock().unwrap()
    }

    async fn respond_later(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record_pin(&self, call: PinCall) {
        self.pin_calls.lock().unwrap().push(call);
    }

    fn receipt(&self, kind: TransferKind) -> TransferReceipt {
        let n = self.transfer_calls.lock().unwrap().len();
        TransferReceipt {
            transaction_id: format!("tx-{}", n),
            status: Some("pending".to_string()),
            kind: Some(kind),
        }
    }
}

impl PinService for MockBackend {
    async fn pin_status(&self) -> Result<PinStatus, ApiError> {
        self.record_pin(PinCall::Status);
        self.respond_later().await;
        Ok(PinStatus {
            enabled: self.pin_enabled,
            locked_until: None,
        })
    }

    async fn setup_pin(&self, pin: &Pin) -> Result<(), ApiError> {
        self.record_pin(PinCall::Setup(pin.as_str().to_string()));
        self.commit_error.clone().map_or(Ok(()), Err)
    }

    async fn verify_pin(&self, pin: &Pin) -> Result<bool, ApiError> {
        self.record_pin(PinCall::Verify(pin.as_str().to_string()));
        match &self.verify_error {
            Some(err) => Err(err.clone()),
            None => Ok(pin.as_str() == self.valid_pin),
        }
    }

    async fn change_pin(&self, current: Option<&Pin>, new_pin: &Pin) -> Result<(), ApiError> {
        self.record_pin(PinCall::Change(
            current.map(|p| p.as_str().to_string()),
            new_pin.as_str().to_string(),
        ));
        self.commit_error.clone().map_or(Ok(()), Err)
    }
}

impl TransferService for MockBackend {
    async fn send_money(&self, request: &SendMoneyRequest) -> Result<TransferReceipt, ApiError> {
        self.transfer_calls.lock().unwrap().push(TransferCall::Send {
            phone: request.recipient_phone.clone(),
            amount: request.amount,
            converted_amount: request.converted_amount,
            pin: request.pin.as_str().to_string(),
        });
        self.respond_later().await;
        match &self.transfer_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.receipt(TransferKind::AppTransfer)),
        }
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> Result<TransferReceipt, ApiError> {
        self.transfer_calls.lock().unwrap().push(TransferCall::Withdraw {
            account_number: request.account_number.clone(),
            bank_code: request.bank_code.clone(),
            amount: request.amount,
        });
        self.respond_later().await;
        match &self.transfer_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.receipt(TransferKind::BankWithdrawal)),
        }
    }
}

impl RateSource for MockBackend {
    async fn rate(&self, currency: &str) -> Result<f64, ApiError> {
        *self.rate_calls.lock().unwrap() += 1;
        if let Some(err) = self.rate_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.rates
            .lock()
            .unwrap()
            .get(currency)
            .copied()
            .ok_or_else(|| ApiError::status(404, format!("no rate for {}", currency)))
    }
}
