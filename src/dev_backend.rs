// 🧪 Dev Backend - in-memory stand-in for the remote API
// Same routes and error bodies as the real service; one wallet, one PIN

use crate::api::{PinStatus, RateQuote, TransferReceipt};
use crate::error::TransferErrorCode;
use crate::transfer::{TransferCategory, TransferKind};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Bank code the dev backend always reports as offline
pub const OFFLINE_BANK_CODE: &str = "999";

/// Converted amounts further than this from the live rate are stale
const RATE_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone)]
pub struct DevTransaction {
    pub id: String,
    pub kind: TransferKind,
    pub amount: f64,
    pub fee: f64,
    pub counterparty: String,
    pub category: Option<TransferCategory>,
}

#[derive(Debug)]
pub struct DevState {
    pub pin_hash: Option<String>,
    pub balance: f64,
    pub fee_rate: f64,
    pub daily_limit: f64,
    pub daily_total: f64,
    pub restricted: bool,
    pub rates: HashMap<String, f64>,
    pub transactions: Vec<DevTransaction>,
    idempotency: HashMap<String, String>,
}

impl Default for DevState {
    fn default() -> Self {
        let rates = [
            ("GBP", 0.79),
            ("EUR", 0.92),
            ("NGN", 1550.0),
            ("KES", 129.5),
            ("GHS", 15.2),
            ("CAD", 1.36),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        DevState {
            pin_hash: None,
            balance: 5_000.0,
            fee_rate: 0.02,
            daily_limit: 10_000.0,
            daily_total: 0.0,
            restricted: false,
            rates,
            transactions: Vec::new(),
            idempotency: HashMap::new(),
        }
    }
}

pub type SharedState = Arc<Mutex<DevState>>;

pub fn default_state() -> SharedState {
    Arc::new(Mutex::new(DevState::default()))
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/pin/status", get(pin_status))
        .route("/api/pin/setup", post(setup_pin))
        .route("/api/pin/verify", post(verify_pin))
        .route("/api/pin/change", post(change_pin))
        .route("/api/transactions/send", post(send_money))
        .route("/api/transactions/withdraw", post(withdraw))
        .route("/api/rates/:currency", get(get_rate))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

fn lock(state: &SharedState) -> MutexGuard<'_, DevState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn hash_pin(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("dev-salt:{}", pin));
    format!("{:x}", hasher.finalize())
}

fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}

fn error_response(status: StatusCode, message: &str, code: Option<TransferErrorCode>) -> Response {
    let body = serde_json::json!({
        "message": message,
        "code": code.map(|c| c.as_str()),
    });
    (status, Json(body)).into_response()
}

fn ok() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

// ============================================================================
// PIN HANDLERS
// ============================================================================

#[derive(Deserialize)]
struct PinBody {
    pin: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePinBody {
    #[serde(default)]
    current_pin: Option<String>,
    new_pin: String,
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "success": true, "data": "OK" }))
}

async fn pin_status(State(state): State<SharedState>) -> Response {
    let state = lock(&state);
    Json(PinStatus {
        enabled: state.pin_hash.is_some(),
        locked_until: None,
    })
    .into_response()
}

async fn setup_pin(State(state): State<SharedState>, Json(body): Json<PinBody>) -> Response {
    let mut state = lock(&state);
    if state.pin_hash.is_some() {
        return error_response(StatusCode::CONFLICT, "PIN already set up", None);
    }
    if !is_valid_pin(&body.pin) {
        return error_response(StatusCode::BAD_REQUEST, "PIN must be 4 digits", None);
    }
    state.pin_hash = Some(hash_pin(&body.pin));
    info!("dev backend: PIN set up");
    ok()
}

async fn verify_pin(State(state): State<SharedState>, Json(body): Json<PinBody>) -> Response {
    let state = lock(&state);
    match &state.pin_hash {
        None => error_response(StatusCode::BAD_REQUEST, "PIN not set up", None),
        Some(hash) => {
            let valid = *hash == hash_pin(&body.pin);
            Json(serde_json::json!({ "valid": valid })).into_response()
        }
    }
}

async fn change_pin(State(state): State<SharedState>, Json(body): Json<ChangePinBody>) -> Response {
    let mut state = lock(&state);
    if let (Some(hash), Some(current)) = (&state.pin_hash, &body.current_pin) {
        if *hash != hash_pin(current) {
            return error_response(StatusCode::BAD_REQUEST, "Current PIN is incorrect", None);
        }
    }
    if !is_valid_pin(&body.new_pin) {
        return error_response(StatusCode::BAD_REQUEST, "PIN must be 4 digits", None);
    }
    state.pin_hash = Some(hash_pin(&body.new_pin));
    info!("dev backend: PIN changed");
    ok()
}

// ============================================================================
// TRANSFER HANDLERS
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    recipient_phone: String,
    amount: f64,
    recipient_currency: String,
    #[serde(default)]
    converted_amount: Option<f64>,
    #[serde(default)]
    category: Option<TransferCategory>,
    pin: String,
    idempotency_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawBody {
    account_number: String,
    bank_code: String,
    amount: f64,
    recipient_currency: String,
    #[serde(default)]
    converted_amount: Option<f64>,
    pin: String,
    idempotency_key: String,
}

struct Debit<'a> {
    kind: TransferKind,
    amount: f64,
    counterparty: String,
    recipient_currency: &'a str,
    converted_amount: Option<f64>,
    category: Option<TransferCategory>,
    pin: &'a str,
    idempotency_key: &'a str,
}

/// Shared checks + balance movement for send and withdraw
fn apply_debit(state: &mut DevState, debit: Debit<'_>) -> Response {
    if let Some(existing) = state.idempotency.get(debit.idempotency_key) {
        return receipt(existing.clone(), debit.kind);
    }

    match &state.pin_hash {
        None => return error_response(StatusCode::BAD_REQUEST, "PIN not set up", None),
        Some(hash) if *hash != hash_pin(debit.pin) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid PIN", None)
        }
        Some(_) => {}
    }

    if state.restricted {
        return error_response(
            StatusCode::FORBIDDEN,
            "Account restricted",
            Some(TransferErrorCode::AccountRestricted),
        );
    }
    if debit.amount.is_nan() || debit.amount <= 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "Amount must be positive", None);
    }

    if let (Some(converted), Some(rate)) =
        (debit.converted_amount, state.rates.get(debit.recipient_currency))
    {
        let expected = debit.amount * rate;
        if (converted - expected).abs() > expected * RATE_TOLERANCE {
            return error_response(
                StatusCode::CONFLICT,
                "Quoted rate no longer valid",
                Some(TransferErrorCode::RateExpired),
            );
        }
    }

    let fee = debit.amount * state.fee_rate;
    if debit.amount + fee > state.balance {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Insufficient balance",
            Some(TransferErrorCode::InsufficientBalance),
        );
    }
    if state.daily_total + debit.amount > state.daily_limit {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Daily limit exceeded",
            Some(TransferErrorCode::DailyLimitExceeded),
        );
    }

    state.balance -= debit.amount + fee;
    state.daily_total += debit.amount;

    let id = uuid::Uuid::new_v4().to_string();
    state
        .idempotency
        .insert(debit.idempotency_key.to_string(), id.clone());
    state.transactions.push(DevTransaction {
        id: id.clone(),
        kind: debit.kind,
        amount: debit.amount,
        fee,
        counterparty: debit.counterparty,
        category: debit.category,
    });
    info!(kind = debit.kind.as_str(), amount = debit.amount, "dev backend: transfer accepted");

    receipt(id, debit.kind)
}

fn receipt(transaction_id: String, kind: TransferKind) -> Response {
    Json(TransferReceipt {
        transaction_id,
        status: Some("pending".to_string()),
        kind: Some(kind),
    })
    .into_response()
}

async fn send_money(State(state): State<SharedState>, Json(body): Json<SendBody>) -> Response {
    if body.recipient_phone.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Recipient phone is required", None);
    }
    let mut state = lock(&state);
    apply_debit(
        &mut state,
        Debit {
            kind: TransferKind::AppTransfer,
            amount: body.amount,
            counterparty: body.recipient_phone.clone(),
            recipient_currency: &body.recipient_currency,
            converted_amount: body.converted_amount,
            category: body.category,
            pin: &body.pin,
            idempotency_key: &body.idempotency_key,
        },
    )
}

async fn withdraw(State(state): State<SharedState>, Json(body): Json<WithdrawBody>) -> Response {
    let account_ok =
        body.account_number.len() == 10 && body.account_number.bytes().all(|b| b.is_ascii_digit());
    if !account_ok || body.bank_code.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid bank details",
            Some(TransferErrorCode::InvalidBankDetails),
        );
    }
    if body.bank_code == OFFLINE_BANK_CODE {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Bank offline",
            Some(TransferErrorCode::BankOffline),
        );
    }

    let mut state = lock(&state);
    apply_debit(
        &mut state,
        Debit {
            kind: TransferKind::BankWithdrawal,
            amount: body.amount,
            counterparty: format!("{}:{}", body.bank_code, body.account_number),
            recipient_currency: &body.recipient_currency,
            converted_amount: body.converted_amount,
            category: None,
            pin: &body.pin,
            idempotency_key: &body.idempotency_key,
        },
    )
}

async fn get_rate(State(state): State<SharedState>, Path(currency): Path<String>) -> Response {
    let code = currency.to_uppercase();
    let state = lock(&state);
    match state.rates.get(&code) {
        Some(rate) => Json(RateQuote {
            currency: code,
            rate: *rate,
        })
        .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("No rate for {}", code),
            None,
        ),
    }
}
