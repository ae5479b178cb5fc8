// 🚨 Error Taxonomy - one classification point for every remote failure
// Raw transport/HTTP failures come in as ApiError, leave as ClassifiedError

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// TRANSFER ERROR CODES
// ============================================================================

/// Machine-readable codes the backend attaches to rejected transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferErrorCode {
    InsufficientBalance,
    InvalidBankDetails,
    RateExpired,
    DailyLimitExceeded,
    AccountRestricted,
    BankOffline,
}

impl TransferErrorCode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "INSUFFICIENT_BALANCE" => Some(TransferErrorCode::InsufficientBalance),
            "INVALID_BANK_DETAILS" => Some(TransferErrorCode::InvalidBankDetails),
            "RATE_EXPIRED" => Some(TransferErrorCode::RateExpired),
            "DAILY_LIMIT_EXCEEDED" => Some(TransferErrorCode::DailyLimitExceeded),
            "ACCOUNT_RESTRICTED" => Some(TransferErrorCode::AccountRestricted),
            "BANK_OFFLINE" => Some(TransferErrorCode::BankOffline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            TransferErrorCode::InvalidBankDetails => "INVALID_BANK_DETAILS",
            TransferErrorCode::RateExpired => "RATE_EXPIRED",
            TransferErrorCode::DailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            TransferErrorCode::AccountRestricted => "ACCOUNT_RESTRICTED",
            TransferErrorCode::BankOffline => "BANK_OFFLINE",
        }
    }

    /// Message shown to the user in place of the raw backend text
    pub fn user_message(&self) -> &'static str {
        match self {
            TransferErrorCode::InsufficientBalance => {
                "Insufficient balance. Please top up your wallet and try again."
            }
            TransferErrorCode::InvalidBankDetails => {
                "The bank details provided are invalid. Please check the account number and bank."
            }
            TransferErrorCode::RateExpired => {
                "The exchange rate has expired. Please review the new rate and try again."
            }
            TransferErrorCode::DailyLimitExceeded => {
                "You have reached your daily transfer limit. Please try again tomorrow."
            }
            TransferErrorCode::AccountRestricted => {
                "Your account is restricted. Please contact support."
            }
            TransferErrorCode::BankOffline => {
                "The recipient's bank is temporarily unavailable. Please try again later."
            }
        }
    }
}

// ============================================================================
// RAW REMOTE FAILURES
// ============================================================================

/// A remote call that did not succeed, before any classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("no response from server: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Status {
        status: u16,
        message: Option<String>,
        code: Option<String>,
    },
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn with_code(status: u16, code: TransferErrorCode, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: Some(message.into()),
            code: Some(code.as_str().to_string()),
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Literal message from the backend, if it sent one
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => {
                message.as_deref().filter(|m| !m.trim().is_empty())
            }
            _ => None,
        }
    }

    pub fn transfer_code(&self) -> Option<TransferErrorCode> {
        match self {
            ApiError::Status { code: Some(code), .. } => TransferErrorCode::from_code(code),
            _ => None,
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Network,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn fallback_message(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "Some of the details you entered are invalid.",
            ErrorCategory::Authentication => "Your session has expired. Please log in again.",
            ErrorCategory::Network => "Unable to reach the server. Check your connection.",
            ErrorCategory::Server => "The server encountered an error. Please try again later.",
            ErrorCategory::Unknown => "Something went wrong. Please try again.",
        }
    }

    fn suggestions(&self) -> Vec<String> {
        let items: &[&str] = match self {
            ErrorCategory::Validation => &["Review the highlighted details and try again"],
            ErrorCategory::Authentication => &["Log out and log back in"],
            ErrorCategory::Network => &[
                "Check your internet connection",
                "Try again in a moment",
            ],
            ErrorCategory::Server => &["Wait a few minutes and retry", "Contact support if it persists"],
            ErrorCategory::Unknown => &["Try again", "Contact support if it persists"],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

/// A remote failure after classification, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
    pub suggestions: Vec<String>,
    pub code: Option<TransferErrorCode>,
}

/// Classify a remote failure by HTTP status and message content.
///
/// Message precedence: known transfer code, then the literal backend message,
/// then the category's fallback text.
pub fn categorize(err: &ApiError) -> ClassifiedError {
    let code = err.transfer_code();
    let backend_message = err.backend_message();

    let category = match err {
        ApiError::Transport(_) | ApiError::Timeout => ErrorCategory::Network,
        ApiError::Status { status, .. } => {
            let lowered = backend_message.unwrap_or_default().to_lowercase();
            if matches!(status, 401 | 403) || mentions_auth_failure(&lowered) {
                ErrorCategory::Authentication
            } else if *status >= 500 {
                ErrorCategory::Server
            } else if code.is_some() || matches!(status, 400 | 409 | 422) {
                ErrorCategory::Validation
            } else if lowered.contains("timeout") || lowered.contains("network") {
                ErrorCategory::Network
            } else {
                ErrorCategory::Unknown
            }
        }
    };

    let message = match (code, backend_message) {
        (Some(code), _) => code.user_message().to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => category.fallback_message().to_string(),
    };

    ClassifiedError {
        category,
        message,
        suggestions: category.suggestions(),
        code,
    }
}

fn mentions_auth_failure(message: &str) -> bool {
    message.contains("unauthorized")
        || message.contains("session expired")
        || (message.contains("token") && (message.contains("expired") || message.contains("invalid")))
}

// ============================================================================
// FLOW-LEVEL ERRORS
// ============================================================================

/// Reasons an amount string is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmountError {
    #[error("Enter an amount")]
    Empty,

    #[error("'{0}' is not a valid amount")]
    NotANumber(String),

    #[error("Amount must be greater than zero")]
    NotPositive,

    #[error("Amount cannot exceed {max:.2}")]
    AboveCeiling { max: f64 },
}

/// Errors raised by the transfer confirmation path.
#[derive(Debug, Error)]
pub enum RemitError {
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),

    #[error("Recipient details incomplete: missing {}", .0.join(", "))]
    IncompleteRecipient(Vec<&'static str>),

    #[error(transparent)]
    Remote(#[from] ClassifiedError),

    #[error("A request is already in progress")]
    Busy,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<ApiError> for RemitError {
    fn from(err: ApiError) -> Self {
        RemitError::Remote(categorize(&err))
    }
}

// ============================================================================
// TESTS
// ============================================================================
