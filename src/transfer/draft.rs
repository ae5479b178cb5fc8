// 💸 Transaction Draft - recipient, amount, fee and conversion
// Lives for one confirm screen; nothing here is persisted

use crate::error::AmountError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const DEFAULT_MAX_AMOUNT: f64 = 100_000.0;
pub const DEFAULT_FEE_RATE: f64 = 0.02;
pub const DEFAULT_INPUT_CURRENCY: &str = "USD";

/// Recipients in this currency receive the amount exactly as entered
pub const NO_CONVERSION_CURRENCY: &str = "NGN";

// ============================================================================
// LIMITS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferLimits {
    /// Largest amount accepted, in the input currency
    pub max_amount: f64,
    /// Flat fee as a fraction of the amount (0.02 = 2%)
    pub fee_rate: f64,
    pub input_currency: String,
}

impl Default for TransferLimits {
    fn default() -> Self {
        TransferLimits {
            max_amount: DEFAULT_MAX_AMOUNT,
            fee_rate: DEFAULT_FEE_RATE,
            input_currency: DEFAULT_INPUT_CURRENCY.to_string(),
        }
    }
}

// ============================================================================
// KIND + CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Wallet-to-wallet transfer to another app user
    AppTransfer,
    /// Payout to an external bank account
    BankWithdrawal,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::AppTransfer => "app_transfer",
            TransferKind::BankWithdrawal => "bank_withdrawal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferCategory {
    FamilySupport,
    Education,
    Business,
    Medical,
    Bills,
    Gift,
    Other,
}

impl TransferCategory {
    pub const ALL: [TransferCategory; 7] = [
        TransferCategory::FamilySupport,
        TransferCategory::Education,
        TransferCategory::Business,
        TransferCategory::Medical,
        TransferCategory::Bills,
        TransferCategory::Gift,
        TransferCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransferCategory::FamilySupport => "Family support",
            TransferCategory::Education => "Education",
            TransferCategory::Business => "Business",
            TransferCategory::Medical => "Medical",
            TransferCategory::Bills => "Bills",
            TransferCategory::Gift => "Gift",
            TransferCategory::Other => "Other",
        }
    }
}

// ============================================================================
// RECIPIENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    /// ISO 4217 code the recipient is paid in
    pub currency: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub bank_code: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Recipient {
    pub fn app_user(name: &str, phone: &str, currency: &str) -> Self {
        Recipient {
            name: name.to_string(),
            currency: currency.to_uppercase(),
            phone: Some(phone.to_string()),
            account_number: None,
            bank_code: None,
            bank_name: None,
            country: None,
        }
    }

    pub fn bank_account(name: &str, account_number: &str, bank_code: &str, currency: &str) -> Self {
        Recipient {
            name: name.to_string(),
            currency: currency.to_uppercase(),
            phone: None,
            account_number: Some(account_number.to_string()),
            bank_code: Some(bank_code.to_string()),
            bank_name: None,
            country: None,
        }
    }

    pub fn needs_conversion(&self, input_currency: &str) -> bool {
        !self.currency.eq_ignore_ascii_case(input_currency)
            && !self.currency.eq_ignore_ascii_case(NO_CONVERSION_CURRENCY)
    }

    /// Fields the transfer kind needs but the recipient lacks
    pub fn missing_fields(&self, kind: TransferKind) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match kind {
            TransferKind::AppTransfer => {
                if is_blank(&self.phone) {
                    missing.push("phone number");
                }
            }
            TransferKind::BankWithdrawal => {
                if is_blank(&self.account_number) {
                    missing.push("account number");
                }
                if is_blank(&self.bank_code) {
                    missing.push("bank code");
                }
            }
        }
        missing
    }

    /// Account number with all but the last four digits hidden
    pub fn masked_account(&self) -> Option<String> {
        let number = self.account_number.as_deref()?.trim();
        let visible: String = number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Some(format!("••••{}", visible))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

// ============================================================================
// AMOUNT + QUOTE
// ============================================================================

/// Parse a user-entered amount: strictly positive, finite, at most `max`
pub fn parse_amount(input: &str, max: f64) -> Result<f64, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let value: f64 = trimmed
        .replace(',', "")
        .parse()
        .map_err(|_| AmountError::NotANumber(trimmed.to_string()))?;

    if !value.is_finite() {
        return Err(AmountError::NotANumber(trimmed.to_string()));
    }
    if value <= 0.0 {
        return Err(AmountError::NotPositive);
    }
    if value > max {
        return Err(AmountError::AboveCeiling { max });
    }

    Ok(value)
}

pub fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferQuote {
    pub amount: f64,
    pub fee: f64,
    /// amount + fee, charged to the wallet
    pub total: f64,
    pub input_currency: String,
    pub recipient_currency: String,
    pub exchange_rate: Option<f64>,
    /// None when no conversion applies or the rate has not arrived yet
    pub converted_amount: Option<f64>,
}

impl TransferQuote {
    pub fn fee_display(&self) -> String {
        format_amount(self.fee)
    }

    pub fn total_display(&self) -> String {
        format_amount(self.total)
    }

    pub fn converted_display(&self) -> Option<String> {
        self.converted_amount.map(format_amount)
    }
}

// ============================================================================
// DRAFT
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// Stable for the lifetime of the screen; feeds the idempotency key
    pub id: Uuid,
    pub recipient: Recipient,
    pub kind: TransferKind,
    pub amount: String,
    pub category: Option<TransferCategory>,
    pub note: Option<String>,
    pub exchange_rate: Option<f64>,
}

impl TransactionDraft {
    pub fn new(recipient: Recipient, kind: TransferKind) -> Self {
        TransactionDraft {
            id: Uuid::new_v4(),
            recipient,
            kind,
            amount: String::new(),
            category: None,
            note: None,
            exchange_rate: None,
        }
    }

    pub fn quote(&self, limits: &TransferLimits) -> Result<TransferQuote, AmountError> {
        let amount = parse_amount(&self.amount, limits.max_amount)?;
        let fee = amount * limits.fee_rate;

        let (exchange_rate, converted_amount) =
            if self.recipient.needs_conversion(&limits.input_currency) {
                (self.exchange_rate, self.exchange_rate.map(|rate| amount * rate))
            } else {
                (None, None)
            };

        Ok(TransferQuote {
            amount,
            fee,
            total: amount + fee,
            input_currency: limits.input_currency.clone(),
            recipient_currency: self.recipient.currency.clone(),
            exchange_rate,
            converted_amount,
        })
    }

    /// Same draft + same amount always yields the same key
    pub fn idempotency_key(&self, amount: f64) -> String {
        let target = match self.kind {
            TransferKind::AppTransfer => self.recipient.phone.clone().unwrap_or_default(),
            TransferKind::BankWithdrawal => format!(
                "{}:{}",
                self.recipient.bank_code.clone().unwrap_or_default(),
                self.recipient.account_number.clone().unwrap_or_default()
            ),
        };

        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}{:.2}",
            self.id,
            self.kind.as_str(),
            target,
            amount
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================
