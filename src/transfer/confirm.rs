// ✅ Confirm Screen - amount → PIN check → one transfer call
//
// Flow:
//   1. amount entered, quote recomputed (fee, total, converted amount)
//   2. confirm(): remote PIN status decides verify vs. "PIN not set up"
//   3. PIN flow runs in Verify mode (see pin::flow)
//   4. execute(pin): recipient completeness, then exactly one send/withdraw

use crate::api::{
    PinService, RateSource, SendMoneyRequest, TransferReceipt, TransferService, WithdrawRequest,
};
use crate::error::{categorize, AmountError, RemitError};
use crate::pin::{Pin, PinFlow, PinFlowController};
use crate::transfer::draft::{
    format_amount, Recipient, TransactionDraft, TransferCategory, TransferKind, TransferLimits,
    TransferQuote,
};
use crate::transfer::rates::RatePoller;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const PIN_SETUP_TITLE: &str = "PIN not set up";
pub const PIN_SETUP_MESSAGE: &str =
    "You need a transaction PIN before you can send money. Set one up now?";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmStep {
    /// Hand off to a Verify PIN flow with this subtitle
    VerifyPin { subtitle: String },
    /// Block and offer PIN setup
    PinSetupRequired { title: String, message: String },
}

pub struct ConfirmScreen<B> {
    backend: Arc<B>,
    draft: TransactionDraft,
    limits: TransferLimits,
    rates: Option<RatePoller>,
    submitting: AtomicBool,
}

/// Holds the in-flight flag; clears it even when the request future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn begin(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        InFlight(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<B> ConfirmScreen<B>
where
    B: PinService + TransferService + RateSource + 'static,
{
    pub fn new(backend: Arc<B>, recipient: Recipient, kind: TransferKind, limits: TransferLimits) -> Self {
        ConfirmScreen {
            backend,
            draft: TransactionDraft::new(recipient, kind),
            limits,
            rates: None,
            submitting: AtomicBool::new(false),
        }
    }

    pub fn draft(&self) -> &TransactionDraft {
        &self.draft
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.draft.amount = amount.into();
    }

    pub fn set_category(&mut self, category: Option<TransferCategory>) {
        self.draft.category = category;
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.draft.note = note.filter(|n| !n.trim().is_empty());
    }

    pub fn needs_conversion(&self) -> bool {
        self.draft
            .recipient
            .needs_conversion(&self.limits.input_currency)
    }

    pub fn set_exchange_rate(&mut self, rate: f64) {
        self.draft.exchange_rate = Some(rate);
    }

    /// Poll the recipient currency's rate; no-op when no conversion applies
    pub fn start_rate_updates(&mut self, every: Duration) {
        if !self.needs_conversion() || self.rates.is_some() {
            return;
        }
        let currency = self.draft.recipient.currency.clone();
        self.rates = Some(RatePoller::start(self.backend.clone(), currency, every));
    }

    pub fn stop_rate_updates(&mut self) {
        self.rates = None;
    }

    pub fn is_polling_rates(&self) -> bool {
        self.rates.is_some()
    }

    /// Pull the latest polled rate into the draft
    pub fn refresh_rate(&mut self) -> Option<f64> {
        if let Some(rate) = self.rates.as_ref().and_then(|p| p.latest()) {
            self.draft.exchange_rate = Some(rate);
        }
        self.draft.exchange_rate
    }

    pub fn quote(&self) -> Result<TransferQuote, AmountError> {
        self.draft.quote(&self.limits)
    }

    pub fn can_confirm(&self) -> bool {
        !self.is_submitting() && self.quote().is_ok()
    }

    pub fn subtitle(&self, quote: &TransferQuote) -> String {
        let amount = format!("{} {}", quote.input_currency, format_amount(quote.amount));
        let converted = quote
            .converted_amount
            .map(|v| format!(" (≈ {} {})", quote.recipient_currency, format_amount(v)))
            .unwrap_or_default();
        let recipient = &self.draft.recipient;

        match self.draft.kind {
            TransferKind::AppTransfer => {
                format!("Send {}{} to {}", amount, converted, recipient.name)
            }
            TransferKind::BankWithdrawal => {
                let account = recipient.masked_account().unwrap_or_default();
                format!(
                    "Withdraw {}{} to {} {}",
                    amount, converted, recipient.name, account
                )
                .trim_end()
                .to_string()
            }
        }
    }

    /// Check PIN status and decide where the confirm button leads
    pub async fn confirm(&mut self) -> Result<ConfirmStep, RemitError> {
        if self.is_submitting() {
            return Err(RemitError::Busy);
        }
        self.refresh_rate();
        let quote = self.quote()?;

        let status = {
            let _in_flight = InFlight::begin(&self.submitting);
            self.backend.pin_status().await
        };

        if status?.enabled {
            Ok(ConfirmStep::VerifyPin {
                subtitle: self.subtitle(&quote),
            })
        } else {
            info!("transfer blocked: PIN not set up");
            Ok(ConfirmStep::PinSetupRequired {
                title: PIN_SETUP_TITLE.to_string(),
                message: PIN_SETUP_MESSAGE.to_string(),
            })
        }
    }

    /// Verify-mode PIN flow wired to this screen's backend
    pub fn pin_flow(&self, subtitle: &str) -> PinFlowController<Arc<B>> {
        PinFlowController::new(PinFlow::Verify, self.backend.clone()).with_subtitle(subtitle)
    }

    /// Issue the transfer with a verified PIN. Never retried.
    pub async fn execute(&mut self, pin: Pin) -> Result<TransferReceipt, RemitError> {
        if self.is_submitting() {
            return Err(RemitError::Busy);
        }

        let missing = self.draft.recipient.missing_fields(self.draft.kind);
        if !missing.is_empty() {
            warn!(kind = self.draft.kind.as_str(), ?missing, "recipient details incomplete");
            return Err(RemitError::IncompleteRecipient(missing));
        }

        self.refresh_rate();
        let quote = self.quote()?;
        let idempotency_key = self.draft.idempotency_key(quote.amount);
        let recipient = &self.draft.recipient;

        let in_flight = InFlight::begin(&self.submitting);
        let result = match self.draft.kind {
            TransferKind::AppTransfer => {
                let request = SendMoneyRequest {
                    recipient_phone: recipient.phone.clone().unwrap_or_default(),
                    recipient_name: recipient.name.clone(),
                    amount: quote.amount,
                    currency: quote.input_currency.clone(),
                    recipient_currency: quote.recipient_currency.clone(),
                    converted_amount: quote.converted_amount,
                    category: self.draft.category,
                    note: self.draft.note.clone(),
                    pin,
                    idempotency_key,
                };
                self.backend.send_money(&request).await
            }
            TransferKind::BankWithdrawal => {
                let request = WithdrawRequest {
                    account_number: recipient.account_number.clone().unwrap_or_default(),
                    bank_code: recipient.bank_code.clone().unwrap_or_default(),
                    account_name: recipient.name.clone(),
                    amount: quote.amount,
                    currency: quote.input_currency.clone(),
                    recipient_currency: quote.recipient_currency.clone(),
                    converted_amount: quote.converted_amount,
                    note: self.draft.note.clone(),
                    pin,
                    idempotency_key,
                };
                self.backend.withdraw(&request).await
            }
        };
        drop(in_flight);

        match result {
            Ok(receipt) => {
                info!(
                    kind = self.draft.kind.as_str(),
                    transaction_id = %receipt.transaction_id,
                    "transfer submitted"
                );
                self.stop_rate_updates();
                Ok(receipt)
            }
            Err(err) => {
                let classified = categorize(&err);
                warn!(
                    kind = self.draft.kind.as_str(),
                    category = ?classified.category,
                    error = %err,
                    "transfer failed"
                );
                Err(RemitError::Remote(classified))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ErrorCategory, TransferErrorCode};
    use crate::pin::PinFlowOutcome;
    use crate::test_support::{MockBackend, PinCall, TransferCall};

    fn app_screen(backend: MockBackend, currency: &str) -> ConfirmScreen<MockBackend> {
        ConfirmScreen::new(
            Arc::new(backend),
            Recipient::app_user("Ada Obi", "+2348012345678", currency),
            TransferKind::AppTransfer,
            TransferLimits::default(),
        )
    }

    fn pin(value: &str) -> Pin {
        Pin::parse(value).unwrap()
    }

    #[test]
    fn test_confirm_disabled_for_bad_amounts() {
        let mut screen = app_screen(MockBackend::new(), "NGN");
        for amount in ["0", "-5", "100001", "", "ten"] {
            screen.set_amount(amount);
            assert!(!screen.can_confirm(), "amount {:?} must be rejected", amount);
        }
        screen.set_amount("500");
        assert!(screen.can_confirm());

        let quote = screen.quote().unwrap();
        assert_eq!(quote.fee_display(), "10.00");
        assert_eq!(quote.total_display(), "510.00");
    }

    #[test]
    fn test_gbp_quote_with_mocked_rate() {
        let mut screen = app_screen(MockBackend::new(), "GBP");
        screen.set_amount("100");
        screen.set_exchange_rate(0.79);

        assert_eq!(
            screen.quote().unwrap().converted_display(),
            Some("79.00".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_updates_only_when_converting() {
        let mut ngn = app_screen(MockBackend::new(), "NGN");
        ngn.start_rate_updates(Duration::from_secs(30));
        assert!(!ngn.is_polling_rates());

        let backend = Arc::new(MockBackend::new().with_rate("GBP", 0.79));
        let mut gbp = ConfirmScreen::new(
            backend.clone(),
            Recipient::app_user("Tom", "+447700900000", "GBP"),
            TransferKind::AppTransfer,
            TransferLimits::default(),
        );
        gbp.start_rate_updates(Duration::from_secs(30));
        assert!(gbp.is_polling_rates());

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gbp.refresh_rate(), Some(0.79));

        gbp.stop_rate_updates();
        assert!(!gbp.is_polling_rates());
    }

    #[tokio::test]
    async fn test_confirm_routes_to_verify_when_pin_enabled() {
        let mut screen = app_screen(MockBackend::new(), "NGN");
        screen.set_amount("500");

        let step = screen.confirm().await.unwrap();
        assert_eq!(
            step,
            ConfirmStep::VerifyPin {
                subtitle: "Send USD 500.00 to Ada Obi".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_confirm_prompts_setup_when_pin_disabled() {
        let mut screen = app_screen(MockBackend::new().with_pin_enabled(false), "NGN");
        screen.set_amount("50");

        match screen.confirm().await.unwrap() {
            ConfirmStep::PinSetupRequired { title, .. } => assert_eq!(title, PIN_SETUP_TITLE),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_confirm_rejects_invalid_amount_before_remote_call() {
        let mut screen = app_screen(MockBackend::new(), "NGN");
        screen.set_amount("100001");

        assert!(matches!(
            screen.confirm().await,
            Err(RemitError::InvalidAmount(AmountError::AboveCeiling { .. }))
        ));
        assert!(screen.backend.pin_calls().is_empty());
    }

    #[tokio::test]
    async fn test_full_flow_sends_exactly_once() {
        let backend = MockBackend::new().with_valid_pin("1357");
        let mut screen = app_screen(backend, "GBP");
        screen.set_amount("100");
        screen.set_exchange_rate(0.79);
        screen.set_category(Some(TransferCategory::FamilySupport));

        let subtitle = match screen.confirm().await.unwrap() {
            ConfirmStep::VerifyPin { subtitle } => subtitle,
            other => panic!("unexpected step {:?}", other),
        };
        assert_eq!(subtitle, "Send USD 100.00 (≈ GBP 79.00) to Ada Obi");

        let mut flow = screen.pin_flow(&subtitle);
        let verified = match flow.submit(pin("1357")).await {
            PinFlowOutcome::Completed(pin) => pin,
            other => panic!("unexpected outcome {:?}", other),
        };

        let receipt = screen.execute(verified).await.unwrap();
        assert!(!receipt.transaction_id.is_empty());

        let calls = screen.backend.transfer_calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            TransferCall::Send {
                phone,
                amount,
                converted_amount,
                pin,
            } => {
                assert_eq!(phone, "+2348012345678");
                assert_eq!(*amount, 100.0);
                assert!((converted_amount.unwrap() - 79.0).abs() < 1e-9);
                assert_eq!(pin, "1357");
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(
            screen.backend.pin_calls(),
            vec![PinCall::Status, PinCall::Verify("1357".to_string())]
        );
    }

    #[tokio::test]
    async fn test_incomplete_bank_recipient_is_not_sent() {
        let backend = Arc::new(MockBackend::new());
        let mut recipient = Recipient::bank_account("Ada Obi", "", "058", "NGN");
        recipient.bank_code = Some(" ".to_string());
        let mut screen = ConfirmScreen::new(
            backend.clone(),
            recipient,
            TransferKind::BankWithdrawal,
            TransferLimits::default(),
        );
        screen.set_amount("200");

        let err = screen.execute(pin("1234")).await.unwrap_err();
        match err {
            RemitError::IncompleteRecipient(fields) => {
                assert_eq!(fields, vec!["account number", "bank code"])
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(backend.transfer_calls().is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_uses_bank_details() {
        let backend = Arc::new(MockBackend::new());
        let mut screen = ConfirmScreen::new(
            backend.clone(),
            Recipient::bank_account("Ada Obi", "0123456789", "058", "NGN"),
            TransferKind::BankWithdrawal,
            TransferLimits::default(),
        );
        screen.set_amount("250");

        assert_eq!(
            screen.confirm().await.unwrap(),
            ConfirmStep::VerifyPin {
                subtitle: "Withdraw USD 250.00 to Ada Obi ••••6789".to_string()
            }
        );
        screen.execute(pin("1234")).await.unwrap();

        assert_eq!(
            backend.transfer_calls(),
            vec![TransferCall::Withdraw {
                account_number: "0123456789".to_string(),
                bank_code: "058".to_string(),
                amount: 250.0,
            }]
        );
    }

    #[tokio::test]
    async fn test_remote_failure_is_classified_not_retried() {
        let backend = Arc::new(MockBackend::new().with_transfer_error(ApiError::with_code(
            400,
            TransferErrorCode::DailyLimitExceeded,
            "limit",
        )));
        let mut screen = ConfirmScreen::new(
            backend.clone(),
            Recipient::app_user("Ada", "+234", "NGN"),
            TransferKind::AppTransfer,
            TransferLimits::default(),
        );
        screen.set_amount("10");

        match screen.execute(pin("1234")).await.unwrap_err() {
            RemitError::Remote(classified) => {
                assert_eq!(classified.category, ErrorCategory::Validation);
                assert_eq!(
                    classified.message,
                    TransferErrorCode::DailyLimitExceeded.user_message()
                );
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(backend.transfer_calls().len(), 1);
        assert!(!screen.is_submitting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_does_not_leave_screen_busy() {
        let backend = Arc::new(MockBackend::new().with_latency(Duration::from_secs(60)));
        let mut screen = ConfirmScreen::new(
            backend.clone(),
            Recipient::app_user("Ada", "+234", "NGN"),
            TransferKind::AppTransfer,
            TransferLimits::default(),
        );
        screen.set_amount("10");

        let abandoned = tokio::time::timeout(Duration::from_secs(5), screen.confirm()).await;
        assert!(abandoned.is_err());
        assert!(!screen.is_submitting());

        let abandoned = tokio::time::timeout(Duration::from_secs(5), screen.execute(pin("1234"))).await;
        assert!(abandoned.is_err());
        assert!(!screen.is_submitting());
        assert!(screen.can_confirm());

        let receipt = screen.execute(pin("1234")).await.unwrap();
        assert_eq!(receipt.transaction_id, "tx-2");
        assert_eq!(backend.transfer_calls().len(), 2);
    }
}
