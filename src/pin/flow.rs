// 🔐 PIN Flow - current → new → confirm, shaped by the flow variant
// Bridges completed PIN entries to verify/setup/change calls on the backend

use crate::api::PinService;
use crate::device::{HapticPattern, Haptics, NoopDevice};
use crate::error::ApiError;
use crate::pin::entry::{KeypadButton, Pin, PinEntry, PinKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACK_DELAY: Duration = Duration::from_millis(2000);

pub const MISMATCH_MESSAGE: &str = "PINs do not match";
pub const LOCKED_MESSAGE: &str = "Too many failed attempts. Please try again later.";
const INCORRECT_PIN_MESSAGE: &str = "Incorrect PIN";
const VERIFY_FALLBACK_MESSAGE: &str = "PIN verification failed. Please try again.";
const COMMIT_FALLBACK_MESSAGE: &str = "Could not save your PIN. Please try again.";

// ============================================================================
// FLOW VARIANTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStep {
    Current,
    New,
    Confirm,
}

/// What the PIN is being collected for. Each variant owns its step table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFlow {
    /// Authorize an action with the existing PIN
    Verify,
    /// First-time PIN creation
    Setup,
    /// Replace the PIN, optionally proving the current one first
    Change { require_current_pin: bool },
}

impl PinFlow {
    pub fn steps(&self) -> &'static [PinStep] {
        match self {
            PinFlow::Verify => &[PinStep::Current],
            PinFlow::Setup => &[PinStep::New, PinStep::Confirm],
            PinFlow::Change {
                require_current_pin: true,
            } => &[PinStep::Current, PinStep::New, PinStep::Confirm],
            PinFlow::Change {
                require_current_pin: false,
            } => &[PinStep::New, PinStep::Confirm],
        }
    }

    pub fn initial_step(&self) -> PinStep {
        self.steps()[0]
    }

    /// Step after `from`, or None when `from` is terminal
    pub fn next_step(&self, from: PinStep) -> Option<PinStep> {
        let steps = self.steps();
        let idx = steps.iter().position(|s| *s == from)?;
        steps.get(idx + 1).copied()
    }

    pub fn title(&self, step: PinStep) -> &'static str {
        match (self, step) {
            (PinFlow::Verify, _) => "Enter your PIN",
            (PinFlow::Change { .. }, PinStep::Current) => "Enter current PIN",
            (PinFlow::Change { .. }, PinStep::New) => "Enter new PIN",
            (PinFlow::Change { .. }, PinStep::Confirm) => "Confirm new PIN",
            (PinFlow::Setup, PinStep::Confirm) => "Confirm your PIN",
            (PinFlow::Setup, _) => "Create a 4-digit PIN",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PinFlow::Verify => "verify",
            PinFlow::Setup => "setup",
            PinFlow::Change { .. } => "change",
        }
    }
}

// ============================================================================
// SESSION + OUTCOMES
// ============================================================================

/// Working state of one flow run. Never persisted.
#[derive(Debug, Clone)]
pub struct PinSession {
    pub step: PinStep,
    pub current_pin: Option<Pin>,
    pub new_pin: Option<Pin>,
    pub attempt_count: u32,
}

impl PinSession {
    fn new(flow: PinFlow) -> Self {
        PinSession {
            step: flow.initial_step(),
            current_pin: None,
            new_pin: None,
            attempt_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PinFlowOutcome {
    /// Moved to another step; the entry is cleared for the next PIN
    Advanced { step: PinStep },
    /// Current PIN accepted in a change flow; the new PIN comes next
    CurrentPinVerified,
    /// Confirmation differed; back at `New` with the candidate dropped
    Mismatch { message: String },
    VerificationFailed {
        message: String,
        attempts_remaining: u32,
    },
    /// Attempt limit reached; the caller navigates back after `back_after`
    Locked { message: String, back_after: Duration },
    /// Setup/change call rejected; still at `Confirm`
    Failed { message: String },
    Completed(Pin),
    /// Input arrived after the flow had already ended
    Ignored,
}

impl PinFlowOutcome {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            PinFlowOutcome::Mismatch { .. }
                | PinFlowOutcome::VerificationFailed { .. }
                | PinFlowOutcome::Locked { .. }
                | PinFlowOutcome::Failed { .. }
        )
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct PinFlowController<S> {
    flow: PinFlow,
    session: PinSession,
    entry: PinEntry,
    service: S,
    haptics: Arc<dyn Haptics>,
    max_attempts: u32,
    back_delay: Duration,
    subtitle: Option<String>,
    error: Option<String>,
    locked: bool,
    finished: bool,
}

impl<S: PinService> PinFlowController<S> {
    pub fn new(flow: PinFlow, service: S) -> Self {
        PinFlowController {
            flow,
            session: PinSession::new(flow),
            entry: PinEntry::new(),
            service,
            haptics: Arc::new(NoopDevice),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            back_delay: DEFAULT_BACK_DELAY,
            subtitle: None,
            error: None,
            locked: false,
            finished: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_back_delay(mut self, delay: Duration) -> Self {
        self.back_delay = delay;
        self
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn flow(&self) -> PinFlow {
        self.flow
    }

    pub fn step(&self) -> PinStep {
        self.session.step
    }

    pub fn session(&self) -> &PinSession {
        &self.session
    }

    pub fn attempt_count(&self) -> u32 {
        self.session.attempt_count
    }

    pub fn title(&self) -> &'static str {
        self.flow.title(self.session.step)
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn entry(&self) -> &PinEntry {
        &self.entry
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn enter(&mut self, key: PinKey) -> Option<PinFlowOutcome> {
        let before = self.entry.filled_len();
        let completed = self.entry.handle_key(key);
        self.tap_if_filled(before);
        Some(self.submit(completed?).await)
    }

    pub async fn press(&mut self, button: KeypadButton) -> Option<PinFlowOutcome> {
        let before = self.entry.filled_len();
        let completed = self.entry.press(button);
        self.tap_if_filled(before);
        Some(self.submit(completed?).await)
    }

    fn tap_if_filled(&self, before: usize) {
        if self.entry.filled_len() > before {
            self.haptics.vibrate(HapticPattern::Tap);
        }
    }

    pub async fn paste(&mut self, text: &str) -> Option<PinFlowOutcome> {
        let pin = self.entry.paste(text)?;
        Some(self.submit(pin).await)
    }

    /// Feed one completed PIN into the current step
    pub async fn submit(&mut self, pin: Pin) -> PinFlowOutcome {
        if self.locked || self.finished {
            return PinFlowOutcome::Ignored;
        }

        // No second submission while this one is in flight
        self.entry.set_disabled(true);

        let outcome = match self.session.step {
            PinStep::Current => self.submit_current(pin).await,
            PinStep::New => self.submit_new(pin),
            PinStep::Confirm => self.submit_confirm(pin).await,
        };

        self.entry.clear();
        self.entry.set_disabled(self.locked || self.finished);

        self.error = match &outcome {
            PinFlowOutcome::Mismatch { message }
            | PinFlowOutcome::VerificationFailed { message, .. }
            | PinFlowOutcome::Locked { message, .. }
            | PinFlowOutcome::Failed { message } => Some(message.clone()),
            _ => None,
        };

        if outcome.is_error() {
            self.haptics.vibrate(HapticPattern::Error);
        } else if matches!(outcome, PinFlowOutcome::Completed(_)) {
            self.haptics.vibrate(HapticPattern::Success);
        }

        outcome
    }

    async fn submit_current(&mut self, pin: Pin) -> PinFlowOutcome {
        let verified = self.service.verify_pin(&pin).await;

        let failure_message = match verified {
            Ok(true) => None,
            Ok(false) => Some(INCORRECT_PIN_MESSAGE.to_string()),
            Err(ref err) => Some(remote_message(err, VERIFY_FALLBACK_MESSAGE)),
        };

        if let Some(message) = failure_message {
            self.session.attempt_count += 1;
            let attempts = self.session.attempt_count;
            warn!(flow = self.flow.name(), attempts, "PIN verification failed");

            if attempts >= self.max_attempts {
                self.locked = true;
                info!(flow = self.flow.name(), "PIN flow locked after {} attempts", attempts);
                return PinFlowOutcome::Locked {
                    message: LOCKED_MESSAGE.to_string(),
                    back_after: self.back_delay,
                };
            }

            return PinFlowOutcome::VerificationFailed {
                message,
                attempts_remaining: self.max_attempts - attempts,
            };
        }

        self.session.attempt_count = 0;

        match self.flow.next_step(PinStep::Current) {
            None => {
                self.finished = true;
                debug!(flow = self.flow.name(), "PIN verified");
                PinFlowOutcome::Completed(pin)
            }
            Some(next) => {
                self.session.current_pin = Some(pin);
                self.session.step = next;
                debug!(flow = self.flow.name(), "current PIN verified");
                PinFlowOutcome::CurrentPinVerified
            }
        }
    }

    fn submit_new(&mut self, pin: Pin) -> PinFlowOutcome {
        self.session.new_pin = Some(pin);
        self.session.step = self.flow.next_step(PinStep::New).unwrap_or(PinStep::Confirm);
        PinFlowOutcome::Advanced {
            step: self.session.step,
        }
    }

    async fn submit_confirm(&mut self, pin: Pin) -> PinFlowOutcome {
        if self.session.new_pin.as_ref() != Some(&pin) {
            self.session.new_pin = None;
            self.session.step = PinStep::New;
            return PinFlowOutcome::Mismatch {
                message: MISMATCH_MESSAGE.to_string(),
            };
        }

        let result = match self.flow {
            PinFlow::Setup => self.service.setup_pin(&pin).await,
            PinFlow::Change { .. } => {
                self.service
                    .change_pin(self.session.current_pin.as_ref(), &pin)
                    .await
            }
            // Verify never reaches Confirm
            PinFlow::Verify => Ok(()),
        };

        match result {
            Ok(()) => {
                self.session.attempt_count = 0;
                self.finished = true;
                info!(flow = self.flow.name(), "PIN saved");
                PinFlowOutcome::Completed(pin)
            }
            Err(err) => {
                warn!(flow = self.flow.name(), error = %err, "PIN save failed");
                PinFlowOutcome::Failed {
                    message: remote_message(&err, COMMIT_FALLBACK_MESSAGE),
                }
            }
        }
    }
}

/// Literal backend message when present, else the generic fallback
fn remote_message(err: &ApiError, fallback: &str) -> String {
    err.backend_message().unwrap_or(fallback).to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBackend, PinCall};

    fn pin(value: &str) -> Pin {
        Pin::parse(value).unwrap()
    }

    async fn type_pin<S: PinService>(
        controller: &mut PinFlowController<S>,
        digits: &str,
    ) -> Option<PinFlowOutcome> {
        let mut outcome = None;
        for c in digits.chars() {
            if let Some(o) = controller.enter(PinKey::Digit(c)).await {
                outcome = Some(o);
            }
        }
        outcome
    }

    #[test]
    fn test_step_tables() {
        assert_eq!(PinFlow::Verify.initial_step(), PinStep::Current);
        assert_eq!(PinFlow::Setup.initial_step(), PinStep::New);
        assert_eq!(
            PinFlow::Change { require_current_pin: true }.initial_step(),
            PinStep::Current
        );
        assert_eq!(
            PinFlow::Change { require_current_pin: false }.initial_step(),
            PinStep::New
        );
        assert_eq!(PinFlow::Verify.next_step(PinStep::Current), None);
        assert_eq!(PinFlow::Setup.next_step(PinStep::New), Some(PinStep::Confirm));
        assert_eq!(PinFlow::Setup.next_step(PinStep::Confirm), None);
    }

    #[tokio::test]
    async fn test_setup_matching_pins_calls_setup_once() {
        let backend = MockBackend::new();
        let mut controller = PinFlowController::new(PinFlow::Setup, backend);

        let first = type_pin(&mut controller, "1234").await;
        assert_eq!(first, Some(PinFlowOutcome::Advanced { step: PinStep::Confirm }));
        assert_eq!(controller.entry().filled_len(), 0);

        let second = type_pin(&mut controller, "1234").await;
        assert_eq!(second, Some(PinFlowOutcome::Completed(pin("1234"))));
        assert_eq!(
            controller.service().pin_calls(),
            vec![PinCall::Setup("1234".to_string())]
        );
        assert!(controller.is_finished());
    }

    #[tokio::test]
    async fn test_setup_mismatch_returns_to_new() {
        let backend = MockBackend::new();
        let mut controller = PinFlowController::new(PinFlow::Setup, backend);

        controller.submit(pin("1234")).await;
        let outcome = controller.submit(pin("4321")).await;

        assert_eq!(
            outcome,
            PinFlowOutcome::Mismatch {
                message: "PINs do not match".to_string()
            }
        );
        assert_eq!(controller.step(), PinStep::New);
        assert!(controller.session().new_pin.is_none());
        assert_eq!(controller.error(), Some("PINs do not match"));
        assert!(controller.service().pin_calls().is_empty());
    }

    #[tokio::test]
    async fn test_verify_locks_after_three_failures() {
        let backend = MockBackend::new().with_valid_pin("9999");
        let mut controller = PinFlowController::new(PinFlow::Verify, backend)
            .with_back_delay(Duration::from_millis(1500));

        let first = controller.submit(pin("0000")).await;
        assert_eq!(
            first,
            PinFlowOutcome::VerificationFailed {
                message: "Incorrect PIN".to_string(),
                attempts_remaining: 2
            }
        );
        controller.submit(pin("0001")).await;
        let third = controller.submit(pin("0002")).await;

        assert_eq!(
            third,
            PinFlowOutcome::Locked {
                message: LOCKED_MESSAGE.to_string(),
                back_after: Duration::from_millis(1500)
            }
        );
        assert!(controller.is_locked());
        assert!(controller.entry().is_disabled());

        // Locked flows swallow input, including the right PIN
        assert_eq!(controller.submit(pin("9999")).await, PinFlowOutcome::Ignored);
        assert_eq!(controller.service().pin_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_success_resets_attempt_counter() {
        let backend = MockBackend::new().with_valid_pin("2580");
        let mut controller = PinFlowController::new(PinFlow::Verify, backend);

        controller.submit(pin("1111")).await;
        assert_eq!(controller.attempt_count(), 1);

        let outcome = controller.submit(pin("2580")).await;
        assert_eq!(outcome, PinFlowOutcome::Completed(pin("2580")));
        assert_eq!(controller.attempt_count(), 0);
        assert!(!controller.is_locked());
    }

    #[tokio::test]
    async fn test_verify_error_uses_backend_message() {
        let backend = MockBackend::new()
            .with_verify_error(ApiError::status(500, "PIN service unavailable"));
        let mut controller = PinFlowController::new(PinFlow::Verify, backend);

        match controller.submit(pin("1234")).await {
            PinFlowOutcome::VerificationFailed { message, .. } => {
                assert_eq!(message, "PIN service unavailable")
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let silent = MockBackend::new().with_verify_error(ApiError::Timeout);
        let mut controller = PinFlowController::new(PinFlow::Verify, silent);
        match controller.submit(pin("1234")).await {
            PinFlowOutcome::VerificationFailed { message, .. } => {
                assert_eq!(message, VERIFY_FALLBACK_MESSAGE)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_change_with_current_pin() {
        let backend = MockBackend::new().with_valid_pin("1111");
        let mut controller =
            PinFlowController::new(PinFlow::Change { require_current_pin: true }, backend);
        assert_eq!(controller.title(), "Enter current PIN");

        assert_eq!(
            controller.submit(pin("1111")).await,
            PinFlowOutcome::CurrentPinVerified
        );
        assert_eq!(controller.step(), PinStep::New);

        controller.submit(pin("2222")).await;
        let done = controller.submit(pin("2222")).await;

        assert_eq!(done, PinFlowOutcome::Completed(pin("2222")));
        assert_eq!(
            controller.service().pin_calls(),
            vec![
                PinCall::Verify("1111".to_string()),
                PinCall::Change(Some("1111".to_string()), "2222".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_change_without_current_pin_starts_at_new() {
        let backend = MockBackend::new();
        let mut controller =
            PinFlowController::new(PinFlow::Change { require_current_pin: false }, backend);
        assert_eq!(controller.step(), PinStep::New);

        controller.submit(pin("3333")).await;
        controller.submit(pin("3333")).await;
        assert_eq!(
            controller.service().pin_calls(),
            vec![PinCall::Change(None, "3333".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_setup_stays_on_confirm() {
        let backend = MockBackend::new()
            .with_commit_error(ApiError::status(400, "PIN too simple"));
        let mut controller = PinFlowController::new(PinFlow::Setup, backend);

        controller.submit(pin("1234")).await;
        let outcome = controller.submit(pin("1234")).await;

        assert_eq!(
            outcome,
            PinFlowOutcome::Failed {
                message: "PIN too simple".to_string()
            }
        );
        assert_eq!(controller.step(), PinStep::Confirm);
        assert!(!controller.is_finished());
        assert!(!controller.entry().is_disabled());
    }

    #[tokio::test]
    async fn test_keypad_and_paste_drive_the_flow() {
        let backend = MockBackend::new().with_valid_pin("4071");
        let mut controller = PinFlowController::new(PinFlow::Verify, backend);

        assert!(controller.paste("40x1").await.is_none());

        let mut outcome = None;
        for d in [4u8, 0, 7, 1] {
            outcome = controller.press(KeypadButton::Digit(d)).await.or(outcome);
        }
        assert_eq!(outcome, Some(PinFlowOutcome::Completed(pin("4071"))));
    }

    #[derive(Default)]
    struct RecordingHaptics {
        pulses: std::sync::Mutex<Vec<HapticPattern>>,
    }

    impl Haptics for RecordingHaptics {
        fn vibrate(&self, pattern: HapticPattern) {
            self.pulses.lock().unwrap().push(pattern);
        }
    }

    #[tokio::test]
    async fn test_haptics_follow_entry_and_outcome() {
        let haptics = Arc::new(RecordingHaptics::default());
        let mut controller = PinFlowController::new(PinFlow::Verify, MockBackend::new())
            .with_haptics(haptics.clone());

        type_pin(&mut controller, "9999").await;
        controller.enter(PinKey::Backspace).await;
        type_pin(&mut controller, "1234").await;

        let pulses = haptics.pulses.lock().unwrap().clone();
        let taps = pulses.iter().filter(|p| **p == HapticPattern::Tap).count();
        assert_eq!(taps, 8);
        assert_eq!(
            pulses.iter().filter(|p| **p != HapticPattern::Tap).collect::<Vec<_>>(),
            vec![&HapticPattern::Error, &HapticPattern::Success]
        );
    }
}
