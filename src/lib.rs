// Secure Remit - Core Library
// PIN entry and flows, transfer confirmation, notifications, storage and the REST client

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod http_client;
pub mod notifications;
pub mod pin;
pub mod session;
pub mod storage;
pub mod transfer;

#[cfg(feature = "server")]
pub mod dev_backend;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::{
    PinService, PinStatus, RateQuote, RateSource, SendMoneyRequest, TransferReceipt,
    TransferService, WithdrawRequest,
};
pub use config::AppConfig;
pub use device::{Capabilities, Clipboard, HapticPattern, Haptics, NoopDevice, SystemNotifier};
pub use error::{
    categorize, AmountError, ApiError, ClassifiedError, ErrorCategory, RemitError,
    TransferErrorCode,
};
pub use http_client::HttpBackend;
pub use notifications::{
    NewNotification, Notification, NotificationKind, NotificationService, NotificationStore,
    Priority, SimulationConfig,
};
pub use pin::{
    Pin, PinEntry, PinFlow, PinFlowController, PinFlowOutcome, PinKey, PinSession, PinStep,
    PIN_LENGTH,
};
pub use session::{CachedUser, KycStatus, SessionCache};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use transfer::{
    ConfirmScreen, ConfirmStep, RatePoller, Recipient, TransactionDraft, TransferCategory,
    TransferKind, TransferLimits, TransferQuote,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
