// Transfer amount entry, quoting and confirmation

pub mod confirm;
pub mod draft;
pub mod rates;

pub use confirm::{ConfirmScreen, ConfirmStep};
pub use draft::{
    format_amount, parse_amount, Recipient, TransactionDraft, TransferCategory, TransferKind,
    TransferLimits, TransferQuote,
};
pub use rates::RatePoller;
