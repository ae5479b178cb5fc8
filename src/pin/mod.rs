// PIN capture and the step machine that authorizes with it

pub mod entry;
pub mod flow;

pub use entry::{KeypadButton, Pin, PinEntry, PinKey, PIN_LENGTH};
pub use flow::{PinFlow, PinFlowController, PinFlowOutcome, PinSession, PinStep};
