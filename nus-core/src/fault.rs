//! Single escalation path for unrecoverable radio errors.
//!
//! Nothing here unwinds: the event context cannot tolerate it. A fault is
//! logged and then the radio resets the system.

use crate::radio::{Radio, RadioError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// A radio call returned an error the core has no recovery for.
    #[error("radio call `{call}` failed: {error}")]
    Radio {
        call: &'static str,
        error: RadioError,
    },
}

/// Log the fault and reset. Never returns.
pub fn escalate<R: Radio + ?Sized>(radio: &R, fault: Fault) -> ! {
    log::error!("fatal fault, resetting: {}", fault);
    radio.system_reset(&fault)
}

/// Pass through success; escalate any error from `call`.
pub fn ensure<R: Radio + ?Sized>(radio: &R, call: &'static str, result: Result<(), RadioError>) {
    if let Err(error) = result {
        escalate(radio, Fault::Radio { call, error });
    }
}
