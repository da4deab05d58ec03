//! Boundary to the packet radio below the core.
//!
//! The radio is shared by both contexts, so every method takes `&self` and
//! implementations provide their own interior synchronization.

use std::time::Duration;

use crate::connection::PeerHandle;
use crate::fault::Fault;

/// Outcome classes of a radio call, as the core needs to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    /// Invalid state or stale connection handle: there is nobody to talk to.
    #[error("no connection")]
    NotConnected,
    /// The radio's local notification queue is full; try again shortly.
    #[error("notification queue full")]
    Congested,
    #[error("radio error {code:#06x}")]
    Fatal { code: u32 },
}

/// HCI reason codes carried by disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    RemoteUserTerminated,
    LocalHostTerminated,
    SupervisionTimeout,
    Other(u8),
}

impl DisconnectReason {
    pub fn code(self) -> u8 {
        match self {
            DisconnectReason::RemoteUserTerminated => 0x13,
            DisconnectReason::LocalHostTerminated => 0x16,
            DisconnectReason::SupervisionTimeout => 0x08,
            DisconnectReason::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x13 => DisconnectReason::RemoteUserTerminated,
            0x16 => DisconnectReason::LocalHostTerminated,
            0x08 => DisconnectReason::SupervisionTimeout,
            other => DisconnectReason::Other(other),
        }
    }
}

/// Packet radio operations consumed by the core.
pub trait Radio {
    /// Queue one notification on the TX characteristic.
    fn send_notification(&self, peer: PeerHandle, data: &[u8]) -> Result<(), RadioError>;

    fn start_advertising(&self) -> Result<(), RadioError>;

    fn stop_advertising(&self) -> Result<(), RadioError>;

    /// Answer an ATT MTU exchange with this device's maximum.
    fn reply_mtu_exchange(&self, peer: PeerHandle, local_max: u16) -> Result<(), RadioError>;

    /// Supply an empty system attribute set for a fresh connection.
    fn reply_missing_attributes(&self, peer: PeerHandle) -> Result<(), RadioError>;

    /// Reject pairing with "pairing not supported".
    fn reply_security_unsupported(&self, peer: PeerHandle) -> Result<(), RadioError>;

    /// Let the radio pick the PHY on both directions.
    fn request_phy_auto(&self, peer: PeerHandle) -> Result<(), RadioError>;

    /// Ask the peer to adopt the preferred connection parameters.
    fn request_conn_param_update(&self, peer: PeerHandle) -> Result<(), RadioError>;

    fn disconnect(&self, peer: PeerHandle, reason: DisconnectReason) -> Result<(), RadioError>;

    /// Low-power wait. Must return after the next radio event or timer tick.
    fn wait_for_event(&self);

    /// Short pause between congestion retries.
    fn delay(&self, duration: Duration);

    /// Terminal step of the fault path. Never returns.
    fn system_reset(&self, fault: &Fault) -> !;
}

impl<R: Radio + ?Sized> Radio for std::sync::Arc<R> {
    fn send_notification(&self, peer: PeerHandle, data: &[u8]) -> Result<(), RadioError> {
        (**self).send_notification(peer, data)
    }

    fn start_advertising(&self) -> Result<(), RadioError> {
        (**self).start_advertising()
    }

    fn stop_advertising(&self) -> Result<(), RadioError> {
        (**self).stop_advertising()
    }

    fn reply_mtu_exchange(&self, peer: PeerHandle, local_max: u16) -> Result<(), RadioError> {
        (**self).reply_mtu_exchange(peer, local_max)
    }

    fn reply_missing_attributes(&self, peer: PeerHandle) -> Result<(), RadioError> {
        (**self).reply_missing_attributes(peer)
    }

    fn reply_security_unsupported(&self, peer: PeerHandle) -> Result<(), RadioError> {
        (**self).reply_security_unsupported(peer)
    }

    fn request_phy_auto(&self, peer: PeerHandle) -> Result<(), RadioError> {
        (**self).request_phy_auto(peer)
    }

    fn request_conn_param_update(&self, peer: PeerHandle) -> Result<(), RadioError> {
        (**self).request_conn_param_update(peer)
    }

    fn disconnect(&self, peer: PeerHandle, reason: DisconnectReason) -> Result<(), RadioError> {
        (**self).disconnect(peer, reason)
    }

    fn wait_for_event(&self) {
        (**self).wait_for_event()
    }

    fn delay(&self, duration: Duration) {
        (**self).delay(duration)
    }

    fn system_reset(&self, fault: &Fault) -> ! {
        (**self).system_reset(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_round_trip() {
        for reason in [
            DisconnectReason::RemoteUserTerminated,
            DisconnectReason::LocalHostTerminated,
            DisconnectReason::SupervisionTimeout,
            DisconnectReason::Other(0x3e),
        ] {
            assert_eq!(DisconnectReason::from_code(reason.code()), reason);
        }
    }

    #[test]
    fn fatal_error_shows_code() {
        let err = RadioError::Fatal { code: 0x3001 };
        assert_eq!(err.to_string(), "radio error 0x3001");
    }
}
