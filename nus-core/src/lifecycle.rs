//! Event-context half of the link: reacts to radio events.
//!
//! One match arm per event kind. Every radio call made here is expected to
//! succeed; any error goes down the fault path.

use std::sync::Arc;

use crate::connection::{ConnectionState, PeerHandle};
use crate::fault;
use crate::inbound;
use crate::link::LinkStats;
use crate::radio::{DisconnectReason, Radio};
use crate::ring::{Producer, RING_BUFFER_LEN};

/// Events delivered by the radio, borrowed from its event buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent<'a> {
    Connected {
        handle: PeerHandle,
    },
    Disconnected {
        handle: PeerHandle,
        reason: DisconnectReason,
    },
    /// Peer proposes its receive MTU.
    MtuExchangeRequest {
        handle: PeerHandle,
        client_mtu: u16,
    },
    PhyUpdateRequest {
        handle: PeerHandle,
    },
    /// Peer wrote to the RX characteristic.
    Write {
        handle: PeerHandle,
        data: &'a [u8],
    },
    /// System attributes are unknown for a fresh connection.
    SysAttrMissing {
        handle: PeerHandle,
    },
    SecParamsRequest {
        handle: PeerHandle,
    },
    GattcTimeout {
        handle: PeerHandle,
    },
    GattsTimeout {
        handle: PeerHandle,
    },
    /// Anything this link has no use for.
    Other {
        id: u16,
    },
}

pub struct EventHandler<R: Radio, const N: usize = RING_BUFFER_LEN> {
    radio: Arc<R>,
    state: Arc<ConnectionState>,
    stats: Arc<LinkStats>,
    inbound: Producer<N>,
}

impl<R: Radio, const N: usize> EventHandler<R, N> {
    pub(crate) fn new(
        radio: Arc<R>,
        state: Arc<ConnectionState>,
        stats: Arc<LinkStats>,
        inbound: Producer<N>,
    ) -> Self {
        Self {
            radio,
            state,
            stats,
            inbound,
        }
    }

    /// Begin advertising. Call once, after the radio is up.
    pub fn start(&mut self) {
        fault::ensure(
            self.radio.as_ref(),
            "start_advertising",
            self.radio.start_advertising(),
        );
        self.state.set_advertising(true);
        log::info!("advertising");
    }

    /// Process one radio event. Runs to completion without blocking.
    pub fn handle(&mut self, event: RadioEvent<'_>) {
        let radio = self.radio.as_ref();
        match event {
            RadioEvent::Connected { handle } => {
                if let Some(previous) = self.state.peer() {
                    log::warn!("connect from {:?} while {:?} is attached", handle, previous);
                }
                self.state.on_connect(handle);
                log::info!("peer {:?} connected", handle);
                fault::ensure(radio, "stop_advertising", radio.stop_advertising());
                fault::ensure(
                    radio,
                    "request_conn_param_update",
                    radio.request_conn_param_update(handle),
                );
            }
            RadioEvent::Disconnected { handle, reason } => {
                // A late event for a replaced peer must not end the live link.
                if self.state.peer() != Some(handle) {
                    log::debug!("ignoring disconnect of stale peer {:?}", handle);
                    return;
                }
                self.state.on_disconnect();
                log::info!("peer {:?} disconnected ({:?})", handle, reason);
                fault::ensure(radio, "start_advertising", radio.start_advertising());
            }
            RadioEvent::MtuExchangeRequest { handle, client_mtu } => {
                let local_max = self.state.local_max_mtu();
                fault::ensure(
                    radio,
                    "reply_mtu_exchange",
                    radio.reply_mtu_exchange(handle, local_max),
                );
                self.state.on_mtu_negotiated(client_mtu);
                log::debug!(
                    "mtu: client {} local {} -> payload {}",
                    client_mtu,
                    local_max,
                    self.state.max_payload()
                );
            }
            RadioEvent::PhyUpdateRequest { handle } => {
                fault::ensure(radio, "request_phy_auto", radio.request_phy_auto(handle));
            }
            RadioEvent::Write { data, .. } => {
                inbound::deliver(&mut self.inbound, data, &self.stats);
            }
            RadioEvent::SysAttrMissing { handle } => {
                fault::ensure(
                    radio,
                    "reply_missing_attributes",
                    radio.reply_missing_attributes(handle),
                );
            }
            RadioEvent::SecParamsRequest { handle } => {
                log::debug!("pairing request from {:?} declined", handle);
                fault::ensure(
                    radio,
                    "reply_security_unsupported",
                    radio.reply_security_unsupported(handle),
                );
            }
            RadioEvent::GattcTimeout { handle } | RadioEvent::GattsTimeout { handle } => {
                log::warn!("gatt timeout on {:?}, disconnecting", handle);
                fault::ensure(
                    radio,
                    "disconnect",
                    radio.disconnect(handle, DisconnectReason::RemoteUserTerminated),
                );
            }
            RadioEvent::Other { id } => {
                log::debug!("ignoring radio event {:#06x}", id);
            }
        }
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }
}
