//! Connection state shared between the event and foreground contexts.
//!
//! Written only by the lifecycle handler; read from both sides. Every field is
//! an independent atomic, so a reader interrupted mid-update sees each field
//! either before or after the change, never torn.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

/// BLE minimum (and default) ATT MTU.
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Largest ATT MTU this device will ever accept.
pub const MAX_ATT_MTU: u16 = 128;

/// ATT opcode (1) + attribute handle (2) carried in every notification.
pub const ATT_HEADER_LEN: u16 = 3;

const NO_PEER: u16 = 0xFFFF;

/// Radio-assigned connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle(pub u16);

impl PeerHandle {
    pub fn raw(self) -> u16 {
        self.0
    }
}

#[derive(Debug)]
pub struct ConnectionState {
    peer: AtomicU16,
    mtu: AtomicU16,
    local_max_mtu: u16,
    advertising: AtomicBool,
}

impl ConnectionState {
    /// Disconnected, not yet advertising. `local_max_mtu` is clamped into
    /// `DEFAULT_ATT_MTU..=MAX_ATT_MTU`.
    pub fn new(local_max_mtu: u16) -> Self {
        Self {
            peer: AtomicU16::new(NO_PEER),
            mtu: AtomicU16::new(DEFAULT_ATT_MTU),
            local_max_mtu: local_max_mtu.clamp(DEFAULT_ATT_MTU, MAX_ATT_MTU),
            advertising: AtomicBool::new(false),
        }
    }

    /// Record the peer and leave the advertising state. Only one peer is
    /// admitted at a time.
    pub fn on_connect(&self, peer: PeerHandle) {
        self.advertising.store(false, Ordering::Release);
        self.mtu.store(DEFAULT_ATT_MTU, Ordering::Release);
        self.peer.store(peer.raw(), Ordering::Release);
    }

    /// Forget the peer, drop back to the default MTU and mark advertising.
    pub fn on_disconnect(&self) {
        self.peer.store(NO_PEER, Ordering::Release);
        self.mtu.store(DEFAULT_ATT_MTU, Ordering::Release);
        self.advertising.store(true, Ordering::Release);
    }

    /// Settle the MTU from the client's proposal: the smaller of the two
    /// sides, never below the BLE minimum.
    pub fn on_mtu_negotiated(&self, client_mtu: u16) {
        let mtu = client_mtu.clamp(DEFAULT_ATT_MTU, self.local_max_mtu);
        self.mtu.store(mtu, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.peer().is_some()
    }

    pub fn peer(&self) -> Option<PeerHandle> {
        match self.peer.load(Ordering::Acquire) {
            NO_PEER => None,
            raw => Some(PeerHandle(raw)),
        }
    }

    pub fn negotiated_mtu(&self) -> u16 {
        self.mtu.load(Ordering::Acquire)
    }

    /// Bytes of console data that fit in one notification.
    pub fn max_payload(&self) -> usize {
        usize::from(self.negotiated_mtu() - ATT_HEADER_LEN)
    }

    pub fn local_max_mtu(&self) -> u16 {
        self.local_max_mtu
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::Acquire)
    }

    pub fn set_advertising(&self, advertising: bool) {
        self.advertising.store(advertising, Ordering::Release);
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(MAX_ATT_MTU)
    }
}
