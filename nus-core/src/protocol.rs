//! Emulated air protocol: messages exchanged between a host-side radio and a
//! remote client when the link is carried over a socket instead of BLE.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current protocol version. Carried in advertisements.
pub const PROTOCOL_VERSION: u8 = 1;

/// Preferred connection parameters requested after every connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnParams {
    pub min_interval_ms: u16,
    pub max_interval_ms: u16,
    pub latency: u16,
    pub supervision_timeout_ms: u16,
}

pub const PREFERRED_CONN_PARAMS: ConnParams = ConnParams {
    min_interval_ms: 15,
    max_interval_ms: 15,
    latency: 3,
    supervision_timeout_ms: 2000,
};

/// All air message types. Encoding is bincode; framing is length-prefix (see wire module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AirMessage {
    /// Discovery: device is connectable.
    Advertisement {
        protocol_version: u8,
        name: String,
        address: u16,
        service_uuid: Uuid,
        /// Raw AD structures, as a BLE scanner would see them.
        adv_data: Vec<u8>,
        listen_port: u16,
    },
    /// Client proposes its receive MTU.
    ExchangeMtu { client_mtu: u16 },
    /// Device answers with its maximum MTU.
    MtuReply { server_mtu: u16 },
    /// Client writes to the RX characteristic.
    Write { data: Vec<u8> },
    /// Device notifies on the TX characteristic.
    Notify { data: Vec<u8> },
    /// Client asks to change PHY.
    PhyUpdate,
    /// Device lets the radio choose the PHY.
    PhyAuto,
    PairingRequest,
    PairingReply { supported: bool },
    ConnParamUpdate(ConnParams),
    /// Either side tears the link down. `reason` is an HCI code.
    Disconnect { reason: u8 },
}
