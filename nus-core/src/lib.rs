//! Console byte stream over a BLE UART-style packet link.
//! Host-driven: the radio delivers events to an [`EventHandler`]; the console
//! reads and writes through a [`ConsoleIo`].

pub mod advertising;
pub mod connection;
pub mod console;
pub mod fault;
pub mod inbound;
pub mod lifecycle;
pub mod link;
pub mod protocol;
pub mod radio;
pub mod ring;
pub mod sender;
pub mod wire;

#[cfg(test)]
mod testing;

pub use connection::{ConnectionState, PeerHandle, DEFAULT_ATT_MTU, MAX_ATT_MTU};
pub use console::ConsoleIo;
pub use fault::Fault;
pub use lifecycle::{EventHandler, RadioEvent};
pub use link::{split, split_with_capacity, LinkConfig, LinkStats, StatsSnapshot};
pub use protocol::{AirMessage, PROTOCOL_VERSION};
pub use radio::{DisconnectReason, Radio, RadioError};
pub use ring::{ByteRing, Consumer, Producer, RING_BUFFER_LEN};
pub use sender::{OutboundSender, SendOutcome};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};
