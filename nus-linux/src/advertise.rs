//! Advertising beacon: UDP multicast announcement of the NUS service.
//!
//! Sent only while the radio is advertising, i.e. while no client is attached.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use nus_core::advertising::{advertising_data, NUS_SERVICE_UUID};
use nus_core::wire::encode_frame;
use nus_core::{AirMessage, PROTOCOL_VERSION};
use tokio::net::UdpSocket;

use crate::radio::EmulatedRadio;

pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 60, 61);

pub struct Beacon {
    pub name: String,
    pub address: u16,
    pub listen_port: u16,
    pub advertising_port: u16,
    pub interval: Duration,
}

impl Beacon {
    fn message(&self) -> std::io::Result<AirMessage> {
        let adv_data = advertising_data(&self.name)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Ok(AirMessage::Advertisement {
            protocol_version: PROTOCOL_VERSION,
            name: self.name.clone(),
            address: self.address,
            service_uuid: NUS_SERVICE_UUID,
            adv_data,
            listen_port: self.listen_port,
        })
    }
}

pub async fn run_advertising(beacon: Beacon, radio: Arc<EmulatedRadio>) -> std::io::Result<()> {
    let frame = encode_frame(&beacon.message()?)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let socket = make_multicast_socket().await?;
    let dest = SocketAddr::from((MULTICAST_GROUP, beacon.advertising_port));
    log::info!(
        "advertising {} to {} every {:?}",
        beacon.name,
        dest,
        beacon.interval
    );

    let mut ticker = tokio::time::interval(beacon.interval);
    loop {
        ticker.tick().await;
        if !radio.is_advertising() {
            continue;
        }
        if let Err(e) = socket.send_to(&frame, dest).await {
            log::debug!("advertisement send failed: {}", e);
        }
    }
}

async fn make_multicast_socket() -> std::io::Result<UdpSocket> {
    let std_sock = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    std_sock.set_multicast_ttl_v4(1)?;
    std_sock.set_multicast_loop_v4(true)?;
    std_sock.set_nonblocking(true)?;
    UdpSocket::from_std(std_sock)
}
