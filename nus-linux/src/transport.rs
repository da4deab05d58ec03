//! Local transport: TCP server standing in for the BLE link.
//!
//! Each accepted client is one connection. Frames read from it become radio
//! events, which a single event task feeds to the core's `EventHandler`; that
//! task is the event context.

use std::sync::Arc;
use std::time::Duration;

use nus_core::wire::{self, encode_frame, LEN_SIZE};
use nus_core::{AirMessage, DisconnectReason, EventHandler, PeerHandle, RadioEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::radio::{EmulatedRadio, Session, SessionIo};

/// HCI "connection rejected due to limited resources".
const REJECT_LIMITED_RESOURCES: u8 = 0x0D;

/// Owned copy of a radio event, queued from socket tasks to the event task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Connected(PeerHandle),
    Disconnected(PeerHandle, DisconnectReason),
    MtuExchange(PeerHandle, u16),
    PhyUpdate(PeerHandle),
    Write(PeerHandle, Vec<u8>),
    SysAttrMissing(PeerHandle),
    PairingRequest(PeerHandle),
    Timeout(PeerHandle),
}

impl HostEvent {
    pub fn as_radio_event(&self) -> RadioEvent<'_> {
        match *self {
            HostEvent::Connected(handle) => RadioEvent::Connected { handle },
            HostEvent::Disconnected(handle, reason) => RadioEvent::Disconnected { handle, reason },
            HostEvent::MtuExchange(handle, client_mtu) => {
                RadioEvent::MtuExchangeRequest { handle, client_mtu }
            }
            HostEvent::PhyUpdate(handle) => RadioEvent::PhyUpdateRequest { handle },
            HostEvent::Write(handle, ref data) => RadioEvent::Write { handle, data },
            HostEvent::SysAttrMissing(handle) => RadioEvent::SysAttrMissing { handle },
            HostEvent::PairingRequest(handle) => RadioEvent::SecParamsRequest { handle },
            HostEvent::Timeout(handle) => RadioEvent::GattsTimeout { handle },
        }
    }
}

/// Event context: the only caller of `handler.handle`.
pub async fn run_events(
    mut handler: EventHandler<Arc<EmulatedRadio>>,
    radio: Arc<EmulatedRadio>,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
) {
    handler.start();
    while let Some(event) = events.recv().await {
        handler.handle(event.as_radio_event());
        radio.notify_event();
    }
}

/// Accept clients one at a time; refuse a second while one is attached.
pub async fn run_transport(
    listen_port: u16,
    radio: Arc<EmulatedRadio>,
    events: mpsc::UnboundedSender<HostEvent>,
    notify_queue: usize,
    idle_timeout: Option<Duration>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", listen_port)).await?;
    log::info!("listening on port {}", listen_port);
    let mut next_handle: u16 = 0;

    loop {
        let (stream, from) = listener.accept().await?;
        let handle = PeerHandle(next_handle);
        // 0xFFFF is the core's "no peer" marker.
        next_handle = (next_handle + 1) % 0xFFFF;

        let (session, io) = Session::new(handle, notify_queue);
        if radio.attach(session).is_err() {
            log::info!("refusing {}: already connected", from);
            tokio::spawn(reject(stream));
            continue;
        }
        log::debug!("{} is {:?}", from, handle);
        if events.send(HostEvent::Connected(handle)).is_err() {
            break;
        }

        let radio = Arc::clone(&radio);
        let events = events.clone();
        tokio::spawn(async move {
            let reason = run_connection(stream, handle, io, &events, idle_timeout).await;
            // Queue the disconnect before freeing the slot, so a new client's
            // connect is always handled after it.
            let _ = events.send(HostEvent::Disconnected(handle, reason));
            radio.detach(handle);
        });
    }
    Ok(())
}

async fn reject(mut stream: TcpStream) {
    let msg = AirMessage::Disconnect {
        reason: REJECT_LIMITED_RESOURCES,
    };
    if let Ok(frame) = encode_frame(&msg) {
        let _ = stream.write_all(&frame).await;
    }
    let _ = stream.shutdown().await;
}

/// Pump one client until it leaves or the radio disconnects it. Returns why
/// the link ended.
async fn run_connection(
    stream: TcpStream,
    handle: PeerHandle,
    io: SessionIo,
    events: &mpsc::UnboundedSender<HostEvent>,
    idle_timeout: Option<Duration>,
) -> DisconnectReason {
    let SessionIo {
        notify_rx,
        control_rx,
        mut shutdown_rx,
    } = io;
    let (mut reader, writer) = stream.into_split();
    let writer_task = tokio::spawn(run_writer(writer, notify_rx, control_rx));

    let mut attrs_known = false;
    let reason = loop {
        let read = read_message(&mut reader, idle_timeout);
        let msg = tokio::select! {
            changed = shutdown_rx.changed() => {
                let reason = match changed {
                    Ok(()) => *shutdown_rx.borrow(),
                    Err(_) => None,
                };
                break reason.unwrap_or(DisconnectReason::LocalHostTerminated);
            }
            msg = read => msg,
        };
        let msg = match msg {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                let _ = events.send(HostEvent::Timeout(handle));
                continue;
            }
            Err(e) => {
                log::debug!("{:?} read ended: {}", handle, e);
                break DisconnectReason::RemoteUserTerminated;
            }
        };
        let event = match msg {
            AirMessage::ExchangeMtu { client_mtu } => HostEvent::MtuExchange(handle, client_mtu),
            AirMessage::Write { data } => {
                if !attrs_known {
                    attrs_known = true;
                    let _ = events.send(HostEvent::SysAttrMissing(handle));
                }
                HostEvent::Write(handle, data)
            }
            AirMessage::PhyUpdate => HostEvent::PhyUpdate(handle),
            AirMessage::PairingRequest => HostEvent::PairingRequest(handle),
            AirMessage::Disconnect { reason } => break DisconnectReason::from_code(reason),
            other => {
                log::debug!("{:?} sent unexpected {:?}", handle, other);
                continue;
            }
        };
        if events.send(event).is_err() {
            break DisconnectReason::LocalHostTerminated;
        }
    };

    writer_task.abort();
    reason
}

/// Read one frame. `Ok(None)` means the idle timeout elapsed first.
async fn read_message(
    reader: &mut OwnedReadHalf,
    idle_timeout: Option<Duration>,
) -> std::io::Result<Option<AirMessage>> {
    let mut header = [0u8; LEN_SIZE];
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, reader.read_exact(&mut header)).await {
            Ok(res) => {
                res?;
            }
            Err(_) => return Ok(None),
        },
        None => {
            reader.read_exact(&mut header).await?;
        }
    }
    let len = wire::frame_len(&header).map_err(invalid_data)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    wire::decode_payload(&payload).map(Some).map_err(invalid_data)
}

fn invalid_data(e: wire::FrameDecodeError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut notify_rx: mpsc::Receiver<Vec<u8>>,
    mut control_rx: mpsc::UnboundedReceiver<AirMessage>,
) {
    loop {
        let msg = tokio::select! {
            // Replies go out ahead of queued console output.
            biased;
            Some(msg) = control_rx.recv() => msg,
            Some(data) = notify_rx.recv() => AirMessage::Notify { data },
            else => break,
        };
        let frame = match encode_frame(&msg) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("dropping unencodable {:?}: {}", msg, e);
                continue;
            }
        };
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}
