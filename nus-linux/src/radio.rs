//! Emulated radio: one TCP client stands in for the BLE central.
//!
//! Notifications go through a bounded queue so a slow client produces the
//! same congestion a real radio reports. Replies to a session that has
//! already gone are dropped; the disconnect event that follows covers them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use nus_core::protocol::{AirMessage, PREFERRED_CONN_PARAMS};
use nus_core::{DisconnectReason, Fault, PeerHandle, Radio, RadioError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// Exit status used in place of a chip reset; a supervisor restarts us.
pub const EXIT_RESET: i32 = 70;

/// Radio side of one connected client.
pub struct Session {
    handle: PeerHandle,
    notify_tx: mpsc::Sender<Vec<u8>>,
    control_tx: mpsc::UnboundedSender<AirMessage>,
    shutdown_tx: watch::Sender<Option<DisconnectReason>>,
}

/// Transport side of one connected client.
pub struct SessionIo {
    pub notify_rx: mpsc::Receiver<Vec<u8>>,
    pub control_rx: mpsc::UnboundedReceiver<AirMessage>,
    pub shutdown_rx: watch::Receiver<Option<DisconnectReason>>,
}

impl Session {
    pub fn new(handle: PeerHandle, notify_queue: usize) -> (Session, SessionIo) {
        let (notify_tx, notify_rx) = mpsc::channel(notify_queue.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        (
            Session {
                handle,
                notify_tx,
                control_tx,
                shutdown_tx,
            },
            SessionIo {
                notify_rx,
                control_rx,
                shutdown_rx,
            },
        )
    }
}

pub struct EmulatedRadio {
    session: Mutex<Option<Session>>,
    advertising: AtomicBool,
    pending: Mutex<bool>,
    wake: Condvar,
    tick: Duration,
}

impl EmulatedRadio {
    pub fn new(tick: Duration) -> Self {
        Self {
            session: Mutex::new(None),
            advertising: AtomicBool::new(false),
            pending: Mutex::new(false),
            wake: Condvar::new(),
            tick,
        }
    }

    /// Admit a client. Fails (returning the session) while another is attached.
    pub fn attach(&self, session: Session) -> Result<(), Session> {
        let mut slot = self.session();
        if slot.is_some() {
            return Err(session);
        }
        *slot = Some(session);
        // A connectable advertiser stops advertising once connected.
        self.advertising.store(false, Ordering::Release);
        Ok(())
    }

    pub fn detach(&self, handle: PeerHandle) {
        let mut slot = self.session();
        if slot.as_ref().is_some_and(|s| s.handle == handle) {
            *slot = None;
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::Acquire)
    }

    /// Wake the foreground after an event was handled.
    pub fn notify_event(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = true;
        self.wake.notify_all();
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn control(&self, peer: PeerHandle, msg: AirMessage) -> Result<(), RadioError> {
        match self.session().as_ref() {
            Some(s) if s.handle == peer => {
                if s.control_tx.send(msg).is_err() {
                    log::debug!("writer for {:?} already gone", peer);
                }
            }
            _ => log::debug!("dropping reply to stale peer {:?}", peer),
        }
        Ok(())
    }
}

impl Radio for EmulatedRadio {
    fn send_notification(&self, peer: PeerHandle, data: &[u8]) -> Result<(), RadioError> {
        let slot = self.session();
        let Some(s) = slot.as_ref().filter(|s| s.handle == peer) else {
            return Err(RadioError::NotConnected);
        };
        match s.notify_tx.try_send(data.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RadioError::Congested),
            Err(TrySendError::Closed(_)) => Err(RadioError::NotConnected),
        }
    }

    fn start_advertising(&self) -> Result<(), RadioError> {
        self.advertising.store(true, Ordering::Release);
        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), RadioError> {
        self.advertising.store(false, Ordering::Release);
        Ok(())
    }

    fn reply_mtu_exchange(&self, peer: PeerHandle, local_max: u16) -> Result<(), RadioError> {
        self.control(
            peer,
            AirMessage::MtuReply {
                server_mtu: local_max,
            },
        )
    }

    fn reply_missing_attributes(&self, peer: PeerHandle) -> Result<(), RadioError> {
        // No CCCD state to restore: every client starts subscribed.
        log::trace!("empty system attributes for {:?}", peer);
        Ok(())
    }

    fn reply_security_unsupported(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.control(peer, AirMessage::PairingReply { supported: false })
    }

    fn request_phy_auto(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.control(peer, AirMessage::PhyAuto)
    }

    fn request_conn_param_update(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.control(peer, AirMessage::ConnParamUpdate(PREFERRED_CONN_PARAMS))
    }

    fn disconnect(&self, peer: PeerHandle, reason: DisconnectReason) -> Result<(), RadioError> {
        if let Some(s) = self.session().as_ref().filter(|s| s.handle == peer) {
            s.shutdown_tx.send_replace(Some(reason));
        }
        Ok(())
    }

    fn wait_for_event(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !*pending {
            pending = self
                .wake
                .wait_timeout(pending, self.tick)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *pending = false;
    }

    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn system_reset(&self, fault: &Fault) -> ! {
        log::error!("reset requested: {}", fault);
        std::process::exit(EXIT_RESET)
    }
}
