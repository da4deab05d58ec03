//! Recording radio for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::connection::PeerHandle;
use crate::fault::Fault;
use crate::radio::{DisconnectReason, Radio, RadioError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(PeerHandle, Vec<u8>),
    StartAdvertising,
    StopAdvertising,
    MtuReply(PeerHandle, u16),
    SysAttrReply(PeerHandle),
    SecurityUnsupported(PeerHandle),
    PhyAuto(PeerHandle),
    ConnParamUpdate(PeerHandle),
    Disconnect(PeerHandle, DisconnectReason),
    Wait,
    Delay(Duration),
}

type Hook = Box<dyn FnMut() + Send>;

#[derive(Default)]
pub struct MockRadio {
    calls: Mutex<Vec<Call>>,
    send_results: Mutex<VecDeque<Result<(), RadioError>>>,
    fail_next: Mutex<Option<RadioError>>,
    on_delay: Mutex<Option<Hook>>,
    on_wait: Mutex<Option<Hook>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results handed out by successive `send_notification` calls; `Ok` once drained.
    pub fn script_sends(&self, results: impl IntoIterator<Item = Result<(), RadioError>>) {
        self.send_results.lock().unwrap().extend(results);
    }

    /// Make the next non-send radio call fail with `error`.
    pub fn fail_next_call(&self, error: RadioError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn on_delay(&self, hook: impl FnMut() + Send + 'static) {
        *self.on_delay.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn on_wait(&self, hook: impl FnMut() + Send + 'static) {
        *self.on_wait.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Payloads of every send attempt, successful or not.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(_, data) => Some(data),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Radio for MockRadio {
    fn send_notification(&self, peer: PeerHandle, data: &[u8]) -> Result<(), RadioError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Send(peer, data.to_vec()));
        self.send_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn start_advertising(&self) -> Result<(), RadioError> {
        self.record(Call::StartAdvertising)
    }

    fn stop_advertising(&self) -> Result<(), RadioError> {
        self.record(Call::StopAdvertising)
    }

    fn reply_mtu_exchange(&self, peer: PeerHandle, local_max: u16) -> Result<(), RadioError> {
        self.record(Call::MtuReply(peer, local_max))
    }

    fn reply_missing_attributes(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.record(Call::SysAttrReply(peer))
    }

    fn reply_security_unsupported(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.record(Call::SecurityUnsupported(peer))
    }

    fn request_phy_auto(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.record(Call::PhyAuto(peer))
    }

    fn request_conn_param_update(&self, peer: PeerHandle) -> Result<(), RadioError> {
        self.record(Call::ConnParamUpdate(peer))
    }

    fn disconnect(&self, peer: PeerHandle, reason: DisconnectReason) -> Result<(), RadioError> {
        self.record(Call::Disconnect(peer, reason))
    }

    fn wait_for_event(&self) {
        self.calls.lock().unwrap().push(Call::Wait);
        if let Some(hook) = self.on_wait.lock().unwrap().as_mut() {
            hook();
        }
    }

    fn delay(&self, duration: Duration) {
        self.calls.lock().unwrap().push(Call::Delay(duration));
        if let Some(hook) = self.on_delay.lock().unwrap().as_mut() {
            hook();
        }
    }

    fn system_reset(&self, fault: &Fault) -> ! {
        panic!("system reset: {fault}");
    }
}
