//! Outbound sender: drains the outbound ring into notifications.
//!
//! Each call moves at most one chunk of `max_payload()` bytes. A congested
//! radio is retried with the same chunk for as long as the same peer stays
//! connected; a popped chunk is never pushed back or sent twice.

use std::time::Duration;

use crate::connection::{ConnectionState, MAX_ATT_MTU};
use crate::fault::{self, Fault};
use crate::link::LinkStats;
use crate::radio::{Radio, RadioError};
use crate::ring::Consumer;

/// What one `send_pending` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Outbound ring was empty.
    Idle,
    /// A chunk of this many bytes was accepted by the radio.
    Sent(usize),
    /// A chunk of this many bytes was thrown away: no peer to receive it.
    Discarded(usize),
}

pub struct OutboundSender<const N: usize> {
    outbound: Consumer<N>,
    retry_delay: Duration,
}

impl<const N: usize> OutboundSender<N> {
    pub fn new(outbound: Consumer<N>, retry_delay: Duration) -> Self {
        Self {
            outbound,
            retry_delay,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Send one chunk from the outbound ring. Foreground only; not reentrant.
    pub fn send_pending<R: Radio + ?Sized>(
        &mut self,
        radio: &R,
        state: &ConnectionState,
        stats: &LinkStats,
    ) -> SendOutcome {
        if self.outbound.is_empty() {
            return SendOutcome::Idle;
        }

        let mut chunk = [0u8; MAX_ATT_MTU as usize];
        let limit = state.max_payload().min(chunk.len());
        let mut len = 0;
        while len < limit {
            match self.outbound.pop() {
                Some(b) => {
                    chunk[len] = b;
                    len += 1;
                }
                None => break,
            }
        }
        let chunk = &chunk[..len];

        let Some(peer) = state.peer() else {
            stats.chunk_discarded();
            return SendOutcome::Discarded(len);
        };

        // Retry only while the last attempt was congested AND the link still
        // belongs to the peer the chunk was meant for.
        loop {
            match radio.send_notification(peer, chunk) {
                Ok(()) => {
                    stats.notification_sent();
                    return SendOutcome::Sent(len);
                }
                Err(RadioError::NotConnected) => {
                    stats.chunk_discarded();
                    return SendOutcome::Discarded(len);
                }
                Err(RadioError::Congested) => {
                    stats.congestion_retry();
                    radio.delay(self.retry_delay);
                    if state.peer() != Some(peer) {
                        log::debug!("peer {:?} went away during retry", peer);
                        stats.chunk_discarded();
                        return SendOutcome::Discarded(len);
                    }
                }
                Err(error) => fault::escalate(
                    radio,
                    Fault::Radio {
                        call: "send_notification",
                        error,
                    },
                ),
            }
        }
    }

    /// Send chunks until the outbound ring is empty.
    pub fn flush<R: Radio + ?Sized>(&mut self, radio: &R, state: &ConnectionState, stats: &LinkStats) {
        while self.send_pending(radio, state, stats) != SendOutcome::Idle {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PeerHandle;
    use crate::link::DEFAULT_RETRY_DELAY;
    use crate::ring::{ByteRing, Producer};
    use crate::testing::{Call, MockRadio};
    use std::sync::Arc;

    const PEER: PeerHandle = PeerHandle(1);

    fn setup() -> (Producer<1024>, OutboundSender<1024>, ConnectionState, LinkStats) {
        let (tx, rx) = ByteRing::<1024>::new().split();
        let state = ConnectionState::default();
        state.on_connect(PEER);
        (
            tx,
            OutboundSender::new(rx, DEFAULT_RETRY_DELAY),
            state,
            LinkStats::default(),
        )
    }

    fn fill(tx: &mut Producer<1024>, data: &[u8]) {
        for &b in data {
            assert!(tx.push(b));
        }
    }

    #[test]
    fn empty_ring_is_idle_without_radio_calls() {
        let (_tx, mut sender, state, stats) = setup();
        let radio = MockRadio::new();
        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Idle);
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn chunks_follow_max_payload() {
        let (mut tx, mut sender, state, stats) = setup();
        state.on_mtu_negotiated(126);
        assert_eq!(state.max_payload(), 123);
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        fill(&mut tx, &data);

        let radio = MockRadio::new();
        sender.flush(&radio, &state, &stats);

        let sent = radio.sent();
        let sizes: Vec<usize> = sent.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![123, 123, 54]);
        assert_eq!(sent.concat(), data);
        assert_eq!(stats.snapshot().notifications_sent, 3);
    }

    #[test]
    fn default_payload_before_negotiation() {
        let (mut tx, mut sender, state, stats) = setup();
        fill(&mut tx, &[7u8; 25]);
        let radio = MockRadio::new();
        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Sent(20));
        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Sent(5));
    }

    #[test]
    fn congestion_retries_same_chunk_until_success() {
        let (mut tx, mut sender, state, stats) = setup();
        fill(&mut tx, b"print('hi')");
        let radio = MockRadio::new();
        radio.script_sends([
            Err(RadioError::Congested),
            Err(RadioError::Congested),
            Err(RadioError::Congested),
            Ok(()),
        ]);

        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Sent(11));
        let sent = radio.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|c| c.as_slice() == b"print('hi')"));
        let delays = radio
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Delay(d) if *d == DEFAULT_RETRY_DELAY))
            .count();
        assert_eq!(delays, 3);
        assert_eq!(stats.snapshot().congestion_retries, 3);
        assert!(sender.is_idle());
    }

    #[test]
    fn not_connected_error_discards_chunk() {
        let (mut tx, mut sender, state, stats) = setup();
        fill(&mut tx, b"abc");
        let radio = MockRadio::new();
        radio.script_sends([Err(RadioError::NotConnected)]);
        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Discarded(3));
        assert_eq!(radio.sent().len(), 1);
        assert!(sender.is_idle());
        assert_eq!(stats.snapshot().chunks_discarded, 1);
    }

    #[test]
    fn no_peer_discards_without_radio_call() {
        let (mut tx, mut sender, state, stats) = setup();
        state.on_disconnect();
        fill(&mut tx, b"lost");
        let radio = MockRadio::new();
        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Discarded(4));
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn disconnect_during_retry_stops_loop_and_next_call_discards() {
        let (mut tx, rx) = ByteRing::<1024>::new().split();
        let mut sender = OutboundSender::new(rx, DEFAULT_RETRY_DELAY);
        let state = Arc::new(ConnectionState::default());
        state.on_connect(PEER);
        let stats = LinkStats::default();
        fill(&mut tx, &[1u8; 40]);

        let radio = MockRadio::new();
        radio.script_sends(std::iter::repeat(Err(RadioError::Congested)).take(1000));
        let hook_state = Arc::clone(&state);
        radio.on_delay(move || hook_state.on_disconnect());

        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Discarded(20));
        assert_eq!(radio.sent().len(), 1);

        assert_eq!(sender.send_pending(&radio, &state, &stats), SendOutcome::Discarded(20));
        assert_eq!(radio.sent().len(), 1);
        assert!(sender.is_idle());
    }

    #[test]
    #[should_panic(expected = "system reset")]
    fn unexpected_error_is_fatal() {
        let (mut tx, mut sender, state, stats) = setup();
        fill(&mut tx, b"x");
        let radio = MockRadio::new();
        radio.script_sends([Err(RadioError::Fatal { code: 0x3004 })]);
        sender.send_pending(&radio, &state, &stats);
    }
}
