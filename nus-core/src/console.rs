//! Foreground half of the link: the byte I/O a console interpreter uses.
//!
//! `write_bytes` never blocks and drops what does not fit. `read_byte` is the
//! only place the foreground ever suspends.

use std::io;
use std::sync::Arc;

use crate::connection::ConnectionState;
use crate::link::{LinkStats, StatsSnapshot};
use crate::radio::Radio;
use crate::ring::{Consumer, Producer, RING_BUFFER_LEN};
use crate::sender::{OutboundSender, SendOutcome};

pub struct ConsoleIo<R: Radio, const N: usize = RING_BUFFER_LEN> {
    radio: Arc<R>,
    state: Arc<ConnectionState>,
    stats: Arc<LinkStats>,
    inbound: Consumer<N>,
    outbound: Producer<N>,
    sender: OutboundSender<N>,
}

impl<R: Radio, const N: usize> ConsoleIo<R, N> {
    pub(crate) fn new(
        radio: Arc<R>,
        state: Arc<ConnectionState>,
        stats: Arc<LinkStats>,
        inbound: Consumer<N>,
        outbound: Producer<N>,
        sender: OutboundSender<N>,
    ) -> Self {
        Self {
            radio,
            state,
            stats,
            inbound,
            outbound,
            sender,
        }
    }

    /// Queue `bytes` for transmission. Stops at the first byte that does not
    /// fit and drops the rest. Returns how many bytes were queued.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.iter().take_while(|&&b| self.outbound.push(b)).count();
        let dropped = bytes.len() - accepted;
        if dropped > 0 {
            self.stats.add_outbound_dropped(dropped);
            log::trace!("outbound ring full, dropped {} bytes", dropped);
        }
        accepted
    }

    /// Block until a received byte is available.
    ///
    /// While waiting, pending output keeps draining. The radio wait is entered
    /// only once both rings are empty.
    pub fn read_byte(&mut self) -> u8 {
        loop {
            if let Some(b) = self.inbound.pop() {
                return b;
            }
            self.poll();
            if self.inbound.is_empty() && self.sender.is_idle() {
                self.radio.wait_for_event();
            }
        }
    }

    /// Non-blocking read.
    pub fn try_read_byte(&mut self) -> Option<u8> {
        self.inbound.pop()
    }

    /// Send at most one chunk of pending output.
    pub fn poll(&mut self) -> SendOutcome {
        self.sender
            .send_pending(self.radio.as_ref(), &self.state, &self.stats)
    }

    /// Send all pending output.
    pub fn flush_output(&mut self) {
        self.sender
            .flush(self.radio.as_ref(), &self.state, &self.stats);
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<R: Radio, const N: usize> io::Write for ConsoleIo<R, N> {
    /// May accept fewer bytes than offered, including zero when the ring is full.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_output();
        Ok(())
    }
}

impl<R: Radio, const N: usize> io::Read for ConsoleIo<R, N> {
    /// Blocks for the first byte, then takes whatever else is already queued.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        *first = self.read_byte();
        let mut n = 1;
        for slot in rest {
            match self.inbound.pop() {
                Some(b) => {
                    *slot = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PeerHandle;
    use crate::lifecycle::RadioEvent;
    use crate::link::{split, split_with_capacity, LinkConfig};
    use crate::testing::{Call, MockRadio};
    use std::io::{Read, Write};

    const PEER: PeerHandle = PeerHandle(0);

    #[test]
    fn read_returns_bytes_in_arrival_order() {
        let (mut handler, mut console) =
            split_with_capacity::<_, 8>(MockRadio::new(), LinkConfig::default());
        handler.handle(RadioEvent::Connected { handle: PEER });
        handler.handle(RadioEvent::Write {
            handle: PEER,
            data: &[1, 2, 3, 4, 5],
        });
        handler.handle(RadioEvent::Write {
            handle: PEER,
            data: &[6, 7, 8, 9, 10],
        });
        handler.handle(RadioEvent::Write {
            handle: PEER,
            data: &[11, 12],
        });

        let got: Vec<u8> = (0..7).map(|_| console.read_byte()).collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(console.try_read_byte(), None);
        assert_eq!(console.stats_snapshot().inbound_dropped, 5);
    }

    #[test]
    fn write_drops_past_capacity() {
        let (_handler, mut console) =
            split_with_capacity::<_, 8>(MockRadio::new(), LinkConfig::default());
        assert_eq!(console.write_bytes(b"0123456789"), 7);
        assert_eq!(console.write_bytes(b"x"), 0);
        assert_eq!(console.stats_snapshot().outbound_dropped, 4);
    }

    #[test]
    fn read_drains_output_before_waiting() {
        let (mut handler, mut console) = split(MockRadio::new(), LinkConfig::default());
        handler.handle(RadioEvent::Connected { handle: PEER });
        console.write_bytes(b">>> ");
        handler.handle(RadioEvent::Write {
            handle: PEER,
            data: b"1",
        });

        assert_eq!(console.read_byte(), b'1');
        // Input was already there: nothing was sent and no wait happened.
        assert!(console.radio.sent().is_empty());

        let (sent_tx, sent_rx) = std::sync::mpsc::channel();
        let mut handler = Some(handler);
        console.radio.on_wait(move || {
            if let Some(mut h) = handler.take() {
                h.handle(RadioEvent::Write {
                    handle: PEER,
                    data: b"2",
                });
                sent_tx.send(()).unwrap();
            }
        });
        assert_eq!(console.read_byte(), b'2');
        sent_rx.recv().unwrap();

        let calls = console.radio.calls();
        let send_at = calls
            .iter()
            .position(|c| matches!(c, Call::Send(_, d) if d.as_slice() == b">>> "))
            .unwrap();
        let wait_at = calls.iter().position(|c| *c == Call::Wait).unwrap();
        assert!(send_at < wait_at);
    }

    #[test]
    fn io_traits_move_bytes() {
        let (mut handler, mut console) = split(MockRadio::new(), LinkConfig::default());
        handler.handle(RadioEvent::Connected { handle: PEER });
        handler.handle(RadioEvent::Write {
            handle: PEER,
            data: b"abc",
        });

        let mut buf = [0u8; 8];
        assert_eq!(console.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(console.read(&mut []).unwrap(), 0);

        write!(console, "ok\r\n").unwrap();
        console.flush().unwrap();
        assert_eq!(console.radio.sent().concat(), b"ok\r\n");
    }

    #[test]
    fn output_reaches_new_peer_after_stale_disconnect() {
        let (mut handler, mut console) = split(MockRadio::new(), LinkConfig::default());
        handler.handle(RadioEvent::Connected { handle: PeerHandle(0) });
        handler.handle(RadioEvent::Connected { handle: PeerHandle(1) });
        handler.handle(RadioEvent::Disconnected {
            handle: PeerHandle(0),
            reason: crate::radio::DisconnectReason::RemoteUserTerminated,
        });

        console.write_bytes(b"hello");
        assert_eq!(console.poll(), SendOutcome::Sent(5));
        assert!(console
            .radio
            .calls()
            .contains(&Call::Send(PeerHandle(1), b"hello".to_vec())));
    }

    #[test]
    fn output_without_peer_is_discarded_on_flush() {
        let (_handler, mut console) = split(MockRadio::new(), LinkConfig::default());
        console.write_bytes(&[0u8; 50]);
        console.flush_output();
        assert!(console.radio.calls().is_empty());
        assert_eq!(console.stats_snapshot().chunks_discarded, 3);
    }
}
