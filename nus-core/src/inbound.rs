//! Inbound path: copies received write payloads into the inbound ring.
//!
//! Runs in event context. Bounded by the payload length, never blocks and
//! never allocates. Bytes that do not fit are dropped.

use crate::link::LinkStats;
use crate::ring::Producer;

/// Append `data` in order; stop at the first byte that does not fit.
/// Returns how many bytes were accepted.
pub fn deliver<const N: usize>(inbound: &mut Producer<N>, data: &[u8], stats: &LinkStats) -> usize {
    let accepted = data.iter().take_while(|&&b| inbound.push(b)).count();
    let dropped = data.len() - accepted;
    if dropped > 0 {
        stats.add_inbound_dropped(dropped);
        log::trace!("inbound ring full, dropped {} of {} bytes", dropped, data.len());
    }
    accepted
}
