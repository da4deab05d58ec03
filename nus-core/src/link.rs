//! Link assembly: configuration, drop counters, and the split of one link
//! into its event-context half and its foreground half.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{ConnectionState, MAX_ATT_MTU};
use crate::console::ConsoleIo;
use crate::lifecycle::EventHandler;
use crate::radio::Radio;
use crate::ring::{ByteRing, RING_BUFFER_LEN};
use crate::sender::OutboundSender;

/// Pause between attempts while the radio's notification queue is full.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_micros(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Largest ATT MTU offered during MTU exchange.
    pub max_mtu: u16,
    pub retry_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_mtu: MAX_ATT_MTU,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Counters for data the link dropped or struggled to deliver. Purely
/// observational: none of them changes what the link does.
#[derive(Debug, Default)]
pub struct LinkStats {
    inbound_dropped: AtomicU64,
    outbound_dropped: AtomicU64,
    chunks_discarded: AtomicU64,
    congestion_retries: AtomicU64,
    notifications_sent: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Received bytes lost because the inbound ring was full.
    pub inbound_dropped: u64,
    /// Console bytes lost because the outbound ring was full.
    pub outbound_dropped: u64,
    /// Chunks thrown away because no peer was connected.
    pub chunks_discarded: u64,
    pub congestion_retries: u64,
    pub notifications_sent: u64,
}

impl LinkStats {
    pub(crate) fn add_inbound_dropped(&self, n: usize) {
        self.inbound_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_outbound_dropped(&self, n: usize) {
        self.outbound_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn chunk_discarded(&self) {
        self.chunks_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn congestion_retry(&self) {
        self.congestion_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            outbound_dropped: self.outbound_dropped.load(Ordering::Relaxed),
            chunks_discarded: self.chunks_discarded.load(Ordering::Relaxed),
            congestion_retries: self.congestion_retries.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
        }
    }
}

/// Build a link with the default ring size.
pub fn split<R: Radio>(radio: R, config: LinkConfig) -> (EventHandler<R>, ConsoleIo<R>) {
    split_with_capacity::<R, RING_BUFFER_LEN>(radio, config)
}

/// Build a link whose two rings have `N` slots each.
///
/// The inbound ring's producer goes to the [`EventHandler`]; its consumer,
/// plus both halves of the outbound ring, go to the [`ConsoleIo`].
pub fn split_with_capacity<R: Radio, const N: usize>(
    radio: R,
    config: LinkConfig,
) -> (EventHandler<R, N>, ConsoleIo<R, N>) {
    let radio = Arc::new(radio);
    let state = Arc::new(ConnectionState::new(config.max_mtu));
    let stats = Arc::new(LinkStats::default());
    let (inbound_tx, inbound_rx) = ByteRing::<N>::new().split();
    let (outbound_tx, outbound_rx) = ByteRing::<N>::new().split();

    let handler = EventHandler::new(
        Arc::clone(&radio),
        Arc::clone(&state),
        Arc::clone(&stats),
        inbound_tx,
    );
    let sender = OutboundSender::new(outbound_rx, config.retry_delay);
    let console = ConsoleIo::new(radio, state, stats, inbound_rx, outbound_tx, sender);
    (handler, console)
}
