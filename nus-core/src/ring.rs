//! Fixed-capacity single-producer/single-consumer byte ring.
//!
//! A ring of `N` slots holds at most `N - 1` bytes: it is empty when
//! `head == tail` and full when advancing `head` would land on `tail`.
//! There is no lock. Splitting a ring yields exactly one [`Producer`] and one
//! [`Consumer`], which is what makes the index arithmetic safe across threads.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default slot count for the console rings. Large enough to print a
/// `bytearray(256)` repr in one go.
pub const RING_BUFFER_LEN: usize = 1024 + 45;

/// Byte ring with `N` slots (`N - 1` usable bytes).
pub struct ByteRing<const N: usize> {
    buffer: UnsafeCell<[u8; N]>,
    /// Next write index. Only the producer stores to it.
    head: AtomicUsize,
    /// Next read index. Only the consumer stores to it.
    tail: AtomicUsize,
}

// The only `&self` operations are atomic queries. Writes to `buffer` happen
// through `push_shared`/`pop_shared`, reachable only via `&mut self` or the
// unique `Producer`/`Consumer` handles.
unsafe impl<const N: usize> Sync for ByteRing<N> {}

impl<const N: usize> ByteRing<N> {
    const VALID: () = assert!(N >= 2, "a ring needs at least two slots");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Self {
            buffer: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Usable capacity in bytes (`N - 1`).
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        Self::advance(self.head.load(Ordering::Acquire)) == self.tail.load(Ordering::Acquire)
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    /// Append one byte. Returns `false` and leaves the ring untouched when full.
    pub fn push(&mut self, byte: u8) -> bool {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.push_shared(byte) }
    }

    /// Remove the oldest byte, or `None` when empty.
    pub fn pop(&mut self) -> Option<u8> {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.pop_shared() }
    }

    /// Split into the writer and reader halves. Each half is unique, so the
    /// ring keeps exactly one producer and one consumer for its lifetime.
    pub fn split(self) -> (Producer<N>, Consumer<N>) {
        let ring = Arc::new(self);
        (
            Producer {
                ring: Arc::clone(&ring),
            },
            Consumer { ring },
        )
    }

    fn advance(index: usize) -> usize {
        let next = index + 1;
        if next == N {
            0
        } else {
            next
        }
    }

    /// # Safety
    /// The caller must be the ring's only producer.
    unsafe fn push_shared(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = Self::advance(head);
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        // No reference to the whole array is formed: the consumer may be
        // reading another slot at the same time.
        self.buffer.get().cast::<u8>().add(head).write(byte);
        self.head.store(next, Ordering::Release);
        true
    }

    /// # Safety
    /// The caller must be the ring's only consumer.
    unsafe fn pop_shared(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let byte = self.buffer.get().cast::<u8>().add(tail).read();
        self.tail.store(Self::advance(tail), Ordering::Release);
        Some(byte)
    }
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer half of a split [`ByteRing`].
pub struct Producer<const N: usize> {
    ring: Arc<ByteRing<N>>,
}

impl<const N: usize> Producer<N> {
    /// Append one byte; `false` when the ring is full. Never blocks.
    pub fn push(&mut self, byte: u8) -> bool {
        // SAFETY: `Producer` is not `Clone` and `split` creates exactly one.
        unsafe { self.ring.push_shared(byte) }
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Reader half of a split [`ByteRing`].
pub struct Consumer<const N: usize> {
    ring: Arc<ByteRing<N>>,
}

impl<const N: usize> Consumer<N> {
    /// Remove the oldest byte; `None` when the ring is empty.
    pub fn pop(&mut self) -> Option<u8> {
        // SAFETY: `Consumer` is not `Clone` and `split` creates exactly one.
        unsafe { self.ring.pop_shared() }
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }
}
