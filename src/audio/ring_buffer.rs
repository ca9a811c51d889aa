//! Lock-free single-producer/single-consumer byte ring.
//!
//! Fixed capacity, allocated once in [`ring_buffer`]. The two halves are
//! separate owned types, so exactly one thread can write and exactly one
//! thread can read. No locks and no allocation after construction: both
//! halves are safe to use from an audio callback.
//!
//! Storage is a slice of `AtomicU8` so the halves can share it without
//! `unsafe`. Byte copies use relaxed stores; the cursors publish them with
//! release/acquire ordering.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared {
    data: Box<[AtomicU8]>,
    /// Total bytes consumed (wrapping)
    read: AtomicUsize,
    /// Total bytes produced (wrapping)
    write: AtomicUsize,
}

impl Shared {
    #[inline]
    fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn used(&self, read: usize, write: usize) -> usize {
        write.wrapping_sub(read)
    }

    /// Copy `out.len()` bytes starting at stream position `pos`
    #[inline]
    fn copy_out(&self, pos: usize, out: &mut [u8]) {
        let capacity = self.capacity();
        let mut index = pos % capacity;
        for byte in out.iter_mut() {
            *byte = self.data[index].load(Ordering::Relaxed);
            index += 1;
            if index == capacity {
                index = 0;
            }
        }
    }

    /// Copy `bytes` in starting at stream position `pos`
    #[inline]
    fn copy_in(&self, pos: usize, bytes: &[u8]) {
        let capacity = self.capacity();
        let mut index = pos % capacity;
        for &byte in bytes {
            self.data[index].store(byte, Ordering::Relaxed);
            index += 1;
            if index == capacity {
                index = 0;
            }
        }
    }
}

/// Writing half of the ring
pub struct RingProducer {
    shared: Arc<Shared>,
}

/// Reading half of the ring
pub struct RingConsumer {
    shared: Arc<Shared>,
}

/// Create a ring holding up to `capacity` bytes, split into its two halves.
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn ring_buffer(capacity: usize) -> (RingProducer, RingConsumer) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    let data: Box<[AtomicU8]> = (0..capacity).map(|_| AtomicU8::new(0)).collect();
    let shared = Arc::new(Shared {
        data,
        read: AtomicUsize::new(0),
        write: AtomicUsize::new(0),
    });
    (
        RingProducer {
            shared: Arc::clone(&shared),
        },
        RingConsumer { shared },
    )
}

impl RingProducer {
    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Bytes written but not yet consumed
    #[inline]
    pub fn size_used(&self) -> usize {
        let read = self.shared.read.load(Ordering::Acquire);
        let write = self.shared.write.load(Ordering::Relaxed);
        self.shared.used(read, write)
    }

    /// Bytes that can be written right now
    #[inline]
    pub fn size_free(&self) -> usize {
        self.capacity() - self.size_used()
    }

    /// Append `bytes` as one unit.
    ///
    /// Returns `false` and writes nothing if they do not fit in the free
    /// space. Callers treat that as "try again later".
    #[inline]
    pub fn put(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.size_free() {
            return false;
        }
        let write = self.shared.write.load(Ordering::Relaxed);
        self.shared.copy_in(write, bytes);
        self.shared
            .write
            .store(write.wrapping_add(bytes.len()), Ordering::Release);
        true
    }
}

impl RingConsumer {
    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Bytes available to read
    #[inline]
    pub fn size_used(&self) -> usize {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);
        self.shared.used(read, write)
    }

    /// Free space as seen from the reading side
    #[inline]
    pub fn size_free(&self) -> usize {
        self.capacity() - self.size_used()
    }

    /// Copy the first `out.len()` queued bytes without consuming them.
    ///
    /// Returns `false` if fewer bytes are queued.
    #[inline]
    pub fn peek(&self, out: &mut [u8]) -> bool {
        if out.len() > self.size_used() {
            return false;
        }
        let read = self.shared.read.load(Ordering::Relaxed);
        self.shared.copy_out(read, out);
        true
    }

    /// Consume exactly `out.len()` bytes into `out`.
    ///
    /// Returns `false` and consumes nothing if fewer bytes are queued.
    #[inline]
    pub fn get(&mut self, out: &mut [u8]) -> bool {
        if out.len() > self.size_used() {
            return false;
        }
        let read = self.shared.read.load(Ordering::Relaxed);
        self.shared.copy_out(read, out);
        self.shared
            .read
            .store(read.wrapping_add(out.len()), Ordering::Release);
        true
    }

    /// Drop everything currently queued
    pub fn clear(&mut self) {
        let write = self.shared.write.load(Ordering::Acquire);
        self.shared.read.store(write, Ordering::Release);
    }
}
