// ===============================
// src/queue.rs
// ===============================
//
// Bounded wait-free SPSC ring used for every inter-thread handoff in the
// pipeline (quotes into the market-data worker, orders into the routing
// worker). Capacity is rounded up to a power of two; head and tail are
// free-running counters masked into the buffer, so the full capacity is
// usable. The producer writes the slot before releasing the tail; the
// consumer acquires the tail before reading and releases the head after.
//
// Exactly one producer thread and one consumer thread — the split handles
// enforce that at the type level.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    cap: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Slots are only touched by the single producer (writes at tail) and the
// single consumer (reads at head); the atomics order those accesses.
unsafe impl<T: Send> Sync for Inner<T> {}
unsafe impl<T: Send> Send for Inner<T> {}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe { (*self.buf[head & self.mask].get()).assume_init_drop() };
            head = head.wrapping_add(1);
        }
    }
}

/// Producer end. `push` is non-blocking and hands the item back on a full ring.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
}

/// Consumer end. `pop` is non-blocking and returns None on an empty ring.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

/// Create a ring holding at least `capacity` items and split it into its two ends.
pub fn spsc<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let cap = capacity.max(2).next_power_of_two();
    let buf: Vec<UnsafeCell<MaybeUninit<T>>> =
        (0..cap).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
    let inner = Arc::new(Inner {
        buf: buf.into_boxed_slice(),
        mask: cap - 1,
        cap,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (Producer { inner: inner.clone() }, Consumer { inner })
}

impl<T> Producer<T> {
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == self.inner.cap {
            return Err(item);
        }
        unsafe { (*self.inner.buf[tail & self.inner.mask].get()).write(item) };
        self.inner.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }
}

impl<T> Consumer<T> {
    pub fn pop(&mut self) -> Option<T> {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let item = unsafe { (*self.inner.buf[head & self.inner.mask].get()).assume_init_read() };
        self.inner.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}
