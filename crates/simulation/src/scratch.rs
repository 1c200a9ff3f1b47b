//! Reusable scratch memory for per-tick algorithms.
//!
//! Segment building, booking and pathfinding all need short-lived buffers
//! sized to the map. They lease them from a [`ScratchArena`]; the lease hands
//! the buffer back when it is dropped, so every exit path (early `return`,
//! `?`, `continue 'outer`) releases it. The arena tracks how many bytes are
//! leased right now against a fixed capacity and remembers the high-water
//! mark.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::config::SCRATCH_CAPACITY_BYTES;

/// A buffer type the arena knows how to recycle.
pub trait ScratchBuffer: Default + Send + 'static {
    fn reset(&mut self);
}

impl<T: Send + 'static> ScratchBuffer for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T: Send + 'static> ScratchBuffer for VecDeque<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

type Pool = HashMap<TypeId, Vec<Box<dyn Any + Send>>>;

pub struct ScratchArena {
    capacity: usize,
    used: AtomicUsize,
    high_water: AtomicUsize,
    pool: Mutex<Pool>,
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::with_capacity(SCRATCH_CAPACITY_BYTES)
    }
}

impl std::fmt::Debug for ScratchArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchArena")
            .field("capacity", &self.capacity)
            .field("used", &self.used())
            .field("high_water", &self.high_water())
            .finish()
    }
}

impl ScratchArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            pool: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes leased right now.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Marks the current usage; dropping the marker asserts every lease taken
    /// after it has been returned.
    pub fn temp_usage(&self) -> TempUsage<'_> {
        TempUsage {
            arena: self,
            mark: self.used(),
        }
    }

    /// An empty recycled buffer, accounted as `bytes` until it is dropped.
    pub fn lease<B: ScratchBuffer>(&self, bytes: usize) -> ScratchLease<'_, B> {
        self.reserve(bytes);
        let buffer = self.take::<B>();
        ScratchLease {
            arena: self,
            bytes,
            buffer: Some(buffer),
        }
    }

    pub fn lease_vec<T: Send + 'static>(&self, capacity: usize) -> ScratchLease<'_, Vec<T>> {
        let mut lease = self.lease::<Vec<T>>(capacity * std::mem::size_of::<T>());
        lease.reserve(capacity);
        lease
    }

    pub fn lease_queue<T: Send + 'static>(&self, capacity: usize) -> ScratchLease<'_, VecDeque<T>> {
        let mut lease = self.lease::<VecDeque<T>>(capacity * std::mem::size_of::<T>());
        lease.reserve(capacity);
        lease
    }

    /// `len` copies of `T::default()`.
    pub fn lease_zeroed<T: Default + Clone + Send + 'static>(
        &self,
        len: usize,
    ) -> ScratchLease<'_, Vec<T>> {
        let mut lease = self.lease::<Vec<T>>(len * std::mem::size_of::<T>());
        lease.resize(len, T::default());
        lease
    }

    fn reserve(&self, bytes: usize) {
        let used = self.used.fetch_add(bytes, Ordering::Relaxed) + bytes;
        assert!(
            used <= self.capacity,
            "scratch arena exhausted: {used} bytes leased, capacity is {}",
            self.capacity
        );
        self.high_water.fetch_max(used, Ordering::Relaxed);
    }

    fn take<B: ScratchBuffer>(&self) -> B {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        pool.get_mut(&TypeId::of::<B>())
            .and_then(|list| list.pop())
            .and_then(|boxed| boxed.downcast::<B>().ok())
            .map(|b| *b)
            .unwrap_or_default()
    }

    fn give_back<B: ScratchBuffer>(&self, mut buffer: B, bytes: usize) {
        buffer.reset();
        self.used.fetch_sub(bytes, Ordering::Relaxed);
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        pool.entry(TypeId::of::<B>())
            .or_default()
            .push(Box::new(buffer));
    }
}

/// A leased buffer. Derefs to the buffer; returns it to the arena on drop.
pub struct ScratchLease<'a, B: ScratchBuffer> {
    arena: &'a ScratchArena,
    bytes: usize,
    buffer: Option<B>,
}

impl<B: ScratchBuffer> Deref for ScratchLease<'_, B> {
    type Target = B;
    fn deref(&self) -> &B {
        match &self.buffer {
            Some(b) => b,
            None => unreachable!("scratch buffer taken before drop"),
        }
    }
}

impl<B: ScratchBuffer> DerefMut for ScratchLease<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        match &mut self.buffer {
            Some(b) => b,
            None => unreachable!("scratch buffer taken before drop"),
        }
    }
}

impl<B: ScratchBuffer> Drop for ScratchLease<'_, B> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.arena.give_back(buffer, self.bytes);
        }
    }
}

pub struct TempUsage<'a> {
    arena: &'a ScratchArena,
    mark: usize,
}

impl TempUsage<'_> {
    pub fn mark(&self) -> usize {
        self.mark
    }
}

impl Drop for TempUsage<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert_eq!(
                self.arena.used(),
                self.mark,
                "scratch leases outlived their temp usage scope"
            );
        }
    }
}
