use crate::{
    common::unlikely,
    consumer::Consumer,
    error::MirrorBufError,
    memory::{self, Memory},
    producer::Producer,
    sync::{fence, Arc, AtomicUsize, Condvar, Mutex, MutexGuard, Ordering},
};
use bytemuck::Pod;
use crossbeam::utils::CachePadded;
use std::marker::PhantomData;
use std::sync::PoisonError;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

pub(crate) struct Shared<T> {
    pub(crate) memory: Memory,
    pub(crate) capacity: usize,
    pub(crate) read_pos: CachePadded<AtomicUsize>,
    pub(crate) write_pos: CachePadded<AtomicUsize>,
    // Bumped by `clear` so each handle can drop its cached counts.
    generation: AtomicUsize,
    waiters: AtomicUsize,
    lock: CachePadded<Mutex<()>>,
    cond: Condvar,
    _marker: PhantomData<T>,
}

impl<T: Pod> Shared<T> {
    #[inline(always)]
    pub(crate) fn mask(&self, pos: usize) -> usize {
        pos & (self.capacity - 1)
    }

    #[inline(always)]
    pub(crate) fn ptr_at(&self, pos: usize) -> *mut T {
        unsafe { self.memory.as_ptr().as_ptr().cast::<T>().add(self.mask(pos)) }
    }

    /// Elements the consumer may read. Consumer side only.
    #[inline(always)]
    pub(crate) fn readable(&self) -> usize {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        write_pos.wrapping_sub(self.read_pos.load(Ordering::Relaxed))
    }

    /// Elements the producer may write. Producer side only.
    #[inline(always)]
    pub(crate) fn writable(&self) -> usize {
        let read_pos = self.read_pos.load(Ordering::Acquire);
        self.capacity - self.write_pos.load(Ordering::Relaxed).wrapping_sub(read_pos)
    }

    pub(crate) fn len(&self) -> usize {
        let read_pos = self.read_pos.load(Ordering::Acquire);
        self.write_pos.load(Ordering::Acquire).wrapping_sub(read_pos)
    }

    pub(crate) fn generation(&self) -> usize {
        self.generation.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wakes the peer if it is parked in `wait_until`.
    ///
    /// Pairs with the fence in `wait_until`: either the waiter sees the new
    /// position in its predicate, or we see it registered and signal it.
    #[inline(always)]
    pub(crate) fn notify(&self) {
        fence(Ordering::SeqCst);
        if unlikely(self.waiters.load(Ordering::Relaxed) != 0) {
            drop(self.lock());
            self.cond.notify_one();
        }
    }

    /// Blocks until `ready` returns true or `timeout` elapses. `ready` is
    /// evaluated under the wait lock before every wait and after every wake.
    pub(crate) fn wait_until<F>(&self, timeout: Duration, mut ready: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let satisfied = loop {
            if ready() {
                break true;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                break false;
            }
            guard = match self.cond.wait_timeout(guard, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        drop(guard);
        satisfied
    }

    pub(crate) fn clear(&self) {
        let _guard = self.lock();
        self.read_pos.store(0, Ordering::Release);
        self.write_pos.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        trace!(capacity = self.capacity, "ring buffer cleared");
        self.cond.notify_all();
    }
}

/// Caps a count returned by a transfer callback at what it was offered.
#[inline(always)]
pub(crate) fn clamp_reported(count: usize, offered: usize) -> usize {
    if unlikely(count > offered) {
        warn!(
            count = count,
            offered = offered,
            "callback reported more elements than offered, clamping"
        );
        return offered;
    }
    count
}

/// Fixed capacity ring buffer over mirrored memory.
///
/// Construct with [`RingBuffer::new`], then [`split`](RingBuffer::split) into
/// the single [`Producer`] and single [`Consumer`]. The mapping is released
/// when the buffer and both handles are gone.
pub struct RingBuffer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Pod> RingBuffer<T> {
    /// Creates a ring buffer holding `capacity` elements.
    ///
    /// `capacity * size_of::<T>()` must be a power of two and at least one
    /// page, which also makes `capacity` a power of two.
    ///
    /// # Errors
    /// [`MirrorBufError::InvalidCapacity`] for an unusable capacity, or the
    /// mapping error if the double mapping could not be set up.
    pub fn new(capacity: usize) -> Result<Self, MirrorBufError> {
        let element_size = std::mem::size_of::<T>();
        let invalid = MirrorBufError::InvalidCapacity {
            capacity,
            element_size,
            page_size: memory::page_size(),
        };
        let size = capacity.checked_mul(element_size).ok_or(invalid)?;
        let memory = Memory::new(size).map_err(|err| match err {
            MirrorBufError::InvalidCapacity { .. } => invalid,
            err => err,
        })?;

        Ok(RingBuffer {
            shared: Arc::new(Shared {
                memory,
                capacity,
                read_pos: CachePadded::new(AtomicUsize::new(0)),
                write_pos: CachePadded::new(AtomicUsize::new(0)),
                generation: AtomicUsize::new(0),
                waiters: AtomicUsize::new(0),
                lock: CachePadded::new(Mutex::new(())),
                cond: Condvar::new(),
                _marker: PhantomData,
            }),
        })
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.shared.memory.size()
    }

    /// Produced but not yet consumed elements, as seen right now.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resets both positions to zero and wakes every waiter.
    ///
    /// Must not race with a transfer in progress on either side.
    pub fn clear(&self) {
        self.shared.clear();
    }

    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let generation = self.shared.generation();
        let producer = Producer::new(Arc::clone(&self.shared), generation);
        let consumer = Consumer::new(self.shared, generation);
        (producer, consumer)
    }
}
