use crate::{
    common::{likely, unlikely},
    error::TimedOut,
    ringbuf::{clamp_reported, Shared},
    sync::{Arc, Ordering},
};
use bytemuck::Pod;
use std::time::Duration;
use tracing::{trace, warn};

/// Writing half of a [`RingBuffer`](crate::RingBuffer).
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    free: usize,
    generation: usize,
}

impl<T: Pod> Producer<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, generation: usize) -> Self {
        let free = shared.capacity;
        Producer {
            shared,
            free,
            generation,
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn size(&self) -> usize {
        self.shared.memory.size()
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// See [`RingBuffer::clear`](crate::RingBuffer::clear).
    pub fn clear(&mut self) {
        self.shared.clear();
        self.sync_generation();
    }

    #[inline(always)]
    fn sync_generation(&mut self) {
        let generation = self.shared.generation();
        if unlikely(generation != self.generation) {
            self.generation = generation;
            self.free = 0;
        }
    }

    /// Free space in elements.
    ///
    /// A cached count is returned when it already covers a non-zero
    /// `min_required`; otherwise the consumer position is reloaded. Pass
    /// zero for an exact figure.
    #[inline]
    pub fn free_to_write(&mut self, min_required: usize) -> usize {
        self.sync_generation();
        if min_required == 0 || self.free < min_required {
            self.free = self.shared.writable();
        }
        self.free
    }

    /// Contiguous view of the whole free region.
    pub fn write_slice(&mut self) -> &mut [T] {
        let free = self.free_to_write(0);
        self.slice_mut(free)
    }

    #[inline(always)]
    fn slice_mut(&mut self, len: usize) -> &mut [T] {
        let write_pos = self.shared.write_pos.load(Ordering::Relaxed);
        // The mirror keeps any run of up to `capacity` elements in bounds.
        unsafe { std::slice::from_raw_parts_mut(self.shared.ptr_at(write_pos), len) }
    }

    /// Publishes `count` elements written through [`write_slice`] or a
    /// callback. Counts beyond the free space are clamped.
    ///
    /// [`write_slice`]: Producer::write_slice
    #[inline]
    pub fn produce(&mut self, count: usize) {
        self.sync_generation();
        let count = self.clamp(count);
        self.advance(count);
    }

    #[inline(always)]
    fn advance(&mut self, count: usize) {
        let write_pos = self.shared.write_pos.load(Ordering::Relaxed);
        let new_write_pos = write_pos.wrapping_add(count);
        self.shared.write_pos.store(new_write_pos, Ordering::Release);
        self.free -= count;

        trace!(
            write_pos = new_write_pos,
            count = count,
            free = self.free,
            "producer advanced"
        );

        self.shared.notify();
    }

    #[inline(always)]
    fn clamp(&mut self, count: usize) -> usize {
        if likely(count <= self.free) {
            return count;
        }
        let free = self.free_to_write(count);
        if unlikely(count > free) {
            warn!(
                count = count,
                free = free,
                "produced count exceeds free space, clamping"
            );
            return free;
        }
        count
    }

    /// Waits up to `timeout` for at least `min` free elements, hands the whole
    /// free region to `callback` and publishes the count it returns.
    ///
    /// The callback may be offered more than `min` elements and may produce
    /// fewer than offered.
    ///
    /// # Errors
    /// [`TimedOut`] if the space did not appear in time. The callback is not
    /// called in that case.
    pub fn write_at_least<F>(
        &mut self,
        min: usize,
        timeout: Duration,
        callback: F,
    ) -> Result<usize, TimedOut>
    where
        F: FnOnce(&mut [T]) -> usize,
    {
        if unlikely(self.free_to_write(min) < min) {
            let shared = &*self.shared;
            let mut free = self.free;
            let mut generation = self.generation;
            let ready = shared.wait_until(timeout, || {
                generation = shared.generation();
                free = shared.writable();
                free >= min
            });
            self.free = free;
            self.generation = generation;

            if !ready {
                trace!(min = min, free = free, "producer wait timed out");
                return Err(TimedOut { required: min });
            }
        }

        let offered = self.free;
        let produced = clamp_reported(callback(self.slice_mut(offered)), offered);
        self.advance(produced);
        Ok(produced)
    }
}
