use crate::{
    common::{likely, unlikely},
    error::TimedOut,
    ringbuf::{clamp_reported, Shared},
    sync::{Arc, Ordering},
};
use bytemuck::Pod;
use std::time::Duration;
use tracing::{trace, warn};

/// Reading half of a [`RingBuffer`](crate::RingBuffer).
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    available: usize,
    generation: usize,
}

impl<T: Pod> Consumer<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, generation: usize) -> Self {
        Consumer {
            shared,
            available: 0,
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
            self.available = 0;
        }
    }

    /// Elements ready to read.
    ///
    /// A cached count is returned when it already covers a non-zero
    /// `min_required`; otherwise the producer position is reloaded. Pass
    /// zero for an exact figure.
    #[inline]
    pub fn available(&mut self, min_required: usize) -> usize {
        self.sync_generation();
        if min_required == 0 || self.available < min_required {
            self.available = self.shared.readable();
        }
        self.available
    }

    /// Contiguous view of everything ready to read.
    pub fn read_slice(&mut self) -> &[T] {
        let available = self.available(0);
        self.slice(available)
    }

    #[inline(always)]
    fn slice(&self, len: usize) -> &[T] {
        let read_pos = self.shared.read_pos.load(Ordering::Relaxed);
        unsafe { std::slice::from_raw_parts(self.shared.ptr_at(read_pos), len) }
    }

    /// Releases `count` elements back to the producer. Counts beyond what is
    /// available are clamped.
    #[inline]
    pub fn consume(&mut self, count: usize) {
        self.sync_generation();
        let count = self.clamp(count);
        self.advance(count);
    }

    #[inline(always)]
    fn advance(&mut self, count: usize) {
        let read_pos = self.shared.read_pos.load(Ordering::Relaxed);
        let new_read_pos = read_pos.wrapping_add(count);
        self.shared.read_pos.store(new_read_pos, Ordering::Release);
        self.available -= count;

        trace!(
            read_pos = new_read_pos,
            count = count,
            available = self.available,
            "consumer advanced"
        );

        self.shared.notify();
    }

    #[inline(always)]
    fn clamp(&mut self, count: usize) -> usize {
        if likely(count <= self.available) {
            return count;
        }
        let available = self.available(count);
        if unlikely(count > available) {
            warn!(
                count = count,
                available = available,
                "consumed count exceeds available elements, clamping"
            );
            return available;
        }
        count
    }

    /// Waits up to `timeout` for at least `min` elements, hands everything
    /// available to `callback` and consumes the count it returns.
    ///
    /// # Errors
    /// [`TimedOut`] if the data did not arrive in time. The callback is not
    /// called in that case.
    pub fn read_at_least<F>(
        &mut self,
        min: usize,
        timeout: Duration,
        callback: F,
    ) -> Result<usize, TimedOut>
    where
        F: FnOnce(&[T]) -> usize,
    {
        if unlikely(self.available(min) < min) {
            let shared = &*self.shared;
            let mut available = self.available;
            let mut generation = self.generation;
            let ready = shared.wait_until(timeout, || {
                generation = shared.generation();
                available = shared.readable();
                available >= min
            });
            self.available = available;
            self.generation = generation;

            if !ready {
                trace!(min = min, available = available, "consumer wait timed out");
                return Err(TimedOut { required: min });
            }
        }

        let offered = self.available;
        let consumed = clamp_reported(callback(self.slice(offered)), offered);
        self.advance(consumed);
        Ok(consumed)
    }
}
