//! # mirrorbuf - Mirrored Single-Producer Single-Consumer Ring Buffer
//!
//! Ring buffer whose backing memory is mapped twice, back to back, so that a
//! region wrapping past the end of the buffer is still one contiguous slice.
//! Readers and writers always get a single `&[T]` / `&mut [T]`, no matter
//! where the positions are.
//!
//! Uses `memfd` and `mmap` for the mirrored mapping, atomic counters with
//! acquire/release ordering for progress, and a mutex/condvar pair only for
//! the timed wait when data or space is not yet there.
//!
//! ## Creating a Buffer
//!
//! ```rust
//! use mirrorbuf::RingBuffer;
//!
//! let ring = RingBuffer::<f32>::new(4096)?;
//! assert_eq!(ring.capacity(), 4096);
//! assert_eq!(ring.size(), 4096 * 4);
//!
//! let (producer, consumer) = ring.split();
//! # Ok::<(), mirrorbuf::MirrorBufError>(())
//! ```
//!
//! The byte size (`capacity * size_of::<T>()`) must be a power of two and at
//! least one page (typically 4096 bytes). Anything else is rejected with
//! [`MirrorBufError::InvalidCapacity`].
//!
//! ## Transfers
//!
//! [`Producer::write_at_least`] waits until at least `min` elements are free,
//! hands the whole free region to a callback and publishes the number of
//! elements the callback reports. [`Consumer::read_at_least`] is the mirror
//! image. Both return [`TimedOut`] if the wait expires; nothing is committed
//! in that case and the call can simply be retried.
//!
//! ```rust
//! use mirrorbuf::RingBuffer;
//! use std::time::Duration;
//!
//! let (mut producer, mut consumer) = RingBuffer::<f32>::new(4096)?.split();
//!
//! producer.write_at_least(3, Duration::from_millis(500), |slice| {
//!     slice[..3].copy_from_slice(&[1.0, 2.0, 3.0]);
//!     3
//! })?;
//!
//! let consumed = consumer.read_at_least(2, Duration::from_millis(100), |slice| {
//!     assert_eq!(slice, &[1.0, 2.0, 3.0]);
//!     slice.len()
//! })?;
//! assert_eq!(consumed, 3);
//!
//! let timed_out = consumer.read_at_least(1, Duration::from_millis(1), |slice| slice.len());
//! assert!(timed_out.is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Manual Access
//!
//! ```rust
//! # use mirrorbuf::RingBuffer;
//! # let (mut producer, mut consumer) = RingBuffer::<u8>::new(4096)?.split();
//! let free = producer.write_slice();
//! free[..5].copy_from_slice(b"hello");
//! producer.produce(5);
//!
//! assert_eq!(consumer.available(0), 5);
//! assert_eq!(consumer.read_slice(), b"hello");
//! consumer.consume(5);
//! # Ok::<(), mirrorbuf::MirrorBufError>(())
//! ```
//!
//! ## Resetting
//!
//! [`RingBuffer::clear`] (also on both handles) drops all buffered data and
//! wakes any blocked transfer so it re-evaluates. Call it only while neither
//! side is in the middle of a transfer, typically when a stream restarts.

pub use consumer::Consumer;
pub use error::{Half, MirrorBufError, TimedOut};
pub use producer::Producer;
pub use ringbuf::RingBuffer;

pub(crate) mod common;
pub(crate) mod consumer;
pub mod error;
#[cfg(all(test, feature = "loom"))]
pub(crate) mod loom;
pub mod memory;
pub(crate) mod producer;
pub(crate) mod ringbuf;
pub(crate) mod sync;
