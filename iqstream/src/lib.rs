//! Complex baseband sample streaming.
//!
//! A [`Stream`] owns a mirrored ring buffer of [`Complex32`] samples. While
//! active, a dedicated thread pulls one transfer of `mtu` samples per
//! transfer period from a [`Source`] and writes it into the buffer; the
//! application drains it with [`Stream::read`], converting to the
//! [`StreamFormat`] it asked for.

pub mod config;
pub mod converter;
pub mod error;
pub mod source;
pub mod stream;

pub use config::Config;
pub use converter::{Complex32, StreamFormat};
pub use error::{IqStreamError, Result};
pub use source::{RampSource, Source, ToneSource};
pub use stream::{ticks_to_time_ns, ReadResult, Stream};
