//! Receive stream: a source thread pushing transfers into the ring buffer
//! and an application-facing read converting them to the requested format.

use crate::config::Config;
use crate::converter::{self, Complex32, StreamFormat};
use crate::error::{IqStreamError, Result};
use crate::source::Source;
use governor::clock::Clock;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use mirrorbuf::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a successful [`Stream::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// Samples written to the output buffer.
    pub samples: usize,
    /// Stream time after the most recent source transfer.
    pub time_ns: i64,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Producer<Complex32>>,
}

pub struct Stream {
    consumer: Consumer<Complex32>,
    // Parked here while the stream is inactive.
    producer: Option<Producer<Complex32>>,
    worker: Option<Worker>,
    ticks: Arc<AtomicU64>,
    sample_rate: f64,
    mtu: usize,
    // One transfer per `mtu / sample_rate`.
    quota: Quota,
    write_timeout: Duration,
    format: StreamFormat,
}

impl Stream {
    pub fn setup(config: &Config, format: StreamFormat) -> Result<Self> {
        config.validate()?;
        let period = config.transfer_period();
        let quota = Quota::with_period(period).ok_or_else(|| {
            IqStreamError::InvalidConfig(format!(
                "transfer period of {} samples at {} Hz rounds to zero",
                config.mtu, config.sample_rate
            ))
        })?;
        let (producer, consumer) = RingBuffer::new(config.buffer_capacity)?.split();

        info!(
            format = %format,
            mtu = config.mtu,
            capacity = config.buffer_capacity,
            sample_rate = config.sample_rate,
            "stream set up"
        );

        Ok(Stream {
            consumer,
            producer: Some(producer),
            worker: None,
            ticks: Arc::new(AtomicU64::new(0)),
            sample_rate: config.sample_rate,
            mtu: config.mtu,
            quota,
            write_timeout: config.write_timeout(),
            format,
        })
    }

    /// Clears the buffer, resets the sample clock and starts pulling
    /// transfers from `source`.
    pub fn activate<S: Source>(&mut self, source: S) -> Result<()> {
        if self.worker.is_some() {
            return Err(IqStreamError::AlreadyActive);
        }
        let producer = self.producer.take().ok_or(IqStreamError::ProducerLost)?;

        self.consumer.clear();
        self.ticks.store(0, Ordering::Release);

        let running = Arc::new(AtomicBool::new(true));
        let transfer = Transfer {
            producer,
            ticks: Arc::clone(&self.ticks),
            running: Arc::clone(&running),
            mtu: self.mtu,
            limiter: RateLimiter::direct(self.quota),
            write_timeout: self.write_timeout,
        };

        let handle = thread::Builder::new()
            .name("iqstream-source".to_string())
            .spawn(move || transfer.run(source))?;

        self.worker = Some(Worker { running, handle });
        debug!(mtu = self.mtu, sample_rate = self.sample_rate, "stream activated");
        Ok(())
    }

    /// Stops the source thread. Buffered samples stay readable until the
    /// next activation.
    pub fn deactivate(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(IqStreamError::NotActive)?;
        worker.running.store(false, Ordering::Release);
        let producer = worker
            .handle
            .join()
            .map_err(|_| IqStreamError::SourcePanicked)?;
        self.producer = Some(producer);
        debug!(ticks = self.ticks(), "stream deactivated");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Reads up to `min(num_elems, mtu)` samples into `out` in the stream
    /// format, waiting at most `timeout` for them to arrive.
    pub fn read(&mut self, out: &mut [u8], num_elems: usize, timeout: Duration) -> Result<ReadResult> {
        let to_convert = num_elems.min(self.mtu);
        let needed = to_convert * self.format.bytes_per_sample();
        if out.len() < needed {
            return Err(IqStreamError::OutputTooSmall {
                needed,
                got: out.len(),
            });
        }

        let format = self.format;
        let mut converted = Ok(0);
        let res = self.consumer.read_at_least(to_convert, timeout, |samples| {
            converted = converter::convert(&samples[..to_convert], out, format, 1.0);
            if converted.is_ok() {
                to_convert
            } else {
                0
            }
        });
        let time_ns = self.time_ns();

        if res.is_err() {
            info!(requested = to_convert, "stream read timeout");
            return Err(IqStreamError::Timeout);
        }
        converted?;

        Ok(ReadResult {
            samples: to_convert,
            time_ns,
        })
    }

    /// Samples delivered by the source since activation.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn time_ns(&self) -> i64 {
        ticks_to_time_ns(self.ticks() as i64, self.sample_rate)
    }

    /// Samples buffered but not yet read.
    pub fn buffered(&self) -> usize {
        self.consumer.len()
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.deactivate() {
                warn!(error = %e, "failed to deactivate stream on drop");
            }
        }
    }
}

/// State owned by the source thread.
struct Transfer {
    producer: Producer<Complex32>,
    ticks: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    mtu: usize,
    limiter: DefaultDirectRateLimiter,
    write_timeout: Duration,
}

impl Transfer {
    fn run<S: Source>(mut self, mut source: S) -> Producer<Complex32> {
        let mut samples = vec![Complex32::default(); self.mtu];

        while self.running.load(Ordering::Acquire) {
            if let Err(not_until) = self.limiter.check() {
                thread::sleep(not_until.wait_time_from(self.limiter.clock().now()));
                continue;
            }

            source.fill(&mut samples);

            let mtu = self.mtu;
            let written = self.producer.write_at_least(mtu, self.write_timeout, |slice| {
                slice[..mtu].copy_from_slice(&samples);
                mtu
            });

            // The device keeps sampling whether or not there was room.
            self.ticks.fetch_add(mtu as u64, Ordering::Release);

            if written.is_err() {
                info!(mtu = mtu, "ringbuffer write timeout");
            }
        }

        self.producer
    }
}

/// Converts a sample count to nanoseconds, splitting the arithmetic so that
/// large tick counts keep full precision.
pub fn ticks_to_time_ns(ticks: i64, rate: f64) -> i64 {
    let whole_rate = rate as i64;
    if whole_rate == 0 {
        return (ticks as f64 * 1e9 / rate).round() as i64;
    }
    let full = ticks / whole_rate;
    let err = ticks - full * whole_rate;
    let part = full as f64 * (rate - whole_rate as f64);
    let frac = ((err as f64 - part) * 1e9) / rate;
    full * 1_000_000_000 + frac.round() as i64
}
