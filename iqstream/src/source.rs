//! Sample sources standing in for the radio hardware.
//!
//! A source is driven from the stream's producer thread: once per transfer
//! period it is asked for exactly one transfer of samples, which the stream
//! then copies into the ring buffer.

use crate::converter::Complex32;
use std::f64::consts::TAU;

pub trait Source: Send + 'static {
    /// Fills `out` with the next `out.len()` samples.
    fn fill(&mut self, out: &mut [Complex32]);
}

/// Complex exponential at a fixed offset from the center frequency.
pub struct ToneSource {
    phase: f64,
    step: f64,
    amplitude: f32,
}

impl ToneSource {
    pub fn new(tone_hz: f64, sample_rate: f64, amplitude: f32) -> Self {
        ToneSource {
            phase: 0.0,
            step: TAU * tone_hz / sample_rate,
            amplitude,
        }
    }
}

impl Source for ToneSource {
    fn fill(&mut self, out: &mut [Complex32]) {
        for sample in out {
            *sample = Complex32::from_polar(self.amplitude, self.phase as f32);
            self.phase = (self.phase + self.step) % TAU;
        }
    }
}

/// Emits `n + 0i` for the n-th sample. Gaps or reordering downstream show up
/// as a broken ramp.
#[derive(Default)]
pub struct RampSource {
    next: u32,
}

impl RampSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Source for RampSource {
    fn fill(&mut self, out: &mut [Complex32]) {
        for sample in out {
            *sample = Complex32::new(self.next as f32, 0.0);
            self.next = self.next.wrapping_add(1);
        }
    }
}
