// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Output sample formats and conversion from the native `CF32` samples held
//! in the ring buffer.
//!
//! Format names follow the SoapySDR convention: `C` for complex, then the
//! component type (`F` float, `S` signed, `U` unsigned) and its width in
//! bits. Components are interleaved I then Q, little endian.

use crate::error::IqStreamError;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Complex32 = Complex<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StreamFormat {
    #[default]
    CF32,
    CF64,
    CS16,
    CS8,
    CU8,
}

impl StreamFormat {
    /// Format the source delivers into the ring buffer.
    pub const NATIVE: StreamFormat = StreamFormat::CF32;

    pub const ALL: [StreamFormat; 5] = [
        StreamFormat::CF32,
        StreamFormat::CF64,
        StreamFormat::CS16,
        StreamFormat::CS8,
        StreamFormat::CU8,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::CF32 => "CF32",
            StreamFormat::CF64 => "CF64",
            StreamFormat::CS16 => "CS16",
            StreamFormat::CS8 => "CS8",
            StreamFormat::CU8 => "CU8",
        }
    }

    /// Bytes per complex sample (both components).
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            StreamFormat::CF32 => 8,
            StreamFormat::CF64 => 16,
            StreamFormat::CS16 => 4,
            StreamFormat::CS8 | StreamFormat::CU8 => 2,
        }
    }

    /// Component value corresponding to 1.0 in the native format.
    pub fn full_scale(&self) -> f64 {
        match self {
            StreamFormat::CF32 | StreamFormat::CF64 => 1.0,
            StreamFormat::CS16 => 32767.0,
            StreamFormat::CS8 | StreamFormat::CU8 => 127.0,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamFormat {
    type Err = IqStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IqStreamError::UnsupportedFormat(s.to_string()))
    }
}

impl TryFrom<String> for StreamFormat {
    type Error = IqStreamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamFormat> for String {
    fn from(format: StreamFormat) -> Self {
        format.as_str().to_string()
    }
}

/// Converts `src` into `dst` in `format`, multiplying by `scale` first.
/// Integer outputs saturate. Returns the number of bytes written.
pub fn convert(
    src: &[Complex32],
    dst: &mut [u8],
    format: StreamFormat,
    scale: f64,
) -> Result<usize, IqStreamError> {
    let needed = src.len() * format.bytes_per_sample();
    if dst.len() < needed {
        return Err(IqStreamError::OutputTooSmall {
            needed,
            got: dst.len(),
        });
    }
    let dst = &mut dst[..needed];
    let gain = scale * format.full_scale();

    match format {
        StreamFormat::CF32 if scale == 1.0 && cfg!(target_endian = "little") => {
            dst.copy_from_slice(bytemuck::cast_slice(src));
        }
        StreamFormat::CF32 => {
            let gain = gain as f32;
            for (out, sample) in dst.chunks_exact_mut(8).zip(src) {
                out[..4].copy_from_slice(&(sample.re * gain).to_le_bytes());
                out[4..].copy_from_slice(&(sample.im * gain).to_le_bytes());
            }
        }
        StreamFormat::CF64 => {
            for (out, sample) in dst.chunks_exact_mut(16).zip(src) {
                out[..8].copy_from_slice(&(sample.re as f64 * gain).to_le_bytes());
                out[8..].copy_from_slice(&(sample.im as f64 * gain).to_le_bytes());
            }
        }
        StreamFormat::CS16 => {
            for (out, sample) in dst.chunks_exact_mut(4).zip(src) {
                let re = (sample.re as f64 * gain).round() as i16;
                let im = (sample.im as f64 * gain).round() as i16;
                out[..2].copy_from_slice(&re.to_le_bytes());
                out[2..].copy_from_slice(&im.to_le_bytes());
            }
        }
        StreamFormat::CS8 => {
            for (out, sample) in dst.chunks_exact_mut(2).zip(src) {
                out[0] = ((sample.re as f64 * gain).round() as i8) as u8;
                out[1] = ((sample.im as f64 * gain).round() as i8) as u8;
            }
        }
        StreamFormat::CU8 => {
            for (out, sample) in dst.chunks_exact_mut(2).zip(src) {
                out[0] = (sample.re as f64 * gain + 128.0).round() as u8;
                out[1] = (sample.im as f64 * gain + 128.0).round() as u8;
            }
        }
    }

    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn samples() -> Vec<Complex32> {
        vec![
            Complex32::new(0.0, 0.0),
            Complex32::new(0.5, -0.5),
            Complex32::new(1.0, -1.0),
            Complex32::new(2.0, -3.0),
        ]
    }

    #[rstest]
    #[case("CF32", StreamFormat::CF32)]
    #[case("cs16", StreamFormat::CS16)]
    #[case("CS8", StreamFormat::CS8)]
    #[case("CU8", StreamFormat::CU8)]
    #[case("CF64", StreamFormat::CF64)]
    fn test_parse_format(#[case] name: &str, #[case] expected: StreamFormat) {
        assert_eq!(name.parse::<StreamFormat>().unwrap(), expected);
        assert!(expected.to_string().eq_ignore_ascii_case(name));
    }

    #[test]
    fn test_parse_unknown_format() {
        match "CS12".parse::<StreamFormat>() {
            Err(IqStreamError::UnsupportedFormat(name)) => assert_eq!(name, "CS12"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_native_copy() {
        let src = samples();
        let mut dst = vec![0u8; src.len() * 8];
        assert_eq!(convert(&src, &mut dst, StreamFormat::CF32, 1.0).unwrap(), 32);

        let decoded: Vec<f32> = dst
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(decoded, vec![0.0, 0.0, 0.5, -0.5, 1.0, -1.0, 2.0, -3.0]);
    }

    #[test]
    fn test_scaled_float() {
        let src = samples();
        let mut dst = vec![0u8; src.len() * 16];
        convert(&src, &mut dst, StreamFormat::CF64, 2.0).unwrap();
        let re = f64::from_le_bytes(dst[16..24].try_into().unwrap());
        let im = f64::from_le_bytes(dst[24..32].try_into().unwrap());
        assert_eq!((re, im), (1.0, -1.0));
    }

    #[test]
    fn test_cs16_saturates() {
        let src = samples();
        let mut dst = vec![0u8; src.len() * 4];
        convert(&src, &mut dst, StreamFormat::CS16, 1.0).unwrap();

        let decoded: Vec<i16> = dst
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, vec![0, 0, 16384, -16384, 32767, -32767, 32767, -32768]);
    }

    #[test]
    fn test_eight_bit_formats() {
        let src = samples();
        let mut signed = vec![0u8; src.len() * 2];
        let mut unsigned = vec![0u8; src.len() * 2];
        convert(&src, &mut signed, StreamFormat::CS8, 1.0).unwrap();
        convert(&src, &mut unsigned, StreamFormat::CU8, 1.0).unwrap();

        let signed: Vec<i8> = signed.into_iter().map(|b| b as i8).collect();
        assert_eq!(signed, vec![0, 0, 64, -64, 127, -127, 127, -128]);
        assert_eq!(unsigned, vec![128, 128, 192, 65, 255, 1, 255, 0]);
    }

    #[test]
    fn test_output_too_small() {
        let src = samples();
        let mut dst = vec![0u8; 7];
        assert!(matches!(
            convert(&src, &mut dst, StreamFormat::CS16, 1.0),
            Err(IqStreamError::OutputTooSmall { needed: 16, got: 7 })
        ));
    }
}
