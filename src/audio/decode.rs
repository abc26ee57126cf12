use hound::{SampleFormat, WavReader};
use std::io::Cursor;

use crate::error::CueError;

/// A decoded clip held in memory, downmixed to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// Read a sample with linear interpolation at a fractional frame index.
    pub fn read_interpolated(&self, position: f64) -> f32 {
        if self.data.is_empty() || position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        if idx + 1 >= self.data.len() {
            return self.data.get(idx).copied().unwrap_or(0.0);
        }
        let frac = (position - idx as f64) as f32;
        self.data[idx] * (1.0 - frac) + self.data[idx + 1] * frac
    }
}

/// Decode a RIFF/WAVE clip. Integer and float PCM are accepted; channels are
/// averaged into one.
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, CueError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    if interleaved.is_empty() {
        return Err(CueError::Empty);
    }

    let data = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(SampleBuffer::new(data, spec.sample_rate))
}
