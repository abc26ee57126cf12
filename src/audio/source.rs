//! Where cue bytes come from.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

/// Supplies raw encoded bytes for a cue source location.
pub trait CueSource: Sync {
    fn fetch(&self, source: &str) -> io::Result<Vec<u8>>;
}

/// Reads cue files relative to a directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl CueSource for DirSource {
    fn fetch(&self, source: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(source))
    }
}

/// Fixed in-memory table of clips.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    clips: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.clips.insert(source.into(), bytes);
        self
    }
}

impl CueSource for MemorySource {
    fn fetch(&self, source: &str) -> io::Result<Vec<u8>> {
        self.clips
            .get(source)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, source.to_string()))
    }
}

const BUILTIN_RATE: u32 = 44_100;

/// Synthesized stand-ins for `press.wav`, `tick.wav` and `stop.wav`, so the
/// caller works without any sound files installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl CueSource for BuiltinSource {
    fn fetch(&self, source: &str) -> io::Result<Vec<u8>> {
        let samples = match source {
            "press.wav" => press_clip(),
            "tick.wav" => tick_clip(),
            "stop.wav" => stop_clip(),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no built-in clip named {other}"),
                ))
            }
        };
        encode_wav(&samples, BUILTIN_RATE)
    }
}

/// Encode mono float samples as 16-bit PCM WAV bytes.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> io::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(io::Error::other)?;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(v).map_err(io::Error::other)?;
        }
        writer.finalize().map_err(io::Error::other)?;
    }
    Ok(cursor.into_inner())
}

fn tone(freq: f32, secs: f32, decay: f32, gain: f32) -> Vec<f32> {
    let n = (secs * BUILTIN_RATE as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / BUILTIN_RATE as f32;
            (TAU * freq * t).sin() * (-decay * t).exp() * gain
        })
        .collect()
}

fn press_clip() -> Vec<f32> {
    tone(1_200.0, 0.08, 60.0, 0.8)
}

// 4s of clicks every 100ms; the 3.9s loop point lands between clicks.
fn tick_clip() -> Vec<f32> {
    let mut out = vec![0.0; 4 * BUILTIN_RATE as usize];
    let click = tone(2_000.0, 0.012, 400.0, 0.6);
    let spacing = BUILTIN_RATE as usize / 10;
    for start in (0..out.len()).step_by(spacing) {
        for (dst, &s) in out[start..].iter_mut().zip(&click) {
            *dst = s;
        }
    }
    out
}

fn stop_clip() -> Vec<f32> {
    let a = tone(880.0, 0.6, 6.0, 0.5);
    let b = tone(1_320.0, 0.6, 8.0, 0.3);
    a.iter().zip(&b).map(|(x, y)| x + y).collect()
}
