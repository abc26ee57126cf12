use std::sync::Arc;
use std::time::Instant;

use super::decode::SampleBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Running,
    /// Output clock is frozen until resumed (e.g. device not started yet).
    Suspended,
}

/// Loop region inside a clip, in seconds from the clip start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopWindow {
    pub start: f64,
    pub end: f64,
}

/// One scheduled playback of a clip on the output clock.
#[derive(Debug, Clone)]
pub struct Voice {
    pub cue: String,
    pub buffer: Arc<SampleBuffer>,
    pub start_at: f64,
    pub stop_at: Option<f64>,
    pub loop_window: Option<LoopWindow>,
}

impl Voice {
    pub fn one_shot(cue: impl Into<String>, buffer: Arc<SampleBuffer>, start_at: f64) -> Self {
        Self {
            cue: cue.into(),
            buffer,
            start_at,
            stop_at: None,
            loop_window: None,
        }
    }

    /// Sample of this voice at output time `t`; `None` once the voice is done.
    pub fn sample_at(&self, t: f64) -> Option<f32> {
        if self.stop_at.is_some_and(|stop| t >= stop) {
            return None;
        }
        if t < self.start_at {
            return Some(0.0);
        }
        let mut pos = t - self.start_at;
        match self.loop_window {
            Some(w) => {
                let end = w.end.min(self.buffer.duration_secs());
                let span = end - w.start;
                if span > 0.0 && pos >= end {
                    pos = w.start + (pos - w.start) % span;
                }
            }
            None => {
                if pos >= self.buffer.duration_secs() {
                    return None;
                }
            }
        }
        Some(self.buffer.read_interpolated(pos * self.buffer.sample_rate as f64))
    }

    pub fn is_finished_at(&self, t: f64) -> bool {
        if self.stop_at.is_some_and(|stop| t >= stop) {
            return true;
        }
        self.loop_window.is_none() && t - self.start_at >= self.buffer.duration_secs()
    }
}

/// A sink that plays voices against one monotonic output clock.
pub trait AudioOutput {
    fn state(&self) -> OutputState;
    fn resume(&mut self);
    /// Output clock in seconds.
    fn current_time(&self) -> f64;
    fn schedule(&mut self, voice: Voice);
}

impl<O: AudioOutput + ?Sized> AudioOutput for Box<O> {
    fn state(&self) -> OutputState {
        (**self).state()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn schedule(&mut self, voice: Voice) {
        (**self).schedule(voice)
    }
}

/// Clock-only output for builds without a sound device. Voices are dropped.
#[derive(Debug, Clone, Copy)]
pub struct SilentOutput {
    origin: Instant,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SilentOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for SilentOutput {
    fn state(&self) -> OutputState {
        OutputState::Running
    }

    fn resume(&mut self) {}

    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, voice: Voice) {
        tracing::trace!(cue = %voice.cue, at = voice.start_at, "silent output dropped voice");
    }
}
