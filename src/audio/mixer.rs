//! Software mixer: sums scheduled voices into interleaved output frames.

use std::sync::{Arc, Mutex, MutexGuard};

use super::output::{AudioOutput, OutputState, Voice};

#[derive(Debug)]
pub struct Mixer {
    pub master_gain: f32,
    sample_rate: u32,
    frames_rendered: u64,
    state: OutputState,
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            master_gain: 0.8,
            sample_rate,
            frames_rendered: 0,
            state: OutputState::Running,
            voices: Vec::new(),
        }
    }

    /// A mixer whose clock stays at zero until the first `resume`.
    pub fn suspended(sample_rate: u32) -> Self {
        Self {
            state: OutputState::Suspended,
            ..Self::new(sample_rate)
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Voices not yet finished, in scheduling order.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Fill `out` with `channels`-interleaved frames and advance the clock.
    /// A suspended mixer writes silence and keeps its clock still.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if self.state == OutputState::Suspended {
            out.fill(0.0);
            return;
        }

        let rate = self.sample_rate as f64;
        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let t = (self.frames_rendered + i as u64) as f64 / rate;
            let sum: f32 = self.voices.iter().filter_map(|v| v.sample_at(t)).sum();
            frame.fill(soft_clip(sum * self.master_gain));
        }

        self.frames_rendered += (out.len() / channels) as u64;
        let now = self.current_time();
        self.voices.retain(|v| !v.is_finished_at(now));
    }
}

impl AudioOutput for Mixer {
    fn state(&self) -> OutputState {
        self.state
    }

    fn resume(&mut self) {
        if self.state == OutputState::Suspended {
            tracing::debug!("resuming audio output");
            self.state = OutputState::Running;
        }
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn schedule(&mut self, voice: Voice) {
        self.voices.push(voice);
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// A mixer shared between the UI thread and a device callback.
#[derive(Debug, Clone)]
pub struct SharedMixer(Arc<Mutex<Mixer>>);

impl SharedMixer {
    pub fn new(mixer: Mixer) -> Self {
        Self(Arc::new(Mutex::new(mixer)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AudioOutput for SharedMixer {
    fn state(&self) -> OutputState {
        self.lock().state()
    }

    fn resume(&mut self) {
        self.lock().resume()
    }

    fn current_time(&self) -> f64 {
        self.lock().current_time()
    }

    fn schedule(&mut self, voice: Voice) {
        self.lock().schedule(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::SampleBuffer;

    fn dc(level: f32, frames: usize, rate: u32) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new(vec![level; frames], rate))
    }

    #[test]
    fn suspended_mixer_is_silent_and_frozen() {
        let mut m = Mixer::suspended(100);
        m.schedule(Voice::one_shot("press", dc(0.5, 100, 100), 0.0));
        let mut out = vec![1.0; 20];
        m.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(m.current_time(), 0.0);

        m.resume();
        assert_eq!(m.state(), OutputState::Running);
        m.render(&mut out, 2);
        assert!((m.current_time() - 0.1).abs() < 1e-9);
        assert!(out.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn overlapping_voices_sum() {
        let mut m = Mixer::new(100);
        m.master_gain = 1.0;
        m.schedule(Voice::one_shot("press", dc(0.2, 100, 100), 0.0));
        m.schedule(Voice::one_shot("press", dc(0.2, 100, 100), 0.0));
        let mut out = vec![0.0; 1];
        m.render(&mut out, 1);
        assert!((out[0] - soft_clip(0.4)).abs() < 1e-6);
    }

    #[test]
    fn finished_voices_are_dropped() {
        let mut m = Mixer::new(100);
        m.schedule(Voice::one_shot("press", dc(0.5, 10, 100), 0.0));
        let mut out = vec![0.0; 5];
        m.render(&mut out, 1);
        assert_eq!(m.voices().len(), 1);
        m.render(&mut out, 1);
        assert!(m.voices().is_empty());
    }

    #[test]
    fn soft_clip_prevents_overflow() {
        let mut m = Mixer::new(100);
        m.master_gain = 1.0;
        m.schedule(Voice::one_shot("a", dc(1.0, 10, 100), 0.0));
        m.schedule(Voice::one_shot("b", dc(1.0, 10, 100), 0.0));
        m.schedule(Voice::one_shot("c", dc(1.0, 10, 100), 0.0));
        let mut out = vec![0.0; 1];
        m.render(&mut out, 1);
        assert!(out[0] <= 1.0);
    }

    #[test]
    fn shared_mixer_delegates() {
        let mut shared = SharedMixer::new(Mixer::suspended(48_000));
        assert_eq!(shared.state(), OutputState::Suspended);
        shared.resume();
        assert_eq!(shared.state(), OutputState::Running);
        shared.schedule(Voice::one_shot("x", dc(0.1, 4, 48_000), 0.0));
        assert_eq!(shared.lock().voices().len(), 1);
    }
}
