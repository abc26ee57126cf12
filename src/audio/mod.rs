//! Sound cues: preloaded clips played as one-shots or as the timed
//! press → looping tick → stop gesture that accompanies a draw.

pub mod decode;
#[cfg(feature = "playback")]
pub mod device;
pub mod mixer;
pub mod output;
pub mod source;

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::CueError;
use decode::{decode_wav, SampleBuffer};
use output::{AudioOutput, LoopWindow, OutputState, Voice};
use source::CueSource;

pub const PRESS: &str = "press";
pub const TICK: &str = "tick";
pub const STOP: &str = "stop";

/// Loop end inside the tick clip, chosen so the wrap is inaudible.
pub const TICK_LOOP_END_SECS: f64 = 3.9;

/// Cue name → source location understood by a [`CueSource`].
pub type CueSpecs = BTreeMap<String, String>;

pub fn default_cue_specs() -> CueSpecs {
    [PRESS, TICK, STOP]
        .into_iter()
        .map(|name| (name.to_string(), format!("{name}.wav")))
        .collect()
}

/// Plays decoded cues on an [`AudioOutput`].
#[derive(Debug)]
pub struct CuePlayer<O: AudioOutput> {
    output: O,
    cues: HashMap<String, Arc<SampleBuffer>>,
}

impl<O: AudioOutput> CuePlayer<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            cues: HashMap::new(),
        }
    }

    /// Fetch and decode every cue in parallel. Either all cues are adopted
    /// or none are; the error names the cue that failed.
    pub fn preload<S: CueSource>(&mut self, specs: &CueSpecs, source: &S) -> Result<(), CueError> {
        let loaded = specs
            .par_iter()
            .map(|(name, location)| {
                let fail = |e: Box<dyn std::error::Error + Send + Sync>| CueError::Load {
                    name: name.clone(),
                    source: e,
                };
                let bytes = source.fetch(location).map_err(|e| fail(Box::new(e)))?;
                let buffer = decode_wav(&bytes).map_err(|e| fail(Box::new(e)))?;
                Ok((name.clone(), Arc::new(buffer)))
            })
            .collect::<Result<Vec<_>, CueError>>()?;

        for (name, buffer) in loaded {
            tracing::debug!(cue = %name, secs = buffer.duration_secs(), "cue loaded");
            self.cues.insert(name, buffer);
        }
        Ok(())
    }

    /// True once the three draw cues are loaded.
    pub fn is_ready(&self) -> bool {
        [PRESS, TICK, STOP].iter().all(|n| self.cues.contains_key(*n))
    }

    pub fn has_cue(&self, name: &str) -> bool {
        self.cues.contains_key(name)
    }

    /// Play a cue once from the start. Overlapping calls overlap.
    pub fn play_cue(&mut self, name: &str) -> Result<(), CueError> {
        let buffer = self.buffer(name)?;
        self.ensure_running();
        let at = self.output.current_time();
        self.output.schedule(Voice::one_shot(name, buffer, at));
        Ok(())
    }

    /// Press now, tick looping from now, and both the tick stop and the
    /// stop cue at `duration_secs` from now, all from one clock reading.
    pub fn play_draw_cue(&mut self, duration_secs: f64) -> Result<(), CueError> {
        let press = self.buffer(PRESS)?;
        let tick = self.buffer(TICK)?;
        let stop = self.buffer(STOP)?;
        self.ensure_running();

        let base = self.output.current_time();
        let end = base + duration_secs;

        self.output.schedule(Voice::one_shot(PRESS, press, base));
        self.output.schedule(Voice {
            cue: TICK.to_string(),
            buffer: tick,
            start_at: base,
            stop_at: Some(end),
            loop_window: Some(LoopWindow {
                start: 0.0,
                end: TICK_LOOP_END_SECS,
            }),
        });
        self.output.schedule(Voice::one_shot(STOP, stop, end));
        tracing::trace!(base, end, "draw cue scheduled");
        Ok(())
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    fn buffer(&self, name: &str) -> Result<Arc<SampleBuffer>, CueError> {
        self.cues
            .get(name)
            .cloned()
            .ok_or_else(|| CueError::Unknown(name.to_string()))
    }

    fn ensure_running(&mut self) {
        if self.output.state() == OutputState::Suspended {
            self.output.resume();
        }
    }
}
