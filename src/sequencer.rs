//! The draw sequence: pick the next pool number, start the cue and the
//! reveal, and commit the draw once its duration has elapsed.
//!
//! A draw is accepted by [`DrawSequencer::draw`] and finished by a later
//! [`DrawSequencer::poll`]; the caller drives `poll` from its tick loop.
//! While a draw is in flight every other mutating call fails fast.

use chrono::Local;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::audio::output::AudioOutput;
use crate::audio::CuePlayer;
use crate::config::TimingConfig;
use crate::error::{DrawError, RecoveryError};
use crate::persistence::{EventKind, GameEvent};
use crate::reveal::Reveal;
use crate::scheduler::{Clock, Timeline};
use crate::session::{RecoverySnapshot, Session};

/// Receiver of everything the sequencer wants shown.
pub trait DisplaySink {
    /// A decoy or the final number of the running reveal.
    fn show_value(&mut self, value: u8);
    fn add_to_history(&mut self, number: u8);
    fn set_trigger_enabled(&mut self, enabled: bool);
    /// Replace everything shown with a fresh history (new game or recovery).
    fn reset(&mut self, history: &[u8]);
}

/// An accepted draw. The number is not in the history until it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub number: u8,
    /// Position in the pool, which is also the count before this draw.
    pub index: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawTask {
    Complete { number: u8 },
}

#[derive(Debug)]
struct InFlight {
    started_at: Duration,
    reveal: Reveal,
}

#[derive(Debug)]
pub struct DrawSequencer<C: Clock> {
    clock: C,
    timers: Timeline<DrawTask>,
    in_flight: Option<InFlight>,
    notifier: Option<Sender<GameEvent>>,
}

impl<C: Clock> DrawSequencer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            timers: Timeline::new(),
            in_flight: None,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Sender<GameEvent>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn set_notifier(&mut self, notifier: Sender<GameEvent>) {
        self.notifier = Some(notifier);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn timers(&self) -> &Timeline<DrawTask> {
        &self.timers
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Accept a draw: cue and reveal start now, the draw commits after its
    /// duration on a later `poll`.
    pub fn draw<O, D>(
        &mut self,
        session: &Session,
        cues: &mut CuePlayer<O>,
        display: &mut D,
    ) -> Result<Draw, DrawError>
    where
        O: AudioOutput,
        D: DisplaySink + ?Sized,
    {
        if !cues.is_ready() {
            return Err(DrawError::NotReady);
        }
        if self.in_flight.is_some() {
            return Err(DrawError::InFlight);
        }
        let index = session.drawn_count();
        let number = session
            .next_number()
            .ok_or(DrawError::PoolExhausted(session.pool().len()))?;

        let now = self.clock.now();
        let duration = Duration::from_millis(session.timing().duration_for(index));

        display.set_trigger_enabled(false);
        if let Err(e) = cues.play_draw_cue(duration.as_secs_f64()) {
            tracing::warn!(error = %e, "draw cue failed");
        }

        let mut reveal = Reveal::new(number, duration);
        if let Some(frame) = reveal.latest_until(Duration::ZERO) {
            display.show_value(frame.value);
        }
        self.timers
            .schedule(now + duration, DrawTask::Complete { number });
        self.in_flight = Some(InFlight {
            started_at: now,
            reveal,
        });

        tracing::debug!(index, number, duration_ms = duration.as_millis() as u64, "draw started");
        Ok(Draw {
            number,
            index,
            duration,
        })
    }

    /// Advance the reveal and run due timers. Returns the number committed
    /// by this call, if any.
    pub fn poll<D: DisplaySink + ?Sized>(&mut self, session: &mut Session, display: &mut D) -> Option<u8> {
        let now = self.clock.now();
        if let Some(flight) = self.in_flight.as_mut() {
            let elapsed = now.saturating_sub(flight.started_at);
            if let Some(frame) = flight.reveal.latest_until(elapsed) {
                display.show_value(frame.value);
            }
        }

        let mut completed = None;
        for task in self.timers.drain_due(now) {
            match task {
                DrawTask::Complete { number } => {
                    self.complete(session, number, display);
                    completed = Some(number);
                }
            }
        }
        completed
    }

    fn complete<D: DisplaySink + ?Sized>(&mut self, session: &mut Session, number: u8, display: &mut D) {
        session.record(number);
        display.add_to_history(number);
        display.set_trigger_enabled(true);
        self.in_flight = None;

        let kind = if session.drawn_count() == 1 {
            EventKind::Start
        } else {
            EventKind::Update
        };
        tracing::info!(number, drawn = session.drawn_count(), "number called");
        self.notify(kind, session);
    }

    /// Apply new timing. Refused while a draw is in flight.
    pub fn update_timing(&self, session: &mut Session, timing: TimingConfig) -> Result<TimingConfig, DrawError> {
        if self.in_flight.is_some() {
            return Err(DrawError::InFlight);
        }
        let applied = session.set_timing(timing);
        tracing::debug!(timing = ?applied, "timing updated");
        Ok(applied)
    }

    /// Start over with a fresh pool, keeping the timing.
    pub fn new_game<D: DisplaySink + ?Sized>(&mut self, session: &mut Session, display: &mut D) -> Result<(), DrawError> {
        if self.in_flight.is_some() {
            return Err(DrawError::InFlight);
        }
        *session = Session::new(session.timing());
        display.reset(&[]);
        display.set_trigger_enabled(true);
        tracing::info!("new game");
        Ok(())
    }

    /// Adopt a persisted game wholesale. A malformed snapshot leaves the
    /// session untouched.
    pub fn recover<D: DisplaySink + ?Sized>(
        &mut self,
        session: &mut Session,
        snapshot: &RecoverySnapshot,
        display: &mut D,
    ) -> Result<(), RecoveryError> {
        if self.in_flight.is_some() {
            return Err(RecoveryError::InFlight);
        }
        session.adopt(snapshot)?;
        display.reset(session.history());
        if let Some(last) = session.state().last() {
            display.show_value(last);
        }
        display.set_trigger_enabled(true);
        tracing::info!(drawn = session.drawn_count(), "game recovered");
        self.notify(EventKind::Recover, session);
        Ok(())
    }

    fn notify(&mut self, kind: EventKind, session: &Session) {
        let Some(tx) = self.notifier.as_ref() else {
            return;
        };
        let event = GameEvent {
            kind,
            at: Local::now(),
            pool: session.pool().as_slice().to_vec(),
            history: session.history().to_vec(),
            drawn_count: session.drawn_count(),
        };
        if tx.send(event).is_err() {
            tracing::warn!("game log receiver gone; persistence disabled");
            self.notifier = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mixer::Mixer;
    use crate::audio::source::{encode_wav, MemorySource};
    use crate::audio::{default_cue_specs, STOP, TICK};
    use crate::scheduler::ManualClock;
    use crate::session::{Pool, POOL_SIZE};
    use assert_matches::assert_matches;
    use std::sync::mpsc;

    #[derive(Debug, Default)]
    struct RecordingDisplay {
        shown: Vec<u8>,
        history: Vec<u8>,
        enabled: Vec<bool>,
    }

    impl DisplaySink for RecordingDisplay {
        fn show_value(&mut self, value: u8) {
            self.shown.push(value);
        }
        fn add_to_history(&mut self, number: u8) {
            self.history.push(number);
        }
        fn set_trigger_enabled(&mut self, enabled: bool) {
            self.enabled.push(enabled);
        }
        fn reset(&mut self, history: &[u8]) {
            self.shown.clear();
            self.history = history.to_vec();
        }
    }

    fn cues() -> CuePlayer<Mixer> {
        let clip = |secs: f32| encode_wav(&vec![0.1; (secs * 100.0) as usize], 100).unwrap();
        let source = MemorySource::new()
            .with("press.wav", clip(0.1))
            .with("tick.wav", clip(4.0))
            .with("stop.wav", clip(0.5));
        let mut player = CuePlayer::new(Mixer::new(100));
        player.preload(&default_cue_specs(), &source).unwrap();
        player
    }

    fn ordered_pool() -> Pool {
        Pool::from_numbers((1..=75).collect()).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn draw_commits_after_duration() {
        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone());
        let mut session = Session::with_pool(ordered_pool(), TimingConfig::new(3_000, false, 2_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();

        let draw = seq.draw(&session, &mut player, &mut display).unwrap();
        assert_eq!(draw.number, 1);
        assert_eq!(draw.duration, ms(3_000));
        assert_eq!(display.enabled, vec![false]);
        assert_eq!(display.shown.len(), 1);
        assert_eq!(session.drawn_count(), 0);
        assert_eq!(seq.timers().next_due(), Some(ms(3_000)));

        clock.advance(ms(2_999));
        assert_eq!(seq.poll(&mut session, &mut display), None);
        assert_eq!(session.drawn_count(), 0);
        assert!(seq.is_in_flight());

        clock.advance(ms(1));
        assert_eq!(seq.poll(&mut session, &mut display), Some(1));
        assert_eq!(session.history(), &[1]);
        assert_eq!(display.history, vec![1]);
        assert_eq!(display.shown.last(), Some(&1));
        assert_eq!(display.enabled, vec![false, true]);
        assert!(!seq.is_in_flight());
    }

    #[test]
    fn first_draw_override_applies_once() {
        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone());
        let mut session = Session::with_pool(ordered_pool(), TimingConfig::new(5_000, true, 2_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();

        let first = seq.draw(&session, &mut player, &mut display).unwrap();
        assert_eq!(first.duration, ms(2_000));
        clock.advance(first.duration);
        seq.poll(&mut session, &mut display);

        let second = seq.draw(&session, &mut player, &mut display).unwrap();
        assert_eq!(second.duration, ms(5_000));
    }

    #[test]
    fn reentrant_draw_fails_fast() {
        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone());
        let mut session = Session::with_pool(ordered_pool(), TimingConfig::default());
        let mut player = cues();
        let mut display = RecordingDisplay::default();

        seq.draw(&session, &mut player, &mut display).unwrap();
        clock.advance(ms(100));
        assert_matches!(seq.draw(&session, &mut player, &mut display), Err(DrawError::InFlight));
        assert_eq!(seq.timers().len(), 1);
        assert_matches!(
            seq.update_timing(&mut session, TimingConfig::default()),
            Err(DrawError::InFlight)
        );
        assert_matches!(seq.new_game(&mut session, &mut display), Err(DrawError::InFlight));
    }

    #[test]
    fn draw_refused_before_preload() {
        let mut seq = DrawSequencer::new(ManualClock::new());
        let session = Session::new(TimingConfig::default());
        let mut player = CuePlayer::new(Mixer::new(100));
        let mut display = RecordingDisplay::default();
        assert_matches!(seq.draw(&session, &mut player, &mut display), Err(DrawError::NotReady));
        assert!(display.enabled.is_empty());
    }

    #[test]
    fn exhausted_pool_refuses_and_keeps_state() {
        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone());
        let mut session = Session::with_pool(ordered_pool(), TimingConfig::new(1_000, false, 1_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();

        for _ in 0..POOL_SIZE {
            seq.draw(&session, &mut player, &mut display).unwrap();
            clock.advance(ms(1_000));
            seq.poll(&mut session, &mut display);
        }
        assert!(session.is_exhausted());
        let before = session.snapshot();
        assert_matches!(
            seq.draw(&session, &mut player, &mut display),
            Err(DrawError::PoolExhausted(75))
        );
        assert_eq!(session.snapshot(), before);
        assert!(!seq.is_in_flight());
    }

    #[test]
    fn draw_cue_matches_draw_duration() {
        let mut seq = DrawSequencer::new(ManualClock::new());
        let session = Session::with_pool(ordered_pool(), TimingConfig::new(4_000, false, 2_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();
        seq.draw(&session, &mut player, &mut display).unwrap();

        let voices = player.output().voices();
        let tick = voices.iter().find(|v| v.cue == TICK).unwrap();
        let stop = voices.iter().find(|v| v.cue == STOP).unwrap();
        assert_eq!(tick.stop_at, Some(tick.start_at + 4.0));
        assert_eq!(stop.start_at, tick.start_at + 4.0);
    }

    #[test]
    fn notifies_start_then_update() {
        let (tx, rx) = mpsc::channel();
        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone()).with_notifier(tx);
        let mut session = Session::with_pool(ordered_pool(), TimingConfig::new(1_000, false, 1_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();

        for _ in 0..3 {
            seq.draw(&session, &mut player, &mut display).unwrap();
            clock.advance(ms(1_000));
            seq.poll(&mut session, &mut display);
        }
        let events: Vec<GameEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Start);
        assert_eq!(events[1].kind, EventKind::Update);
        assert_eq!(events[2].history, vec![1, 2, 3]);
        assert_eq!(events[2].drawn_count, 3);
    }

    #[test]
    fn recover_then_draw_continues_pool() {
        let mut pool: Vec<u8> = (1..=75).collect();
        pool.swap(0, 6);
        pool.swap(1, 2);
        assert_eq!(&pool[..2], &[7, 3]);
        let snapshot = RecoverySnapshot {
            pool: pool.clone(),
            drawn_count: 3,
        };

        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone());
        let mut session = Session::new(TimingConfig::new(1_000, true, 1_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();

        seq.recover(&mut session, &snapshot, &mut display).unwrap();
        assert_eq!(session.history(), &pool[..3]);
        assert_eq!(display.history, pool[..3].to_vec());

        let next = seq.draw(&session, &mut player, &mut display).unwrap();
        assert_eq!(next.number, pool[3]);
        assert_eq!(next.duration, ms(1_000));
    }

    #[test]
    fn malformed_recovery_keeps_current_game() {
        let mut seq = DrawSequencer::new(ManualClock::new());
        let mut session = Session::new(TimingConfig::default());
        let mut display = RecordingDisplay::default();
        let before = session.snapshot();
        let bad = RecoverySnapshot {
            pool: vec![7, 3, 9],
            drawn_count: 3,
        };
        assert_matches!(
            seq.recover(&mut session, &bad, &mut display),
            Err(RecoveryError::Malformed(_))
        );
        assert_eq!(session.snapshot(), before);
        assert!(display.history.is_empty());
    }

    #[test]
    fn update_timing_clamps() {
        let seq = DrawSequencer::new(ManualClock::new());
        let mut session = Session::new(TimingConfig::default());
        let applied = seq
            .update_timing(&mut session, TimingConfig {
                default_duration_ms: 500,
                use_first_override: true,
                first_duration_ms: 15_000,
            })
            .unwrap();
        assert_eq!(applied.default_duration_ms, 1_000);
        assert_eq!(applied.first_duration_ms, 10_000);
        assert_eq!(session.timing(), applied);
    }

    #[test]
    fn new_game_reshuffles_and_clears() {
        let clock = ManualClock::new();
        let mut seq = DrawSequencer::new(clock.clone());
        let mut session = Session::with_pool(ordered_pool(), TimingConfig::new(1_000, false, 1_000));
        let mut player = cues();
        let mut display = RecordingDisplay::default();
        seq.draw(&session, &mut player, &mut display).unwrap();
        clock.advance(ms(1_000));
        seq.poll(&mut session, &mut display);

        seq.new_game(&mut session, &mut display).unwrap();
        assert_eq!(session.drawn_count(), 0);
        assert!(display.history.is_empty());
        assert_eq!(session.timing().default_duration_ms, 1_000);
    }
}
