use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::session::POOL_SIZE;

/// Spacing between decoy values.
pub const REVEAL_CADENCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealFrame {
    /// Offset from the start of the draw.
    pub at: Duration,
    pub value: u8,
    pub is_final: bool,
}

/// Lazy display sequence for one draw: a decoy every 50ms for `duration`,
/// then the drawn number at exactly `duration`. Display only; it carries no
/// game state.
#[derive(Debug, Clone)]
pub struct Reveal<R = StdRng> {
    number: u8,
    duration: Duration,
    next_at: Duration,
    done: bool,
    pending: Option<RevealFrame>,
    rng: R,
}

impl Reveal<StdRng> {
    pub fn new(number: u8, duration: Duration) -> Self {
        Self::with_rng(number, duration, StdRng::from_entropy())
    }
}

impl<R: Rng> Reveal<R> {
    pub fn with_rng(number: u8, duration: Duration, rng: R) -> Self {
        Self {
            number,
            duration,
            next_at: Duration::ZERO,
            done: false,
            pending: None,
            rng,
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_finished(&self) -> bool {
        self.done && self.pending.is_none()
    }

    /// Consume every frame due by `elapsed` and return the newest one. Frames
    /// skipped because the caller polled late are dropped.
    pub fn latest_until(&mut self, elapsed: Duration) -> Option<RevealFrame> {
        let mut latest = None;
        loop {
            let frame = match self.pending.take().or_else(|| self.next()) {
                Some(f) => f,
                None => break,
            };
            if frame.at > elapsed {
                self.pending = Some(frame);
                break;
            }
            latest = Some(frame);
        }
        latest
    }
}

impl<R: Rng> Iterator for Reveal<R> {
    type Item = RevealFrame;

    fn next(&mut self) -> Option<RevealFrame> {
        if self.done {
            return None;
        }
        if self.next_at < self.duration {
            let frame = RevealFrame {
                at: self.next_at,
                value: self.rng.gen_range(1..=POOL_SIZE as u8),
                is_final: false,
            };
            self.next_at += REVEAL_CADENCE;
            return Some(frame);
        }
        self.done = true;
        Some(RevealFrame {
            at: self.duration,
            value: self.number,
            is_final: true,
        })
    }
}
