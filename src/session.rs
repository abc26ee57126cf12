use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::TimingConfig;
use crate::error::RecoveryError;

pub const POOL_SIZE: usize = 75;

/// True when `numbers` holds each of 1..=75 exactly once.
pub fn is_full_permutation(numbers: &[u8]) -> bool {
    if numbers.len() != POOL_SIZE {
        return false;
    }
    let mut seen = [false; POOL_SIZE];
    for &n in numbers {
        let idx = n as usize;
        if idx == 0 || idx > POOL_SIZE || seen[idx - 1] {
            return false;
        }
        seen[idx - 1] = true;
    }
    true
}

/// The shuffled sequence numbers are drawn from, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool(Vec<u8>);

impl Pool {
    pub fn shuffled() -> Self {
        Self::shuffled_with(&mut rand::thread_rng())
    }

    pub fn shuffled_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut numbers: Vec<u8> = (1..=POOL_SIZE as u8).collect();
        numbers.shuffle(rng);
        Self(numbers)
    }

    pub fn from_numbers(numbers: Vec<u8>) -> Result<Self, RecoveryError> {
        if !is_full_permutation(&numbers) {
            return Err(RecoveryError::Malformed(format!(
                "pool must contain each of 1..={} once, got {} entries",
                POOL_SIZE,
                numbers.len()
            )));
        }
        Ok(Self(numbers))
    }

    pub fn get(&self, idx: usize) -> Option<u8> {
        self.0.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Progress through the pool. `history` is always `pool[..drawn_count]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawState {
    history: Vec<u8>,
}

impl DrawState {
    pub fn drawn_count(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[u8] {
        &self.history
    }

    pub fn last(&self) -> Option<u8> {
        self.history.last().copied()
    }

    pub(crate) fn record(&mut self, number: u8) {
        self.history.push(number);
    }
}

/// A persisted `{pool, drawn_count}` pair used to resume a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySnapshot {
    pub pool: Vec<u8>,
    pub drawn_count: usize,
}

impl RecoverySnapshot {
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if !is_full_permutation(&self.pool) {
            return Err(RecoveryError::Malformed(format!(
                "pool must contain each of 1..={} once, got {} entries",
                POOL_SIZE,
                self.pool.len()
            )));
        }
        if self.drawn_count > POOL_SIZE {
            return Err(RecoveryError::Malformed(format!(
                "drawn count {} exceeds {}",
                self.drawn_count, POOL_SIZE
            )));
        }
        Ok(())
    }
}

/// Everything a single game owns: the pool, the draws so far and the timing.
#[derive(Debug, Clone)]
pub struct Session {
    pool: Pool,
    state: DrawState,
    timing: TimingConfig,
}

impl Session {
    pub fn new(timing: TimingConfig) -> Self {
        Self::with_pool(Pool::shuffled(), timing)
    }

    pub fn with_pool(pool: Pool, timing: TimingConfig) -> Self {
        Self {
            pool,
            state: DrawState::default(),
            timing: timing.clamped(),
        }
    }

    pub fn timing(&self) -> TimingConfig {
        self.timing
    }

    /// Writers go through `DrawSequencer::update_timing`, which holds the
    /// in-flight lock.
    pub(crate) fn set_timing(&mut self, timing: TimingConfig) -> TimingConfig {
        self.timing = timing.clamped();
        self.timing
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn drawn_count(&self) -> usize {
        self.state.drawn_count()
    }

    pub fn history(&self) -> &[u8] {
        self.state.history()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.drawn_count() >= self.pool.len()
    }

    pub fn next_number(&self) -> Option<u8> {
        self.pool.get(self.state.drawn_count())
    }

    pub(crate) fn record(&mut self, number: u8) {
        debug_assert_eq!(self.next_number(), Some(number));
        self.state.record(number);
    }

    /// Replace pool and draw state with a validated snapshot. On error the
    /// session is left untouched.
    pub fn adopt(&mut self, snapshot: &RecoverySnapshot) -> Result<(), RecoveryError> {
        snapshot.validate()?;
        let pool = Pool(snapshot.pool.clone());
        let mut state = DrawState::default();
        for &n in &pool.as_slice()[..snapshot.drawn_count] {
            state.record(n);
        }
        self.pool = pool;
        self.state = state;
        Ok(())
    }

    pub fn snapshot(&self) -> RecoverySnapshot {
        RecoverySnapshot {
            pool: self.pool.as_slice().to_vec(),
            drawn_count: self.state.drawn_count(),
        }
    }
}
