//! Input and tick delivery for the caller loop.
//!
//! Terminal events arrive on a channel fed by a reader thread. [`Runner`]
//! interleaves them with ticks on a fixed cadence measured on a [`Clock`],
//! so a held key cannot stall the reveal or the commit of a running draw.

use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

use crate::scheduler::Clock;

/// Tick interval of the UI loop; matches the reveal cadence.
pub const TICK_RATE: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub enum CallerEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Anything that can hand the loop its next input event.
pub trait EventSource {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<CallerEvent, RecvTimeoutError>;
}

/// Events delivered over an mpsc channel: the terminal reader in
/// production, a test thread or a pre-filled queue otherwise.
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: Receiver<CallerEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<CallerEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CallerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Start the crossterm reader thread. It stops when the source is dropped
/// or the terminal read fails.
pub fn terminal_events() -> ChannelEventSource {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || loop {
        let sent = match event::read() {
            // Windows reports releases too; only presses and repeats count.
            Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                tx.send(CallerEvent::Key(key))
            }
            Ok(CtEvent::Resize(_, _)) => tx.send(CallerEvent::Resize),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "terminal event read failed");
                break;
            }
        };
        if sent.is_err() {
            break;
        }
    });

    ChannelEventSource::new(rx)
}

/// Hands out one event per `step`: input as it arrives, and a `Tick` each
/// time the tick deadline passes. When both are ready they alternate.
#[derive(Debug)]
pub struct Runner<E: EventSource, C: Clock> {
    event_source: E,
    clock: C,
    interval: Duration,
    next_tick: Cell<Duration>,
    last_was_tick: Cell<bool>,
}

impl<E: EventSource, C: Clock> Runner<E, C> {
    pub fn new(event_source: E, clock: C, interval: Duration) -> Self {
        let next_tick = clock.now() + interval;
        Self {
            event_source,
            clock,
            interval,
            next_tick: Cell::new(next_tick),
            last_was_tick: Cell::new(false),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Clock reading at which the next `Tick` is due.
    pub fn next_tick(&self) -> Duration {
        self.next_tick.get()
    }

    /// Blocks at most until the tick deadline.
    pub fn step(&self) -> CallerEvent {
        let now = self.clock.now();
        let due = self.next_tick.get();

        if now >= due {
            if self.last_was_tick.get() {
                if let Ok(ev) = self.event_source.recv_timeout(Duration::ZERO) {
                    self.last_was_tick.set(false);
                    return ev;
                }
            }
            return self.tick(due, now);
        }

        match self.event_source.recv_timeout(due - now) {
            Ok(ev) => {
                self.last_was_tick.set(false);
                ev
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = self.clock.now();
                self.tick(now, now)
            }
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(due - now);
                let now = self.clock.now();
                self.tick(now, now)
            }
        }
    }

    /// Set the next deadline one interval after `from`. Ticks missed while
    /// the loop was busy collapse into this one.
    fn tick(&self, from: Duration, now: Duration) -> CallerEvent {
        let mut next = from + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_tick.set(next);
        self.last_was_tick.set(true);
        CallerEvent::Tick
    }
}
