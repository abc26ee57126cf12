use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::Path;
use std::sync::mpsc::Sender;

use crate::audio::output::AudioOutput;
use crate::audio::source::CueSource;
use crate::audio::{CuePlayer, CueSpecs};
use crate::config::{clamp_duration_ms, Config, ConfigStore, TimingConfig, DURATION_STEP_MS};
use crate::error::{CueError, DrawError, RecoveryError};
use crate::persistence::{load_snapshot, GameEvent};
use crate::scheduler::Clock;
use crate::sequencer::{DisplaySink, DrawSequencer};
use crate::session::{Session, POOL_SIZE};

/// What the screen shows: the value in the big box and the called numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub current: Option<u8>,
    pub called: Vec<u8>,
    pub trigger_enabled: bool,
}

impl Board {
    /// A reveal is running.
    pub fn is_rolling(&self) -> bool {
        !self.trigger_enabled && self.current.is_some()
    }

    pub fn is_called(&self, number: u8) -> bool {
        self.called.contains(&number)
    }
}

impl DisplaySink for Board {
    fn show_value(&mut self, value: u8) {
        self.current = Some(value);
    }

    fn add_to_history(&mut self, number: u8) {
        self.called.push(number);
    }

    fn set_trigger_enabled(&mut self, enabled: bool) {
        self.trigger_enabled = enabled;
    }

    fn reset(&mut self, history: &[u8]) {
        self.called = history.to_vec();
        self.current = history.last().copied();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    fn warn(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warn,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Draw,
    NewGame,
    Longer,
    Shorter,
    ToggleFirstOverride,
    Quit,
}

pub fn action_for(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => Some(Action::Draw),
        KeyCode::Char('n') => Some(Action::NewGame),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => Some(Action::Longer),
        KeyCode::Char('-') | KeyCode::Down => Some(Action::Shorter),
        KeyCode::Char('f') => Some(Action::ToggleFirstOverride),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

/// The running caller: one session plus everything that acts on it.
pub struct App<C: Clock, O: AudioOutput> {
    pub session: Session,
    pub sequencer: DrawSequencer<C>,
    pub cues: CuePlayer<O>,
    pub board: Board,
    pub notice: Option<Notice>,
    config: Config,
    store: Option<Box<dyn ConfigStore>>,
}

impl<C: Clock, O: AudioOutput> App<C, O> {
    pub fn new(config: Config, clock: C, output: O) -> Self {
        Self {
            session: Session::new(config.timing),
            sequencer: DrawSequencer::new(clock),
            cues: CuePlayer::new(output),
            board: Board::default(),
            notice: None,
            config,
            store: None,
        }
    }

    /// Persist settings changes made from the keyboard.
    pub fn with_store(mut self, store: Box<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Sender<GameEvent>) -> Self {
        self.sequencer.set_notifier(notifier);
        self
    }

    pub fn timing(&self) -> TimingConfig {
        self.session.timing()
    }

    /// Load the cues. On failure draws stay disabled and a notice says why.
    pub fn preload<S: CueSource>(&mut self, specs: &CueSpecs, source: &S) -> Result<(), CueError> {
        match self.cues.preload(specs, source) {
            Ok(()) => {
                self.board.trigger_enabled = true;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "sound cues failed to load");
                self.board.trigger_enabled = false;
                self.notice = Some(Notice::error(format!("{e}; drawing is disabled")));
                Err(e)
            }
        }
    }

    pub fn recover_from(&mut self, path: &Path) -> Result<(), RecoveryError> {
        let result = load_snapshot(path).and_then(|snapshot| {
            self.sequencer
                .recover(&mut self.session, &snapshot, &mut self.board)
        });
        match &result {
            Ok(()) => {
                self.notice = Some(Notice::info(format!(
                    "Recovered game with {} of {} numbers called",
                    self.session.drawn_count(),
                    POOL_SIZE
                )));
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "recovery rejected");
                self.notice = Some(Notice::warn(format!("Could not recover game: {e}")));
            }
        }
        result
    }

    /// Apply a key. Returns false when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match action_for(key) {
            Some(Action::Quit) => return false,
            Some(Action::Draw) => self.request_draw(),
            Some(Action::NewGame) => {
                if self.sequencer.new_game(&mut self.session, &mut self.board).is_ok() {
                    self.notice = Some(Notice::info("New game"));
                }
            }
            Some(Action::Longer) => self.adjust_duration(DURATION_STEP_MS as i64),
            Some(Action::Shorter) => self.adjust_duration(-(DURATION_STEP_MS as i64)),
            Some(Action::ToggleFirstOverride) => {
                let mut timing = self.session.timing();
                timing.use_first_override = !timing.use_first_override;
                self.apply_timing(timing);
            }
            None => {}
        }
        true
    }

    pub fn request_draw(&mut self) {
        match self
            .sequencer
            .draw(&self.session, &mut self.cues, &mut self.board)
        {
            Ok(_) => self.notice = None,
            Err(DrawError::InFlight) => {
                tracing::debug!("draw ignored while another is running");
            }
            Err(e @ DrawError::PoolExhausted(_)) => {
                self.notice = Some(Notice::info(format!("{e}. Press n for a new game")));
            }
            Err(e @ DrawError::NotReady) => {
                self.notice = Some(Notice::error(e.to_string()));
            }
        }
    }

    pub fn on_tick(&mut self) {
        self.sequencer.poll(&mut self.session, &mut self.board);
    }

    fn adjust_duration(&mut self, delta_ms: i64) {
        let mut timing = self.session.timing();
        let next = (timing.default_duration_ms as i64 + delta_ms).max(0) as u64;
        timing.default_duration_ms = clamp_duration_ms(next);
        self.apply_timing(timing);
    }

    fn apply_timing(&mut self, timing: TimingConfig) {
        match self.sequencer.update_timing(&mut self.session, timing) {
            Ok(applied) => {
                self.config.timing = applied;
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(&self.config) {
                        tracing::warn!(error = %e, "failed to save settings");
                    }
                }
            }
            Err(_) => {
                self.notice = Some(Notice::warn("Settings are locked while a number is drawn"));
            }
        }
    }
}
