use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
};
use tombola::{
    app::{App, Notice, NoticeLevel},
    app_dirs::AppDirs,
    audio::{
        default_cue_specs,
        output::AudioOutput,
        source::{BuiltinSource, DirSource},
    },
    config::{Config, ConfigStore, FileConfigStore, TimingConfig},
    error::RecoveryError,
    logging,
    persistence::{latest_log, GameLog},
    runtime::{terminal_events, CallerEvent, EventSource, Runner, TICK_RATE},
    scheduler::{Clock, SystemClock},
};

/// terminal bingo caller with animated draws and sound cues
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal bingo caller: draws 1-75 without repeats, animates each call with a countdown and sound cues, and logs every game so it can be resumed."
)]
pub struct Cli {
    /// draw animation length in milliseconds (1000-10000)
    #[clap(short = 'd', long)]
    duration: Option<u64>,

    /// animation length in milliseconds for the first draw of a game (1000-10000)
    #[clap(short = 'f', long)]
    first_duration: Option<u64>,

    /// use the regular duration for the first draw as well
    #[clap(long)]
    no_first_override: bool,

    /// directory containing press.wav, tick.wav and stop.wav (built-in sounds otherwise)
    #[clap(short = 's', long)]
    sounds: Option<PathBuf>,

    /// resume a game from a log file; without a value the latest game is used
    #[clap(short = 'r', long, value_name = "FILE", num_args = 0..=1)]
    recover: Option<Option<PathBuf>>,

    /// write the effective settings to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer command line overrides on top of the stored config.
    fn apply(&self, mut config: Config) -> Config {
        let t = config.timing;
        config.timing = TimingConfig::new(
            self.duration.unwrap_or(t.default_duration_ms),
            t.use_first_override && !self.no_first_override,
            self.first_duration.unwrap_or(t.first_duration_ms),
        );
        if let Some(dir) = &self.sounds {
            config.sounds_dir = Some(dir.clone());
        }
        config
    }

    /// The log to recover from, if recovery was requested.
    fn recover_path(&self, games_dir: &Path) -> Option<Result<PathBuf, RecoveryError>> {
        match self.recover.as_ref()? {
            Some(file) => Some(Ok(file.clone())),
            None => Some(latest_log(games_dir)),
        }
    }
}

#[cfg(feature = "playback")]
type StreamGuard = cpal::Stream;
#[cfg(not(feature = "playback"))]
type StreamGuard = ();

#[cfg(feature = "playback")]
fn open_output() -> (Box<dyn AudioOutput>, Option<StreamGuard>) {
    match tombola::audio::device::open_default_output() {
        Ok((mixer, stream)) => (Box::new(mixer), Some(stream)),
        Err(e) => {
            tracing::warn!(error = %e, "no audio device; cues will be silent");
            (Box::new(tombola::audio::output::SilentOutput::new()), None)
        }
    }
}

#[cfg(not(feature = "playback"))]
fn open_output() -> (Box<dyn AudioOutput>, Option<StreamGuard>) {
    tracing::info!("built without the playback feature; cues are silent");
    (Box::new(tombola::audio::output::SilentOutput::new()), None)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let state_dir = AppDirs::state_dir().unwrap_or_else(|| PathBuf::from("."));
    let _log_guard = logging::init(&state_dir);

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if cli.save_config {
        store.save(&config)?;
        tracing::info!(path = ?store.path(), "settings saved");
    }

    let (output, _stream) = open_output();
    let games_dir = AppDirs::games_dir().unwrap_or_else(|| state_dir.join("games"));
    let (notifier, writer) = GameLog::new(&games_dir).spawn();

    let sounds_dir = config.sounds_dir.clone();
    let mut app = App::new(config, SystemClock::new(), output)
        .with_store(Box::new(store))
        .with_notifier(notifier);

    let specs = default_cue_specs();
    let loaded = match &sounds_dir {
        Some(dir) => app.preload(&specs, &DirSource::new(dir)),
        None => app.preload(&specs, &BuiltinSource),
    };
    if let Err(e) = loaded {
        tracing::debug!(error = %e, "starting with drawing disabled");
    }

    if let Some(path) = cli.recover_path(&games_dir) {
        match path {
            Ok(path) => {
                if let Err(e) = app.recover_from(&path) {
                    tracing::debug!(error = %e, "starting a fresh game instead");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "nothing to recover");
                app.notice = Some(Notice {
                    level: NoticeLevel::Warn,
                    text: format!("Could not recover game: {e}"),
                });
            }
        }
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(terminal_events(), SystemClock::new(), TICK_RATE);
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Closing the channel lets the writer drain and stop.
    drop(app);
    if writer.join().is_err() {
        tracing::error!("game log writer panicked");
    }

    result
}

fn start_tui<B, C, O, E, K>(
    terminal: &mut Terminal<B>,
    app: &mut App<C, O>,
    runner: &Runner<E, K>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    C: Clock,
    O: AudioOutput,
    E: EventSource,
    K: Clock,
{
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        match runner.step() {
            CallerEvent::Tick => app.on_tick(),
            CallerEvent::Resize => {}
            CallerEvent::Key(key) => {
                if !app.handle_key(key) {
                    break;
                }
            }
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }

    Ok(())
}
