//! Game logs: every draw is appended to a per-game CSV file by a writer
//! thread fed over a channel, and any such file can be read back into a
//! [`RecoverySnapshot`].

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::error::RecoveryError;
use crate::session::RecoverySnapshot;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    /// First draw of a game.
    Start,
    Update,
    /// A game was resumed from a log.
    Recover,
}

/// State change sent to the persistence side after each draw.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub kind: EventKind,
    pub at: DateTime<Local>,
    pub pool: Vec<u8>,
    pub history: Vec<u8>,
    pub drawn_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    timestamp: DateTime<Local>,
    event: EventKind,
    drawn_count: usize,
    pool: String,
    history: String,
}

impl From<&GameEvent> for LogRecord {
    fn from(e: &GameEvent) -> Self {
        Self {
            timestamp: e.at,
            event: e.kind,
            drawn_count: e.drawn_count,
            pool: e.pool.iter().join(" "),
            history: e.history.iter().join(" "),
        }
    }
}

fn parse_numbers(field: &str, what: &str) -> Result<Vec<u8>, RecoveryError> {
    field
        .split_whitespace()
        .map(|s| {
            s.parse::<u8>()
                .map_err(|_| RecoveryError::Malformed(format!("bad {what} entry '{s}'")))
        })
        .collect()
}

/// Appends game events to CSV files under a directory, one file per game.
#[derive(Debug)]
pub struct GameLog {
    dir: PathBuf,
    current: Option<(PathBuf, csv::Writer<File>)>,
}

impl GameLog {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            current: None,
        }
    }

    /// Path of the file currently being appended to.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(p, _)| p.as_path())
    }

    /// Write one event. `Start` and `Recover` begin a new file.
    pub fn record(&mut self, event: &GameEvent) -> Result<(), RecoveryError> {
        let rotate = matches!(event.kind, EventKind::Start | EventKind::Recover);
        if rotate || self.current.is_none() {
            fs::create_dir_all(&self.dir)?;
            let path = self.dir.join(format!(
                "game-{}.csv",
                event.at.format("%Y%m%d-%H%M%S-%3f")
            ));
            let writer = csv::Writer::from_path(&path)?;
            tracing::info!(path = ?path, kind = %event.kind, "opened game log");
            self.current = Some((path, writer));
        }
        if let Some((_, writer)) = self.current.as_mut() {
            writer.serialize(LogRecord::from(event))?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Run the log on its own thread. Dropping every sender ends the thread.
    pub fn spawn(mut self) -> (Sender<GameEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<GameEvent>();
        let handle = thread::spawn(move || {
            for event in rx {
                if let Err(e) = self.record(&event) {
                    tracing::error!(error = %e, kind = %event.kind, "failed to write game log");
                }
            }
            tracing::debug!("game log writer stopped");
        });
        (tx, handle)
    }
}

/// Read the last row of a game log as a snapshot. Rejects anything that is
/// not a full pool with a consistent history.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<RecoverySnapshot, RecoveryError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let last = reader
        .deserialize::<LogRecord>()
        .last()
        .transpose()?
        .ok_or(RecoveryError::NotFound)?;

    let pool = parse_numbers(&last.pool, "pool")?;
    let history = parse_numbers(&last.history, "history")?;
    let snapshot = RecoverySnapshot {
        pool,
        drawn_count: last.drawn_count,
    };
    snapshot.validate()?;
    if history.as_slice() != &snapshot.pool[..snapshot.drawn_count] {
        return Err(RecoveryError::Malformed(
            "history does not match pool order".to_string(),
        ));
    }
    Ok(snapshot)
}

/// Most recent `game-*.csv` in `dir`.
pub fn latest_log<P: AsRef<Path>>(dir: P) -> Result<PathBuf, RecoveryError> {
    let entries = match fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RecoveryError::NotFound),
        Err(e) => return Err(e.into()),
    };
    entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "csv")
                && p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("game-"))
        })
        .max()
        .ok_or(RecoveryError::NotFound)
}
