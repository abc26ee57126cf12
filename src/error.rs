use thiserror::Error;

/// Reasons a draw request is refused. None of these change session state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    #[error("all {0} numbers have been drawn")]
    PoolExhausted(usize),

    #[error("a draw is already in progress")]
    InFlight,

    #[error("sound cues are not loaded yet")]
    NotReady,
}

/// Failures from loading or playing sound cues.
#[derive(Error, Debug)]
pub enum CueError {
    #[error("failed to load cue '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unknown cue '{0}'")]
    Unknown(String),

    #[error("decode failed: {0}")]
    Decode(#[from] hound::Error),

    #[error("clip contains no samples")]
    Empty,
}

/// Failures while reading a game log back into a snapshot.
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("game log io: {0}")]
    Io(#[from] std::io::Error),

    #[error("game log csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("no saved game found")]
    NotFound,

    #[error("cannot recover while a draw is in progress")]
    InFlight,

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}
