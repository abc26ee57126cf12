use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const MIN_DURATION_MS: u64 = 1_000;
pub const MAX_DURATION_MS: u64 = 10_000;
pub const DEFAULT_DURATION_MS: u64 = 5_000;
pub const DEFAULT_FIRST_DURATION_MS: u64 = 2_000;

/// Step used by the `+`/`-` keys.
pub const DURATION_STEP_MS: u64 = 500;

/// Clamp an externally supplied duration into the accepted range.
pub fn clamp_duration_ms(ms: u64) -> u64 {
    ms.clamp(MIN_DURATION_MS, MAX_DURATION_MS)
}

/// Animation timing for draws.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    pub default_duration_ms: u64,
    pub use_first_override: bool,
    pub first_duration_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: DEFAULT_DURATION_MS,
            use_first_override: true,
            first_duration_ms: DEFAULT_FIRST_DURATION_MS,
        }
    }
}

impl TimingConfig {
    pub fn new(default_duration_ms: u64, use_first_override: bool, first_duration_ms: u64) -> Self {
        Self {
            default_duration_ms,
            use_first_override,
            first_duration_ms,
        }
        .clamped()
    }

    /// Copy with both durations forced into range.
    pub fn clamped(self) -> Self {
        Self {
            default_duration_ms: clamp_duration_ms(self.default_duration_ms),
            use_first_override: self.use_first_override,
            first_duration_ms: clamp_duration_ms(self.first_duration_ms),
        }
    }

    /// Duration for the draw that happens when `drawn_count` numbers are out.
    pub fn duration_for(&self, drawn_count: usize) -> u64 {
        if drawn_count == 0 && self.use_first_override {
            self.first_duration_ms
        } else {
            self.default_duration_ms
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    /// Directory holding `press.wav`, `tick.wav` and `stop.wav`. Built-in
    /// clips are used when unset.
    pub sounds_dir: Option<PathBuf>,
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "tombola") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("tombola_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(mut cfg) => {
                cfg.timing = cfg.timing.clamped();
                cfg
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn clamp_duration_bounds() {
        assert_eq!(clamp_duration_ms(500), 1_000);
        assert_eq!(clamp_duration_ms(15_000), 10_000);
        assert_eq!(clamp_duration_ms(4_000), 4_000);
        assert_eq!(clamp_duration_ms(1_000), 1_000);
        assert_eq!(clamp_duration_ms(10_000), 10_000);
    }

    #[test]
    fn timing_new_clamps_both_durations() {
        let t = TimingConfig::new(50, true, 99_999);
        assert_eq!(t.default_duration_ms, 1_000);
        assert_eq!(t.first_duration_ms, 10_000);
    }

    #[test]
    fn duration_for_first_draw_override() {
        let t = TimingConfig::new(5_000, true, 2_000);
        assert_eq!(t.duration_for(0), 2_000);
        assert_eq!(t.duration_for(1), 5_000);
        assert_eq!(t.duration_for(74), 5_000);

        let t = TimingConfig::new(5_000, false, 2_000);
        assert_eq!(t.duration_for(0), 5_000);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let cfg = Config {
            timing: TimingConfig::new(3_000, false, 7_000),
            sounds_dir: Some(PathBuf::from("/tmp/sounds")),
        };
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn load_clamps_hand_edited_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"timing":{"default_duration_ms":200,"use_first_override":true,"first_duration_ms":60000}}"#,
        )
        .unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.timing.default_duration_ms, 1_000);
        assert_eq!(cfg.timing.first_duration_ms, 10_000);
        assert_eq!(cfg.sounds_dir, None);
    }

    #[test]
    fn missing_or_garbage_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
        fs::write(&path, b"not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }
}
