use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Where game logs and the application log live.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("tombola"),
            )
        } else {
            ProjectDirs::from("", "", "tombola").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn games_dir() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("games"))
    }
}
