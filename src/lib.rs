// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod reveal;
pub mod runtime;
pub mod scheduler;
pub mod sequencer;
pub mod session;
pub mod ui;
