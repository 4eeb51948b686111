//! # scribe-settings
//!
//! Configuration for the Scribe audit recorder.
//!
//! Settings are resolved in three layers: compiled defaults, a deep-merged
//! user settings file (`~/.scribe/settings.json`), and environment variable
//! overrides with strict parsing.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{DatabaseSettings, HealthSettings, ScribeSettings, SweepSettings};
