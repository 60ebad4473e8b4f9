//! Application-level configuration loading, including gameplay tuning knobs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location of the optional JSON configuration file.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BUZZWIRE_BACK_CONFIG_PATH";

/// Seconds a team has to submit once it wins the buzzer.
const DEFAULT_ANSWER_WINDOW_SECS: u64 = 60;
/// Characters in a generated join code.
const DEFAULT_JOIN_CODE_LENGTH: usize = 6;
/// Hard ceiling on teams per game regardless of the requested size.
const DEFAULT_MAX_TEAMS: usize = 12;

/// Immutable runtime tuning knobs shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    answer_window_secs: u64,
    join_code_length: usize,
    max_teams: usize,
}

impl AppConfig {
    /// Load the configuration file, falling back to baked-in defaults when it
    /// is absent or unreadable. Every fallback is logged.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match read_config(&path) {
            Some(raw) => {
                let config = Self::from(raw);
                info!(
                    path = %path.display(),
                    answer_window_secs = config.answer_window_secs,
                    max_teams = config.max_teams,
                    "configuration loaded"
                );
                config
            }
            None => Self::default(),
        }
    }

    /// Seconds a buzzing team has to submit before the facilitator may time it out.
    pub fn answer_window_secs(&self) -> u64 {
        self.answer_window_secs
    }

    /// Length of generated join codes.
    pub fn join_code_length(&self) -> usize {
        self.join_code_length
    }

    /// Upper bound applied to the requested team count of new games.
    pub fn max_teams(&self) -> usize {
        self.max_teams
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            answer_window_secs: DEFAULT_ANSWER_WINDOW_SECS,
            join_code_length: DEFAULT_JOIN_CODE_LENGTH,
            max_teams: DEFAULT_MAX_TEAMS,
        }
    }
}

/// On-disk shape of the configuration file; every knob is optional.
#[derive(Debug, Deserialize)]
struct RawConfig {
    answer_window_secs: Option<u64>,
    join_code_length: Option<usize>,
    max_teams: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            answer_window_secs: value
                .answer_window_secs
                .unwrap_or(defaults.answer_window_secs),
            join_code_length: value.join_code_length.unwrap_or(defaults.join_code_length),
            max_teams: value.max_teams.unwrap_or(defaults.max_teams),
        }
    }
}

fn resolve_config_path() -> PathBuf {
    match env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

fn read_config(path: &Path) -> Option<RawConfig> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no config file; using defaults");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "config unreadable; using defaults");
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(raw) => Some(raw),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "config invalid; using defaults");
            None
        }
    }
}
