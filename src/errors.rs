//! Defines the custom error types used throughout `castgrid_player`.
//!
//! Each category of failure (configuration, backend reads) gets its own enum,
//! and `AppError` wraps them for the binary. Every type implements `Debug`,
//! `Display` and `std::error::Error`, with `From` conversions for the
//! underlying library errors.

use std::error::Error as StdError;
use std::fmt;

/// Errors related to loading and parsing the player configuration.
#[must_use = "a configuration error should be handled or propagated"]
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The configuration file content is malformed.
    Parse(String),
    /// A required key is missing from the `[settings]` section.
    MissingKey(String),
    /// A key is present but its value is unusable.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read player config: {}", e),
            ConfigError::Parse(e) => write!(f, "player config is not valid INI: {}", e),
            ConfigError::MissingKey(key) => write!(f, "[settings] is missing '{}'", key),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "[settings] {} = '{}' is not usable", key, value)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

/// Errors raised by a configuration backend while reading records.
#[must_use = "a store error should be handled or propagated"]
#[derive(Debug)]
pub enum StoreError {
    /// An HTTP request made by `reqwest` failed.
    Http(reqwest::Error),
    /// A record file could not be (de)serialized.
    Json(serde_json::Error),
    /// A record that must exist (e.g. the media box being edited) is absent.
    NotFound(String),
    /// The backend answered with a non-success status other than 404.
    HttpStatus { status: reqwest::StatusCode, message: String },
    /// Anything else, including simulated outages in the in-memory store.
    Generic(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Http(e) => write!(f, "Backend request error: {}", e),
            StoreError::Json(e) => write!(f, "Backend JSON (de)serialization error: {}", e),
            StoreError::NotFound(what) => write!(f, "Backend record not found: {}", what),
            StoreError::HttpStatus { status, message } => {
                write!(f, "Backend HTTP error {}: {}", status, message)
            }
            StoreError::Generic(s) => write!(f, "Backend error: {}", s),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Http(e) => Some(e),
            StoreError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err)
    }
}

/// Why `castgrid-player` exited.
#[must_use = "an application error should be handled or propagated"]
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Store(StoreError),
    Generic(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "castgrid-player cannot start: {}", e),
            AppError::Store(e) => write!(f, "castgrid-player backend unavailable: {}", e),
            AppError::Generic(s) => write!(f, "castgrid-player: {}", s),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Store(e) => Some(e),
            AppError::Generic(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}
