//! Handles player configuration loading.
//!
//! Settings are read from the `[settings]` section of an INI file; see
//! [`load_config`] for the recognized keys.

use configparser::ini::Ini;
use log::{debug, error, info, warn};
use std::time::Duration;

use crate::errors::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/castgrid.conf";

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
const MIN_REFRESH_INTERVAL_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Where device, grid and media records come from.
#[derive(Clone, Debug, PartialEq)]
pub enum Backend {
    /// JSON record files served over HTTP under `data_url`.
    Http { data_url: String, api_token: Option<String> },
    /// In-process store seeded with demo content.
    Demo,
}

/// Holds the player's configuration parameters.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: Backend,
    /// `None` asks the player to generate an id at startup.
    pub device_id: Option<String>,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
}

/// Loads configuration from the INI file at `path`.
///
/// Recognized keys in `[settings]`: `backend` (`http` | `demo`), `data_url`,
/// `api_token`, `device_id`, `refresh_interval_secs`, `request_timeout_secs`.
///
/// # Errors
/// Returns `ConfigError` if the file cannot be read or parsed, a required key
/// is missing, or a value is unusable.
#[must_use = "loading configuration can fail, the Result must be handled"]
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Attempting to load config from: {}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| {
        error!("Error reading config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    parse_config(&contents)
}

/// Parses configuration from INI text.
#[must_use = "parsing configuration can fail, the Result must be handled"]
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let mut config_parser = Ini::new();
    config_parser.read(contents.to_string()).map_err(|e| {
        error!("Error parsing config: {}", e);
        ConfigError::Parse(e)
    })?;

    let get_key = |key_name: &str| {
        config_parser.get("settings", key_name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let require_key = |key_name: &str| {
        get_key(key_name).ok_or_else(|| {
            error!("Missing configuration key '{}' in section '[settings]'", key_name);
            ConfigError::MissingKey(key_name.to_string())
        })
    };
    let parse_secs = |key_name: &str, default: u64| -> Result<u64, ConfigError> {
        match get_key(key_name) {
            None => Ok(default),
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key_name.to_string(),
                value: raw,
            }),
        }
    };

    let backend_kind = require_key("backend")?;
    debug!("Loaded config value for key 'backend': {}", backend_kind);
    let backend = match backend_kind.to_lowercase().as_str() {
        "http" => {
            let data_url = require_key("data_url")?.trim_end_matches('/').to_string();
            debug!("Loaded config value for key 'data_url': {}", data_url);
            Backend::Http { data_url, api_token: get_key("api_token") }
        }
        "demo" => Backend::Demo,
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "backend".to_string(),
                value: backend_kind,
            });
        }
    };

    let device_id = get_key("device_id");
    debug!("Loaded config value for key 'device_id': {:?}", device_id);

    let mut refresh_secs = parse_secs("refresh_interval_secs", DEFAULT_REFRESH_INTERVAL_SECS)?;
    if refresh_secs < MIN_REFRESH_INTERVAL_SECS {
        warn!(
            "refresh_interval_secs={} is below the minimum, using {}",
            refresh_secs, MIN_REFRESH_INTERVAL_SECS
        );
        refresh_secs = MIN_REFRESH_INTERVAL_SECS;
    }
    let timeout_secs = parse_secs("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?;

    let app_config = AppConfig {
        backend,
        device_id,
        refresh_interval: Duration::from_secs(refresh_secs),
        request_timeout: Duration::from_secs(timeout_secs),
    };
    // Keep the token out of the log.
    info!(
        "Configuration loaded: device_id={:?}, refresh every {:?}, timeout {:?}",
        app_config.device_id, app_config.refresh_interval, app_config.request_timeout
    );
    Ok(app_config)
}
