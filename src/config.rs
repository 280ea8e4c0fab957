//! Settings loading: a JSON settings file with environment overrides.
//!
//! The file lives at `$PUSHOVER_SETTINGS_PATH`, defaulting to
//! `$HOME/.pdc-settings.json`. A missing file is fine as long as the
//! required values arrive via environment variables.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::SettingsError;

/// Default push websocket endpoint.
pub const DEFAULT_PUSH_URL: &str = "wss://client.pushover.net/push";

/// Default REST API base, including the version segment.
pub const DEFAULT_API_URL: &str = "https://api.pushover.net/1";

/// Default host serving app icons.
pub const DEFAULT_ICON_URL: &str = "https://client.pushover.net";

const DEFAULT_KEEP_ALIVE_MS: u64 = 60_000;
const DEFAULT_SETTINGS_FILE: &str = ".pdc-settings.json";

/// How to react to an unrecognized inbound frame on the websocket.
///
/// Observed client behavior differs here, so it is a policy knob
/// rather than a hardcoded choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFramePolicy {
    /// Log the frame and keep the session open.
    #[default]
    Ignore,
    /// Log the frame and force a reconnect.
    Reconnect,
}

/// Raw shape of the settings file. Every field is optional here;
/// validation happens when resolving into [`Settings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    pub device_id: Option<String>,
    pub secret: Option<String>,
    pub image_cache: Option<PathBuf>,
    pub push_url: Option<String>,
    pub api_url: Option<String>,
    pub icon_url: Option<String>,
    pub keep_alive_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub unknown_frame_policy: Option<UnknownFramePolicy>,
}

/// Environment overrides applied on top of the settings file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub device_id: Option<String>,
    pub secret: Option<String>,
    pub image_cache: Option<PathBuf>,
}

impl EnvOverrides {
    /// Snapshot the relevant environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            device_id: non_empty_var("PUSHOVER_DEVICE_ID"),
            secret: non_empty_var("PUSHOVER_SECRET"),
            image_cache: non_empty_var("PUSHOVER_IMAGE_CACHE").map(PathBuf::from),
        }
    }
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Device registered with Pushover, identifying the stream.
    pub device_id: String,
    /// Account secret paired with the device.
    pub secret: String,
    /// Icon cache directory; caching is disabled when absent.
    pub image_cache: Option<PathBuf>,
    /// Push websocket endpoint.
    pub push_url: String,
    /// REST API base URL.
    pub api_url: String,
    /// Icon host base URL.
    pub icon_url: String,
    /// Deadline for traffic on the websocket before forcing a reconnect.
    pub keep_alive_timeout: Duration,
    /// Optional per-request timeout for fetch/ack/icon HTTP calls.
    pub request_timeout: Option<Duration>,
    /// Policy for unrecognized inbound frames.
    pub unknown_frame_policy: UnknownFramePolicy,
}

impl Settings {
    /// Load settings from the default file path and the environment.
    ///
    /// # Errors
    /// Returns `SettingsError` when the file is unreadable or invalid,
    /// or when `deviceId`/`secret` are missing everywhere.
    pub fn load() -> Result<Self, SettingsError> {
        let path = settings_path();
        info!(path = %path.display(), "Attempting to load settings");
        let file = read_settings_file(&path)?;
        Self::resolve(file, EnvOverrides::from_env())
    }

    /// Merge a settings file with environment overrides and validate.
    ///
    /// # Errors
    /// Returns `SettingsError::Missing` when `deviceId` or `secret` is
    /// absent from both sources.
    pub fn resolve(file: SettingsFile, env: EnvOverrides) -> Result<Self, SettingsError> {
        let device_id = env
            .device_id
            .or(file.device_id)
            .ok_or(SettingsError::Missing("deviceId"))?;
        let secret = env
            .secret
            .or(file.secret)
            .ok_or(SettingsError::Missing("secret"))?;

        Ok(Self {
            device_id,
            secret,
            image_cache: env.image_cache.or(file.image_cache),
            push_url: file
                .push_url
                .unwrap_or_else(|| DEFAULT_PUSH_URL.to_string()),
            api_url: file
                .api_url
                .map_or_else(|| DEFAULT_API_URL.to_string(), |url| {
                    url.trim_end_matches('/').to_string()
                }),
            icon_url: file
                .icon_url
                .map_or_else(|| DEFAULT_ICON_URL.to_string(), |url| {
                    url.trim_end_matches('/').to_string()
                }),
            keep_alive_timeout: Duration::from_millis(
                file.keep_alive_timeout_ms.unwrap_or(DEFAULT_KEEP_ALIVE_MS),
            ),
            request_timeout: file.request_timeout_ms.map(Duration::from_millis),
            unknown_frame_policy: file.unknown_frame_policy.unwrap_or_default(),
        })
    }
}

fn settings_path() -> PathBuf {
    if let Some(path) = non_empty_var("PUSHOVER_SETTINGS_PATH") {
        return PathBuf::from(path);
    }
    let home = non_empty_var("HOME").unwrap_or_default();
    PathBuf::from(home).join(DEFAULT_SETTINGS_FILE)
}

fn read_settings_file(path: &std::path::Path) -> Result<SettingsFile, SettingsError> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })
        }
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            // Hopefully we have env vars.
            Ok(SettingsFile::default())
        }
        Err(source) => Err(SettingsError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
