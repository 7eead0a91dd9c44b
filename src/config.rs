//! Viewer configuration parsed from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::consts::{DEFAULT_FRAME_INTERVAL_MS, DEFAULT_MAX_SURFACE_PX};
use crate::types::MapError;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Frame pacing and surface limits for a mounted view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub frame_interval: Duration,
    pub max_surface_width: u32,
    pub max_surface_height: u32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            max_surface_width: DEFAULT_MAX_SURFACE_PX,
            max_surface_height: DEFAULT_MAX_SURFACE_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub backend_url: String,
    pub timeouts: HttpTimeouts,
    pub view: ViewOptions,
}

impl ViewerConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `DECKMAP_BACKEND_URL`: default `http://127.0.0.1:8000`
    /// - `DECKMAP_REQUEST_TIMEOUT_SECS`: default 30
    /// - `DECKMAP_CONNECT_TIMEOUT_SECS`: default 10
    /// - `DECKMAP_FRAME_INTERVAL_MS`: default 16
    /// - `DECKMAP_MAX_SURFACE_PX`: default 600
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ConfigParse`] for unparseable or zero values.
    pub fn from_env() -> Result<Self, MapError> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ViewerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("DECKMAP_BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if backend_url.is_empty() {
            return Err(MapError::ConfigParse("DECKMAP_BACKEND_URL is empty".into()));
        }

        let timeouts = HttpTimeouts {
            request_secs: parse_or(&lookup, "DECKMAP_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_or(&lookup, "DECKMAP_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let frame_ms: u64 = parse_or(&lookup, "DECKMAP_FRAME_INTERVAL_MS", DEFAULT_FRAME_INTERVAL_MS)?;
        if frame_ms == 0 {
            return Err(MapError::ConfigParse("DECKMAP_FRAME_INTERVAL_MS must be > 0".into()));
        }
        let max_px: u32 = parse_or(&lookup, "DECKMAP_MAX_SURFACE_PX", DEFAULT_MAX_SURFACE_PX)?;
        if max_px == 0 {
            return Err(MapError::ConfigParse("DECKMAP_MAX_SURFACE_PX must be > 0".into()));
        }

        Ok(Self {
            backend_url,
            timeouts,
            view: ViewOptions {
                frame_interval: Duration::from_millis(frame_ms),
                max_surface_width: max_px,
                max_surface_height: max_px,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, MapError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| MapError::ConfigParse(format!("invalid {key}: {raw}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
