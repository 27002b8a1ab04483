use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const STREAM_URL_ENV_VAR: &str = "WORLDVIEW_STREAM_URL";
pub const SNAPSHOT_URL_ENV_VAR: &str = "WORLDVIEW_SNAPSHOT_URL";
pub const SPRITE_BASE_URL_ENV_VAR: &str = "WORLDVIEW_SPRITE_BASE_URL";
pub const ASSET_DIR_ENV_VAR: &str = "WORLDVIEW_ASSET_DIR";
pub const FOLLOW_ENV_VAR: &str = "WORLDVIEW_FOLLOW";
pub const FALLBACK_FETCH_ENV_VAR: &str = "WORLDVIEW_FALLBACK_FETCH";
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "WORLDVIEW_REQUEST_TIMEOUT_MS";

const DEFAULT_STREAM_URL: &str = "wss://server.clawwars.xyz/ws/world";
const DEFAULT_SNAPSHOT_URL: &str = "https://server.clawwars.xyz/world";
const DEFAULT_SPRITE_BASE_URL: &str = "https://cdn.clawwars.xyz/sprites/";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
    #[error("{var} must be a ws:// or wss:// url, got '{value}'")]
    StreamScheme { var: &'static str, value: String },
    #[error("{var} must be an http:// or https:// url, got '{value}'")]
    HttpScheme { var: &'static str, value: String },
    #[error("invalid {var} value '{value}' (expected {expected})")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{var} is not valid unicode")]
    NotUnicode { var: &'static str },
}

/// Where sprite images come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpriteSource {
    Remote(String),
    Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub stream_url: String,
    pub snapshot_url: String,
    pub sprite_source: SpriteSource,
    pub follow: Option<String>,
    pub fallback_fetch: bool,
    pub request_timeout: Duration,
    pub event_buffer: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            snapshot_url: DEFAULT_SNAPSHOT_URL.to_string(),
            sprite_source: SpriteSource::Remote(DEFAULT_SPRITE_BASE_URL.to_string()),
            follow: None,
            fallback_fetch: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ViewerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(read_env_var)
    }

    /// Builds a config from an arbitrary variable source; `Ok(None)` means unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(STREAM_URL_ENV_VAR)? {
            config.stream_url = validate_stream_url(STREAM_URL_ENV_VAR, &url)?;
        }
        if let Some(url) = lookup(SNAPSHOT_URL_ENV_VAR)? {
            config.snapshot_url = validate_http_url(SNAPSHOT_URL_ENV_VAR, &url)?;
        }
        if let Some(url) = lookup(SPRITE_BASE_URL_ENV_VAR)? {
            let mut url = validate_http_url(SPRITE_BASE_URL_ENV_VAR, &url)?;
            if !url.ends_with('/') {
                url.push('/');
            }
            config.sprite_source = SpriteSource::Remote(url);
        }
        // A local asset directory wins over the remote base.
        if let Some(dir) = lookup(ASSET_DIR_ENV_VAR)? {
            let dir = non_empty(ASSET_DIR_ENV_VAR, &dir)?;
            config.sprite_source = SpriteSource::Directory(PathBuf::from(dir));
        }
        if let Some(name) = lookup(FOLLOW_ENV_VAR)? {
            let name = name.trim();
            config.follow = (!name.is_empty()).then(|| name.to_string());
        }
        if let Some(flag) = lookup(FALLBACK_FETCH_ENV_VAR)? {
            config.fallback_fetch = parse_flag(FALLBACK_FETCH_ENV_VAR, &flag)?;
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV_VAR)? {
            let ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: REQUEST_TIMEOUT_ENV_VAR,
                    value: raw.clone(),
                    expected: "positive integer milliseconds",
                })?;
            config.request_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn read_env_var(var: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { var }),
    }
}

fn non_empty(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { var });
    }
    Ok(trimmed.to_string())
}

fn validate_stream_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let url = non_empty(var, value)?;
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url)
    } else {
        Err(ConfigError::StreamScheme { var, value: url })
    }
}

fn validate_http_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let url = non_empty(var, value)?;
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(ConfigError::HttpScheme { var, value: url })
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            expected: "true/false or 1/0",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&'static str, &str)]) -> Result<ViewerConfig, ConfigError> {
        let vars: HashMap<&'static str, String> = pairs
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        ViewerConfig::from_lookup(|var| Ok(vars.get(var).cloned()))
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config_from(&[]), Ok(ViewerConfig::default()));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            (STREAM_URL_ENV_VAR, "ws://localhost:9000/ws/world"),
            (SNAPSHOT_URL_ENV_VAR, "http://localhost:9000/world"),
            (SPRITE_BASE_URL_ENV_VAR, "http://localhost:9000/sprites"),
            (FOLLOW_ENV_VAR, "  Ada "),
            (FALLBACK_FETCH_ENV_VAR, "0"),
            (REQUEST_TIMEOUT_ENV_VAR, "2500"),
        ])
        .expect("config");

        assert_eq!(config.stream_url, "ws://localhost:9000/ws/world");
        assert_eq!(config.snapshot_url, "http://localhost:9000/world");
        assert_eq!(
            config.sprite_source,
            SpriteSource::Remote("http://localhost:9000/sprites/".to_string())
        );
        assert_eq!(config.follow.as_deref(), Some("Ada"));
        assert!(!config.fallback_fetch);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn asset_dir_takes_precedence_over_remote_sprites() {
        let config = config_from(&[
            (SPRITE_BASE_URL_ENV_VAR, "https://cdn.example/sprites/"),
            (ASSET_DIR_ENV_VAR, "/tmp/sprites"),
        ])
        .expect("config");
        assert_eq!(
            config.sprite_source,
            SpriteSource::Directory(PathBuf::from("/tmp/sprites"))
        );
    }

    #[test]
    fn blank_follow_means_no_follow() {
        let config = config_from(&[(FOLLOW_ENV_VAR, "   ")]).expect("config");
        assert_eq!(config.follow, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        assert_eq!(
            config_from(&[(STREAM_URL_ENV_VAR, "https://nope")]),
            Err(ConfigError::StreamScheme {
                var: STREAM_URL_ENV_VAR,
                value: "https://nope".to_string(),
            })
        );
        assert!(matches!(
            config_from(&[(REQUEST_TIMEOUT_ENV_VAR, "0")]),
            Err(ConfigError::Invalid {
                var: REQUEST_TIMEOUT_ENV_VAR,
                ..
            })
        ));
        assert!(matches!(
            config_from(&[(FALLBACK_FETCH_ENV_VAR, "maybe")]),
            Err(ConfigError::Invalid {
                var: FALLBACK_FETCH_ENV_VAR,
                ..
            })
        ));
        assert_eq!(
            config_from(&[(ASSET_DIR_ENV_VAR, "")]),
            Err(ConfigError::Empty {
                var: ASSET_DIR_ENV_VAR
            })
        );
    }
}
