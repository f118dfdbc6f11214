use chrono::{FixedOffset, Offset, Utc};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use tracing::{info, warn};

use crate::error::DiaryError;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
}

impl BackendConfig {
    /// The endpoint and key, or the configuration error the banner shows.
    pub fn credentials(&self) -> Result<(&str, &str), DiaryError> {
        match (self.url.as_deref(), self.api_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url.trim_end_matches('/'), key)),
            (None, _) => Err(DiaryError::Config("SUPABASE_URL is not set".into())),
            (_, None) => Err(DiaryError::Config("SUPABASE_ANON_KEY is not set".into())),
        }
    }
}

/// Settings the view-state and effects need at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bucket: String,
    pub utc_offset: FixedOffset,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bucket: "images".to_string(),
            utc_offset: offset_hours(8).unwrap_or_else(|| Utc.fix()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub settings: Settings,
    pub session_file: PathBuf,
}

impl Config {
    /// Reads the process environment. Only the endpoint and key have no
    /// default; their absence is reported by the backend on first use.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let hours: i32 = try_load(&lookup, "DIARY_UTC_OFFSET", 8);
        let utc_offset = offset_hours(hours).unwrap_or_else(|| {
            warn!("DIARY_UTC_OFFSET {hours} is out of range, using +8");
            Settings::default().utc_offset
        });

        Config {
            backend: BackendConfig {
                url: required(&lookup, "SUPABASE_URL"),
                api_key: required(&lookup, "SUPABASE_ANON_KEY"),
                table: try_load(&lookup, "DIARY_TABLE", "entries".to_string()),
            },
            settings: Settings {
                bucket: try_load(&lookup, "DIARY_BUCKET", "images".to_string()),
                utc_offset,
            },
            session_file: PathBuf::from(try_load(
                &lookup,
                "DIARY_SESSION_FILE",
                "memory_lane_session.json".to_string(),
            )),
        }
    }
}

/// Loads `.env` into the process environment when present. Returns the file
/// that was read.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Log destination. Read before the subscriber exists, so it cannot log.
pub fn log_path() -> PathBuf {
    env::var("DIARY_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("memory_lane.log"))
}

fn offset_hours(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let value = lookup(key).filter(|v| !v.trim().is_empty());
    if value.is_none() {
        warn!("Environment variable {key} not found");
    }
    value
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value: {e}, using default: {default}");
            default
        }),
    }
}
