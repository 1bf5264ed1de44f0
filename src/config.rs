//! Run configuration.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::pipeline::classifier::DEFAULT_BODY_WINDOW;

/// Settings for one analytics run, built from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsConfig {
    /// Email export to read (bare array or `{metadata, emails}` document).
    pub input_path: PathBuf,
    /// Directory receiving `analytics.json`, `flow_graph.json` and `classified_emails.json`.
    pub output_dir: PathBuf,
    /// Keep only emails from the last N calendar months.
    pub months: Option<u32>,
    /// Keep only emails from this calendar year.
    pub year: Option<i32>,
    /// Classification workers.
    pub workers: usize,
    /// Body characters scanned when scoring.
    pub body_window: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input/emails.json"),
            output_dir: PathBuf::from("output"),
            months: None,
            year: None,
            workers: default_workers(),
            body_window: DEFAULT_BODY_WINDOW,
        }
    }
}

impl AnalyticsConfig {
    /// Build config from `SISIFUS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let input_path = lookup("SISIFUS_INPUT")
            .map(PathBuf::from)
            .unwrap_or(defaults.input_path);

        let output_dir = lookup("SISIFUS_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let months: Option<u32> = parse_var(&lookup, "SISIFUS_MONTHS")?;
        let year: Option<i32> = parse_var(&lookup, "SISIFUS_YEAR")?;

        let workers = parse_var(&lookup, "SISIFUS_WORKERS")?.unwrap_or(defaults.workers);
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SISIFUS_WORKERS".into(),
                message: "must be at least 1".into(),
            });
        }

        let body_window = parse_var(&lookup, "SISIFUS_BODY_WINDOW")?.unwrap_or(defaults.body_window);

        Ok(Self {
            input_path,
            output_dir,
            months,
            year,
            workers,
            body_window,
        })
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}': {}", raw, e),
    })
}
