// src/config.rs
//! Runtime settings, loaded from environment variables (`.env` supported via
//! dotenvy in the binary). Everything has a default except the credentials
//! and the channel list.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::models::WorkFormat;
use crate::monitor::scheduler::{MonitorConfig, ScheduleMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Anthropic,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_url: String,
    pub database_name: String,
    pub telegram_bot_token: String,
    /// Raw channel references as configured; normalized by the pipeline.
    pub channels: Vec<String>,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub extractor: ExtractorKind,
    pub store: StoreKind,
    /// `None` accepts every work format.
    pub work_format_filter: Option<Vec<WorkFormat>>,
    pub fetch_limit: usize,
    pub monitor: MonitorConfig,
    pub bind_addr: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let extractor = match env_or("EXTRACTOR", "anthropic").to_ascii_lowercase().as_str() {
            "anthropic" => ExtractorKind::Anthropic,
            "mock" => ExtractorKind::Mock,
            other => bail!("unsupported EXTRACTOR `{other}` (expected anthropic|mock)"),
        };
        let store = match env_or("STORE", "mongo").to_ascii_lowercase().as_str() {
            "mongo" => StoreKind::Mongo,
            "memory" => StoreKind::Memory,
            other => bail!("unsupported STORE `{other}` (expected mongo|memory)"),
        };

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        if extractor == ExtractorKind::Anthropic && anthropic_api_key.is_empty() {
            bail!("ANTHROPIC_API_KEY is required when EXTRACTOR=anthropic");
        }

        let channels = parse_channels(&env_required("TELEGRAM_CHANNELS")?);
        if channels.is_empty() {
            bail!("TELEGRAM_CHANNELS is set but contains no channel references");
        }

        Ok(Self {
            mongodb_url: env_or("MONGODB_URL", "mongodb://localhost:27017"),
            database_name: env_or("DATABASE_NAME", "vacancies"),
            telegram_bot_token: env_required("TELEGRAM_BOT_TOKEN")?,
            channels,
            anthropic_api_key,
            anthropic_model: env_or("ANTHROPIC_MODEL", "claude-3-haiku-20240307"),
            extractor,
            store,
            work_format_filter: parse_work_format_filter(&env_or("WORK_FORMAT_FILTER", ""))?,
            fetch_limit: env_parse("FETCH_LIMIT", 50usize)?,
            monitor: monitor_config_from_env()?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),
        })
    }
}

fn monitor_config_from_env() -> Result<MonitorConfig> {
    let (mode, default_cycle_secs) =
        match env_or("MONITOR_MODE", "concurrent").to_ascii_lowercase().as_str() {
            "concurrent" => (ScheduleMode::Concurrent, 60u64),
            "sequential" => (
                ScheduleMode::Sequential {
                    channel_delay: Duration::from_secs(env_parse("CHANNEL_DELAY_SECS", 5u64)?),
                },
                300u64,
            ),
            other => bail!("unsupported MONITOR_MODE `{other}` (expected concurrent|sequential)"),
        };
    Ok(MonitorConfig {
        mode,
        cycle_delay: Duration::from_secs(env_parse(
            "MONITOR_INTERVAL_SECS",
            default_cycle_secs,
        )?),
    })
}

/// Comma-separated channel references, trimmed, empties dropped.
pub fn parse_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma-separated work formats; empty means "accept everything".
pub fn parse_work_format_filter(raw: &str) -> Result<Option<Vec<WorkFormat>>> {
    let formats: Vec<WorkFormat> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            WorkFormat::parse(s).ok_or_else(|| anyhow!("unknown work format `{s}` in WORK_FORMAT_FILTER"))
        })
        .collect::<Result<_>>()?;
    Ok(if formats.is_empty() { None } else { Some(formats) })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &str) -> Result<String> {
    let v = std::env::var(key).with_context(|| format!("{key} must be set"))?;
    if v.trim().is_empty() {
        bail!("{key} must not be empty");
    }
    Ok(v)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("parsing {key}={v}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_split_and_trimmed() {
        let out = parse_channels(" -1001234567890, @rust_jobs ,, 987654 ");
        assert_eq!(out, vec!["-1001234567890", "@rust_jobs", "987654"]);
        assert!(parse_channels("").is_empty());
    }

    #[test]
    fn empty_work_format_filter_accepts_everything() {
        assert_eq!(parse_work_format_filter("").unwrap(), None);
        assert_eq!(parse_work_format_filter("  ").unwrap(), None);
    }

    #[test]
    fn remote_only_filter_parses() {
        assert_eq!(
            parse_work_format_filter("remote").unwrap(),
            Some(vec![WorkFormat::Remote])
        );
        assert_eq!(
            parse_work_format_filter("remote, hybrid").unwrap(),
            Some(vec![WorkFormat::Remote, WorkFormat::Hybrid])
        );
    }

    #[test]
    fn unknown_work_format_is_rejected() {
        assert!(parse_work_format_filter("onsite").is_err());
    }
}
