use crate::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub station: StationConfig,
    pub redpanda: RedpandaConfig,
    pub topics: TopicConfig,
    /// Log every encoded payload after a successful publish.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Base URL of the station, without a trailing slash.
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedpandaConfig {
    /// Comma-separated list of broker addresses (e.g., "redpanda.redpanda.svc.cluster.local:9092")
    pub brokers: String,
    pub message_timeout: Duration,
}

impl RedpandaConfig {
    pub fn broker_list(&self) -> Vec<String> {
        self.brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub wind: String,
    pub thermal: String,
    pub rain: String,
    pub unified: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            wind: "wxWind".into(),
            thermal: "wxTHP".into(),
            rain: "wxRain".into(),
            unified: "wxTopic".into(),
        }
    }
}

impl TopicConfig {
    pub fn all(&self) -> [&str; 4] {
        [&self.wind, &self.thermal, &self.rain, &self.unified].map(String::as_str)
    }
}

const DEFAULT_STATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 5;

impl Config {
    /// Read configuration from the process environment, after loading an
    /// optional `.env` file.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    /// REDPANDA_BROKERS, when set, overrides KAFKA_BROKERS.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, "STATION_URL")?;
        let url = url.trim_end_matches('/').to_string();

        let brokers = match lookup("REDPANDA_BROKERS").filter(|b| !b.trim().is_empty()) {
            Some(brokers) => brokers,
            None => required(&lookup, "KAFKA_BROKERS")?,
        };

        let redpanda = RedpandaConfig {
            brokers,
            message_timeout: Duration::from_secs(seconds(
                &lookup,
                "PUBLISH_TIMEOUT_SECS",
                DEFAULT_PUBLISH_TIMEOUT_SECS,
            )?),
        };
        if redpanda.broker_list().is_empty() {
            return Err(AppError::Config(
                "KAFKA_BROKERS must list at least one broker".into(),
            ));
        }

        let defaults = TopicConfig::default();
        let topic = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        let topics = TopicConfig {
            wind: topic("TOPIC_WIND", defaults.wind),
            thermal: topic("TOPIC_THP", defaults.thermal),
            rain: topic("TOPIC_RAIN", defaults.rain),
            unified: topic("TOPIC_UNIFIED", defaults.unified),
        };

        Ok(Config {
            station: StationConfig {
                url,
                timeout: Duration::from_secs(seconds(
                    &lookup,
                    "STATION_TIMEOUT_SECS",
                    DEFAULT_STATION_TIMEOUT_SECS,
                )?),
            },
            redpanda,
            topics,
            debug: lookup("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AppError::Config(format!("{} must be set", key))),
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<u64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(v) => match v.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(AppError::Config(format!(
                "{} must be a positive number of seconds, got '{}'",
                key, v
            ))),
            Ok(secs) => Ok(secs),
        },
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
