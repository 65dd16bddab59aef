use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::escalation::EscalationConfig;
use crate::model::HOUR_MS;

/// Process settings, all from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub escalation: EscalationConfig,
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            escalation: EscalationConfig::default(),
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values keep the default and
    /// log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_dir = lookup("LESSONBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let metrics_port = lookup("LESSONBOOK_METRICS_PORT")
            .and_then(|raw| parse_or_warn::<u16>("LESSONBOOK_METRICS_PORT", &raw));

        let hours = positive(parse_var(&lookup, "ESCALATION_HOURS", 2i64), "ESCALATION_HOURS", 2);
        let interval_ms = positive(
            parse_var(&lookup, "ESCALATION_CHECK_INTERVAL_MS", 300_000i64),
            "ESCALATION_CHECK_INTERVAL_MS",
            300_000,
        );
        let compact_threshold = parse_var(&lookup, "LESSONBOOK_COMPACT_THRESHOLD", defaults.compact_threshold);

        Self {
            data_dir,
            metrics_port,
            escalation: EscalationConfig {
                threshold: hours.saturating_mul(HOUR_MS),
                interval: Duration::from_millis(interval_ms as u64),
            },
            compact_threshold,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("lessonbook.wal")
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring invalid {key}={raw:?}, using default");
            None
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|raw| parse_or_warn(key, &raw))
        .unwrap_or(default)
}

fn positive(value: i64, key: &str, default: i64) -> i64 {
    if value > 0 {
        value
    } else {
        warn!("{key} must be positive, using default {default}");
        default
    }
}
