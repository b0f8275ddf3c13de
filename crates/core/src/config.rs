use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Environment prefix for every setting, e.g. `POWERGUARD_SENSOR_URL`.
pub const ENV_PREFIX: &str = "POWERGUARD_";

/// All powerguard parameters. Loaded once from the environment at startup;
/// nothing is re-read while the monitor runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardCfg {
    // sensor
    pub sensor_url: String,
    pub request_timeout_secs: u64,
    pub sensor_retries: u32,
    pub retry_backoff_ms: u64,

    // thresholds (percent)
    pub low_battery_percent: u8,
    pub shutdown_percent: u8,

    // poll cadence
    pub normal_poll_secs: u64,
    pub emergency_poll_secs: u64,

    // countdown
    pub countdown_start_secs: u32,
    pub snooze_secs: u32,
    pub warning_visible_below_secs: u32,

    // host shutdown
    pub os_grace_secs: u32,
    pub dry_run: bool,

    // logging
    pub log_json: bool,
}

impl Default for GuardCfg {
    fn default() -> Self {
        Self {
            sensor_url: "http://192.168.1.186/data".to_owned(),
            request_timeout_secs: 5,
            sensor_retries: 3,
            retry_backoff_ms: 1000,
            low_battery_percent: 20,
            shutdown_percent: 5,
            normal_poll_secs: 60,
            emergency_poll_secs: 5,
            countdown_start_secs: 60,
            snooze_secs: 300,
            warning_visible_below_secs: 60,
            os_grace_secs: 60,
            dry_run: false,
            log_json: false,
        }
    }
}

/// Rejected configuration. Fatal at startup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("shutdown threshold {shutdown}% must be below low-battery threshold {low}%")]
    ThresholdOrder { shutdown: u8, low: u8 },
    #[error("{key} is {value}%, must be at most 100%")]
    PercentOutOfRange { key: &'static str, value: u8 },
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("sensor_url is empty")]
    EmptySensorUrl,
}

/// Immutable protective thresholds handed to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub low_battery_percent: u8,
    pub shutdown_percent: u8,
    pub normal_poll: Duration,
    pub emergency_poll: Duration,
    pub countdown_start_secs: u32,
    pub snooze_secs: u32,
    pub warning_visible_below_secs: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        GuardCfg::default().thresholds()
    }
}

impl GuardCfg {
    /// Load from `POWERGUARD_*` environment variables, falling back to defaults
    /// for anything missing or unparseable.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from arbitrary `(NAME, value)` pairs; only prefixed names count.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let map: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v.trim().to_owned()))
            })
            .collect();
        Self::from_map(&map)
    }

    fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            sensor_url: m.get("sensor_url").cloned().unwrap_or(d.sensor_url),
            request_timeout_secs: get_or(m, "request_timeout_secs", d.request_timeout_secs),
            sensor_retries: get_or(m, "sensor_retries", d.sensor_retries),
            retry_backoff_ms: get_or(m, "retry_backoff_ms", d.retry_backoff_ms),
            low_battery_percent: get_or(m, "low_battery_percent", d.low_battery_percent),
            shutdown_percent: get_or(m, "shutdown_percent", d.shutdown_percent),
            normal_poll_secs: get_or(m, "normal_poll_secs", d.normal_poll_secs),
            emergency_poll_secs: get_or(m, "emergency_poll_secs", d.emergency_poll_secs),
            countdown_start_secs: get_or(m, "countdown_start_secs", d.countdown_start_secs),
            snooze_secs: get_or(m, "snooze_secs", d.snooze_secs),
            warning_visible_below_secs: get_or(m, "warning_visible_below_secs", d.warning_visible_below_secs),
            os_grace_secs: get_or(m, "os_grace_secs", d.os_grace_secs),
            dry_run: get_bool_or(m, "dry_run", d.dry_run),
            log_json: get_bool_or(m, "log_json", d.log_json),
        }
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_url.trim().is_empty() {
            return Err(ConfigError::EmptySensorUrl);
        }
        for (key, value) in [
            ("low_battery_percent", self.low_battery_percent),
            ("shutdown_percent", self.shutdown_percent),
        ] {
            if value > 100 {
                return Err(ConfigError::PercentOutOfRange { key, value });
            }
        }
        if self.shutdown_percent >= self.low_battery_percent {
            return Err(ConfigError::ThresholdOrder {
                shutdown: self.shutdown_percent,
                low: self.low_battery_percent,
            });
        }
        if self.normal_poll_secs == 0 {
            return Err(ConfigError::ZeroInterval("normal_poll_secs"));
        }
        if self.emergency_poll_secs == 0 {
            return Err(ConfigError::ZeroInterval("emergency_poll_secs"));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            low_battery_percent: self.low_battery_percent,
            shutdown_percent: self.shutdown_percent,
            normal_poll: Duration::from_secs(self.normal_poll_secs),
            emergency_poll: Duration::from_secs(self.emergency_poll_secs),
            countdown_start_secs: self.countdown_start_secs,
            snooze_secs: self.snooze_secs,
            warning_visible_below_secs: self.warning_visible_below_secs,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_bool_or(map: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match map.get(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
