use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub redpanda: RedpandaConfig,
    pub database: DbConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    pub brokers: String,
    /// Topic carrying new-telemetry notifications
    pub topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Offset reset strategy: "earliest", "latest", or "none"
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
}

fn default_group_id() -> String {
    "power-monitor".into()
}

fn default_auto_offset_reset() -> String {
    "latest".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Meter/user whose telemetry is monitored
    pub subject: String,
    /// Readings fetched per identification pass
    #[serde(default = "default_identification_window")]
    pub identification_window: usize,
    /// Readings fetched per anomaly pass
    #[serde(default = "default_anomaly_window")]
    pub anomaly_window: usize,
    #[serde(default = "default_max_reading_age_secs")]
    pub max_reading_age_secs: i64,
    /// Below this real power the meter is considered idle
    #[serde(default = "default_min_active_power_w")]
    pub min_active_power_w: f64,
}

fn default_identification_window() -> usize {
    7
}
fn default_anomaly_window() -> usize {
    20
}
fn default_max_reading_age_secs() -> i64 {
    60
}
fn default_min_active_power_w() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_threshold_secs() -> u64 {
    20
}
fn default_check_interval_secs() -> u64 {
    10
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            threshold_secs: default_threshold_secs(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    #[serde(default = "default_toggle_threshold")]
    pub toggle_threshold: usize,
    /// Clear a device's alert latch after this many consecutive stable
    /// verdicts. Unset means the latch is never cleared.
    #[serde(default)]
    pub latch_reset_after: Option<usize>,
}

fn default_capacity() -> usize {
    10
}
fn default_min_observations() -> usize {
    6
}
fn default_toggle_threshold() -> usize {
    4
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            min_observations: default_min_observations(),
            toggle_threshold: default_toggle_threshold(),
            latch_reset_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
}

fn default_devices() -> Vec<DeviceConfig> {
    ["Bulb 7W", "Bulb 12W", "Bulb 15W"]
        .into_iter()
        .map(|name| DeviceConfig { name: name.into() })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub classifier: EndpointConfig,
    pub anomaly: AnomalyModelConfig,
    /// Energy regressor behind `POST /api/v1/predict/energy`. Unset answers 503.
    #[serde(default)]
    pub energy: Option<EndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnomalyModelConfig {
    Http(EndpointConfig),
    Frequency {
        #[serde(default = "default_alert_threshold")]
        alert_threshold: f64,
        #[serde(default = "default_bucket_width")]
        bucket_width: f64,
    },
}

fn default_alert_threshold() -> f64 {
    0.005
}
fn default_bucket_width() -> f64 {
    0.1
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Afterwards, if DATABASE_URL env is set, override `database.url`.
    /// If REDPANDA_BROKERS env is set, override `redpanda.brokers`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }
        if let Ok(brokers) = std::env::var("REDPANDA_BROKERS") {
            cfg.redpanda.brokers = brokers;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(
            !self.monitor.subject.is_empty(),
            "monitor.subject must not be empty"
        );
        anyhow::ensure!(
            !self.devices.is_empty(),
            "config must include at least one device"
        );
        anyhow::ensure!(
            self.monitor.identification_window >= 1 && self.monitor.anomaly_window >= 1,
            "window sizes must be at least 1"
        );
        anyhow::ensure!(
            self.debounce.capacity >= 2,
            "debounce.capacity must be at least 2"
        );
        anyhow::ensure!(
            self.debounce.min_observations <= self.debounce.capacity,
            "debounce.min_observations ({}) exceeds debounce.capacity ({})",
            self.debounce.min_observations,
            self.debounce.capacity
        );
        anyhow::ensure!(
            self.heartbeat.threshold_secs > 0 && self.heartbeat.check_interval_secs > 0,
            "heartbeat threshold and check interval must be positive"
        );
        if self.heartbeat.threshold_secs <= self.heartbeat.check_interval_secs {
            warn!(
                threshold_secs = self.heartbeat.threshold_secs,
                check_interval_secs = self.heartbeat.check_interval_secs,
                "heartbeat threshold should exceed the check interval"
            );
        }
        if let AnomalyModelConfig::Frequency { bucket_width, .. } = &self.models.anomaly {
            anyhow::ensure!(
                *bucket_width > 0.0,
                "models.anomaly.bucket_width must be positive"
            );
        }
        Ok(())
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    pub fn api_bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$".
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until we hit `end`, consuming the delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
