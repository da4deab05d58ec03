//! Load config from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nus_core::LinkConfig;

/// Daemon configuration. File: ~/.config/nus/config.toml or /etc/nus/config.toml.
/// Env overrides: NUS_LISTEN_PORT, NUS_ADVERTISING_PORT, NUS_ADVERTISING_INTERVAL_MS,
/// NUS_ADDRESS (hex), NUS_MAX_MTU, NUS_NOTIFY_QUEUE, NUS_TICK_MS, NUS_IDLE_TIMEOUT_SECS,
/// NUS_RETRY_DELAY_US.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// TCP port a client connects to in place of a BLE connection.
    pub listen_port: u16,
    /// UDP multicast port carrying advertisements.
    pub advertising_port: u16,
    pub advertising_interval_ms: u64,
    /// Low 16 bits of the device address; random when unset.
    pub address: Option<u16>,
    /// Largest ATT MTU offered to clients.
    pub max_mtu: u16,
    /// Notifications the radio can hold before reporting congestion.
    pub notify_queue: usize,
    /// Upper bound on how long the console sleeps between checks.
    pub tick_ms: u64,
    /// Disconnect a client silent for this long. 0 disables.
    pub idle_timeout_secs: u64,
    /// Pause between notification attempts while the radio is congested.
    pub retry_delay_us: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 45680,
            advertising_port: 45681,
            advertising_interval_ms: 1000,
            address: None,
            max_mtu: nus_core::MAX_ATT_MTU,
            notify_queue: 1,
            tick_ms: 10,
            idle_timeout_secs: 300,
            retry_delay_us: 100,
        }
    }
}

impl Config {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            max_mtu: self.max_mtu,
            retry_delay: Duration::from_micros(self.retry_delay_us),
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn advertising_interval(&self) -> Duration {
        Duration::from_millis(self.advertising_interval_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Result<Config, ConfigError> {
    let mut c = match config_paths().into_iter().find(|p| p.exists()) {
        Some(path) => load_file(&path)?,
        None => Config::default(),
    };
    apply_env(&mut c, |var| std::env::var(var).ok())?;
    Ok(c)
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/nus/config.toml"));
    }
    out.push(PathBuf::from("/etc/nus/config.toml"));
    out
}

fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&s).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn apply_env(c: &mut Config, get: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
    if let Some(s) = get("NUS_LISTEN_PORT") {
        c.listen_port = parse_env("NUS_LISTEN_PORT", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_ADVERTISING_PORT") {
        c.advertising_port = parse_env("NUS_ADVERTISING_PORT", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_ADVERTISING_INTERVAL_MS") {
        c.advertising_interval_ms =
            parse_env("NUS_ADVERTISING_INTERVAL_MS", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_ADDRESS") {
        let addr = parse_env("NUS_ADDRESS", s, |v| {
            u16::from_str_radix(v.trim_start_matches("0x"), 16).ok()
        })?;
        c.address = Some(addr);
    }
    if let Some(s) = get("NUS_MAX_MTU") {
        c.max_mtu = parse_env("NUS_MAX_MTU", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_NOTIFY_QUEUE") {
        c.notify_queue = parse_env("NUS_NOTIFY_QUEUE", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_TICK_MS") {
        c.tick_ms = parse_env("NUS_TICK_MS", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_IDLE_TIMEOUT_SECS") {
        c.idle_timeout_secs = parse_env("NUS_IDLE_TIMEOUT_SECS", s, |v| v.parse().ok())?;
    }
    if let Some(s) = get("NUS_RETRY_DELAY_US") {
        c.retry_delay_us = parse_env("NUS_RETRY_DELAY_US", s, |v| v.parse().ok())?;
    }
    Ok(())
}

fn parse_env<T>(
    var: &'static str,
    value: String,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    parse(value.trim()).ok_or(ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c: Config = toml::from_str("listen_port = 5000\nnotify_queue = 4\n").unwrap();
        assert_eq!(c.listen_port, 5000);
        assert_eq!(c.notify_queue, 4);
        assert_eq!(c.advertising_port, Config::default().advertising_port);
        assert_eq!(c.address, None);
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(toml::from_str::<Config>("proxy_port = 3128\n").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut c = Config::default();
        apply_env(
            &mut c,
            env(&[("NUS_LISTEN_PORT", "6000"), ("NUS_ADDRESS", "0xBEEF")]),
        )
        .unwrap();
        assert_eq!(c.listen_port, 6000);
        assert_eq!(c.address, Some(0xBEEF));
    }

    #[test]
    fn env_overrides_retry_delay() {
        let mut c = Config::default();
        apply_env(&mut c, env(&[("NUS_RETRY_DELAY_US", "500")])).unwrap();
        assert_eq!(c.retry_delay_us, 500);
        assert_eq!(c.link_config().retry_delay, Duration::from_micros(500));
    }

    #[test]
    fn bad_env_value_is_error() {
        let mut c = Config::default();
        let err = apply_env(&mut c, env(&[("NUS_MAX_MTU", "big")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "NUS_MAX_MTU", .. }));
    }

    #[test]
    fn link_config_and_durations() {
        let c = Config {
            idle_timeout_secs: 0,
            retry_delay_us: 250,
            ..Config::default()
        };
        assert_eq!(c.idle_timeout(), None);
        assert_eq!(c.link_config().retry_delay, Duration::from_micros(250));
        assert_eq!(c.link_config().max_mtu, 128);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_file(Path::new("/nonexistent/nus/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
