//! Optional configuration file – `~/.objctl/config.toml`.
//!
//! Every key has a default, and the defaults reproduce the stock setup, so
//! the file only needs the keys being changed.

use std::fs;
use std::path::{Path, PathBuf};

use objctl_core::{ControllerConfig, ObjectSpec};
use objctl_middleware::RosbridgeTopics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where poses and messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// rosbridge websocket to the simulator.
    #[default]
    Rosbridge,
    /// In-process bus; nothing leaves the process.
    Loopback,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Rosbridge => write!(f, "rosbridge"),
            TransportKind::Loopback => write!(f, "loopback"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rosbridge" => Ok(TransportKind::Rosbridge),
            "loopback" => Ok(TransportKind::Loopback),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportKind,

    /// rosbridge websocket endpoint.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    #[serde(default = "default_transform_topic")]
    pub transform_topic: String,

    #[serde(default = "default_outbound_topic")]
    pub outbound_topic: String,

    #[serde(default = "default_inbound_topic")]
    pub inbound_topic: String,

    /// Controller iterations per second.
    #[serde(default = "default_loop_rate_hz")]
    pub loop_rate_hz: f64,

    /// Seconds between pose publishes for each tracked object.
    #[serde(default = "default_timer_period_secs")]
    pub timer_period_secs: f64,

    /// Send the heading as an orientation instead of leaving it to the
    /// simulator.
    #[serde(default)]
    pub publish_orientation: bool,

    /// Objects put on a circular schedule at startup.
    #[serde(default = "default_objects")]
    pub objects: Vec<ObjectSpec>,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_transform_topic() -> String {
    RosbridgeTopics::default().transform
}
fn default_outbound_topic() -> String {
    RosbridgeTopics::default().outbound
}
fn default_inbound_topic() -> String {
    RosbridgeTopics::default().inbound
}
fn default_loop_rate_hz() -> f64 {
    ControllerConfig::default().loop_rate_hz
}
fn default_timer_period_secs() -> f64 {
    ControllerConfig::default().timer_period_secs
}
fn default_objects() -> Vec<ObjectSpec> {
    ControllerConfig::default().objects
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            rosbridge_url: default_rosbridge_url(),
            transform_topic: default_transform_topic(),
            outbound_topic: default_outbound_topic(),
            inbound_topic: default_inbound_topic(),
            loop_rate_hz: default_loop_rate_hz(),
            timer_period_secs: default_timer_period_secs(),
            publish_orientation: false,
            objects: default_objects(),
        }
    }
}

impl Config {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            loop_rate_hz: self.loop_rate_hz,
            timer_period_secs: self.timer_period_secs,
            publish_orientation: self.publish_orientation,
            objects: self.objects.clone(),
        }
    }

    pub fn topics(&self) -> RosbridgeTopics {
        RosbridgeTopics {
            transform: self.transform_topic.clone(),
            outbound: self.outbound_topic.clone(),
            inbound: self.inbound_topic.clone(),
        }
    }
}

/// `$OBJCTL_CONFIG`, or `~/.objctl/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("OBJCTL_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".objctl").join("config.toml")
}

/// Load the config from [`config_path`].  Returns `None` if the file does not
/// exist.
pub fn load() -> Result<Option<Config>, ConfigError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(toml::from_str(&raw)?))
}

/// Apply `OBJCTL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `OBJCTL_TRANSPORT` | `transport` |
/// | `OBJCTL_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `OBJCTL_LOOP_RATE_HZ` | `loop_rate_hz` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("OBJCTL_TRANSPORT")
        && let Ok(kind) = v.parse::<TransportKind>()
    {
        cfg.transport = kind;
    }
    if let Ok(v) = std::env::var("OBJCTL_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("OBJCTL_LOOP_RATE_HZ")
        && let Ok(hz) = v.parse::<f64>()
    {
        cfg.loop_rate_hz = hz;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = load_from(&write(&dir, "")).expect("load").expect("some");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.controller_config(), ControllerConfig::default());
        assert_eq!(cfg.topics(), RosbridgeTopics::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let body = r#"
transport = "loopback"
publish_orientation = true

[[objects]]
name = "bear_doll"
angular_speed = 1.5
"#;
        let cfg = load_from(&write(&dir, body)).expect("load").expect("some");
        assert_eq!(cfg.transport, TransportKind::Loopback);
        assert!(cfg.publish_orientation);
        assert_eq!(cfg.objects, vec![ObjectSpec::new("bear_doll", 1.5)]);
        assert_eq!(cfg.loop_rate_hz, 50.0);
        assert_eq!(cfg.rosbridge_url, "ws://localhost:9090");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&write(&dir, "transport = 42"));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn config_path_points_to_objctl_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".objctl"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("Loopback".parse::<TransportKind>(), Ok(TransportKind::Loopback));
        assert_eq!("rosbridge".parse::<TransportKind>(), Ok(TransportKind::Rosbridge));
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    // All env-var cases share one test so they cannot race each other.
    #[test]
    fn apply_env_overrides_reads_objctl_vars() {
        // SAFETY: no other test in this crate touches OBJCTL_* variables.
        unsafe {
            std::env::set_var("OBJCTL_TRANSPORT", "loopback");
            std::env::set_var("OBJCTL_ROSBRIDGE_URL", "ws://sim-host:9090");
            std::env::set_var("OBJCTL_LOOP_RATE_HZ", "not-a-number");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.transport, TransportKind::Loopback);
        assert_eq!(cfg.rosbridge_url, "ws://sim-host:9090");
        assert_eq!(cfg.loop_rate_hz, 50.0);

        unsafe { std::env::set_var("OBJCTL_LOOP_RATE_HZ", "100") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.loop_rate_hz, 100.0);

        unsafe {
            std::env::remove_var("OBJCTL_TRANSPORT");
            std::env::remove_var("OBJCTL_ROSBRIDGE_URL");
            std::env::remove_var("OBJCTL_LOOP_RATE_HZ");
        }
    }
}
