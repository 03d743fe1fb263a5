//! Simulation configuration.
//!
//! A [`SimulationConfig`] is loaded from a TOML file (every field optional),
//! possibly overridden from the command line, validated once, and then handed
//! to the controller, which owns it unchanged for the whole run.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::export::ExportFormat;
use crate::setup::BackendPaths;
use crate::strategy::{CoordinatorStrategyKind, PassengerStrategyKind, TaxiStrategyKind};

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Name shown in logs and in the results table
    pub simulation_name: Option<String>,
    /// Upper bound on simulated seconds
    pub max_time: Option<f64>,
    pub coordinator_strategy: CoordinatorStrategyKind,
    pub taxi_strategy: TaxiStrategyKind,
    pub passenger_strategy: PassengerStrategyKind,
    /// Optional file of pre-built agents to inject at startup
    pub scenario: Option<PathBuf>,
    /// Size of the initial random taxi batch
    pub num_taxis: u32,
    /// Size of the initial random passenger batch
    pub num_passengers: u32,
    /// Host every agent address and listener binds to
    pub host: String,
    /// Port of the coordinator's own command surface
    pub http_port: u16,
    /// Port of the runtime command listener
    pub backend_port: u16,
    pub coordinator_name: String,
    pub coordinator_password: String,
    /// 0 = info, 1 = debug, 2+ = trace; >1 enables agent debug, >2 backend debug
    pub verbose: u8,
    /// Directory holding the messaging/runtime artifacts and the session database
    pub workdir: PathBuf,
    /// Driver poll cadence
    pub poll_interval_ms: u64,
    /// Seed for the agent factory RNG
    pub seed: Option<u64>,
    /// Results file written on stop
    pub output: Option<OutputConfig>,
}

/// Where and how the final report is exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: ExportFormat,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation_name: None,
            max_time: None,
            coordinator_strategy: CoordinatorStrategyKind::default(),
            taxi_strategy: TaxiStrategyKind::default(),
            passenger_strategy: PassengerStrategyKind::default(),
            scenario: None,
            num_taxis: 0,
            num_passengers: 0,
            host: "127.0.0.1".to_string(),
            http_port: 9000,
            backend_port: 5000,
            coordinator_name: "coordinator".to_string(),
            coordinator_password: "coordinator_passwd".to_string(),
            verbose: 0,
            workdir: PathBuf::from(".taxi_sim"),
            poll_interval_ms: 100,
            seed: None,
            output: None,
        }
    }
}

impl SimulationConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the values the bootstrap sequence relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "host must be an IP address, got {:?}",
                self.host
            )));
        }
        if self.coordinator_name.is_empty() || self.coordinator_name.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "invalid coordinator name {:?}",
                self.coordinator_name
            )));
        }
        if let Some(max_time) = self.max_time {
            if !max_time.is_finite() || max_time <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "max_time must be a positive number of seconds, got {max_time}"
                )));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.http_port != 0 && self.http_port == self.backend_port {
            return Err(ConfigError::Invalid(format!(
                "http_port and backend_port are both {}",
                self.http_port
            )));
        }
        Ok(())
    }

    /// `"(name)"` when a simulation name is set, empty otherwise.
    pub fn pretty_name(&self) -> String {
        self.simulation_name
            .as_ref()
            .map(|name| format!("({name})"))
            .unwrap_or_default()
    }

    /// Agent address on the configured host.
    pub fn address_of(&self, name: &str) -> String {
        format!("{}@{}", name, self.host)
    }

    pub fn coordinator_address(&self) -> String {
        self.address_of(&self.coordinator_name)
    }

    /// Whether the coordinator and route agents run with debug output.
    pub fn agent_debug(&self) -> bool {
        self.verbose > 1
    }

    /// Whether the messaging backend runs with debug output.
    pub fn backend_debug(&self) -> bool {
        self.verbose > 2
    }

    pub fn backend_paths(&self) -> BackendPaths {
        BackendPaths::in_dir(&self.workdir)
    }

    /// Bind address of the runtime command listener.
    pub fn listener_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid host {:?}", self.host)))?;
        Ok(SocketAddr::new(ip, self.backend_port))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Generates a commented default configuration file.
pub fn default_config_toml() -> String {
    r#"# Taxi simulation configuration

# simulation_name = "rush_hour"
# max_time = 300.0
# scenario = "config/scenario.json"

num_taxis = 5
num_passengers = 20

coordinator_strategy = "delegate_request"
taxi_strategy = "accept_always"
passenger_strategy = "accept_first"

host = "127.0.0.1"
http_port = 9000
backend_port = 5000
coordinator_name = "coordinator"
coordinator_password = "coordinator_passwd"

verbose = 0
workdir = ".taxi_sim"
poll_interval_ms = 100

# [output]
# path = "results.json"
# format = "json"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.backend_port, 5000);
        assert_eq!(config.coordinator_name, "coordinator");
        assert!(config.max_time.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_from_toml() {
        let toml = r#"
            simulation_name = "morning"
            max_time = 120.0
            num_taxis = 3
            num_passengers = 5
            passenger_strategy = "accept_fastest"

            [output]
            path = "out.xlsx"
            format = "excel"
        "#;

        let config = SimulationConfig::from_str(toml).unwrap();

        assert_eq!(config.simulation_name.as_deref(), Some("morning"));
        assert_eq!(config.max_time, Some(120.0));
        assert_eq!(config.num_taxis, 3);
        assert_eq!(config.num_passengers, 5);
        assert_eq!(config.passenger_strategy, PassengerStrategyKind::AcceptFastest);
        let output = config.output.unwrap();
        assert_eq!(output.path, PathBuf::from("out.xlsx"));
        assert_eq!(output.format, ExportFormat::Excel);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = SimulationConfig::from_str("num_taxis = 7").unwrap();

        assert_eq!(config.num_taxis, 7);
        assert_eq!(config.num_passengers, 0);
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = SimulationConfig::from_str(&default_config_toml()).unwrap();

        assert_eq!(config.num_taxis, 5);
        assert_eq!(config.num_passengers, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SimulationConfig {
            simulation_name: Some("roundtrip".into()),
            max_time: Some(60.0),
            output: Some(OutputConfig {
                path: PathBuf::from("res.json"),
                format: ExportFormat::Json,
            }),
            ..SimulationConfig::default()
        };
        let toml = config.to_toml().unwrap();
        let parsed = SimulationConfig::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_host = SimulationConfig {
            host: "".into(),
            ..SimulationConfig::default()
        };
        assert!(matches!(bad_host.validate(), Err(ConfigError::Invalid(_))));

        let named_host = SimulationConfig {
            host: "localhost".into(),
            ..SimulationConfig::default()
        };
        assert!(named_host.validate().is_err());

        let negative_time = SimulationConfig {
            max_time: Some(-1.0),
            ..SimulationConfig::default()
        };
        assert!(negative_time.validate().is_err());

        let same_ports = SimulationConfig {
            http_port: 7000,
            backend_port: 7000,
            ..SimulationConfig::default()
        };
        assert!(same_ports.validate().is_err());

        let ephemeral_ports = SimulationConfig {
            http_port: 0,
            backend_port: 0,
            ..SimulationConfig::default()
        };
        assert!(ephemeral_ports.validate().is_ok());
    }

    #[test]
    fn test_derived_values() {
        let config = SimulationConfig {
            simulation_name: Some("demo".into()),
            verbose: 2,
            ..SimulationConfig::default()
        };

        assert_eq!(config.pretty_name(), "(demo)");
        assert_eq!(config.coordinator_address(), "coordinator@127.0.0.1");
        assert!(config.agent_debug());
        assert!(!config.backend_debug());
        assert_eq!(
            config.listener_addr().unwrap(),
            "127.0.0.1:5000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(SimulationConfig::default().pretty_name(), "");
    }
}
