//! Scenario files.
//!
//! A scenario lists specific agents to inject at startup:
//!
//! ```json
//! {
//!   "taxis": [{ "name": "t1", "position": [10.0, 20.0], "speed": 12.0 }],
//!   "passengers": [{ "name": "p1", "position": [0.0, 0.0], "destination": [50.0, 50.0] }]
//! }
//! ```

use fleet_control::{AgentCredentials, Scenario, ScenarioLoadError};
use fleet_events::Position;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::agents::{PassengerAgent, TaxiAgent, DEFAULT_TAXI_SPEED};
use crate::coordinator::LocalCoordinator;
use crate::messaging::MessagingHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiSpec {
    pub name: String,
    pub position: Position,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerSpec {
    pub name: String,
    pub position: Position,
    pub destination: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_speed() -> f64 {
    DEFAULT_TAXI_SPEED
}

/// Parsed contents of a scenario file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub taxis: Vec<TaxiSpec>,
    #[serde(default)]
    pub passengers: Vec<PassengerSpec>,
}

impl ScenarioFile {
    pub fn from_file(path: &Path) -> Result<Self, ScenarioLoadError> {
        let content = fs::read_to_string(path).map_err(|source| ScenarioLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| ScenarioLoadError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Builds the agents. They are not started.
    pub fn into_agents(self, messaging: &MessagingHandle) -> Scenario<LocalCoordinator> {
        let credentials = |name: String, password: Option<String>| {
            let password = password.unwrap_or_else(|| Uuid::new_v4().to_string());
            AgentCredentials::new(name, password, messaging.host())
        };

        let taxis = self
            .taxis
            .into_iter()
            .map(|t| {
                TaxiAgent::new(
                    credentials(t.name, t.password),
                    messaging.clone(),
                    t.position,
                    t.speed,
                )
            })
            .collect();
        let passengers = self
            .passengers
            .into_iter()
            .map(|p| {
                PassengerAgent::new(
                    credentials(p.name, p.password),
                    messaging.clone(),
                    p.position,
                    p.destination,
                )
            })
            .collect();

        Scenario { taxis, passengers }
    }
}

/// Reads `path` and builds its agents.
pub fn load(
    path: &Path,
    messaging: &MessagingHandle,
) -> Result<Scenario<LocalCoordinator>, ScenarioLoadError> {
    let file = ScenarioFile::from_file(path)?;
    tracing::debug!(
        "Scenario {}: {} taxis, {} passengers",
        path.display(),
        file.taxis.len(),
        file.passengers.len()
    );
    Ok(file.into_agents(messaging))
}
