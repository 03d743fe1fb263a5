//! Simulation control plane.
//!
//! Boots the messaging backend, agent runtime, coordinator and route agent
//! through a [`Platform`], grows the fleet from runtime [`Command`]s, detects
//! termination and reports the results.
//!
//! [`Command`]: fleet_events::Command

pub mod boundary;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod export;
pub mod logging;
pub mod report;
pub mod setup;
pub mod stats;
pub mod strategy;

pub use boundary::{
    Agent, AgentCredentials, AgentFactory, AgentRuntime, Coordinator, CoordinatorParams,
    ListenerHandle, MessagingBackend, Platform, RouteAgent, Scenario,
};
pub use config::{default_config_toml, ConfigError, OutputConfig, SimulationConfig};
pub use controller::{ControllerState, SimulationController};
pub use driver::{run_until_finished, RunOutcome};
pub use error::{
    BootstrapError, BootstrapStep, ComponentError, ControlError, ScenarioLoadError, ShutdownStep,
    ShutdownStepError,
};
pub use export::{read_json_report, ExportError, ExportFormat, ReportFile};
pub use setup::{ensure_backend_config, reset_session_db, BackendPaths};
pub use stats::{FleetSummary, PassengerRow, StatsAggregator, StatsSnapshot, TaxiRow};
pub use strategy::{
    CoordinatorStrategy, CoordinatorStrategyKind, PassengerStrategy, PassengerStrategyKind,
    StrategySet, TaxiStrategy, TaxiStrategyKind,
};
