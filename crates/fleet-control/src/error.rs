//! Control plane error taxonomy.

use fleet_events::Command;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure reported by any external collaborator (backend, runtime, agent).
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("{component} failed to start: {reason}")]
    Start { component: String, reason: String },
    #[error("{component} failed to stop: {reason}")]
    Stop { component: String, reason: String },
    #[error("{component} is unreachable")]
    Unreachable { component: String },
    #[error("{component}: {reason}")]
    Failed { component: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComponentError {
    pub fn start(component: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Start {
            component: component.into(),
            reason: reason.to_string(),
        }
    }

    pub fn stop(component: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Stop {
            component: component.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unreachable(component: impl Into<String>) -> Self {
        Self::Unreachable {
            component: component.into(),
        }
    }

    pub fn failed(component: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Failed {
            component: component.into(),
            reason: reason.to_string(),
        }
    }
}

/// Mandatory bootstrap steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    BackendConfig,
    SessionDatabase,
    MessagingBackend,
    AgentRuntime,
    Coordinator,
    RouteAgent,
    InitialFleet,
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStep::BackendConfig => "backend configuration",
            BootstrapStep::SessionDatabase => "session database reset",
            BootstrapStep::MessagingBackend => "messaging backend",
            BootstrapStep::AgentRuntime => "agent runtime",
            BootstrapStep::Coordinator => "coordinator agent",
            BootstrapStep::RouteAgent => "route agent",
            BootstrapStep::InitialFleet => "initial fleet",
        };
        f.write_str(name)
    }
}

/// Controller construction failed; nothing is left running.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("bootstrap failed at {step}: {source}")]
    Step {
        step: BootstrapStep,
        #[source]
        source: ComponentError,
    },
}

impl BootstrapError {
    /// The step that failed, if the failure happened after validation.
    pub fn step(&self) -> Option<BootstrapStep> {
        match self {
            BootstrapError::InvalidConfig(_) => None,
            BootstrapError::Step { step, .. } => Some(*step),
        }
    }
}

/// Failure loading an optional scenario. Logged; the simulation continues.
#[derive(Debug, Error)]
pub enum ScenarioLoadError {
    #[error("cannot read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse scenario {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("scenario agent {name} failed to start: {source}")]
    AgentStart {
        name: String,
        #[source]
        source: ComponentError,
    },
}

/// Teardown steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownStep {
    CommandListener,
    ParticipantAgents,
    Report,
    RouteAgent,
    Coordinator,
    AgentRuntime,
    MessagingBackend,
}

impl fmt::Display for ShutdownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownStep::CommandListener => "command listener",
            ShutdownStep::ParticipantAgents => "participant agents",
            ShutdownStep::Report => "final report",
            ShutdownStep::RouteAgent => "route agent",
            ShutdownStep::Coordinator => "coordinator agent",
            ShutdownStep::AgentRuntime => "agent runtime",
            ShutdownStep::MessagingBackend => "messaging backend",
        };
        f.write_str(name)
    }
}

/// One failed teardown step. `stop()` keeps going and returns all of these.
#[derive(Debug, Error)]
#[error("shutdown step {step} failed: {source}")]
pub struct ShutdownStepError {
    pub step: ShutdownStep,
    #[source]
    pub source: ComponentError,
}

/// Errors from controller operations after construction.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{operation} is not valid while the controller is {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::controller::ControllerState,
    },
    #[error("applying `{command}` failed: {source}")]
    FleetGrowth {
        command: Command,
        #[source]
        source: ComponentError,
    },
}
