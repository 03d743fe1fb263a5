//! Interfaces of the external collaborators the controller drives.
//!
//! The controller never knows how the messaging backend, the agent runtime or
//! the agents themselves are implemented. A [`Platform`] produces each of them
//! during bootstrap, and the controller only calls the operations below.

use fleet_events::{AgentKind, AggregateStats, CommandSender, PassengerRecord, TaxiRecord};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{ComponentError, ScenarioLoadError};
use crate::setup::BackendPaths;
use crate::strategy::StrategySet;

/// Identity of an agent on the messaging backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCredentials {
    pub name: String,
    pub password: String,
    /// `name@host`
    pub address: String,
}

impl AgentCredentials {
    pub fn new(name: impl Into<String>, password: impl Into<String>, host: &str) -> Self {
        let name = name.into();
        let address = format!("{name}@{host}");
        Self {
            name,
            password: password.into(),
            address,
        }
    }
}

/// Construction parameters of the coordinator agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorParams {
    pub credentials: AgentCredentials,
    pub host: String,
    /// Port of the coordinator's own command surface
    pub http_port: u16,
    pub debug: bool,
}

/// A participant agent (taxi or passenger) before it is handed to the coordinator.
pub trait Agent: Send {
    fn name(&self) -> &str;

    /// Registers presence and starts the agent's behaviour.
    fn start(&mut self) -> Result<(), ComponentError>;
}

/// The presence and message routing service.
pub trait MessagingBackend {
    fn shutdown(&mut self) -> Result<(), ComponentError>;
}

/// The host that schedules agent behaviours.
pub trait AgentRuntime {
    fn shutdown(&mut self) -> Result<(), ComponentError>;
}

/// The authority that owns every participant agent and simulated time.
///
/// All queries take `&self`: the coordinator's registry is mutated only by the
/// coordinator itself.
pub trait Coordinator {
    type Taxi: Agent;
    type Passenger: Agent;

    fn start(&mut self) -> Result<(), ComponentError>;

    fn set_strategies(&self, strategies: StrategySet);

    fn add_taxi(&self, taxi: Self::Taxi);

    fn add_passenger(&self, passenger: Self::Passenger);

    /// Starts the simulation clock.
    fn run_simulation(&self);

    /// Elapsed simulated seconds.
    fn simulation_time(&self) -> f64;

    fn is_simulation_finished(&self) -> bool;

    fn passenger_stats(&self) -> Vec<PassengerRecord>;

    fn taxi_stats(&self) -> Vec<TaxiRecord>;

    fn stats(&self) -> AggregateStats;

    /// Stops every participant agent. The simulation clock stops with them.
    fn stop_agents(&self) -> Result<(), ComponentError>;

    fn stop(&mut self) -> Result<(), ComponentError>;
}

pub trait RouteAgent {
    fn start(&mut self) -> Result<(), ComponentError>;

    fn stop(&mut self) -> Result<(), ComponentError>;
}

/// Creates participant agents in bulk.
pub trait AgentFactory<C: Coordinator> {
    /// Creates `count` agents of `kind`, starts them and registers them with
    /// `coordinator`. Returns how many were registered.
    fn create_agents_batch(
        &mut self,
        kind: AgentKind,
        count: u32,
        coordinator: &C,
    ) -> Result<u32, ComponentError>;
}

/// A running runtime command listener.
pub trait ListenerHandle {
    fn local_addr(&self) -> SocketAddr;

    /// Stops accepting requests. Calling it again does nothing.
    fn terminate(&mut self) -> Result<(), ComponentError>;
}

/// Pre-built agents read from a scenario file, not yet started.
pub struct Scenario<C: Coordinator> {
    pub taxis: Vec<C::Taxi>,
    pub passengers: Vec<C::Passenger>,
}

impl<C: Coordinator> Scenario<C> {
    pub fn len(&self) -> usize {
        self.taxis.len() + self.passengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Coordinator> Default for Scenario<C> {
    fn default() -> Self {
        Self {
            taxis: Vec::new(),
            passengers: Vec::new(),
        }
    }
}

/// Everything the controller needs to bring a simulation up.
///
/// Each method produces one live component; the controller calls them in
/// bootstrap order and tears the results down in reverse.
pub trait Platform {
    type Backend: MessagingBackend;
    type Runtime: AgentRuntime;
    type Coordinator: Coordinator;
    type Route: RouteAgent;
    type Factory: AgentFactory<Self::Coordinator>;
    type Listener: ListenerHandle;

    fn start_messaging(
        &mut self,
        paths: &BackendPaths,
        debug: bool,
    ) -> Result<Self::Backend, ComponentError>;

    fn start_runtime(
        &mut self,
        backend: &Self::Backend,
        paths: &BackendPaths,
    ) -> Result<Self::Runtime, ComponentError>;

    /// Builds the coordinator. The controller starts it.
    fn create_coordinator(
        &mut self,
        params: CoordinatorParams,
        runtime: &Self::Runtime,
        backend: &Self::Backend,
    ) -> Result<Self::Coordinator, ComponentError>;

    /// Builds the route agent. The controller starts it.
    fn create_route_agent(
        &mut self,
        credentials: AgentCredentials,
        debug: bool,
        backend: &Self::Backend,
    ) -> Result<Self::Route, ComponentError>;

    fn agent_factory(&mut self, backend: &Self::Backend) -> Self::Factory;

    fn load_scenario(
        &mut self,
        path: &Path,
        backend: &Self::Backend,
    ) -> Result<Scenario<Self::Coordinator>, ScenarioLoadError>;

    fn start_listener(
        &mut self,
        sender: CommandSender,
        addr: SocketAddr,
    ) -> Result<Self::Listener, ComponentError>;
}
