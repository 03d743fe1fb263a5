//! Recording fake platform for controller tests.
//!
//! Every collaborator call is appended to a shared journal so tests can assert
//! on ordering. Individual calls can be made to fail.

#![allow(dead_code)]

use fleet_control::{
    Agent, AgentCredentials, AgentFactory, AgentRuntime, BackendPaths, ComponentError, Coordinator,
    CoordinatorParams, ListenerHandle, MessagingBackend, Platform, RouteAgent, Scenario,
    ScenarioLoadError, SimulationConfig, StrategySet,
};
use fleet_events::{
    AgentKind, AggregateStats, CommandSender, PassengerRecord, PassengerStatus, Position,
    TaxiRecord, TaxiStatus,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartMessaging,
    StartRuntime,
    CreateCoordinator,
    SetStrategies,
    StartCoordinator,
    CreateRoute,
    StartRoute,
    Batch(AgentKind, u32),
    LoadScenario,
    StartListener,
    RunSimulation,
    TerminateListener,
    StopAgents,
    StopRoute,
    StopCoordinator,
    ShutdownRuntime,
    ShutdownBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    Messaging,
    Runtime,
    Coordinator,
    Route,
    Batch,
    Scenario,
    Listener,
    TerminateListener,
    StopAgents,
    StopRoute,
    StopCoordinator,
    ShutdownRuntime,
    ShutdownBackend,
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

#[derive(Debug, Clone, Default)]
struct Failures(Arc<HashSet<Failure>>);

impl Failures {
    fn check(&self, failure: Failure, component: &str) -> Result<(), ComponentError> {
        if self.0.contains(&failure) {
            Err(ComponentError::failed(component, "injected failure"))
        } else {
            Ok(())
        }
    }
}

pub struct FakeBackend {
    journal: Journal,
    failures: Failures,
}

impl MessagingBackend for FakeBackend {
    fn shutdown(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::ShutdownBackend);
        self.failures.check(Failure::ShutdownBackend, "messaging backend")
    }
}

pub struct FakeRuntime {
    journal: Journal,
    failures: Failures,
}

impl AgentRuntime for FakeRuntime {
    fn shutdown(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::ShutdownRuntime);
        self.failures.check(Failure::ShutdownRuntime, "agent runtime")
    }
}

pub struct FakeAgent {
    pub name: String,
    pub fail_start: bool,
}

impl FakeAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_start: false,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_start: true,
        }
    }
}

impl Agent for FakeAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), ComponentError> {
        if self.fail_start {
            Err(ComponentError::start(self.name.clone(), "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    time: f64,
    finished: bool,
    running: bool,
    taxis: Vec<String>,
    passengers: Vec<String>,
}

/// Coordinator whose clock and finished flag are set by the test.
pub struct FakeCoordinator {
    journal: Journal,
    failures: Failures,
    state: Mutex<CoordinatorState>,
    pub params: CoordinatorParams,
}

impl FakeCoordinator {
    pub fn set_time(&self, time: f64) {
        self.state.lock().unwrap().time = time;
    }

    pub fn set_finished(&self, finished: bool) {
        self.state.lock().unwrap().finished = finished;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn taxi_names(&self) -> Vec<String> {
        self.state.lock().unwrap().taxis.clone()
    }

    pub fn passenger_names(&self) -> Vec<String> {
        self.state.lock().unwrap().passengers.clone()
    }
}

impl Coordinator for FakeCoordinator {
    type Taxi = FakeAgent;
    type Passenger = FakeAgent;

    fn start(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::StartCoordinator);
        self.failures.check(Failure::Coordinator, "coordinator")
    }

    fn set_strategies(&self, _strategies: StrategySet) {
        self.journal.push(Call::SetStrategies);
    }

    fn add_taxi(&self, taxi: FakeAgent) {
        self.state.lock().unwrap().taxis.push(taxi.name);
    }

    fn add_passenger(&self, passenger: FakeAgent) {
        self.state.lock().unwrap().passengers.push(passenger.name);
    }

    fn run_simulation(&self) {
        self.journal.push(Call::RunSimulation);
        self.state.lock().unwrap().running = true;
    }

    fn simulation_time(&self) -> f64 {
        self.state.lock().unwrap().time
    }

    fn is_simulation_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    fn passenger_stats(&self) -> Vec<PassengerRecord> {
        self.passenger_names()
            .into_iter()
            .map(|name| PassengerRecord {
                address: format!("{name}@127.0.0.1"),
                name,
                status: PassengerStatus::Finished,
                origin: Position::new(0.0, 0.0),
                destination: Position::new(3.0, 4.0),
                position: Position::new(3.0, 4.0),
                waiting_time: Some(2.0),
                total_time: Some(7.0),
            })
            .collect()
    }

    fn taxi_stats(&self) -> Vec<TaxiRecord> {
        self.taxi_names()
            .into_iter()
            .map(|name| TaxiRecord {
                address: format!("{name}@127.0.0.1"),
                name,
                status: TaxiStatus::Free,
                position: Position::default(),
                speed: 2.0,
                assignments: 1,
                distance: 5.0,
            })
            .collect()
    }

    fn stats(&self) -> AggregateStats {
        let finished = self.is_simulation_finished();
        AggregateStats::from_passengers(&self.passenger_stats(), finished)
    }

    fn stop_agents(&self) -> Result<(), ComponentError> {
        self.journal.push(Call::StopAgents);
        self.state.lock().unwrap().running = false;
        self.failures.check(Failure::StopAgents, "participant agents")
    }

    fn stop(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::StopCoordinator);
        self.failures.check(Failure::StopCoordinator, "coordinator")
    }
}

pub struct FakeRoute {
    journal: Journal,
    failures: Failures,
}

impl RouteAgent for FakeRoute {
    fn start(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::StartRoute);
        self.failures.check(Failure::Route, "route agent")
    }

    fn stop(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::StopRoute);
        self.failures.check(Failure::StopRoute, "route agent")
    }
}

pub struct FakeFactory {
    journal: Journal,
    failures: Failures,
    next_id: usize,
}

impl AgentFactory<FakeCoordinator> for FakeFactory {
    fn create_agents_batch(
        &mut self,
        kind: AgentKind,
        count: u32,
        coordinator: &FakeCoordinator,
    ) -> Result<u32, ComponentError> {
        self.journal.push(Call::Batch(kind, count));
        self.failures.check(Failure::Batch, "agent factory")?;
        for _ in 0..count {
            let agent = FakeAgent::new(&format!("{}_{}", kind, self.next_id));
            self.next_id += 1;
            match kind {
                AgentKind::Taxi => coordinator.add_taxi(agent),
                AgentKind::Passenger => coordinator.add_passenger(agent),
            }
        }
        Ok(count)
    }
}

pub struct FakeListener {
    journal: Journal,
    failures: Failures,
    addr: SocketAddr,
    pub sender: CommandSender,
}

impl ListenerHandle for FakeListener {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn terminate(&mut self) -> Result<(), ComponentError> {
        self.journal.push(Call::TerminateListener);
        self.failures.check(Failure::TerminateListener, "command listener")
    }
}

/// A platform whose components only journal what is done to them.
#[derive(Default)]
pub struct RecordingPlatform {
    pub journal: Journal,
    failures: HashSet<Failure>,
    scenario_taxis: Vec<FakeAgent>,
    scenario_passengers: Vec<FakeAgent>,
    pub seen_paths: Option<BackendPaths>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failures.insert(failure);
        self
    }

    pub fn with_scenario(mut self, taxis: Vec<FakeAgent>, passengers: Vec<FakeAgent>) -> Self {
        self.scenario_taxis = taxis;
        self.scenario_passengers = passengers;
        self
    }

    fn failures(&self) -> Failures {
        Failures(Arc::new(self.failures.clone()))
    }
}

impl Platform for RecordingPlatform {
    type Backend = FakeBackend;
    type Runtime = FakeRuntime;
    type Coordinator = FakeCoordinator;
    type Route = FakeRoute;
    type Factory = FakeFactory;
    type Listener = FakeListener;

    fn start_messaging(
        &mut self,
        paths: &BackendPaths,
        _debug: bool,
    ) -> Result<FakeBackend, ComponentError> {
        self.journal.push(Call::StartMessaging);
        self.seen_paths = Some(paths.clone());
        self.failures().check(Failure::Messaging, "messaging backend")?;
        Ok(FakeBackend {
            journal: self.journal.clone(),
            failures: self.failures(),
        })
    }

    fn start_runtime(
        &mut self,
        _backend: &FakeBackend,
        _paths: &BackendPaths,
    ) -> Result<FakeRuntime, ComponentError> {
        self.journal.push(Call::StartRuntime);
        self.failures().check(Failure::Runtime, "agent runtime")?;
        Ok(FakeRuntime {
            journal: self.journal.clone(),
            failures: self.failures(),
        })
    }

    fn create_coordinator(
        &mut self,
        params: CoordinatorParams,
        _runtime: &FakeRuntime,
        _backend: &FakeBackend,
    ) -> Result<FakeCoordinator, ComponentError> {
        self.journal.push(Call::CreateCoordinator);
        Ok(FakeCoordinator {
            journal: self.journal.clone(),
            failures: self.failures(),
            state: Mutex::new(CoordinatorState::default()),
            params,
        })
    }

    fn create_route_agent(
        &mut self,
        _credentials: AgentCredentials,
        _debug: bool,
        _backend: &FakeBackend,
    ) -> Result<FakeRoute, ComponentError> {
        self.journal.push(Call::CreateRoute);
        Ok(FakeRoute {
            journal: self.journal.clone(),
            failures: self.failures(),
        })
    }

    fn agent_factory(&mut self, _backend: &FakeBackend) -> FakeFactory {
        FakeFactory {
            journal: self.journal.clone(),
            failures: self.failures(),
            next_id: 0,
        }
    }

    fn load_scenario(
        &mut self,
        path: &Path,
        _backend: &FakeBackend,
    ) -> Result<Scenario<FakeCoordinator>, ScenarioLoadError> {
        self.journal.push(Call::LoadScenario);
        if self.failures.contains(&Failure::Scenario) {
            return Err(ScenarioLoadError::Parse {
                path: path.to_path_buf(),
                reason: "injected failure".into(),
            });
        }
        Ok(Scenario {
            taxis: std::mem::take(&mut self.scenario_taxis),
            passengers: std::mem::take(&mut self.scenario_passengers),
        })
    }

    fn start_listener(
        &mut self,
        sender: CommandSender,
        addr: SocketAddr,
    ) -> Result<FakeListener, ComponentError> {
        self.journal.push(Call::StartListener);
        self.failures().check(Failure::Listener, "command listener")?;
        Ok(FakeListener {
            journal: self.journal.clone(),
            failures: self.failures(),
            addr,
            sender,
        })
    }
}

/// A valid configuration whose backend files live under `dir`.
pub fn test_config(dir: &Path) -> SimulationConfig {
    SimulationConfig {
        workdir: dir.join("work"),
        http_port: 0,
        backend_port: 0,
        ..SimulationConfig::default()
    }
}

pub fn scenario_path(dir: &Path) -> PathBuf {
    dir.join("scenario.json")
}
