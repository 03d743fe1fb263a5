//! Simulation controller: owns the lifecycle of the whole simulation.
//!
//! Construction boots the shared infrastructure in dependency order, creates
//! the initial fleet and starts the runtime command listener. After that an
//! external driver polls [`SimulationController::process_commands`] and
//! [`SimulationController::is_finished`] until it decides to call
//! [`SimulationController::stop`], which tears everything down in reverse and
//! reports the results.

use fleet_events::{AgentKind, Command, CommandChannel, CommandSender};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use tracing::Span;

use crate::boundary::{
    Agent, AgentCredentials, AgentFactory, AgentRuntime, Coordinator, CoordinatorParams,
    ListenerHandle, MessagingBackend, Platform, RouteAgent,
};
use crate::config::SimulationConfig;
use crate::error::{
    BootstrapError, BootstrapStep, ComponentError, ControlError, ScenarioLoadError, ShutdownStep,
    ShutdownStepError,
};
use crate::export::{self, ExportError, ExportFormat};
use crate::report;
use crate::setup;
use crate::stats::{StatsAggregator, StatsSnapshot};
use crate::strategy::StrategySet;

pub const ROUTE_AGENT_NAME: &str = "route";
pub const ROUTE_AGENT_PASSWORD: &str = "route_passwd";

/// Lifecycle of a [`SimulationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Constructing,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Constructing => write!(f, "constructing"),
            ControllerState::Running => write!(f, "running"),
            ControllerState::Stopping => write!(f, "stopping"),
            ControllerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Single authority over simulation lifecycle.
pub struct SimulationController<P: Platform> {
    config: SimulationConfig,
    state: ControllerState,
    span: Span,
    backend: P::Backend,
    runtime: P::Runtime,
    coordinator: P::Coordinator,
    route: P::Route,
    factory: P::Factory,
    listener: Option<P::Listener>,
    channel: CommandChannel,
    stats: StatsAggregator,
    /// Simulation time captured when shutdown began
    frozen_time: Option<f64>,
}

struct Components<P: Platform> {
    backend: P::Backend,
    runtime: P::Runtime,
    coordinator: P::Coordinator,
    route: P::Route,
    factory: P::Factory,
    listener: Option<P::Listener>,
    channel: CommandChannel,
}

impl<P: Platform> SimulationController<P> {
    /// Validates `config` and boots the simulation, logging under a
    /// `simulation` span named after it.
    pub fn new(config: SimulationConfig, platform: P) -> Result<Self, BootstrapError> {
        let span = tracing::info_span!(
            "simulation",
            name = config.simulation_name.as_deref().unwrap_or("unnamed")
        );
        Self::with_span(config, platform, span)
    }

    /// Like [`SimulationController::new`], logging under the given span.
    pub fn with_span(
        config: SimulationConfig,
        mut platform: P,
        span: Span,
    ) -> Result<Self, BootstrapError> {
        config.validate()?;
        let components = span.in_scope(|| bootstrap(&config, &mut platform))?;

        Ok(Self {
            stats: StatsAggregator::new(&config),
            config,
            state: ControllerState::Running,
            span,
            backend: components.backend,
            runtime: components.runtime,
            coordinator: components.coordinator,
            route: components.route,
            factory: components.factory,
            listener: components.listener,
            channel: components.channel,
            frozen_time: None,
        })
    }

    /// Starts the simulation clock. Returns immediately.
    pub fn run(&self) -> Result<(), ControlError> {
        self.ensure_running("run")?;
        let _enter = self.span.enter();
        tracing::info!("Simulation started");
        self.coordinator.run_simulation();
        Ok(())
    }

    /// True once the coordinator reports completion or the configured
    /// `max_time` has been exceeded.
    pub fn is_finished(&self) -> Result<bool, ControlError> {
        self.ensure_running("is_finished")?;
        if self.coordinator.is_simulation_finished() {
            return Ok(true);
        }
        Ok(match self.config.max_time {
            Some(max_time) => self.coordinator.simulation_time() > max_time,
            None => false,
        })
    }

    /// Applies at most one pending command without blocking.
    ///
    /// Returns the applied command, or `None` when the channel was empty. Both
    /// counts are always attempted; the first factory failure is returned.
    pub fn process_commands(&mut self) -> Result<Option<Command>, ControlError> {
        self.ensure_running("process_commands")?;
        let Some(command) = self.channel.try_get() else {
            return Ok(None);
        };

        let span = self.span.clone();
        let _enter = span.enter();
        tracing::info!(
            "Creating {} new taxis and {} new passengers.",
            command.taxis,
            command.passengers
        );

        let mut failure = None;
        for (kind, count) in [
            (AgentKind::Taxi, command.taxis),
            (AgentKind::Passenger, command.passengers),
        ] {
            if count == 0 {
                continue;
            }
            if let Err(source) = self.factory.create_agents_batch(kind, count, &self.coordinator) {
                tracing::error!("Could not create {} {} agents: {}", count, kind, source);
                failure.get_or_insert(source);
            }
        }

        match failure {
            Some(source) => Err(ControlError::FleetGrowth { command, source }),
            None => Ok(Some(command)),
        }
    }

    /// Shuts everything down in reverse bootstrap order and reports results.
    ///
    /// Every step runs even if an earlier one fails; the failures are logged
    /// and returned. Once stopped, further calls return an empty list and do
    /// nothing.
    pub fn stop(&mut self) -> Vec<ShutdownStepError> {
        if matches!(self.state, ControllerState::Stopping | ControllerState::Stopped) {
            return Vec::new();
        }
        let span = self.span.clone();
        let _enter = span.enter();
        self.state = ControllerState::Stopping;

        let simulation_time = self.coordinator.simulation_time();
        self.frozen_time = Some(simulation_time);
        tracing::info!("Terminating... ({:.1} seconds elapsed)", simulation_time);

        let mut errors = Vec::new();

        if let Some(mut listener) = self.listener.take() {
            record(&mut errors, ShutdownStep::CommandListener, listener.terminate());
        }
        record(
            &mut errors,
            ShutdownStep::ParticipantAgents,
            self.coordinator.stop_agents(),
        );

        let snapshot = self.stats.collect(&self.coordinator, simulation_time);
        report::print(snapshot);
        if let Some(output) = &self.config.output {
            let exported = export::write_report(snapshot, &output.path, output.format)
                .map(|()| tracing::info!("Results written to {}", output.path.display()))
                .map_err(|e| ComponentError::failed("report export", e));
            record(&mut errors, ShutdownStep::Report, exported);
        }

        record(&mut errors, ShutdownStep::RouteAgent, self.route.stop());
        record(&mut errors, ShutdownStep::Coordinator, self.coordinator.stop());
        record(&mut errors, ShutdownStep::AgentRuntime, self.runtime.shutdown());
        record(
            &mut errors,
            ShutdownStep::MessagingBackend,
            self.backend.shutdown(),
        );

        self.state = ControllerState::Stopped;
        if errors.is_empty() {
            tracing::info!("Simulation stopped");
        } else {
            tracing::warn!("Simulation stopped with {} failed steps", errors.len());
        }
        errors
    }

    /// Current snapshot, computing one first if none exists.
    pub fn stats(&mut self) -> &StatsSnapshot {
        let simulation_time = self.simulation_time();
        self.stats.snapshot_or_collect(&self.coordinator, simulation_time)
    }

    /// Recomputes the snapshot from the coordinator's current state.
    pub fn collect_stats(&mut self) -> &StatsSnapshot {
        let simulation_time = self.simulation_time();
        self.stats.collect(&self.coordinator, simulation_time)
    }

    pub fn print_stats(&mut self) {
        report::print(self.stats());
    }

    /// Exports the current snapshot, computing one first if none exists.
    pub fn write_file(&mut self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        export::write_report(self.stats(), path, format)
    }

    /// Elapsed simulated seconds, frozen once shutdown has begun.
    pub fn simulation_time(&self) -> f64 {
        self.frozen_time
            .unwrap_or_else(|| self.coordinator.simulation_time())
    }

    /// Producer handle onto the command channel.
    pub fn command_sender(&self) -> CommandSender {
        self.channel.sender()
    }

    pub fn pending_commands(&self) -> usize {
        self.channel.len()
    }

    /// Bound address of the command listener, if it is running.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr())
    }

    pub fn coordinator(&self) -> &P::Coordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), ControlError> {
        if self.state == ControllerState::Running {
            Ok(())
        } else {
            Err(ControlError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl<P: Platform> Drop for SimulationController<P> {
    fn drop(&mut self) {
        if self.state == ControllerState::Running {
            self.span
                .in_scope(|| tracing::warn!("Controller dropped while running, stopping"));
            self.stop();
        }
    }
}

fn record(
    errors: &mut Vec<ShutdownStepError>,
    step: ShutdownStep,
    result: Result<(), ComponentError>,
) {
    if let Err(source) = result {
        tracing::warn!("Could not stop {}: {}", step, source);
        errors.push(ShutdownStepError { step, source });
    }
}

fn fail(step: BootstrapStep, source: ComponentError) -> BootstrapError {
    tracing::error!("Bootstrap failed at {}: {}", step, source);
    BootstrapError::Step { step, source }
}

/// Tears down a partially bootstrapped simulation, most recent first.
fn rollback<P: Platform>(
    route: Option<&mut P::Route>,
    coordinator: Option<&mut P::Coordinator>,
    runtime: Option<&mut P::Runtime>,
    backend: &mut P::Backend,
) {
    if let Some(route) = route {
        if let Err(e) = route.stop() {
            tracing::warn!("Rollback: route agent did not stop: {}", e);
        }
    }
    if let Some(coordinator) = coordinator {
        if let Err(e) = coordinator.stop_agents() {
            tracing::warn!("Rollback: agents did not stop: {}", e);
        }
        if let Err(e) = coordinator.stop() {
            tracing::warn!("Rollback: coordinator did not stop: {}", e);
        }
    }
    if let Some(runtime) = runtime {
        if let Err(e) = runtime.shutdown() {
            tracing::warn!("Rollback: agent runtime did not shut down: {}", e);
        }
    }
    if let Err(e) = backend.shutdown() {
        tracing::warn!("Rollback: messaging backend did not shut down: {}", e);
    }
}

fn bootstrap<P: Platform>(
    config: &SimulationConfig,
    platform: &mut P,
) -> Result<Components<P>, BootstrapError> {
    tracing::info!("Starting taxi simulator {}", config.pretty_name());

    let paths = config.backend_paths();
    setup::ensure_backend_config(&paths, &config.host)
        .map_err(|e| fail(BootstrapStep::BackendConfig, e.into()))?;
    setup::reset_session_db(&paths.session_db, &config.host)
        .map_err(|e| fail(BootstrapStep::SessionDatabase, e.into()))?;

    let mut backend = platform
        .start_messaging(&paths, config.backend_debug())
        .map_err(|e| fail(BootstrapStep::MessagingBackend, e))?;
    tracing::debug!("Messaging backend running");

    let mut runtime = match platform.start_runtime(&backend, &paths) {
        Ok(runtime) => runtime,
        Err(e) => {
            rollback::<P>(None, None, None, &mut backend);
            return Err(fail(BootstrapStep::AgentRuntime, e));
        }
    };
    tracing::debug!("Agent runtime running");

    let params = CoordinatorParams {
        credentials: AgentCredentials::new(
            config.coordinator_name.clone(),
            config.coordinator_password.clone(),
            &config.host,
        ),
        host: config.host.clone(),
        http_port: config.http_port,
        debug: config.agent_debug(),
    };
    let coordinator = platform
        .create_coordinator(params, &runtime, &backend)
        .and_then(|mut coordinator| {
            coordinator.set_strategies(StrategySet::from_config(config));
            coordinator.start().map(|()| coordinator)
        });
    let mut coordinator = match coordinator {
        Ok(coordinator) => coordinator,
        Err(e) => {
            rollback::<P>(None, None, Some(&mut runtime), &mut backend);
            return Err(fail(BootstrapStep::Coordinator, e));
        }
    };
    tracing::info!("Coordinator {} running", config.coordinator_address());

    let credentials = AgentCredentials::new(ROUTE_AGENT_NAME, ROUTE_AGENT_PASSWORD, &config.host);
    let route = platform
        .create_route_agent(credentials, config.agent_debug(), &backend)
        .and_then(|mut route| route.start().map(|()| route));
    let mut route = match route {
        Ok(route) => route,
        Err(e) => {
            rollback::<P>(None, Some(&mut coordinator), Some(&mut runtime), &mut backend);
            return Err(fail(BootstrapStep::RouteAgent, e));
        }
    };
    tracing::debug!("Route agent running");

    let mut factory = platform.agent_factory(&backend);
    tracing::info!(
        "Creating {} taxis and {} passengers.",
        config.num_taxis,
        config.num_passengers
    );
    for (kind, count) in [
        (AgentKind::Taxi, config.num_taxis),
        (AgentKind::Passenger, config.num_passengers),
    ] {
        if count == 0 {
            continue;
        }
        if let Err(e) = factory.create_agents_batch(kind, count, &coordinator) {
            rollback::<P>(
                Some(&mut route),
                Some(&mut coordinator),
                Some(&mut runtime),
                &mut backend,
            );
            return Err(fail(BootstrapStep::InitialFleet, e));
        }
    }

    if let Some(path) = &config.scenario {
        match platform.load_scenario(path, &backend) {
            Ok(scenario) => {
                let total = scenario.len();
                let mut added = 0;
                for mut taxi in scenario.taxis {
                    match start_scenario_agent(&mut taxi) {
                        Ok(()) => {
                            coordinator.add_taxi(taxi);
                            added += 1;
                        }
                        Err(e) => tracing::warn!("{}", e),
                    }
                }
                for mut passenger in scenario.passengers {
                    match start_scenario_agent(&mut passenger) {
                        Ok(()) => {
                            coordinator.add_passenger(passenger);
                            added += 1;
                        }
                        Err(e) => tracing::warn!("{}", e),
                    }
                }
                tracing::info!(
                    "Loaded scenario {}: {} of {} agents added",
                    path.display(),
                    added,
                    total
                );
            }
            Err(e) => tracing::warn!("Scenario skipped: {}", e),
        }
    }

    let channel = CommandChannel::new();
    let listener = match config.listener_addr() {
        Ok(addr) => match platform.start_listener(channel.sender(), addr) {
            Ok(listener) => {
                tracing::info!("Command listener on http://{}", listener.local_addr());
                Some(listener)
            }
            Err(e) => {
                tracing::warn!("Command listener not started, runtime commands disabled: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Command listener not started: {}", e);
            None
        }
    };

    Ok(Components {
        backend,
        runtime,
        coordinator,
        route,
        factory,
        listener,
        channel,
    })
}

fn start_scenario_agent<A: Agent>(agent: &mut A) -> Result<(), ScenarioLoadError> {
    agent.start().map_err(|source| ScenarioLoadError::AgentStart {
        name: agent.name().to_string(),
        source,
    })
}
