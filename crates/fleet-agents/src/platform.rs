//! The in-process platform wired into the controller.

use command_listener::CommandListener;
use fleet_control::{
    AgentCredentials, BackendPaths, ComponentError, CoordinatorParams, Platform, Scenario,
    ScenarioLoadError,
};
use fleet_events::CommandSender;
use std::net::SocketAddr;
use std::path::Path;

use crate::coordinator::LocalCoordinator;
use crate::factory::LocalAgentFactory;
use crate::messaging::LocalMessagingBackend;
use crate::route::LocalRouteAgent;
use crate::runtime::LocalRuntime;
use crate::scenario;

#[derive(Debug, Clone, Default)]
pub struct LocalPlatform {
    seed: Option<u64>,
}

impl LocalPlatform {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl Platform for LocalPlatform {
    type Backend = LocalMessagingBackend;
    type Runtime = LocalRuntime;
    type Coordinator = LocalCoordinator;
    type Route = LocalRouteAgent;
    type Factory = LocalAgentFactory;
    type Listener = CommandListener;

    fn start_messaging(
        &mut self,
        paths: &BackendPaths,
        debug: bool,
    ) -> Result<LocalMessagingBackend, ComponentError> {
        LocalMessagingBackend::start(paths, debug)
    }

    fn start_runtime(
        &mut self,
        backend: &LocalMessagingBackend,
        paths: &BackendPaths,
    ) -> Result<LocalRuntime, ComponentError> {
        LocalRuntime::start(&backend.handle(), paths)
    }

    fn create_coordinator(
        &mut self,
        params: CoordinatorParams,
        runtime: &LocalRuntime,
        backend: &LocalMessagingBackend,
    ) -> Result<LocalCoordinator, ComponentError> {
        Ok(LocalCoordinator::new(params, backend.handle(), runtime.handle()))
    }

    fn create_route_agent(
        &mut self,
        credentials: AgentCredentials,
        debug: bool,
        backend: &LocalMessagingBackend,
    ) -> Result<LocalRouteAgent, ComponentError> {
        Ok(LocalRouteAgent::new(credentials, backend.handle(), debug))
    }

    fn agent_factory(&mut self, backend: &LocalMessagingBackend) -> LocalAgentFactory {
        LocalAgentFactory::new(backend.handle(), self.seed)
    }

    fn load_scenario(
        &mut self,
        path: &Path,
        backend: &LocalMessagingBackend,
    ) -> Result<Scenario<LocalCoordinator>, ScenarioLoadError> {
        scenario::load(path, &backend.handle())
    }

    fn start_listener(
        &mut self,
        sender: CommandSender,
        addr: SocketAddr,
    ) -> Result<CommandListener, ComponentError> {
        command_listener::spawn(addr, sender)
            .map_err(|e| ComponentError::start("command listener", e))
    }
}
