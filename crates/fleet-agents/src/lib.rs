//! In-process agent platform for the taxi fleet simulator.
//!
//! Implements every collaborator the control plane drives:
//!
//! - [`messaging`]: mailbox router agents talk through
//! - [`runtime`]: scheduler that ticks hosted behaviours
//! - [`coordinator`]: owner of the fleet, the clock and dispatch
//! - [`route`]: route agent answering path requests
//! - [`agents`]: taxi and passenger agents
//! - [`factory`] and [`scenario`]: where agents come from
//! - [`platform`]: the [`Platform`](fleet_control::Platform) tying them together

pub mod agents;
pub mod coordinator;
pub mod factory;
pub mod messaging;
pub mod platform;
pub mod route;
pub mod runtime;
pub mod scenario;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::{PassengerAgent, TaxiAgent};
pub use coordinator::LocalCoordinator;
pub use factory::LocalAgentFactory;
pub use messaging::{Envelope, LocalMessagingBackend, MessagingHandle, Payload};
pub use platform::LocalPlatform;
pub use route::{LocalRouteAgent, Route};
pub use runtime::{Behaviour, LocalRuntime, RuntimeHandle};
pub use scenario::ScenarioFile;
