//! Bulk agent creation.

use fleet_control::{Agent, AgentCredentials, AgentFactory, ComponentError, Coordinator};
use fleet_events::{AgentKind, Position};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::agents::{PassengerAgent, TaxiAgent, DEFAULT_TAXI_SPEED};
use crate::coordinator::LocalCoordinator;
use crate::messaging::MessagingHandle;

/// Side length of the square map agents are placed on.
pub const DEFAULT_AREA: f64 = 100.0;

/// Creates randomly placed taxis and passengers.
pub struct LocalAgentFactory {
    messaging: MessagingHandle,
    rng: SmallRng,
    area: f64,
    taxi_speed: f64,
    next_taxi: u32,
    next_passenger: u32,
}

impl LocalAgentFactory {
    /// A seeded factory places agents reproducibly.
    pub fn new(messaging: MessagingHandle, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            messaging,
            rng,
            area: DEFAULT_AREA,
            taxi_speed: DEFAULT_TAXI_SPEED,
            next_taxi: 0,
            next_passenger: 0,
        }
    }

    fn random_position(&mut self) -> Position {
        Position::new(
            self.rng.gen_range(0.0..self.area),
            self.rng.gen_range(0.0..self.area),
        )
    }

    /// Next `prefix_N` name whose address is free on the backend and in `coordinator`.
    fn next_credentials(
        &mut self,
        kind: AgentKind,
        coordinator: &LocalCoordinator,
    ) -> AgentCredentials {
        let counter = match kind {
            AgentKind::Taxi => &mut self.next_taxi,
            AgentKind::Passenger => &mut self.next_passenger,
        };
        loop {
            let name = format!("{}_{}", kind, *counter);
            *counter += 1;
            let address = self.messaging.address_of(&name);
            if !self.messaging.is_registered(&address) && !coordinator.owns(&address) {
                let password = Uuid::new_v4().to_string();
                return AgentCredentials::new(name, password, self.messaging.host());
            }
        }
    }

    fn create_taxi(&mut self, coordinator: &LocalCoordinator) -> TaxiAgent {
        let credentials = self.next_credentials(AgentKind::Taxi, coordinator);
        let position = self.random_position();
        TaxiAgent::new(credentials, self.messaging.clone(), position, self.taxi_speed)
    }

    fn create_passenger(&mut self, coordinator: &LocalCoordinator) -> PassengerAgent {
        let credentials = self.next_credentials(AgentKind::Passenger, coordinator);
        let origin = self.random_position();
        let destination = self.random_position();
        PassengerAgent::new(credentials, self.messaging.clone(), origin, destination)
    }
}

impl AgentFactory<LocalCoordinator> for LocalAgentFactory {
    fn create_agents_batch(
        &mut self,
        kind: AgentKind,
        count: u32,
        coordinator: &LocalCoordinator,
    ) -> Result<u32, ComponentError> {
        for created in 0..count {
            let started = match kind {
                AgentKind::Taxi => {
                    let mut taxi = self.create_taxi(coordinator);
                    taxi.start().map(|()| coordinator.add_taxi(taxi))
                }
                AgentKind::Passenger => {
                    let mut passenger = self.create_passenger(coordinator);
                    passenger.start().map(|()| coordinator.add_passenger(passenger))
                }
            };
            if let Err(e) = started {
                tracing::warn!("Created {} of {} {} agents", created, count, kind);
                return Err(e);
            }
        }
        tracing::info!("Created {} {} agents", count, kind);
        Ok(count)
    }
}
