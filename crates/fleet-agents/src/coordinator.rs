//! Coordinator agent.
//!
//! Owns every taxi and passenger, the simulated clock and the dispatch loop.
//! Hosted by the agent runtime, it advances once per tick:
//!
//! 1. waiting passengers are offered to taxis through the configured strategies
//! 2. accepted taxis get a pickup route from the route agent
//! 3. taxis drive, picking up and dropping off passengers on arrival
//!
//! Route requests are made with the state lock released, so queries never wait
//! on the route agent. A taxi drives a straight line until its route arrives.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use fleet_control::controller::ROUTE_AGENT_NAME;
use fleet_control::strategy::{Proposal, StrategySet, TransportRequest};
use fleet_control::{Agent, ComponentError, Coordinator, CoordinatorParams};
use fleet_events::{
    AggregateStats, PassengerRecord, PassengerStatus, Position, TaxiRecord, TaxiStatus,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::agents::{PassengerAgent, TaxiAgent};
use crate::messaging::{Envelope, MessagingHandle, Payload};
use crate::route::Route;
use crate::runtime::{Behaviour, RuntimeHandle};

/// How long to wait for the route agent before driving in a straight line.
const ROUTE_TIMEOUT: Duration = Duration::from_millis(500);

struct State {
    strategies: StrategySet,
    taxis: Vec<TaxiAgent>,
    passengers: Vec<PassengerAgent>,
    clock: f64,
    running: bool,
}

/// A route to fetch for a taxi once the state lock is released.
#[derive(Debug)]
struct Leg {
    taxi: String,
    passenger: String,
    status: TaxiStatus,
    origin: Position,
    destination: Position,
}

struct Inner {
    params: CoordinatorParams,
    messaging: MessagingHandle,
    runtime: RuntimeHandle,
    route_address: String,
    state: Mutex<State>,
    mailbox: Mutex<Option<Receiver<Envelope>>>,
    next_request: AtomicU64,
}

/// Shared handle to the coordinator. Clones drive the same simulation.
#[derive(Clone)]
pub struct LocalCoordinator {
    inner: Arc<Inner>,
}

impl LocalCoordinator {
    pub fn new(
        params: CoordinatorParams,
        messaging: MessagingHandle,
        runtime: RuntimeHandle,
    ) -> Self {
        let route_address = messaging.address_of(ROUTE_AGENT_NAME);
        Self {
            inner: Arc::new(Inner {
                params,
                messaging,
                runtime,
                route_address,
                state: Mutex::new(State {
                    strategies: StrategySet::default(),
                    taxis: Vec::new(),
                    passengers: Vec::new(),
                    clock: 0.0,
                    running: false,
                }),
                mailbox: Mutex::new(None),
                next_request: AtomicU64::new(1),
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.params.credentials.address
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Advances the simulation by `dt` seconds. Does nothing unless running.
    pub fn advance(&self, dt: f64) {
        self.inner.advance(dt);
    }

    pub fn taxi_count(&self) -> usize {
        self.inner.state().taxis.len()
    }

    pub fn passenger_count(&self) -> usize {
        self.inner.state().passengers.len()
    }

    /// Whether an agent with this address is already owned.
    pub fn owns(&self, address: &str) -> bool {
        let state = self.inner.state();
        state.taxis.iter().any(|t| t.address() == address)
            || state.passengers.iter().any(|p| p.address() == address)
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn advance(&self, dt: f64) {
        let pickups = {
            let mut state = self.state();
            if !state.running {
                return;
            }
            state.clock += dt;
            self.dispatch(&mut state)
        };
        let pickups = self.fetch_routes(pickups);

        let trips = {
            let mut state = self.state();
            if !state.running {
                return;
            }
            apply_routes(&mut state, pickups);
            let now = state.clock;
            self.drive(&mut state, dt, now)
        };
        let trips = self.fetch_routes(trips);

        apply_routes(&mut self.state(), trips);
    }

    fn dispatch(&self, state: &mut State) -> Vec<Leg> {
        let State {
            strategies,
            taxis,
            passengers,
            ..
        } = state;
        let mut legs = Vec::new();

        for passenger in passengers
            .iter_mut()
            .filter(|p| p.is_started() && p.status() == PassengerStatus::Waiting)
        {
            let request = TransportRequest {
                passenger: passenger.name().to_string(),
                origin: passenger.position(),
                destination: passenger.destination(),
            };
            let views: Vec<_> = taxis
                .iter()
                .filter(|t| t.is_started())
                .map(TaxiAgent::view)
                .collect();

            let offered = strategies.coordinator.on_assignment_needed(&request, &views);
            let proposals: Vec<Proposal> = offered
                .iter()
                .filter_map(|name| views.iter().find(|v| &v.name == name))
                .filter(|view| strategies.taxi.on_request(view, &request))
                .map(|view| Proposal::from_taxi(view, &request))
                .collect();
            if proposals.is_empty() {
                continue;
            }

            let Some(choice) = strategies
                .passenger
                .on_proposals(&passenger.view(), &proposals)
                .and_then(|i| proposals.get(i))
            else {
                continue;
            };
            let Some(taxi) = taxis.iter_mut().find(|t| t.name() == choice.taxi) else {
                continue;
            };

            let leg = Leg {
                taxi: taxi.name().to_string(),
                passenger: passenger.name().to_string(),
                status: TaxiStatus::MovingToPassenger,
                origin: taxi.position(),
                destination: passenger.position(),
            };
            taxi.assign(passenger.name(), Route::straight(leg.origin, leg.destination));
            passenger.assign(taxi.name());
            tracing::info!("{} assigned to {}", taxi.name(), passenger.name());
            legs.push(leg);

            strategies.coordinator.on_status_changed(&taxi.view());
            strategies.taxi.on_status_changed(&taxi.view());
            strategies.passenger.on_status_changed(&passenger.view());
        }
        legs
    }

    fn drive(&self, state: &mut State, dt: f64, now: f64) -> Vec<Leg> {
        let State {
            strategies,
            taxis,
            passengers,
            ..
        } = state;
        let mut legs = Vec::new();

        for taxi in taxis.iter_mut() {
            let arrived = taxi.drive(dt);
            let Some(passenger) = taxi
                .passenger()
                .and_then(|name| passengers.iter_mut().find(|p| p.name() == name))
            else {
                continue;
            };

            match (taxi.status(), arrived) {
                (TaxiStatus::MovingToPassenger, true) => {
                    passenger.pick_up(now);
                    let leg = Leg {
                        taxi: taxi.name().to_string(),
                        passenger: passenger.name().to_string(),
                        status: TaxiStatus::MovingToDestination,
                        origin: passenger.position(),
                        destination: passenger.destination(),
                    };
                    taxi.follow(
                        Route::straight(leg.origin, leg.destination),
                        TaxiStatus::MovingToDestination,
                    );
                    tracing::info!("{} picked up {}", taxi.name(), passenger.name());
                    legs.push(leg);
                }
                (TaxiStatus::MovingToDestination, false) => {
                    passenger.move_to(taxi.position());
                    continue;
                }
                (TaxiStatus::MovingToDestination, true) => {
                    passenger.drop_off(now);
                    taxi.release();
                    tracing::info!(
                        "{} delivered {} at {:.1}s",
                        taxi.name(),
                        passenger.name(),
                        now
                    );
                }
                _ => continue,
            }
            strategies.taxi.on_status_changed(&taxi.view());
            strategies.passenger.on_status_changed(&passenger.view());
        }
        legs
    }

    /// Resolves every leg through the route agent. Runs without the state lock.
    ///
    /// Once the simulation stops the remaining legs keep their straight line.
    fn fetch_routes(&self, legs: Vec<Leg>) -> Vec<(Leg, Route)> {
        legs.into_iter()
            .map(|leg| {
                let route = if self.state().running {
                    self.route(leg.origin, leg.destination)
                } else {
                    Route::straight(leg.origin, leg.destination)
                };
                (leg, route)
            })
            .collect()
    }

    /// Asks the route agent for a path, falling back to a straight line.
    fn route(&self, origin: Position, destination: Position) -> Route {
        match self.request_route(origin, destination) {
            Some(route) => route,
            None => {
                tracing::warn!(
                    "No route from {} to {}, driving straight",
                    origin,
                    destination
                );
                Route::straight(origin, destination)
            }
        }
    }

    fn request_route(&self, origin: Position, destination: Position) -> Option<Route> {
        if !self.messaging.is_registered(&self.route_address) {
            return None;
        }
        let mailbox = self.mailbox.lock().unwrap_or_else(|e| e.into_inner());
        let mailbox = mailbox.as_ref()?;

        let id = self.next_request.fetch_add(1, Ordering::SeqCst);
        let request = Envelope {
            from: self.params.credentials.address.clone(),
            to: self.route_address.clone(),
            body: Payload::RouteRequest {
                id,
                origin,
                destination,
            },
        };
        if let Err(e) = self.messaging.send(request) {
            tracing::debug!("Route request {} not sent: {}", id, e);
            return None;
        }

        let deadline = Instant::now() + ROUTE_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match mailbox.recv_timeout(remaining) {
                Ok(Envelope {
                    body: Payload::RouteResponse { id: reply, route },
                    ..
                }) if reply == id => return route,
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }
}

/// Swaps the placeholder route for the fetched one on taxis still on that leg.
fn apply_routes(state: &mut State, routed: Vec<(Leg, Route)>) {
    for (leg, route) in routed {
        let Some(taxi) = state.taxis.iter_mut().find(|t| t.name() == leg.taxi) else {
            continue;
        };
        if taxi.status() == leg.status
            && taxi.passenger() == Some(leg.passenger.as_str())
            && taxi.position() == leg.origin
        {
            taxi.follow(route, leg.status);
        }
    }
}

impl Behaviour for Inner {
    fn name(&self) -> &str {
        &self.params.credentials.name
    }

    fn step(&self, dt: f64) {
        self.advance(dt);
    }
}

impl Coordinator for LocalCoordinator {
    type Taxi = TaxiAgent;
    type Passenger = PassengerAgent;

    fn start(&mut self) -> Result<(), ComponentError> {
        let mut mailbox = self.inner.mailbox.lock().unwrap_or_else(|e| e.into_inner());
        if mailbox.is_some() {
            return Ok(());
        }
        *mailbox = Some(self.inner.messaging.register(self.address())?);
        drop(mailbox);

        self.inner.runtime.attach(self.inner.clone());
        tracing::info!(
            "Coordinator {} started (http port {})",
            self.address(),
            self.inner.params.http_port
        );
        Ok(())
    }

    fn set_strategies(&self, strategies: StrategySet) {
        tracing::debug!("Coordinator strategies: {:?}", strategies);
        self.inner.state().strategies = strategies;
    }

    fn add_taxi(&self, taxi: TaxiAgent) {
        if self.inner.params.debug {
            tracing::debug!("Adding {} at {}", taxi.name(), taxi.position());
        }
        self.inner.state().taxis.push(taxi);
    }

    fn add_passenger(&self, mut passenger: PassengerAgent) {
        let mut state = self.inner.state();
        passenger.request_at(state.clock);
        if self.inner.params.debug {
            tracing::debug!(
                "Adding {} at {} bound for {}",
                passenger.name(),
                passenger.position(),
                passenger.destination()
            );
        }
        state.passengers.push(passenger);
    }

    fn run_simulation(&self) {
        let mut state = self.inner.state();
        if !state.running {
            state.running = true;
            tracing::info!(
                "Simulation running with {} taxis and {} passengers",
                state.taxis.len(),
                state.passengers.len()
            );
        }
    }

    fn simulation_time(&self) -> f64 {
        self.inner.state().clock
    }

    fn is_simulation_finished(&self) -> bool {
        let state = self.inner.state();
        !state.passengers.is_empty()
            && state
                .passengers
                .iter()
                .all(|p| p.status() == PassengerStatus::Finished)
    }

    fn passenger_stats(&self) -> Vec<PassengerRecord> {
        let state = self.inner.state();
        let now = state.clock;
        state.passengers.iter().map(|p| p.record(now)).collect()
    }

    fn taxi_stats(&self) -> Vec<TaxiRecord> {
        self.inner.state().taxis.iter().map(TaxiAgent::record).collect()
    }

    fn stats(&self) -> AggregateStats {
        let passengers = self.passenger_stats();
        AggregateStats::from_passengers(&passengers, self.is_simulation_finished())
    }

    fn stop_agents(&self) -> Result<(), ComponentError> {
        let mut state = self.inner.state();
        state.running = false;
        for taxi in state.taxis.iter_mut() {
            taxi.stop();
        }
        for passenger in state.passengers.iter_mut() {
            passenger.stop();
        }
        tracing::debug!(
            "Stopped {} taxis and {} passengers",
            state.taxis.len(),
            state.passengers.len()
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ComponentError> {
        self.inner.state().running = false;
        self.inner.runtime.detach(&self.inner.params.credentials.name);
        if self
            .inner
            .mailbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            self.inner.messaging.unregister(self.address());
            tracing::info!("Coordinator {} stopped", self.address());
        }
        Ok(())
    }
}
