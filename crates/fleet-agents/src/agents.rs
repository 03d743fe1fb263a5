//! Taxi and passenger agents.
//!
//! Both register presence on the messaging backend when started. Movement and
//! trip bookkeeping are driven by the coordinator that owns them.

use crossbeam_channel::Receiver;
use fleet_control::strategy::{PassengerView, TaxiView};
use fleet_control::{Agent, AgentCredentials, ComponentError};
use fleet_events::{PassengerRecord, PassengerStatus, Position, TaxiRecord, TaxiStatus};
use std::collections::VecDeque;

use crate::messaging::{Envelope, MessagingHandle};
use crate::route::Route;

/// Default cruising speed in distance units per simulated second.
pub const DEFAULT_TAXI_SPEED: f64 = 10.0;

/// Mailbox registration shared by both agent kinds.
#[derive(Debug)]
struct Presence {
    credentials: AgentCredentials,
    messaging: MessagingHandle,
    mailbox: Option<Receiver<Envelope>>,
}

impl Presence {
    fn start(&mut self) -> Result<(), ComponentError> {
        if self.mailbox.is_none() {
            self.mailbox = Some(self.messaging.register(&self.credentials.address)?);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.mailbox.take().is_some() {
            self.messaging.unregister(&self.credentials.address);
        }
    }
}

#[derive(Debug)]
pub struct TaxiAgent {
    presence: Presence,
    position: Position,
    speed: f64,
    status: TaxiStatus,
    waypoints: VecDeque<Position>,
    passenger: Option<String>,
    assignments: u32,
    distance: f64,
}

impl TaxiAgent {
    pub fn new(
        credentials: AgentCredentials,
        messaging: MessagingHandle,
        position: Position,
        speed: f64,
    ) -> Self {
        Self {
            presence: Presence {
                credentials,
                messaging,
                mailbox: None,
            },
            position,
            speed,
            status: TaxiStatus::Free,
            waypoints: VecDeque::new(),
            passenger: None,
            assignments: 0,
            distance: 0.0,
        }
    }

    pub fn address(&self) -> &str {
        &self.presence.credentials.address
    }

    pub fn is_started(&self) -> bool {
        self.presence.mailbox.is_some()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn status(&self) -> TaxiStatus {
        self.status
    }

    pub fn passenger(&self) -> Option<&str> {
        self.passenger.as_deref()
    }

    /// Accepts a passenger and heads for the pickup point.
    pub fn assign(&mut self, passenger: &str, pickup: Route) {
        self.assignments += 1;
        self.passenger = Some(passenger.to_string());
        self.follow(pickup, TaxiStatus::MovingToPassenger);
    }

    pub fn follow(&mut self, route: Route, status: TaxiStatus) {
        self.waypoints = route.path.into();
        self.status = status;
    }

    /// Drives along the current route for `dt` seconds.
    ///
    /// Returns `true` when the final waypoint is reached during this call.
    pub fn drive(&mut self, dt: f64) -> bool {
        if self.status.is_free() {
            return false;
        }
        let mut reach = self.speed * dt;
        while let Some(next) = self.waypoints.front().copied() {
            let step = self.position.distance_to(&next);
            if step > reach {
                self.position = self.position.step_towards(&next, reach);
                self.distance += reach;
                return false;
            }
            reach -= step;
            self.distance += step;
            self.position = next;
            self.waypoints.pop_front();
        }
        true
    }

    /// Drops the current passenger and becomes available.
    pub fn release(&mut self) {
        self.passenger = None;
        self.waypoints.clear();
        self.status = TaxiStatus::Free;
    }

    pub fn stop(&mut self) {
        self.presence.stop();
    }

    pub fn view(&self) -> TaxiView {
        TaxiView {
            name: self.presence.credentials.name.clone(),
            position: self.position,
            status: self.status,
            speed: self.speed,
        }
    }

    pub fn record(&self) -> TaxiRecord {
        TaxiRecord {
            name: self.presence.credentials.name.clone(),
            address: self.presence.credentials.address.clone(),
            status: self.status,
            position: self.position,
            speed: self.speed,
            assignments: self.assignments,
            distance: self.distance,
        }
    }
}

impl Agent for TaxiAgent {
    fn name(&self) -> &str {
        &self.presence.credentials.name
    }

    fn start(&mut self) -> Result<(), ComponentError> {
        self.presence.start()
    }
}

#[derive(Debug)]
pub struct PassengerAgent {
    presence: Presence,
    origin: Position,
    destination: Position,
    position: Position,
    status: PassengerStatus,
    taxi: Option<String>,
    request_time: Option<f64>,
    pickup_time: Option<f64>,
    arrival_time: Option<f64>,
}

impl PassengerAgent {
    pub fn new(
        credentials: AgentCredentials,
        messaging: MessagingHandle,
        origin: Position,
        destination: Position,
    ) -> Self {
        Self {
            presence: Presence {
                credentials,
                messaging,
                mailbox: None,
            },
            origin,
            destination,
            position: origin,
            status: PassengerStatus::Waiting,
            taxi: None,
            request_time: None,
            pickup_time: None,
            arrival_time: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.presence.credentials.address
    }

    pub fn is_started(&self) -> bool {
        self.presence.mailbox.is_some()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn destination(&self) -> Position {
        self.destination
    }

    pub fn status(&self) -> PassengerStatus {
        self.status
    }

    pub fn taxi(&self) -> Option<&str> {
        self.taxi.as_deref()
    }

    /// Marks the moment the passenger starts asking for a taxi.
    pub fn request_at(&mut self, now: f64) {
        self.request_time.get_or_insert(now);
    }

    pub fn assign(&mut self, taxi: &str) {
        self.taxi = Some(taxi.to_string());
        self.status = PassengerStatus::Assigned;
    }

    pub fn pick_up(&mut self, now: f64) {
        self.pickup_time = Some(now);
        self.status = PassengerStatus::InTransit;
    }

    pub fn move_to(&mut self, position: Position) {
        self.position = position;
    }

    pub fn drop_off(&mut self, now: f64) {
        self.position = self.destination;
        self.arrival_time = Some(now);
        self.status = PassengerStatus::Finished;
    }

    pub fn stop(&mut self) {
        self.presence.stop();
    }

    /// Seconds waited for pickup. Counts up to `now` while still waiting.
    pub fn waiting_time(&self, now: f64) -> Option<f64> {
        let requested = self.request_time?;
        Some(self.pickup_time.unwrap_or(now) - requested)
    }

    pub fn total_time(&self) -> Option<f64> {
        Some(self.arrival_time? - self.request_time?)
    }

    pub fn view(&self) -> PassengerView {
        PassengerView {
            name: self.presence.credentials.name.clone(),
            position: self.position,
            destination: self.destination,
            status: self.status,
        }
    }

    pub fn record(&self, now: f64) -> PassengerRecord {
        PassengerRecord {
            name: self.presence.credentials.name.clone(),
            address: self.presence.credentials.address.clone(),
            status: self.status,
            origin: self.origin,
            destination: self.destination,
            position: self.position,
            waiting_time: self.waiting_time(now),
            total_time: self.total_time(),
        }
    }
}

impl Agent for PassengerAgent {
    fn name(&self) -> &str {
        &self.presence.credentials.name
    }

    fn start(&mut self) -> Result<(), ComponentError> {
        self.presence.start()
    }
}
