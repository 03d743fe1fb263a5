//! Strategy interfaces for the three agent roles.
//!
//! The coordinator decides which taxis see a transport request, each taxi
//! decides whether to propose, and the passenger picks among proposals. The
//! concrete variant of each role is chosen in configuration and injected into
//! the coordinator through [`StrategySet`].

use fleet_events::{PassengerStatus, Position, TaxiStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::SimulationConfig;

/// A passenger asking to be carried somewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub passenger: String,
    pub origin: Position,
    pub destination: Position,
}

/// What strategies may see of a taxi.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxiView {
    pub name: String,
    pub position: Position,
    pub status: TaxiStatus,
    pub speed: f64,
}

/// What strategies may see of a passenger.
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerView {
    pub name: String,
    pub position: Position,
    pub destination: Position,
    pub status: PassengerStatus,
}

/// A taxi's offer to serve a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub taxi: String,
    /// Estimated seconds until pickup
    pub eta: f64,
}

impl Proposal {
    /// Builds a proposal with the straight-line pickup estimate.
    pub fn from_taxi(taxi: &TaxiView, request: &TransportRequest) -> Self {
        let eta = if taxi.speed > 0.0 {
            taxi.position.distance_to(&request.origin) / taxi.speed
        } else {
            f64::INFINITY
        };
        Self {
            taxi: taxi.name.clone(),
            eta,
        }
    }
}

/// Dispatch policy of the coordinator.
pub trait CoordinatorStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Names of the taxis the request should be offered to.
    fn on_assignment_needed(&self, request: &TransportRequest, taxis: &[TaxiView]) -> Vec<String>;

    fn on_status_changed(&self, _taxi: &TaxiView) {}
}

/// Decision policy of a taxi.
pub trait TaxiStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `taxi` proposes to serve `request`.
    fn on_request(&self, taxi: &TaxiView, request: &TransportRequest) -> bool;

    fn on_status_changed(&self, _taxi: &TaxiView) {}
}

/// Decision policy of a passenger.
pub trait PassengerStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index of the accepted proposal, or `None` to keep waiting.
    fn on_proposals(&self, passenger: &PassengerView, proposals: &[Proposal]) -> Option<usize>;

    fn on_status_changed(&self, _passenger: &PassengerView) {}
}

/// Offers every request to every free taxi.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelegateRequest;

impl CoordinatorStrategy for DelegateRequest {
    fn name(&self) -> &'static str {
        "delegate_request"
    }

    fn on_assignment_needed(&self, _request: &TransportRequest, taxis: &[TaxiView]) -> Vec<String> {
        taxis
            .iter()
            .filter(|t| t.status.is_free())
            .map(|t| t.name.clone())
            .collect()
    }
}

/// Offers a request only to the free taxi closest to the pickup point.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestTaxi;

impl CoordinatorStrategy for ClosestTaxi {
    fn name(&self) -> &'static str {
        "closest_taxi"
    }

    fn on_assignment_needed(&self, request: &TransportRequest, taxis: &[TaxiView]) -> Vec<String> {
        taxis
            .iter()
            .filter(|t| t.status.is_free())
            .min_by(|a, b| {
                let da = a.position.distance_to(&request.origin);
                let db = b.position.distance_to(&request.origin);
                da.total_cmp(&db)
            })
            .map(|t| vec![t.name.clone()])
            .unwrap_or_default()
    }
}

/// A free taxi always proposes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAlways;

impl TaxiStrategy for AcceptAlways {
    fn name(&self) -> &'static str {
        "accept_always"
    }

    fn on_request(&self, taxi: &TaxiView, _request: &TransportRequest) -> bool {
        taxi.status.is_free()
    }
}

/// Takes the first proposal received.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptFirst;

impl PassengerStrategy for AcceptFirst {
    fn name(&self) -> &'static str {
        "accept_first"
    }

    fn on_proposals(&self, passenger: &PassengerView, proposals: &[Proposal]) -> Option<usize> {
        if passenger.status != PassengerStatus::Waiting || proposals.is_empty() {
            return None;
        }
        Some(0)
    }
}

/// Takes the proposal with the shortest pickup estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptFastest;

impl PassengerStrategy for AcceptFastest {
    fn name(&self) -> &'static str {
        "accept_fastest"
    }

    fn on_proposals(&self, passenger: &PassengerView, proposals: &[Proposal]) -> Option<usize> {
        if passenger.status != PassengerStatus::Waiting {
            return None;
        }
        proposals
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.eta.total_cmp(&b.eta))
            .map(|(i, _)| i)
    }
}

/// Coordinator strategy identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorStrategyKind {
    #[default]
    DelegateRequest,
    ClosestTaxi,
}

/// Taxi strategy identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxiStrategyKind {
    #[default]
    AcceptAlways,
}

/// Passenger strategy identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerStrategyKind {
    #[default]
    AcceptFirst,
    AcceptFastest,
}

impl CoordinatorStrategyKind {
    pub fn build(self) -> Box<dyn CoordinatorStrategy> {
        match self {
            CoordinatorStrategyKind::DelegateRequest => Box::new(DelegateRequest),
            CoordinatorStrategyKind::ClosestTaxi => Box::new(ClosestTaxi),
        }
    }
}

impl TaxiStrategyKind {
    pub fn build(self) -> Box<dyn TaxiStrategy> {
        match self {
            TaxiStrategyKind::AcceptAlways => Box::new(AcceptAlways),
        }
    }
}

impl PassengerStrategyKind {
    pub fn build(self) -> Box<dyn PassengerStrategy> {
        match self {
            PassengerStrategyKind::AcceptFirst => Box::new(AcceptFirst),
            PassengerStrategyKind::AcceptFastest => Box::new(AcceptFastest),
        }
    }
}

impl FromStr for CoordinatorStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delegate_request" => Ok(Self::DelegateRequest),
            "closest_taxi" => Ok(Self::ClosestTaxi),
            other => Err(format!("unknown coordinator strategy: {other}")),
        }
    }
}

impl FromStr for TaxiStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept_always" => Ok(Self::AcceptAlways),
            other => Err(format!("unknown taxi strategy: {other}")),
        }
    }
}

impl FromStr for PassengerStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept_first" => Ok(Self::AcceptFirst),
            "accept_fastest" => Ok(Self::AcceptFastest),
            other => Err(format!("unknown passenger strategy: {other}")),
        }
    }
}

/// The three strategies handed to a coordinator.
pub struct StrategySet {
    pub coordinator: Box<dyn CoordinatorStrategy>,
    pub taxi: Box<dyn TaxiStrategy>,
    pub passenger: Box<dyn PassengerStrategy>,
}

impl StrategySet {
    pub fn from_kinds(
        coordinator: CoordinatorStrategyKind,
        taxi: TaxiStrategyKind,
        passenger: PassengerStrategyKind,
    ) -> Self {
        Self {
            coordinator: coordinator.build(),
            taxi: taxi.build(),
            passenger: passenger.build(),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::from_kinds(
            config.coordinator_strategy,
            config.taxi_strategy,
            config.passenger_strategy,
        )
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::from_kinds(
            CoordinatorStrategyKind::default(),
            TaxiStrategyKind::default(),
            PassengerStrategyKind::default(),
        )
    }
}

impl fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySet")
            .field("coordinator", &self.coordinator.name())
            .field("taxi", &self.taxi.name())
            .field("passenger", &self.passenger.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxi(name: &str, x: f64, status: TaxiStatus) -> TaxiView {
        TaxiView {
            name: name.to_string(),
            position: Position::new(x, 0.0),
            status,
            speed: 2.0,
        }
    }

    fn request() -> TransportRequest {
        TransportRequest {
            passenger: "passenger_0".into(),
            origin: Position::new(0.0, 0.0),
            destination: Position::new(10.0, 10.0),
        }
    }

    fn waiting_passenger() -> PassengerView {
        PassengerView {
            name: "passenger_0".into(),
            position: Position::default(),
            destination: Position::new(10.0, 10.0),
            status: PassengerStatus::Waiting,
        }
    }

    #[test]
    fn test_delegate_request_offers_free_taxis() {
        let taxis = vec![
            taxi("taxi_0", 5.0, TaxiStatus::Free),
            taxi("taxi_1", 1.0, TaxiStatus::MovingToPassenger),
            taxi("taxi_2", 9.0, TaxiStatus::Free),
        ];
        let offered = DelegateRequest.on_assignment_needed(&request(), &taxis);
        assert_eq!(offered, vec!["taxi_0".to_string(), "taxi_2".to_string()]);
    }

    #[test]
    fn test_closest_taxi_offers_one() {
        let taxis = vec![
            taxi("taxi_0", 5.0, TaxiStatus::Free),
            taxi("taxi_1", 1.0, TaxiStatus::MovingToPassenger),
            taxi("taxi_2", 3.0, TaxiStatus::Free),
        ];
        let offered = ClosestTaxi.on_assignment_needed(&request(), &taxis);
        assert_eq!(offered, vec!["taxi_2".to_string()]);
        assert!(ClosestTaxi.on_assignment_needed(&request(), &[]).is_empty());
    }

    #[test]
    fn test_accept_always_only_when_free() {
        assert!(AcceptAlways.on_request(&taxi("t", 0.0, TaxiStatus::Free), &request()));
        assert!(!AcceptAlways.on_request(
            &taxi("t", 0.0, TaxiStatus::MovingToDestination),
            &request()
        ));
    }

    #[test]
    fn test_passenger_strategies() {
        let proposals = vec![
            Proposal { taxi: "slow".into(), eta: 9.0 },
            Proposal { taxi: "fast".into(), eta: 2.0 },
        ];
        let passenger = waiting_passenger();

        assert_eq!(AcceptFirst.on_proposals(&passenger, &proposals), Some(0));
        assert_eq!(AcceptFastest.on_proposals(&passenger, &proposals), Some(1));
        assert_eq!(AcceptFirst.on_proposals(&passenger, &[]), None);

        let riding = PassengerView {
            status: PassengerStatus::InTransit,
            ..passenger
        };
        assert_eq!(AcceptFastest.on_proposals(&riding, &proposals), None);
    }

    #[test]
    fn test_proposal_eta() {
        let proposal = Proposal::from_taxi(&taxi("taxi_0", 6.0, TaxiStatus::Free), &request());
        assert_eq!(proposal.eta, 3.0);
    }

    #[test]
    fn test_kinds_parse_and_build() {
        let set = StrategySet::from_kinds(
            "closest_taxi".parse().unwrap(),
            "accept_always".parse().unwrap(),
            "accept_fastest".parse().unwrap(),
        );
        assert_eq!(set.coordinator.name(), "closest_taxi");
        assert_eq!(set.taxi.name(), "accept_always");
        assert_eq!(set.passenger.name(), "accept_fastest");
        assert!("random".parse::<PassengerStrategyKind>().is_err());

        let defaults = StrategySet::default();
        assert_eq!(defaults.coordinator.name(), "delegate_request");
        assert_eq!(defaults.passenger.name(), "accept_first");
    }
}
