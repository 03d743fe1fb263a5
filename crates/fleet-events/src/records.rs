//! Raw per-agent records reported by a coordinator.
//!
//! These are the unshaped rows a coordinator hands out. They carry more
//! fields than the result tables keep; the control plane projects them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geo::Position;

/// Kind of participant agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Taxi,
    Passenger,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Taxi => write!(f, "taxi"),
            AgentKind::Passenger => write!(f, "passenger"),
        }
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "taxi" => Ok(AgentKind::Taxi),
            "passenger" => Ok(AgentKind::Passenger),
            other => Err(format!("unknown agent kind: {other}")),
        }
    }
}

/// Lifecycle of a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerStatus {
    /// Waiting for a taxi to accept the request.
    #[default]
    Waiting,
    /// A taxi is on its way to the pickup point.
    Assigned,
    /// Riding towards the destination.
    InTransit,
    /// Dropped off at the destination.
    Finished,
}

impl fmt::Display for PassengerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassengerStatus::Waiting => write!(f, "waiting"),
            PassengerStatus::Assigned => write!(f, "assigned"),
            PassengerStatus::InTransit => write!(f, "in_transit"),
            PassengerStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Lifecycle of a taxi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxiStatus {
    #[default]
    Free,
    /// Driving to pick up the assigned passenger.
    MovingToPassenger,
    /// Carrying the passenger to their destination.
    MovingToDestination,
}

impl TaxiStatus {
    pub fn is_free(self) -> bool {
        matches!(self, TaxiStatus::Free)
    }
}

impl fmt::Display for TaxiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxiStatus::Free => write!(f, "free"),
            TaxiStatus::MovingToPassenger => write!(f, "moving_to_passenger"),
            TaxiStatus::MovingToDestination => write!(f, "moving_to_destination"),
        }
    }
}

/// Everything a coordinator knows about one passenger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerRecord {
    pub name: String,
    pub address: String,
    pub status: PassengerStatus,
    pub origin: Position,
    pub destination: Position,
    pub position: Position,
    /// Seconds between the request and the pickup (or now, while still waiting).
    pub waiting_time: Option<f64>,
    /// Seconds between the request and the drop-off.
    pub total_time: Option<f64>,
}

/// Everything a coordinator knows about one taxi.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiRecord {
    pub name: String,
    pub address: String,
    pub status: TaxiStatus,
    pub position: Position,
    pub speed: f64,
    pub assignments: u32,
    pub distance: f64,
}

/// Fleet-wide aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Average waiting time.
    pub waiting: f64,
    /// Average total trip time.
    #[serde(rename = "totaltime")]
    pub total_time: f64,
    pub finished: bool,
}

impl AggregateStats {
    /// Averages passenger timings. Passengers without a value are skipped;
    /// an empty set averages to zero.
    pub fn from_passengers(passengers: &[PassengerRecord], finished: bool) -> Self {
        Self {
            waiting: average(passengers.iter().filter_map(|p| p.waiting_time)),
            total_time: average(passengers.iter().filter_map(|p| p.total_time)),
            finished,
        }
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
