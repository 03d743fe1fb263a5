//! Result tables.
//!
//! [`StatsAggregator`] pulls raw records from the coordinator and projects them
//! into a [`StatsSnapshot`]: one fleet summary row, one row per passenger and
//! one row per taxi. The projection keeps only the reported columns, whatever
//! else the raw records carry.

use fleet_events::{AggregateStats, PassengerRecord, PassengerStatus, TaxiRecord, TaxiStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::boundary::Coordinator;
use crate::config::SimulationConfig;

/// One cell of a result table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Number(n) => write!(f, "{n:.3}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Empty => Ok(()),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

/// Fleet-wide summary row. Name and max-time columns exist only when configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    #[serde(rename = "Simulation Name", skip_serializing_if = "Option::is_none")]
    pub simulation_name: Option<String>,
    #[serde(rename = "Avg Waiting Time")]
    pub avg_waiting_time: f64,
    #[serde(rename = "Avg Total Time")]
    pub avg_total_time: f64,
    #[serde(rename = "Simulation Time")]
    pub simulation_time: f64,
    #[serde(rename = "Max Time", skip_serializing_if = "Option::is_none")]
    pub max_time: Option<f64>,
    #[serde(rename = "Simulation Finished")]
    pub finished: bool,
}

impl FleetSummary {
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::with_capacity(6);
        if self.simulation_name.is_some() {
            columns.push("Simulation Name");
        }
        columns.extend(["Avg Waiting Time", "Avg Total Time", "Simulation Time"]);
        if self.max_time.is_some() {
            columns.push("Max Time");
        }
        columns.push("Simulation Finished");
        columns
    }

    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(6);
        if let Some(name) = &self.simulation_name {
            cells.push(Cell::Text(name.clone()));
        }
        cells.extend([
            Cell::Number(self.avg_waiting_time),
            Cell::Number(self.avg_total_time),
            Cell::Number(self.simulation_time),
        ]);
        if let Some(max_time) = self.max_time {
            cells.push(Cell::Number(max_time));
        }
        cells.push(Cell::Bool(self.finished));
        cells
    }
}

/// Passenger detail row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerRow {
    pub name: String,
    pub waiting_time: Option<f64>,
    pub total_time: Option<f64>,
    pub status: PassengerStatus,
}

impl PassengerRow {
    pub const COLUMNS: [&'static str; 4] = ["name", "waiting_time", "total_time", "status"];

    pub fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.name.clone()),
            Cell::from(self.waiting_time),
            Cell::from(self.total_time),
            Cell::Text(self.status.to_string()),
        ]
    }
}

impl From<&PassengerRecord> for PassengerRow {
    fn from(record: &PassengerRecord) -> Self {
        Self {
            name: record.name.clone(),
            waiting_time: record.waiting_time,
            total_time: record.total_time,
            status: record.status,
        }
    }
}

/// Taxi detail row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiRow {
    pub name: String,
    pub assignments: u32,
    pub distance: f64,
    pub status: TaxiStatus,
}

impl TaxiRow {
    pub const COLUMNS: [&'static str; 4] = ["name", "assignments", "distance", "status"];

    pub fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.name.clone()),
            Cell::Number(f64::from(self.assignments)),
            Cell::Number(self.distance),
            Cell::Text(self.status.to_string()),
        ]
    }
}

impl From<&TaxiRecord> for TaxiRow {
    fn from(record: &TaxiRecord) -> Self {
        Self {
            name: record.name.clone(),
            assignments: record.assignments,
            distance: record.distance,
            status: record.status,
        }
    }
}

/// The three result tables at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub summary: FleetSummary,
    pub passengers: Vec<PassengerRow>,
    pub taxis: Vec<TaxiRow>,
}

impl StatsSnapshot {
    /// Projects raw coordinator output into the result tables.
    pub fn from_records(
        simulation_name: Option<String>,
        max_time: Option<f64>,
        simulation_time: f64,
        aggregate: AggregateStats,
        passengers: &[PassengerRecord],
        taxis: &[TaxiRecord],
    ) -> Self {
        Self {
            summary: FleetSummary {
                simulation_name,
                avg_waiting_time: aggregate.waiting,
                avg_total_time: aggregate.total_time,
                simulation_time,
                max_time,
                finished: aggregate.finished,
            },
            passengers: passengers.iter().map(PassengerRow::from).collect(),
            taxis: taxis.iter().map(TaxiRow::from).collect(),
        }
    }
}

/// Keeps the most recent [`StatsSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    simulation_name: Option<String>,
    max_time: Option<f64>,
    snapshot: Option<StatsSnapshot>,
}

impl StatsAggregator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            simulation_name: config.simulation_name.clone(),
            max_time: config.max_time,
            snapshot: None,
        }
    }

    /// Recomputes the snapshot from the coordinator's current state, replacing
    /// the previous one.
    pub fn collect<C: Coordinator>(&mut self, coordinator: &C, simulation_time: f64) -> &StatsSnapshot {
        let snapshot = build_snapshot(
            self.simulation_name.clone(),
            self.max_time,
            coordinator,
            simulation_time,
        );
        self.snapshot.insert(snapshot)
    }

    /// The last computed snapshot, if any.
    pub fn snapshot(&self) -> Option<&StatsSnapshot> {
        self.snapshot.as_ref()
    }

    /// The last computed snapshot, computing one first if none exists yet.
    pub fn snapshot_or_collect<C: Coordinator>(
        &mut self,
        coordinator: &C,
        simulation_time: f64,
    ) -> &StatsSnapshot {
        let simulation_name = &self.simulation_name;
        let max_time = self.max_time;
        self.snapshot.get_or_insert_with(|| {
            build_snapshot(simulation_name.clone(), max_time, coordinator, simulation_time)
        })
    }
}

fn build_snapshot<C: Coordinator>(
    simulation_name: Option<String>,
    max_time: Option<f64>,
    coordinator: &C,
    simulation_time: f64,
) -> StatsSnapshot {
    let passengers = coordinator.passenger_stats();
    let taxis = coordinator.taxi_stats();
    let aggregate = coordinator.stats();
    tracing::debug!(
        passengers = passengers.len(),
        taxis = taxis.len(),
        simulation_time,
        "Collected simulation stats"
    );
    StatsSnapshot::from_records(
        simulation_name,
        max_time,
        simulation_time,
        aggregate,
        &passengers,
        &taxis,
    )
}
