//! Console rendering of a [`StatsSnapshot`].

use tabled::builder::Builder;
use tabled::{Table, Tabled};

use crate::stats::{Cell, PassengerRow, StatsSnapshot, TaxiRow};

#[derive(Tabled)]
struct PassengerLine {
    name: String,
    waiting_time: String,
    total_time: String,
    status: String,
}

impl From<&PassengerRow> for PassengerLine {
    fn from(row: &PassengerRow) -> Self {
        Self {
            name: row.name.clone(),
            waiting_time: Cell::from(row.waiting_time).to_string(),
            total_time: Cell::from(row.total_time).to_string(),
            status: row.status.to_string(),
        }
    }
}

#[derive(Tabled)]
struct TaxiLine {
    name: String,
    assignments: u32,
    distance: String,
    status: String,
}

impl From<&TaxiRow> for TaxiLine {
    fn from(row: &TaxiRow) -> Self {
        Self {
            name: row.name.clone(),
            assignments: row.assignments,
            distance: Cell::Number(row.distance).to_string(),
            status: row.status.to_string(),
        }
    }
}

/// Renders the three result tables with their titles.
pub fn render(snapshot: &StatsSnapshot) -> String {
    let mut summary = Builder::default();
    summary.push_record(snapshot.summary.columns().into_iter().map(String::from));
    summary.push_record(snapshot.summary.cells().iter().map(|c| c.to_string()));

    let passengers = Table::new(snapshot.passengers.iter().map(PassengerLine::from));
    let taxis = Table::new(snapshot.taxis.iter().map(TaxiLine::from));

    format!(
        "Simulation Results\n{}\nPassenger stats\n{}\nTaxi stats\n{}\n",
        summary.build(),
        passengers,
        taxis
    )
}

/// Prints the result tables to stdout.
pub fn print(snapshot: &StatsSnapshot) {
    println!("{}", render(snapshot));
}
