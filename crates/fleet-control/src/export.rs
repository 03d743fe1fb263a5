//! Report files.
//!
//! Two views of the same [`StatsSnapshot`]:
//! - JSON with `simulation`, `passengers` and `taxis` keys, the row tables
//!   keyed by row index (`"0"`, `"1"`, ...);
//! - a spreadsheet with `Simulation`, `Passengers` and `Taxis` sheets.

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::stats::{Cell, FleetSummary, PassengerRow, StatsSnapshot, TaxiRow};

/// Report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    #[serde(alias = "xlsx")]
    Excel,
}

impl ExportFormat {
    /// Guesses the format from a file extension, falling back to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Excel,
            _ => ExportFormat::Json,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Excel => write!(f, "excel"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Errors that can occur while writing or reading a report file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Serializes a row slice as a map keyed by row index, in row order.
struct IndexedRows<'a, T>(&'a [T]);

impl<T: Serialize> Serialize for IndexedRows<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, row) in self.0.iter().enumerate() {
            map.serialize_entry(&index.to_string(), row)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    simulation: &'a FleetSummary,
    passengers: IndexedRows<'a, PassengerRow>,
    taxis: IndexedRows<'a, TaxiRow>,
}

/// A JSON report read back from disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportFile {
    pub simulation: FleetSummary,
    pub passengers: BTreeMap<usize, PassengerRow>,
    pub taxis: BTreeMap<usize, TaxiRow>,
}

impl ReportFile {
    /// Rebuilds the snapshot, rows in index order.
    pub fn into_snapshot(self) -> StatsSnapshot {
        StatsSnapshot {
            summary: self.simulation,
            passengers: self.passengers.into_values().collect(),
            taxis: self.taxis.into_values().collect(),
        }
    }
}

/// Renders the JSON report document.
pub fn to_json_string(snapshot: &StatsSnapshot) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&document(snapshot))?)
}

fn document(snapshot: &StatsSnapshot) -> ReportDocument<'_> {
    ReportDocument {
        simulation: &snapshot.summary,
        passengers: IndexedRows(&snapshot.passengers),
        taxis: IndexedRows(&snapshot.taxis),
    }
}

/// Writes the JSON report.
pub fn write_json(snapshot: &StatsSnapshot, path: &Path) -> Result<(), ExportError> {
    create_parent(path)?;
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &document(snapshot))?;
    Ok(())
}

/// Reads a JSON report written by [`write_json`].
pub fn read_json_report(path: &Path) -> Result<ReportFile, ExportError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes the spreadsheet report.
pub fn write_excel(snapshot: &StatsSnapshot, path: &Path) -> Result<(), ExportError> {
    create_parent(path)?;
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Simulation")?;
    write_sheet(
        sheet,
        &snapshot.summary.columns(),
        std::iter::once(snapshot.summary.cells()),
    )?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Passengers")?;
    write_sheet(
        sheet,
        &PassengerRow::COLUMNS,
        snapshot.passengers.iter().map(PassengerRow::cells),
    )?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Taxis")?;
    write_sheet(
        sheet,
        &TaxiRow::COLUMNS,
        snapshot.taxis.iter().map(TaxiRow::cells),
    )?;

    workbook.save(path)?;
    Ok(())
}

fn write_sheet(
    sheet: &mut Worksheet,
    columns: &[&str],
    rows: impl Iterator<Item = Vec<Cell>>,
) -> Result<(), XlsxError> {
    for (col, title) in columns.iter().enumerate() {
        sheet.write_string(0, col as u16, *title)?;
    }
    for (index, cells) in rows.enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in cells.into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => {
                    sheet.write_string(row, col, text)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(row, col, b)?;
                }
                Cell::Empty => {}
            }
        }
    }
    Ok(())
}

/// Writes the report in the requested format.
pub fn write_report(
    snapshot: &StatsSnapshot,
    path: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => write_json(snapshot, path),
        ExportFormat::Excel => write_excel(snapshot, path),
    }
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_events::{PassengerStatus, TaxiStatus};
    use tempfile::tempdir;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            summary: FleetSummary {
                simulation_name: None,
                avg_waiting_time: 2.5,
                avg_total_time: 9.0,
                simulation_time: 40.0,
                max_time: Some(60.0),
                finished: true,
            },
            passengers: (0..3)
                .map(|i| PassengerRow {
                    name: format!("passenger_{i}"),
                    waiting_time: Some(i as f64),
                    total_time: if i == 2 { None } else { Some(10.0) },
                    status: if i == 2 {
                        PassengerStatus::Waiting
                    } else {
                        PassengerStatus::Finished
                    },
                })
                .collect(),
            taxis: vec![TaxiRow {
                name: "taxi_0".into(),
                assignments: 2,
                distance: 31.0,
                status: TaxiStatus::Free,
            }],
        }
    }

    #[test]
    fn test_json_document_layout() {
        let json: serde_json::Value =
            serde_json::from_str(&to_json_string(&snapshot()).unwrap()).unwrap();

        assert_eq!(json["simulation"]["Max Time"], 60.0);
        assert!(json["simulation"].get("Simulation Name").is_none());
        assert_eq!(json["passengers"]["0"]["name"], "passenger_0");
        assert_eq!(json["passengers"]["2"]["status"], "waiting");
        assert!(json["passengers"]["2"]["total_time"].is_null());
        assert_eq!(json["taxis"]["0"]["assignments"], 2);
    }

    #[test]
    fn test_json_report_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("res.json");
        let original = snapshot();

        write_json(&original, &path).unwrap();
        let report = read_json_report(&path).unwrap();

        assert_eq!(report.passengers.len(), original.passengers.len());
        assert_eq!(report.taxis.len(), original.taxis.len());
        assert_eq!(report.into_snapshot(), original);
    }

    #[test]
    fn test_write_excel_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("res.xlsx");

        write_report(&snapshot(), &path, ExportFormat::Excel).unwrap();

        let metadata = fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("XLSX".parse::<ExportFormat>(), Ok(ExportFormat::Excel));
        assert_eq!("excel".parse::<ExportFormat>(), Ok(ExportFormat::Excel));
        assert!("csv".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("out/results.xlsx")),
            ExportFormat::Excel
        );
        assert_eq!(ExportFormat::from_path(Path::new("res")), ExportFormat::Json);
    }
}
