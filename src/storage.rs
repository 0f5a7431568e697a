/// Timestamped CSV export for fetch results.
///
/// One file per successful non-empty fetch, named for the local
/// wall-clock moment it was written. Incident files carry whatever
/// columns the flattened records produced; flow files carry the fixed
/// measurement columns, plus an `error` column when any cell of the
/// sweep failed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::model::{Coordinate, FlowOutcome, FlowSample, IncidentRecord};

/// Flow file columns, in write order.
const FLOW_COLUMNS: [&str; 5] = [
    "currentSpeed",
    "freeFlowSpeed",
    "currentTravelTime",
    "freeFlowTravelTime",
    "coordinates",
];

// ---------------------------------------------------------------------------
// Output Locations
// ---------------------------------------------------------------------------

/// Create an output directory if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

pub fn incident_file_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "traffic_incident_{}.csv",
        now.format("%Y%m%d_%H%M%S")
    ))
}

pub fn flow_file_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("traffic_flow_{}.csv", now.format("%Y%m%d_%H%M%S")))
}

// ---------------------------------------------------------------------------
// Incident Export
// ---------------------------------------------------------------------------

/// Write flattened incident records as CSV.
///
/// The header is the sorted union of every record's keys; records missing
/// a column get an empty cell there.
pub fn write_incidents_csv(path: &Path, records: &[IncidentRecord]) -> Result<(), csv::Error> {
    let mut columns = BTreeSet::new();
    for record in records {
        for key in record.fields.keys() {
            columns.insert(key.as_str());
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|&column| {
                record
                    .fields
                    .get(column)
                    .map(value_to_cell)
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Render one JSON value as a CSV cell. Scalars print bare; arrays and
/// objects keep their JSON text so they can be parsed back on read.
fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Flow Export
// ---------------------------------------------------------------------------

/// Write a grid sweep's samples as CSV.
///
/// Successful cells fill the measurement columns; failed cells leave them
/// empty and carry their message in the `error` column, which is present
/// only when the sweep had at least one failure.
pub fn write_flow_csv(path: &Path, samples: &[FlowSample]) -> Result<(), csv::Error> {
    let include_error_column = samples.iter().any(|s| s.is_error());

    let mut header: Vec<&str> = FLOW_COLUMNS.to_vec();
    if include_error_column {
        header.push("error");
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;

    for sample in samples {
        match &sample.outcome {
            FlowOutcome::Segment(record) => {
                let mut row = vec![
                    record.current_speed.to_string(),
                    record.free_flow_speed.to_string(),
                    record.current_travel_time.to_string(),
                    record.free_flow_travel_time.to_string(),
                    coordinates_cell(&record.coordinates),
                ];
                if include_error_column {
                    row.push(String::new());
                }
                writer.write_record(&row)?;
            }
            FlowOutcome::Failed(message) => {
                let mut row = vec![String::new(); FLOW_COLUMNS.len()];
                row.push(message.clone());
                writer.write_record(&row)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Segment shape as a JSON array of [latitude, longitude] pairs.
fn coordinates_cell(coordinates: &[Coordinate]) -> String {
    let pairs: Vec<[f64; 2]> = coordinates
        .iter()
        .map(|c| [c.latitude, c.longitude])
        .collect();
    serde_json::to_string(&pairs).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
