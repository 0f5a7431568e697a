/// Core data types for the TomTom traffic collection service.
///
/// This module defines the shared domain model imported by all other
/// modules. It contains no I/O, only types and their display logic.

use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Geographic types
// ---------------------------------------------------------------------------

/// Rectangular query region for the incidents endpoint, in WGS84 degrees.
///
/// Field order follows the TomTom `bbox` parameter:
/// minLon, minLat, maxLon, maxLat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl std::fmt::Display for BoundingBox {
    /// Renders the box in the comma-joined form the API expects,
    /// e.g. `-74.25,40.5,-73.7,40.95`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// A single vertex of a road-segment shape, as returned by the flow
/// endpoint's `coordinates.coordinate` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Flow types
// ---------------------------------------------------------------------------

/// Speed and travel-time figures for one road segment, extracted from a
/// `flowSegmentData` response. Values are passed through unchanged from
/// the source JSON; speeds are km/h and travel times seconds per the API.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    pub current_speed: f64,
    pub free_flow_speed: f64,
    pub current_travel_time: f64,
    pub free_flow_travel_time: f64,
    /// Ordered shape of the segment the API matched to the queried point.
    pub coordinates: Vec<Coordinate>,
}

/// Outcome of one point query within a grid sweep.
///
/// A failed cell degrades to an error marker rather than aborting the
/// sweep; the marker text carries the upstream status code when one was
/// received.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    Segment(FlowRecord),
    Failed(String),
}

/// One grid cell's result: the queried mesh point plus its outcome.
///
/// The queried point is kept for diagnostics and traceability; the CSV
/// column set remains the record's own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSample {
    pub latitude: f64,
    pub longitude: f64,
    pub outcome: FlowOutcome,
}

impl FlowSample {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, FlowOutcome::Failed(_))
    }
}

// ---------------------------------------------------------------------------
// Incident types
// ---------------------------------------------------------------------------

/// One traffic incident, flattened to a single level of dot-joined keys
/// (`properties.iconCategory`, `geometry.coordinates`, …).
///
/// The incidents endpoint returns GeoJSON-style features whose field set
/// varies with the request; keeping the record as a key → value mapping
/// preserves whatever the API sent. Keys are held sorted so the CSV
/// column order is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncidentRecord {
    pub fields: BTreeMap<String, Value>,
}

impl IncidentRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The remapped category label, if the incident carried a mappable
    /// `properties.iconCategory` code.
    pub fn category_label(&self) -> Option<&str> {
        self.get("properties.iconCategory").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or processing TomTom traffic data.
#[derive(Debug, Clone, PartialEq)]
pub enum TomTomError {
    /// The request never produced a response (connect failure, timeout).
    RequestError(String),
    /// Non-2xx HTTP response from the API.
    HttpError(u16),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The response parsed but the expected key was absent
    /// (e.g. no `flowSegmentData` object).
    MissingData(String),
}

impl std::fmt::Display for TomTomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TomTomError::RequestError(msg) => write!(f, "Request error: {}", msg),
            TomTomError::HttpError(code) => write!(f, "HTTP error: {}", code),
            TomTomError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            TomTomError::MissingData(key) => write!(f, "Missing data: {}", key),
        }
    }
}

impl std::error::Error for TomTomError {}
