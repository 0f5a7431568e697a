/// TomTom Traffic Flow API client
///
/// Retrieves flow segment data (current versus free-flow speed and travel
/// time for the road closest to a point) from the TomTom Traffic API.
///
/// API documentation: https://developer.tomtom.com/traffic-api/documentation/traffic-flow/flow-segment-data

use serde::Deserialize;

use crate::grid::{GridPoint, GridSpec};
use crate::logging::{self, DataSource};
use crate::model::{Coordinate, FlowOutcome, FlowRecord, FlowSample, TomTomError};

use super::TOMTOM_BASE_URL;

/// Flow segment endpoint parameters. Version, style, zoom level, and
/// format are path segments; thickness is a query parameter. Zoom 22 asks
/// for the finest-grained segment containing the query point.
const FLOW_SERVICE_VERSION: u32 = 4;
const FLOW_STYLE: &str = "absolute";
const FLOW_ZOOM: u32 = 22;
const FLOW_FORMAT: &str = "json";
const FLOW_THICKNESS: u32 = 1;

// ============================================================================
// Flow API Response Structures
// ============================================================================

/// Top-level flow segment response
#[derive(Debug, Deserialize)]
pub struct FlowResponse {
    #[serde(rename = "flowSegmentData")]
    pub flow_segment_data: Option<FlowSegmentData>,
}

/// Flow measurements for one road segment. The API also sends road class,
/// confidence, and closure fields; only the speed, travel time, and
/// geometry fields are kept.
#[derive(Debug, Deserialize)]
pub struct FlowSegmentData {
    #[serde(rename = "currentSpeed")]
    pub current_speed: f64,
    #[serde(rename = "freeFlowSpeed")]
    pub free_flow_speed: f64,
    #[serde(rename = "currentTravelTime")]
    pub current_travel_time: f64,
    #[serde(rename = "freeFlowTravelTime")]
    pub free_flow_travel_time: f64,
    pub coordinates: CoordinateList,
}

/// The API nests the segment polyline one level down
#[derive(Debug, Deserialize)]
pub struct CoordinateList {
    pub coordinate: Vec<ApiCoordinate>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Build the flow segment request URL for a query point
pub fn build_flow_url(api_key: &str, latitude: f64, longitude: f64) -> String {
    format!(
        "{}/traffic/services/{}/flowSegmentData/{}/{}/{}?key={}&point={},{}&thickness={}",
        TOMTOM_BASE_URL,
        FLOW_SERVICE_VERSION,
        FLOW_STYLE,
        FLOW_ZOOM,
        FLOW_FORMAT,
        api_key,
        latitude,
        longitude,
        FLOW_THICKNESS
    )
}

/// Parse a flow segment response body
///
/// A body without the `flowSegmentData` key is a well-formed response that
/// carries no measurement, reported as `MissingData` rather than a parse
/// failure.
pub fn parse_flow_response(body: &str) -> Result<FlowRecord, TomTomError> {
    let response: FlowResponse =
        serde_json::from_str(body).map_err(|e| TomTomError::ParseError(e.to_string()))?;

    let data = response
        .flow_segment_data
        .ok_or_else(|| TomTomError::MissingData("flowSegmentData".to_string()))?;

    Ok(FlowRecord {
        current_speed: data.current_speed,
        free_flow_speed: data.free_flow_speed,
        current_travel_time: data.current_travel_time,
        free_flow_travel_time: data.free_flow_travel_time,
        coordinates: data
            .coordinates
            .coordinate
            .into_iter()
            .map(|c| Coordinate {
                latitude: c.latitude,
                longitude: c.longitude,
            })
            .collect(),
    })
}

/// Fetch flow segment data for the road closest to a point
///
/// # Parameters
/// - `client`: HTTP client
/// - `api_key`: TomTom API key
/// - `latitude`, `longitude`: query point in decimal degrees
pub fn fetch_flow_at_point(
    client: &reqwest::blocking::Client,
    api_key: &str,
    latitude: f64,
    longitude: f64,
) -> Result<FlowRecord, TomTomError> {
    let url = build_flow_url(api_key, latitude, longitude);

    let response = client
        .get(&url)
        .send()
        .map_err(|e| TomTomError::RequestError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(TomTomError::HttpError(response.status().as_u16()));
    }

    let body = response
        .text()
        .map_err(|e| TomTomError::RequestError(e.to_string()))?;

    parse_flow_response(&body)
}

// ============================================================================
// Grid Sweep
// ============================================================================

/// Sample every point of a grid with the given fetch function
///
/// One sample per grid point, in the grid's row-major order. A failed
/// fetch becomes an error sample carrying the failure text; it never
/// aborts the sweep or drops the row.
pub fn sample_grid<F>(grid: &GridSpec, mut fetch: F) -> Vec<FlowSample>
where
    F: FnMut(GridPoint) -> Result<FlowRecord, TomTomError>,
{
    grid.points()
        .map(|point| {
            let outcome = match fetch(point) {
                Ok(record) => FlowOutcome::Segment(record),
                Err(e) => FlowOutcome::Failed(e.to_string()),
            };
            FlowSample {
                latitude: point.latitude,
                longitude: point.longitude,
                outcome,
            }
        })
        .collect()
}

/// Sweep the grid against the live API, logging each cell failure
pub fn fetch_flow_grid(
    client: &reqwest::blocking::Client,
    api_key: &str,
    grid: &GridSpec,
) -> Vec<FlowSample> {
    sample_grid(grid, |point| {
        let result = fetch_flow_at_point(client, api_key, point.latitude, point.longitude);
        if let Err(ref e) = result {
            logging::log_fetch_failure(
                DataSource::Flow,
                Some(&format!("{},{}", point.latitude, point.longitude)),
                "Flow segment fetch",
                e,
            );
        }
        result
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SEGMENT_RESPONSE: &str = r#"{
        "flowSegmentData": {
            "frc": "FRC2",
            "currentSpeed": 33,
            "freeFlowSpeed": 44,
            "currentTravelTime": 130,
            "freeFlowTravelTime": 98,
            "confidence": 1,
            "roadClosure": false,
            "coordinates": {
                "coordinate": [
                    {"latitude": 40.75773, "longitude": -73.98565},
                    {"latitude": 40.75779, "longitude": -73.98551},
                    {"latitude": 40.75785, "longitude": -73.98537}
                ]
            },
            "@version": "traffic-service-flow 1.0.120"
        }
    }"#;

    fn test_grid() -> GridSpec {
        GridSpec {
            lat_min: 40.50,
            lat_max: 40.60,
            lon_min: -74.00,
            lon_max: -73.85,
            lat_step: 0.05,
            lon_step: 0.05,
        }
    }

    fn segment_record() -> FlowRecord {
        FlowRecord {
            current_speed: 33.0,
            free_flow_speed: 44.0,
            current_travel_time: 130.0,
            free_flow_travel_time: 98.0,
            coordinates: vec![Coordinate {
                latitude: 40.75773,
                longitude: -73.98565,
            }],
        }
    }

    #[test]
    fn test_build_flow_url_layout() {
        let url = build_flow_url("demo-key", 40.75, -73.98);
        assert_eq!(
            url,
            "https://api.tomtom.com/traffic/services/4/flowSegmentData/absolute/22/json\
             ?key=demo-key&point=40.75,-73.98&thickness=1"
        );
    }

    #[test]
    fn test_parse_passes_measurements_through_unchanged() {
        let record = parse_flow_response(SEGMENT_RESPONSE).expect("fixture should parse");
        assert_eq!(record.current_speed, 33.0);
        assert_eq!(record.free_flow_speed, 44.0);
        assert_eq!(record.current_travel_time, 130.0);
        assert_eq!(record.free_flow_travel_time, 98.0);
    }

    #[test]
    fn test_parse_keeps_segment_polyline_order() {
        let record = parse_flow_response(SEGMENT_RESPONSE).unwrap();
        assert_eq!(record.coordinates.len(), 3);
        assert_eq!(record.coordinates[0].latitude, 40.75773);
        assert_eq!(record.coordinates[2].longitude, -73.98537);
    }

    #[test]
    fn test_parse_without_segment_data_is_missing_data() {
        let result = parse_flow_response("{}");
        match result {
            Err(TomTomError::MissingData(field)) => assert_eq!(field, "flowSegmentData"),
            other => panic!("expected MissingData, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_non_json_body() {
        let result = parse_flow_response("<html>Service Unavailable</html>");
        assert!(matches!(result, Err(TomTomError::ParseError(_))));
    }

    #[test]
    fn test_sample_grid_visits_every_point_in_row_major_order() {
        let grid = test_grid();
        let mut visited = Vec::new();
        let samples = sample_grid(&grid, |point| {
            visited.push((point.latitude, point.longitude));
            Ok(segment_record())
        });

        assert_eq!(samples.len(), grid.len());
        assert_eq!(visited.len(), grid.len());
        // First row holds lat_min; longitude advances fastest.
        assert_eq!(visited[0], (40.50, -74.00));
        assert_eq!(visited[1], (40.50, -73.95));
        assert!(samples.iter().all(|s| !s.is_error()));
    }

    #[test]
    fn test_sample_grid_isolates_cell_failures() {
        let grid = test_grid();
        let mut calls = 0;
        let samples = sample_grid(&grid, |_| {
            calls += 1;
            if calls == 2 {
                Err(TomTomError::HttpError(404))
            } else {
                Ok(segment_record())
            }
        });

        // The failing cell is recorded in place, not dropped.
        assert_eq!(samples.len(), grid.len());
        let failed: Vec<&FlowSample> = samples.iter().filter(|s| s.is_error()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].latitude, 40.50);
        assert_eq!(failed[0].longitude, -73.95);
    }

    #[test]
    fn test_failed_cell_carries_http_status_text() {
        let grid = GridSpec {
            lat_max: 40.55,
            lon_max: -73.95,
            ..test_grid()
        };
        let samples = sample_grid(&grid, |_| Err(TomTomError::HttpError(404)));

        assert_eq!(samples.len(), 1);
        match &samples[0].outcome {
            FlowOutcome::Failed(text) => assert!(
                text.contains("404"),
                "error text should name the status code, got: {}",
                text
            ),
            other => panic!("expected failed outcome, got {:?}", other),
        }
    }
}
