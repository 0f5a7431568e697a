/// TomTom Traffic Incident Details API client
///
/// Retrieves the incident list for a bounding box from the TomTom Traffic
/// API and flattens each GeoJSON-shaped incident into a flat column map
/// ready for CSV export.
///
/// API documentation: https://developer.tomtom.com/traffic-api/documentation/traffic-incidents/incident-details

use std::collections::BTreeMap;

use serde_json::Value;

use crate::categories;
use crate::logging::{self, DataSource};
use crate::model::{BoundingBox, IncidentRecord, TomTomError};

use super::TOMTOM_BASE_URL;

const INCIDENTS_SERVICE_VERSION: u32 = 5;

/// Flattened path of the numeric category code remapped to a label.
const ICON_CATEGORY_KEY: &str = "properties.iconCategory";

// ============================================================================
// API Client Functions
// ============================================================================

/// Build the incident details request URL for a bounding box
pub fn build_incidents_url(api_key: &str, bbox: &BoundingBox) -> String {
    format!(
        "{}/traffic/services/{}/incidentDetails?key={}&bbox={}",
        TOMTOM_BASE_URL, INCIDENTS_SERVICE_VERSION, api_key, bbox
    )
}

/// Parse an incident details response body
///
/// Each incident is flattened to dot-joined keys and its numeric
/// `properties.iconCategory` code is replaced with the category label, or
/// null when the code is unknown. A body without the `incidents` key is a
/// valid response with nothing to report.
pub fn parse_incidents_response(body: &str) -> Result<Vec<IncidentRecord>, TomTomError> {
    let response: Value =
        serde_json::from_str(body).map_err(|e| TomTomError::ParseError(e.to_string()))?;

    let incidents = match response.get("incidents") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            return Err(TomTomError::ParseError(
                "incidents field is not an array".to_string(),
            ));
        }
        None => &[],
    };

    let mut records = Vec::new();
    for item in incidents {
        if item.is_object() {
            let mut fields = BTreeMap::new();
            flatten_into("", item, &mut fields);
            remap_icon_category(&mut fields);
            records.push(IncidentRecord { fields });
        }
    }

    Ok(records)
}

/// Fetch all current incidents inside a bounding box
pub fn fetch_incidents(
    client: &reqwest::blocking::Client,
    api_key: &str,
    bbox: &BoundingBox,
) -> Result<Vec<IncidentRecord>, TomTomError> {
    let url = build_incidents_url(api_key, bbox);

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

    let records = parse_incidents_response(&body)?;

    logging::info(
        DataSource::Incidents,
        None,
        &format!("Number of incidents: {}", records.len()),
    );

    Ok(records)
}

// ============================================================================
// Flattening
// ============================================================================

/// Flatten a JSON value into dot-joined column keys
///
/// Nested objects contribute their children under `parent.child` paths;
/// arrays and scalars are kept whole as cell values.
fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&path, child, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

/// Replace the numeric category code with its label in place
///
/// Unknown codes and non-numeric values become null; a record without the
/// key is left without it.
fn remap_icon_category(fields: &mut BTreeMap<String, Value>) {
    if let Some(value) = fields.get_mut(ICON_CATEGORY_KEY) {
        *value = value
            .as_u64()
            .and_then(categories::label_for_code)
            .map(|label| Value::String(label.to_string()))
            .unwrap_or(Value::Null);
    }
}

// ============================================================================
// Tests
// ============================================================================
