//! Endpoint Verification Module
//!
//! Probes the live TomTom endpoints with the effective configuration to
//! determine whether the credential works and the configured region
//! returns data.
//!
//! Use this after changing the API key, region, or grid before leaving
//! the collector to run unattended.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

use crate::config::Config;
use crate::grid::GridPoint;
use crate::ingest::{flow, incidents};
use crate::model::{BoundingBox, TomTomError};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub flow_result: FlowVerification,
    pub incident_result: IncidentVerification,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub checks_total: usize,
    pub checks_working: usize,
    pub checks_failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowVerification {
    pub latitude: f64,
    pub longitude: f64,
    pub status: VerificationStatus,
    pub endpoint_reachable: bool,
    pub segment_found: bool,
    pub coordinate_count: usize,
    pub current_speed: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentVerification {
    pub bbox: String,
    pub status: VerificationStatus,
    pub endpoint_reachable: bool,
    pub incident_count: usize,
    pub labeled_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

// ============================================================================
// Flow Endpoint Verification
// ============================================================================

pub fn verify_flow_endpoint(
    client: &reqwest::blocking::Client,
    api_key: &str,
    point: GridPoint,
) -> FlowVerification {
    let mut result = FlowVerification {
        latitude: point.latitude,
        longitude: point.longitude,
        status: VerificationStatus::Failed,
        endpoint_reachable: false,
        segment_found: false,
        coordinate_count: 0,
        current_speed: None,
        error_message: None,
    };

    // Test: fetch the segment closest to the probe point
    match flow::fetch_flow_at_point(client, api_key, point.latitude, point.longitude) {
        Ok(record) => {
            result.endpoint_reachable = true;
            result.segment_found = true;
            result.coordinate_count = record.coordinates.len();
            result.current_speed = Some(record.current_speed);
        }
        Err(TomTomError::MissingData(_)) => {
            // The endpoint answered but has no road near the probe point.
            result.endpoint_reachable = true;
            result.error_message = Some("No flow segment at probe point".to_string());
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    // Determine status
    if result.segment_found {
        result.status = VerificationStatus::Success;
    } else if result.endpoint_reachable {
        result.status = VerificationStatus::PartialSuccess;
    }

    result
}

// ============================================================================
// Incident Endpoint Verification
// ============================================================================

pub fn verify_incidents_endpoint(
    client: &reqwest::blocking::Client,
    api_key: &str,
    bbox: &BoundingBox,
) -> IncidentVerification {
    let mut result = IncidentVerification {
        bbox: bbox.to_string(),
        status: VerificationStatus::Failed,
        endpoint_reachable: false,
        incident_count: 0,
        labeled_count: 0,
        error_message: None,
    };

    // Test: fetch the current incident list for the configured region
    match incidents::fetch_incidents(client, api_key, bbox) {
        Ok(records) => {
            result.endpoint_reachable = true;
            result.incident_count = records.len();
            result.labeled_count = records
                .iter()
                .filter(|r| r.category_label().is_some())
                .count();
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    // Determine status
    if result.endpoint_reachable {
        if result.incident_count > 0 {
            result.status = VerificationStatus::Success;
        } else {
            result.status = VerificationStatus::PartialSuccess;
        }
    }

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(config: &Config) -> Result<VerificationReport, Box<dyn Error>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()?;

    println!("🔍 Verifying flow endpoint...");
    let probe_point = config.flow.grid().center();
    print!("  point {},{} ... ", probe_point.latitude, probe_point.longitude);
    let flow_result = verify_flow_endpoint(&client, &config.api_key, probe_point);

    match flow_result.status {
        VerificationStatus::Success => {
            println!(
                "✓ OK (segment with {} coordinates, current speed {:?})",
                flow_result.coordinate_count, flow_result.current_speed
            );
        }
        VerificationStatus::PartialSuccess => {
            println!("⚠ Reachable but no segment at probe point");
        }
        VerificationStatus::Failed => {
            println!(
                "✗ FAILED: {}",
                flow_result.error_message.as_deref().unwrap_or("Unknown")
            );
        }
    }

    println!("\n🔍 Verifying incident endpoint...");
    let bbox = config.incidents.bounding_box();
    print!("  bbox {} ... ", bbox);
    let incident_result = verify_incidents_endpoint(&client, &config.api_key, &bbox);

    match incident_result.status {
        VerificationStatus::Success => {
            println!(
                "✓ OK ({} incidents, {} with category labels)",
                incident_result.incident_count, incident_result.labeled_count
            );
        }
        VerificationStatus::PartialSuccess => {
            println!("⚠ Reachable but no incidents in region right now");
        }
        VerificationStatus::Failed => {
            println!(
                "✗ FAILED: {}",
                incident_result
                    .error_message
                    .as_deref()
                    .unwrap_or("Unknown")
            );
        }
    }

    let statuses = [&flow_result.status, &incident_result.status];
    let checks_failed = statuses
        .into_iter()
        .filter(|s| **s == VerificationStatus::Failed)
        .count();
    let summary = VerificationSummary {
        checks_total: statuses.len(),
        checks_working: statuses.len() - checks_failed,
        checks_failed,
    };

    Ok(VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        flow_result,
        incident_result,
        summary,
    })
}

impl VerificationReport {
    /// True when no check failed outright. Partial results count as
    /// working: an empty region is not a broken endpoint.
    pub fn passed(&self) -> bool {
        self.summary.checks_failed == 0
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Flow endpoint:      {}",
        status_text(&report.flow_result.status)
    );
    println!(
        "Incident endpoint:  {}",
        status_text(&report.incident_result.status)
    );
    println!();
    println!(
        "Checks passing: {}/{}  ({} failed)",
        report.summary.checks_working, report.summary.checks_total, report.summary.checks_failed
    );
    println!("═══════════════════════════════════════════════════════════");
}

fn status_text(status: &VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Success => "working",
        VerificationStatus::PartialSuccess => "reachable, no data",
        VerificationStatus::Failed => "FAILED",
    }
}
