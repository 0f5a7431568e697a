/// The orchestration core: one loop that owns the HTTP client, the
/// per-feed "last fetched" timestamps, and the due tests deciding when
/// each feed runs.
///
/// Upstream failures never escape the loop; they degrade to empty
/// results at the fetch boundary. Filesystem failures do escape, since a
/// collector that cannot write its output has nothing left to do.

use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use chrono::{DateTime, Local, Timelike};

use crate::config::{Config, FlowSchedule};
use crate::ingest::{flow, incidents};
use crate::logging::{self, DataSource};
use crate::model::IncidentRecord;
use crate::storage;

pub struct Scheduler {
    client: reqwest::blocking::Client,
    config: Config,
    last_incident_fetch: Option<DateTime<Local>>,
    last_flow_fetch: Option<DateTime<Local>>,
}

impl Scheduler {
    pub fn new(config: Config) -> Result<Scheduler, Box<dyn std::error::Error>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Scheduler {
            client,
            config,
            last_incident_fetch: None,
            last_flow_fetch: None,
        })
    }

    // -----------------------------------------------------------------------
    // Due Tests
    // -----------------------------------------------------------------------

    /// Whether the incident feed should run now. Due when never fetched,
    /// or when the configured interval has elapsed since the last fetch.
    pub fn incidents_due_at(&self, now: DateTime<Local>) -> bool {
        match self.last_incident_fetch {
            None => true,
            Some(prev) => {
                now - prev
                    >= chrono::Duration::minutes(self.config.incidents.interval_minutes as i64)
            }
        }
    }

    /// Whether the flow sweep should run now.
    ///
    /// In trigger-hours mode a sweep is due while the current hour is in
    /// the trigger set, at most once per hour: a sweep recorded in the
    /// same hour-of-day suppresses further ones until the hour changes.
    /// In interval mode the test works like the incident feed's.
    pub fn flow_due_at(&self, now: DateTime<Local>) -> bool {
        match self.config.flow_schedule() {
            FlowSchedule::TriggerHours(hours) => {
                hours.contains(&now.hour())
                    && self
                        .last_flow_fetch
                        .map_or(true, |prev| prev.hour() != now.hour())
            }
            FlowSchedule::IntervalMinutes(minutes) => match self.last_flow_fetch {
                None => true,
                Some(prev) => now - prev >= chrono::Duration::minutes(minutes as i64),
            },
        }
    }

    pub fn mark_incidents_fetched(&mut self, now: DateTime<Local>) {
        self.last_incident_fetch = Some(now);
    }

    pub fn mark_flow_fetched(&mut self, now: DateTime<Local>) {
        self.last_flow_fetch = Some(now);
    }

    // -----------------------------------------------------------------------
    // Loop Body
    // -----------------------------------------------------------------------

    /// One pass: run whichever feeds are due at `now`.
    pub fn tick(&mut self, now: DateTime<Local>) -> Result<(), Box<dyn std::error::Error>> {
        if self.incidents_due_at(now) {
            self.run_incident_fetch(now)?;
        }
        if self.flow_due_at(now) {
            self.run_flow_sweep(now)?;
        }
        Ok(())
    }

    fn run_incident_fetch(
        &mut self,
        now: DateTime<Local>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let bbox = self.config.incidents.bounding_box();
        let records =
            match incidents::fetch_incidents(&self.client, &self.config.api_key, &bbox) {
                Ok(records) => records,
                Err(e) => {
                    logging::log_fetch_failure(DataSource::Incidents, None, "Incident fetch", &e);
                    Vec::new()
                }
            };
        self.store_incident_results(now, &records)
    }

    /// Persist an incident fetch outcome and advance the incident
    /// timestamp. An empty result skips the write; "fetched, found
    /// nothing" still counts as fetched.
    fn store_incident_results(
        &mut self,
        now: DateTime<Local>,
        records: &[IncidentRecord],
    ) -> Result<(), Box<dyn std::error::Error>> {
        if records.is_empty() {
            logging::info(DataSource::Incidents, None, "No data fetched");
        } else {
            let dir = Path::new(&self.config.incidents.output_dir);
            let path = storage::incident_file_path(dir, now);
            storage::write_incidents_csv(&path, records)?;
            logging::info(
                DataSource::Incidents,
                None,
                &format!("Data saved as {}", path.display()),
            );
        }

        self.mark_incidents_fetched(now);
        Ok(())
    }

    fn run_flow_sweep(&mut self, now: DateTime<Local>) -> Result<(), Box<dyn std::error::Error>> {
        let grid = self.config.flow.grid();
        let samples = flow::fetch_flow_grid(&self.client, &self.config.api_key, &grid);

        let successful = samples.iter().filter(|s| !s.is_error()).count();
        logging::log_sweep_summary(samples.len(), successful, samples.len() - successful);

        if samples.is_empty() {
            logging::info(DataSource::Flow, None, "No data fetched");
        } else {
            let dir = Path::new(&self.config.flow.output_dir);
            let path = storage::flow_file_path(dir, now);
            storage::write_flow_csv(&path, &samples)?;
            logging::info(
                DataSource::Flow,
                None,
                &format!("Data saved as {}", path.display()),
            );
        }

        self.mark_flow_fetched(now);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run Loop
    // -----------------------------------------------------------------------

    /// Run until the shutdown channel fires.
    ///
    /// The poll sleep doubles as the shutdown wait, so an interrupt takes
    /// effect without waiting out the interval. A dropped sender counts
    /// as shutdown too.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<(), Box<dyn std::error::Error>> {
        logging::info(
            DataSource::System,
            None,
            &format!(
                "Scheduler started (poll interval {}s)",
                self.config.scheduler.poll_interval_secs
            ),
        );

        loop {
            self.tick(Local::now())?;

            match shutdown.recv_timeout(self.config.poll_interval()) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduler_with(config_text: &str) -> Scheduler {
        let config = Config::from_toml_str(config_text).expect("test config should parse");
        Scheduler::new(config).expect("client should build")
    }

    /// A fixed local wall-clock instant on an ordinary day.
    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_unset_timestamps_make_both_feeds_due() {
        let scheduler = scheduler_with(
            r#"
            [flow]
            schedule = "interval"
            "#,
        );
        assert!(scheduler.incidents_due_at(at(7, 0)));
        assert!(scheduler.flow_due_at(at(7, 0)));
    }

    #[test]
    fn test_incidents_not_due_before_interval_elapses() {
        let mut scheduler = scheduler_with("");
        scheduler.mark_incidents_fetched(at(8, 0));
        assert!(!scheduler.incidents_due_at(at(8, 59)));
    }

    #[test]
    fn test_incidents_due_once_interval_elapses() {
        let mut scheduler = scheduler_with("");
        scheduler.mark_incidents_fetched(at(8, 0));
        assert!(scheduler.incidents_due_at(at(9, 0)));
        assert!(scheduler.incidents_due_at(at(10, 30)));
    }

    #[test]
    fn test_incident_interval_is_configurable() {
        let mut scheduler = scheduler_with(
            r#"
            [incidents]
            interval_minutes = 15
            "#,
        );
        scheduler.mark_incidents_fetched(at(8, 0));
        assert!(!scheduler.incidents_due_at(at(8, 14)));
        assert!(scheduler.incidents_due_at(at(8, 15)));
    }

    #[test]
    fn test_flow_sweep_runs_at_most_once_per_trigger_hour() {
        let mut scheduler = scheduler_with(
            r#"
            [flow]
            trigger_hours = [8, 9]
            "#,
        );

        assert!(scheduler.flow_due_at(at(8, 15)));
        scheduler.mark_flow_fetched(at(8, 15));

        // Same trigger hour: already covered.
        assert!(!scheduler.flow_due_at(at(8, 45)));
        // Next trigger hour: due again.
        assert!(scheduler.flow_due_at(at(9, 5)));
    }

    #[test]
    fn test_flow_not_due_outside_trigger_hours() {
        let scheduler = scheduler_with(
            r#"
            [flow]
            trigger_hours = [8, 18]
            "#,
        );
        assert!(!scheduler.flow_due_at(at(7, 59)));
        assert!(!scheduler.flow_due_at(at(12, 0)));
    }

    #[test]
    fn test_flow_empty_trigger_set_is_never_due() {
        let scheduler = scheduler_with(
            r#"
            [flow]
            trigger_hours = []
            "#,
        );
        assert!(!scheduler.flow_due_at(at(8, 0)));
    }

    #[test]
    fn test_empty_incident_result_marks_fetched_without_writing() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut scheduler = scheduler_with(&format!(
            r#"
            [incidents]
            output_dir = "{}"
            "#,
            dir.path().display()
        ));

        scheduler
            .store_incident_results(at(8, 0), &[])
            .expect("storing an empty result should not fail");

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 0, "empty fetch must not produce a file");
        assert!(!scheduler.incidents_due_at(at(8, 30)));
    }

    #[test]
    fn test_non_empty_incident_result_writes_timestamped_file() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let mut scheduler = scheduler_with(&format!(
            r#"
            [incidents]
            output_dir = "{}"
            "#,
            dir.path().display()
        ));

        let mut record = IncidentRecord::default();
        record.fields.insert(
            "properties.iconCategory".to_string(),
            serde_json::Value::from("Jam"),
        );
        scheduler
            .store_incident_results(at(8, 0), &[record])
            .expect("storing one record should succeed");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["traffic_incident_20260310_080000.csv"]);
        assert!(!scheduler.incidents_due_at(at(8, 30)));
    }

    #[test]
    fn test_flow_interval_mode_ignores_trigger_hours() {
        let mut scheduler = scheduler_with(
            r#"
            [flow]
            schedule = "interval"
            interval_minutes = 2
            trigger_hours = [8]
            "#,
        );
        scheduler.mark_flow_fetched(at(12, 15));

        assert!(!scheduler.flow_due_at(at(12, 16)));
        assert!(scheduler.flow_due_at(at(12, 17)));
    }
}
