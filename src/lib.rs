//! Traffic data collection service for the TomTom Traffic API.
//!
//! Polls two feeds on independent schedules, a regional incident list
//! and a grid sweep of point flow measurements, and exports each fetch
//! as a timestamped CSV file.

pub mod categories;
pub mod config;
pub mod grid;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod storage;
pub mod verify;
