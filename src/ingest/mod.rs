/// TomTom Traffic API clients: the flow segment feed (point speed
/// samples) and the incident details feed (regional event lists).

pub mod flow;
pub mod incidents;

/// All traffic endpoints live under this host.
pub const TOMTOM_BASE_URL: &str = "https://api.tomtom.com";
