use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::Result;
use crate::types::{ReportResponse, Summary, Thermostat};

/// The remote thermostat service as seen by the decision engine. Injected so
/// the engine can be exercised against fakes.
#[allow(async_fn_in_trait)]
pub trait ThermostatGateway {
    /// Listing of per-device composite revision tokens.
    async fn fetch_summary(&mut self) -> Result<Summary>;

    /// Details for the given devices, keyed by identifier.
    async fn fetch_thermostats(
        &mut self,
        ids: &[String],
        include_program: bool,
        include_events: bool,
    ) -> Result<HashMap<String, Thermostat>>;

    /// Historical runtime report for one device.
    async fn fetch_report(&mut self, id: &str, include_sensors: bool) -> Result<ReportResponse>;

    /// Pin `id` to `climate` for the absolute window `start..end`.
    async fn submit_hold(
        &mut self,
        id: &str,
        climate: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<()>;
}
