use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use crate::gateway::ThermostatGateway;
use crate::hold::HoldWindow;
use crate::presence::Presence;
use crate::protocol::DATETIME_FMT;
use crate::report::sensor_samples;
use crate::types::{ClimateLabel, SensorSample, Summary, Thermostat};
use crate::{Error, Result};

const WINDOW_SAMPLES: usize = 3;
const HOLD_MINUTES: i64 = 14;

/// Field offsets within a colon-separated composite revision row. Field 6 is
/// the interval (telemetry) revision, not the thermostat-metadata one.
const REV_IDENTIFIER: usize = 0;
const REV_INTERVAL: usize = 6;
const REV_FIELDS: usize = 7;

/// Tracks the last interval revision seen per device; a device is only worth
/// fetching when that token moves.
#[derive(Debug, Default)]
pub struct RevisionTracker {
    last_seen: HashMap<String, String>,
}

impl RevisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices whose interval revision changed since the previous
    /// observation, in encounter order. Never-seen devices always count as
    /// changed. A summary without a revision list degrades to "no changes".
    pub fn observe(&mut self, summary: &Summary) -> Vec<String> {
        let Some(rows) = &summary.revision_list else {
            warn!("summary has no revisionList; treating as no changes");
            return Vec::new();
        };
        let mut changed = Vec::new();
        for row in rows {
            let parts: Vec<&str> = row.split(':').collect();
            if parts.len() < REV_FIELDS {
                warn!(row = %row, "malformed revision row");
                continue;
            }
            let identifier = parts[REV_IDENTIFIER];
            let interval = parts[REV_INTERVAL];
            if self.last_seen.get(identifier).map(String::as_str) != Some(interval) {
                changed.push(identifier.to_string());
                self.last_seen
                    .insert(identifier.to_string(), interval.to_string());
            }
        }
        changed
    }
}

/// What a single decision cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub changed: usize,
    pub holds: usize,
    pub failed: usize,
}

/// Drives one occupancy decision per changed device per cycle: poll the
/// revision listing, aggregate each changed device's sensor window, and
/// submit a hold where the running climate disagrees with the sensors.
pub struct Engine<G, P> {
    gateway: G,
    probe: P,
    ping_addrs: Vec<String>,
    revisions: RevisionTracker,
}

impl<G: ThermostatGateway, P: Presence> Engine<G, P> {
    pub fn new(gateway: G, probe: P, ping_addrs: Vec<String>) -> Self {
        Self {
            gateway,
            probe,
            ping_addrs,
            revisions: RevisionTracker::new(),
        }
    }

    /// One full decision cycle. Per-device failures are logged and counted,
    /// never propagated, so one bad report can't mask the other devices.
    /// Gateway-level failures (summary or detail fetch, auth rejection)
    /// abort the cycle and surface to the caller.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let summary = self.gateway.fetch_summary().await?;
        let changed = self.revisions.observe(&summary);
        let mut report = CycleReport {
            changed: changed.len(),
            ..CycleReport::default()
        };
        if changed.is_empty() {
            return Ok(report);
        }

        let thermostats = self.gateway.fetch_thermostats(&changed, true, true).await?;

        // Probed once per cycle; the result is shared by every device below.
        let live_addr = if self.ping_addrs.is_empty() {
            None
        } else {
            let found = self.probe.first_live(&self.ping_addrs).await;
            info!(found = ?found, "presence probe");
            found
        };

        for identifier in &changed {
            match self
                .evaluate(identifier, &thermostats, live_addr.as_deref())
                .await
            {
                Ok(true) => report.holds += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(device = %identifier, error = %e, "device evaluation failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn evaluate(
        &mut self,
        identifier: &str,
        thermostats: &HashMap<String, Thermostat>,
        live_addr: Option<&str>,
    ) -> Result<bool> {
        let raw = self.gateway.fetch_report(identifier, true).await?;
        let samples = sensor_samples(&raw)?;
        let window = &samples[samples.len().saturating_sub(WINDOW_SAMPLES)..];
        let target = desired_climate(window, live_addr);
        info!(device = identifier, "sensors say we're {target}");

        let Some(thermostat) = thermostats.get(identifier) else {
            return Err(Error::Protocol(format!(
                "no details for thermostat {identifier}"
            )));
        };

        for event in &thermostat.events {
            if event.running {
                info!(
                    device = identifier,
                    kind = %event.event_type,
                    climate = %event.hold_climate_ref,
                    until = %event.end_time,
                    "running event"
                );
            }
        }

        let Some(running) = thermostat.running_climate() else {
            warn!(device = identifier, "no running event or program; skipping");
            return Ok(false);
        };
        if thermostat.events.iter().all(|e| !e.running) {
            info!(device = identifier, climate = %running, "regularly scheduled climate");
        }

        if !running.is_switchable() || running == target {
            return Ok(false);
        }

        info!(device = identifier, from = %running, to = %target, "changing climate");
        let start = NaiveDateTime::parse_from_str(&thermostat.thermostat_time, DATETIME_FMT)
            .map_err(|e| {
                Error::Protocol(format!(
                    "bad thermostatTime {:?}: {e}",
                    thermostat.thermostat_time
                ))
            })?;
        let hold = HoldWindow::starting_at(start, HOLD_MINUTES);
        self.gateway
            .submit_hold(identifier, target.as_ref_str(), hold.start, hold.end)
            .await?;
        Ok(true)
    }
}

/// Scan the trailing window oldest to newest. The label starts at Away and
/// latches to Home on the first occupied sample; it never falls back within
/// one scan. A live presence address counts a zero-occupancy sample as
/// occupied, for that sample's contribution only.
fn desired_climate(window: &[SensorSample], live_addr: Option<&str>) -> ClimateLabel {
    let mut label = ClimateLabel::Away;
    for sample in window {
        let mut occupied = sample.occupancy();
        if occupied == 0.0 && live_addr.is_some() {
            occupied += 1.0;
        }
        if occupied != 0.0 {
            label = ClimateLabel::Home;
        }
        info!(
            time = %sample.timestamp.format("%H:%M"),
            values = ?sample.values,
            live_addr = ?live_addr,
            "sample"
        );
    }
    label
}
