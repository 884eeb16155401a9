use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Deserialize;

/// A named comfort profile. Only `Home` and `Away` are ever switched
/// automatically; anything else is user- or schedule-selected and left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClimateLabel {
    Home,
    Away,
    Other(String),
}

impl ClimateLabel {
    pub fn from_ref(s: &str) -> Self {
        match s {
            "home" => ClimateLabel::Home,
            "away" => ClimateLabel::Away,
            other => ClimateLabel::Other(other.to_string()),
        }
    }

    pub fn as_ref_str(&self) -> &str {
        match self {
            ClimateLabel::Home => "home",
            ClimateLabel::Away => "away",
            ClimateLabel::Other(s) => s,
        }
    }

    /// Whether the engine is allowed to move the device off this climate.
    pub fn is_switchable(&self) -> bool {
        matches!(self, ClimateLabel::Home | ClimateLabel::Away)
    }
}

impl fmt::Display for ClimateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref_str())
    }
}

/// thermostatSummary response. `revision_list` stays optional so a
/// shape-mismatched summary degrades to "no changes" instead of failing
/// the cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct Summary {
    #[serde(rename = "revisionList")]
    pub revision_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatResponse {
    #[serde(default)]
    pub thermostat_list: Vec<Thermostat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermostat {
    pub identifier: String,
    /// Device-local wall clock, "%Y-%m-%d %H:%M:%S".
    #[serde(default)]
    pub thermostat_time: String,
    #[serde(default)]
    pub events: Vec<ThermostatEvent>,
    #[serde(default)]
    pub program: Option<Program>,
}

impl Thermostat {
    /// The climate actually in force: the last running event's hold climate,
    /// falling back to the program's current climate.
    pub fn running_climate(&self) -> Option<ClimateLabel> {
        self.events
            .iter()
            .filter(|e| e.running)
            .last()
            .map(|e| ClimateLabel::from_ref(&e.hold_climate_ref))
            .or_else(|| {
                self.program
                    .as_ref()
                    .map(|p| ClimateLabel::from_ref(&p.current_climate_ref))
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub hold_climate_ref: String,
    #[serde(default)]
    pub end_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(default)]
    pub current_climate_ref: String,
}

/// runtimeReport response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(default)]
    pub sensor_list: Vec<SensorBlock>,
}

/// One thermostat's section of a runtime report: sensor metadata plus
/// comma-separated data rows addressed through the `columns` header.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorBlock {
    #[serde(default)]
    pub sensors: Vec<SensorMeta>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorMeta {
    pub sensor_id: String,
    pub sensor_type: String,
}

/// One timestamped aggregation of co-located sensor readings.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub timestamp: NaiveDateTime,
    /// Sensor type ("occupancy", "temperature", ...) to the values recorded
    /// at this timestamp across sensors of that type.
    pub values: BTreeMap<String, Vec<f64>>,
}

impl SensorSample {
    /// Summed occupancy readings for this sample; absent readings count as 0.
    pub fn occupancy(&self) -> f64 {
        self.values
            .get("occupancy")
            .map(|v| v.iter().sum())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(running: bool, climate: &str) -> ThermostatEvent {
        ThermostatEvent {
            event_type: "hold".to_string(),
            running,
            hold_climate_ref: climate.to_string(),
            end_time: String::new(),
        }
    }

    fn thermostat(events: Vec<ThermostatEvent>, program: Option<&str>) -> Thermostat {
        Thermostat {
            identifier: "123".to_string(),
            thermostat_time: "2024-05-06 10:00:00".to_string(),
            events,
            program: program.map(|c| Program {
                current_climate_ref: c.to_string(),
            }),
        }
    }

    #[test]
    fn climate_label_round_trip() {
        assert_eq!(ClimateLabel::from_ref("home"), ClimateLabel::Home);
        assert_eq!(ClimateLabel::from_ref("away"), ClimateLabel::Away);
        assert_eq!(
            ClimateLabel::from_ref("sleep"),
            ClimateLabel::Other("sleep".to_string())
        );
        assert_eq!(ClimateLabel::Home.as_ref_str(), "home");
        assert_eq!(ClimateLabel::Other("sleep".into()).as_ref_str(), "sleep");
    }

    #[test]
    fn only_home_and_away_are_switchable() {
        assert!(ClimateLabel::Home.is_switchable());
        assert!(ClimateLabel::Away.is_switchable());
        assert!(!ClimateLabel::Other("sleep".into()).is_switchable());
    }

    #[test]
    fn running_event_beats_program() {
        let t = thermostat(vec![event(true, "home")], Some("away"));
        assert_eq!(t.running_climate(), Some(ClimateLabel::Home));
    }

    #[test]
    fn last_running_event_wins() {
        let t = thermostat(
            vec![event(true, "home"), event(false, "sleep"), event(true, "away")],
            Some("home"),
        );
        assert_eq!(t.running_climate(), Some(ClimateLabel::Away));
    }

    #[test]
    fn falls_back_to_program_when_no_event_runs() {
        let t = thermostat(vec![event(false, "home")], Some("away"));
        assert_eq!(t.running_climate(), Some(ClimateLabel::Away));
    }

    #[test]
    fn no_events_no_program_yields_none() {
        let t = thermostat(vec![], None);
        assert_eq!(t.running_climate(), None);
    }

    #[test]
    fn occupancy_sums_across_sensors() {
        let mut values = BTreeMap::new();
        values.insert("occupancy".to_string(), vec![1.0, 0.0, 1.0]);
        values.insert("temperature".to_string(), vec![71.2]);
        let sample = SensorSample {
            timestamp: NaiveDateTime::parse_from_str("2024-05-06 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            values,
        };
        assert_eq!(sample.occupancy(), 2.0);
    }

    #[test]
    fn occupancy_missing_counts_as_zero() {
        let sample = SensorSample {
            timestamp: NaiveDateTime::parse_from_str("2024-05-06 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            values: BTreeMap::new(),
        };
        assert_eq!(sample.occupancy(), 0.0);
    }
}
