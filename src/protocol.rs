use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};

pub const API_URL: &str = "https://api.ecobee.com";
pub const DEFAULT_APP_KEY: &str = "I8U8uUExhEzXtPGxITMijwu2A5bgBf1X";
pub const SCOPE: &str = "smartWrite";

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIME_FMT: &str = "%H:%M:%S";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn summary_body() -> Value {
    json!({
        "selection": {
            "selectionType": "registered",
            "selectionMatch": ""
        }
    })
}

pub fn thermostat_body(ids: &[String], include_program: bool, include_events: bool) -> Value {
    json!({
        "selection": {
            "selectionType": "thermostats",
            "selectionMatch": ids.join(":"),
            "includeProgram": include_program,
            "includeEvents": include_events
        }
    })
}

pub fn report_body(id: &str, start: NaiveDate, end: NaiveDate, include_sensors: bool) -> Value {
    json!({
        "startDate": start.format(DATE_FMT).to_string(),
        "endDate": end.format(DATE_FMT).to_string(),
        "includeSensors": include_sensors,
        "selection": {
            "selectionType": "thermostats",
            "selectionMatch": id
        }
    })
}

/// setHold with an absolute start/end window. No setpoints: the referenced
/// climate supplies its own.
pub fn set_hold_body(id: &str, climate: &str, start: NaiveDateTime, end: NaiveDateTime) -> Value {
    json!({
        "selection": {
            "selectionType": "thermostats",
            "selectionMatch": id
        },
        "functions": [{
            "type": "setHold",
            "params": {
                "holdClimateRef": climate,
                "startDate": start.format(DATE_FMT).to_string(),
                "startTime": start.format(TIME_FMT).to_string(),
                "endDate": end.format(DATE_FMT).to_string(),
                "endTime": end.format(TIME_FMT).to_string(),
                "holdType": "dateTime"
            }
        }]
    })
}
