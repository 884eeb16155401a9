use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::protocol::DATETIME_FMT;
use crate::types::{ReportResponse, SensorBlock, SensorSample};
use crate::{Error, Result};

/// Raw cells the report uses for "no reading at this timestamp".
const NO_DATA: &[&str] = &["", "null"];

/// Flatten a runtime report into chronological occupancy-relevant samples.
///
/// Row order is the report's own (chronological). Cells carrying the no-data
/// sentinel are dropped rather than coerced to zero; rows that end up with no
/// readings at all are dropped entirely. A non-numeric cell in a real column
/// is a data-integrity error for the whole report.
pub fn sensor_samples(report: &ReportResponse) -> Result<Vec<SensorSample>> {
    let block = report
        .sensor_list
        .first()
        .ok_or_else(|| Error::Protocol("runtime report has no sensorList".to_string()))?;
    block_samples(block)
}

fn block_samples(block: &SensorBlock) -> Result<Vec<SensorSample>> {
    let columns: HashMap<&str, usize> = block
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| (name.as_str(), index))
        .collect();
    let date_col = *columns
        .get("date")
        .ok_or_else(|| Error::Protocol("report has no date column".to_string()))?;
    let time_col = *columns
        .get("time")
        .ok_or_else(|| Error::Protocol("report has no time column".to_string()))?;

    let mut samples = Vec::new();
    for row in &block.data {
        let cells: Vec<&str> = row.split(',').collect();
        let date = cells.get(date_col).copied().unwrap_or("");
        let time = cells.get(time_col).copied().unwrap_or("");
        let stamp = format!("{date} {time}");
        let timestamp = NaiveDateTime::parse_from_str(&stamp, DATETIME_FMT)
            .map_err(|e| Error::BadSample(format!("bad row timestamp {stamp:?}: {e}")))?;

        let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for sensor in &block.sensors {
            let Some(&col) = columns.get(sensor.sensor_id.as_str()) else {
                debug!(sensor = %sensor.sensor_id, "sensor has no report column");
                continue;
            };
            let Some(cell) = cells.get(col) else {
                continue;
            };
            if NO_DATA.contains(cell) {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| {
                Error::BadSample(format!(
                    "sensor {} reading {cell:?} is not numeric",
                    sensor.sensor_id
                ))
            })?;
            values
                .entry(sensor.sensor_type.clone())
                .or_default()
                .push(value);
        }
        if !values.is_empty() {
            samples.push(SensorSample { timestamp, values });
        }
    }
    Ok(samples)
}
