use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

/// Appends one NDJSON line per outbound API call. Debugging aid; write
/// failures are warned about, never fatal.
pub(crate) struct ApiLog {
    file: File,
}

impl ApiLog {
    pub fn new(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log_call(&mut self, method: &str, call: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "call": call,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_status(&mut self, call: &str, status: u16) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "call": call,
            "status": status,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write API log entry: {e}");
        }
    }
}
