use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Credentials for the remote API, persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    /// Absent or past means the access token must be refreshed before use.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// True while the access token is still good, with a one minute margin.
    pub fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() + Duration::seconds(60) < at,
            None => false,
        }
    }

    /// Force a refresh before the next API call.
    pub fn invalidate(&mut self) {
        self.expires_at = None;
    }
}

/// JSON-file persistence for the session.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let session = serde_json::from_str(&raw)
            .map_err(|e| Error::Decode(format!("token file {}: {e}", self.path.display())))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let raw = serde_json::to_string_pretty(session).map_err(|e| Error::Decode(e.to_string()))?;
        fs::write(&self.path, raw)?;
        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }
}
