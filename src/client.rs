use std::collections::HashMap;

use chrono::{Duration, Local, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::gateway::ThermostatGateway;
use crate::logger::ApiLog;
use crate::protocol::{self, API_URL, DEFAULT_APP_KEY, SCOPE};
use crate::store::{Session, TokenStore};
use crate::types::{ReportResponse, Summary, Thermostat, ThermostatResponse};
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    refresh_token: String,
    expires_in: i64,
}

/// One-time authorization challenge. The pin has to be registered on the
/// ecobee portal before `complete_install` can trade the code for tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct PinChallenge {
    #[serde(rename = "ecobeePin")]
    pub pin: String,
    pub code: String,
    /// Minutes until the pin expires.
    pub expires_in: i64,
}

pub struct EcobeeClientBuilder {
    base_url: String,
    app_key: String,
    scope: String,
    token_path: String,
    api_log_path: Option<String>,
}

impl EcobeeClientBuilder {
    pub fn new(token_path: impl Into<String>) -> Self {
        Self {
            base_url: API_URL.to_string(),
            app_key: DEFAULT_APP_KEY.to_string(),
            scope: SCOPE.to_string(),
            token_path: token_path.into(),
            api_log_path: None,
        }
    }

    /// Point at a different API host. Integration tests aim this at a mock.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn app_key(mut self, key: impl Into<String>) -> Self {
        self.app_key = key.into();
        self
    }

    /// Append an NDJSON trace of outbound API calls to this file.
    pub fn api_log(mut self, path: impl Into<String>) -> Self {
        self.api_log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<EcobeeClient> {
        let store = TokenStore::new(&self.token_path);
        let session = store.load()?;
        let logger = match self.api_log_path {
            Some(path) => Some(ApiLog::new(&path)?),
            None => None,
        };
        Ok(EcobeeClient {
            http: reqwest::Client::new(),
            base_url: self.base_url,
            app_key: self.app_key,
            scope: self.scope,
            store,
            session,
            logger,
        })
    }
}

/// Authenticated transport to the ecobee API: token refresh, the PIN install
/// flow, and the four operations the decision engine consumes.
pub struct EcobeeClient {
    http: reqwest::Client,
    base_url: String,
    app_key: String,
    scope: String,
    store: TokenStore,
    session: Option<Session>,
    logger: Option<ApiLog>,
}

impl EcobeeClient {
    pub fn builder(token_path: impl Into<String>) -> EcobeeClientBuilder {
        EcobeeClientBuilder::new(token_path)
    }

    pub fn is_authorized(&self) -> bool {
        self.session.is_some()
    }

    // -- Authorization --

    /// Start the one-time PIN authorization.
    pub async fn request_pin(&mut self) -> Result<PinChallenge> {
        let url = format!("{}/authorize", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("response_type", "ecobeePin"),
                ("client_id", self.app_key.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        decode(resp, "authorize").await
    }

    /// Trade the registered authorization code for tokens and persist them.
    pub async fn complete_install(&mut self, code: &str) -> Result<()> {
        let url = format!("{}/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .query(&[
                ("grant_type", "ecobeePin"),
                ("code", code),
                ("client_id", self.app_key.as_str()),
            ])
            .send()
            .await?;
        self.update_session(resp).await
    }

    async fn maybe_refresh(&mut self) -> Result<()> {
        if let Some(session) = &self.session
            && session.is_fresh()
        {
            return Ok(());
        }
        let refresh_token = match &self.session {
            Some(s) => s.refresh_token.clone(),
            None => return Err(Error::NotAuthorized),
        };
        info!("refreshing authentication");
        let url = format!("{}/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .query(&[
                ("grant_type", "refresh_token"),
                ("code", refresh_token.as_str()),
                ("client_id", self.app_key.as_str()),
            ])
            .send()
            .await?;
        self.update_session(resp).await
    }

    async fn update_session(&mut self, resp: reqwest::Response) -> Result<()> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body = %body, "token endpoint rejected the request");
            return Err(Error::AuthRejected);
        }
        let tokens: TokenResponse = decode(resp, "token").await?;
        let session = Session {
            access_token: tokens.access_token,
            token_type: tokens.token_type,
            refresh_token: tokens.refresh_token,
            expires_at: Some(Utc::now() + Duration::seconds(tokens.expires_in)),
        };
        self.store.save(&session)?;
        self.session = Some(session);
        Ok(())
    }

    // -- Transport --

    async fn get<T: serde::de::DeserializeOwned>(&mut self, call: &str, body: &Value) -> Result<T> {
        self.maybe_refresh().await?;
        let auth = self.bearer()?;
        if let Some(ref mut log) = self.logger {
            log.log_call("GET", call, body);
        }
        let resp = self
            .http
            .get(format!("{}/1/{call}", self.base_url))
            .query(&[("json", body.to_string())])
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("Authorization", auth)
            .send()
            .await?;
        let resp = self.check(call, resp).await?;
        decode(resp, call).await
    }

    async fn post<T: serde::de::DeserializeOwned>(&mut self, call: &str, body: &Value) -> Result<T> {
        self.maybe_refresh().await?;
        let auth = self.bearer()?;
        if let Some(ref mut log) = self.logger {
            log.log_call("POST", call, body);
        }
        let resp = self
            .http
            .post(format!("{}/1/{call}", self.base_url))
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("Authorization", auth)
            .body(body.to_string())
            .send()
            .await?;
        let resp = self.check(call, resp).await?;
        decode(resp, call).await
    }

    fn bearer(&self) -> Result<String> {
        let session = self.session.as_ref().ok_or(Error::NotAuthorized)?;
        Ok(format!("{} {}", session.token_type, session.access_token))
    }

    /// A 401 invalidates the session so the next cycle re-authenticates
    /// instead of retrying with stale credentials.
    async fn check(&mut self, call: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if let Some(ref mut log) = self.logger {
            log.log_status(call, status.as_u16());
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            warn!(call, body = %body, "unauthorized; invalidating session");
            if let Some(ref mut session) = self.session {
                session.invalidate();
                self.store.save(session)?;
            }
            return Err(Error::AuthRejected);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(call, %status, body = %body, "API call failed");
            return Err(Error::Protocol(format!("{call} returned {status}")));
        }
        Ok(resp)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response, call: &str) -> Result<T> {
    let body = resp.text().await?;
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!(call, payload = %body, "couldn't decode response");
            Err(Error::Decode(format!("{call}: {e}")))
        }
    }
}

impl ThermostatGateway for EcobeeClient {
    async fn fetch_summary(&mut self) -> Result<Summary> {
        self.get("thermostatSummary", &protocol::summary_body()).await
    }

    async fn fetch_thermostats(
        &mut self,
        ids: &[String],
        include_program: bool,
        include_events: bool,
    ) -> Result<HashMap<String, Thermostat>> {
        let body = protocol::thermostat_body(ids, include_program, include_events);
        let resp: ThermostatResponse = self.get("thermostat", &body).await?;
        Ok(resp
            .thermostat_list
            .into_iter()
            .map(|t| (t.identifier.clone(), t))
            .collect())
    }

    async fn fetch_report(&mut self, id: &str, include_sensors: bool) -> Result<ReportResponse> {
        // One day either side of now tolerates device-clock skew.
        let today = Local::now().date_naive();
        let body = protocol::report_body(
            id,
            today - Duration::days(1),
            today + Duration::days(1),
            include_sensors,
        );
        self.get("runtimeReport", &body).await
    }

    async fn submit_hold(
        &mut self,
        id: &str,
        climate: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<()> {
        info!(device = id, climate, start = %start, end = %end, "setHold");
        let body = protocol::set_hold_body(id, climate, start, end);
        let _: Value = self.post("thermostat", &body).await?;
        Ok(())
    }
}
