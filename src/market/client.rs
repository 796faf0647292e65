//! Blocking client for the GME market-data API.
//!
//! Sessions authenticate once with login and password, then send the bearer
//! token with every request. A `401` triggers one re-login and retry.
//! Authentication failures are errors; every other remote failure is logged
//! and reported as "no data" (`Ok(None)`).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::decode::{Payload, decode_content};
use super::table::{export_records_csv, extract_records};

/// Production endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mercatoelettrico.org/request/api/v1";

/// Platform name for public market results.
pub const PUBLIC_MARKET_RESULTS: &str = "PublicMarketResults";

/// Client failure that callers must handle.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// API login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Reads `GME_USERNAME` and `GME_PASSWORD`; `None` if either is unset
    /// or empty.
    pub fn from_env() -> Option<Self> {
        let username = env::var("GME_USERNAME").ok().filter(|s| !s.is_empty())?;
        let password = env::var("GME_PASSWORD").ok().filter(|s| !s.is_empty())?;
        Some(Self { username, password })
    }
}

/// Base URL from `GME_BASE_URL`, or [`DEFAULT_BASE_URL`].
pub fn base_url_from_env() -> String {
    env::var("GME_BASE_URL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends HTTP requests. Non-2xx statuses are responses, not errors.
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when no response was received.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// [`Transport`] over a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut req = match request.method {
            Method::Get => self.agent.get(&request.url),
            Method::Post => self.agent.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        let result = match &request.body {
            Some(body) => req.send_json(body),
            None => req.call(),
        };
        let response = match result {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => return Err(ClientError::Transport(t.to_string())),
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// A `RequestData` query.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub segment: String,
    pub data_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub attributes: Map<String, Value>,
}

impl DataRequest {
    pub fn new(data_name: &str, segment: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            segment: segment.to_string(),
            data_name: data_name.to_string(),
            start,
            end,
            attributes: Map::new(),
        }
    }

    /// Request body; dates are `yyyyMMdd` integers.
    pub fn payload(&self) -> Value {
        json!({
            "Platform": PUBLIC_MARKET_RESULTS,
            "Segment": self.segment,
            "DataName": self.data_name,
            "IntervalStart": compact_date(self.start),
            "IntervalEnd": compact_date(self.end),
            "Attributes": self.attributes,
        })
    }

    /// `{segment}_{data_name}_{YYYY-MM-DD}.csv`, named after the start date.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.csv",
            self.segment,
            self.data_name,
            self.start.format("%Y-%m-%d")
        )
    }
}

/// `2025-12-30` → `20251230`.
pub fn compact_date(d: NaiveDate) -> u32 {
    d.year().unsigned_abs() * 10_000 + d.month() * 100 + d.day()
}

/// A GME API session.
pub struct GmeClient {
    base_url: String,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    token: Option<String>,
}

impl GmeClient {
    /// Client for the production endpoint over `ureq`.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_transport(credentials, DEFAULT_BASE_URL, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(
        credentials: Credentials,
        base_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            transport,
            token: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Obtains a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] if the service rejects the login or
    /// replies with something other than a token.
    pub fn login(&mut self) -> Result<(), ClientError> {
        let request = HttpRequest {
            method: Method::Post,
            url: format!("{}/Auth", self.base_url),
            bearer: None,
            body: Some(json!({
                "Login": self.credentials.username,
                "Password": self.credentials.password,
            })),
        };
        let response = self
            .transport
            .send(&request)
            .map_err(|e| ClientError::Auth(e.to_string()))?;
        if !(200..300).contains(&response.status) {
            return Err(ClientError::Auth(format!("HTTP {}", response.status)));
        }
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| ClientError::Auth(format!("invalid login response: {e}")))?;

        let success = field(&body, "Success").and_then(Value::as_bool).unwrap_or(false);
        let token = field(&body, "token").and_then(Value::as_str);
        match (success, token) {
            (true, Some(token)) if !token.is_empty() => {
                self.token = Some(token.to_string());
                tracing::info!(user = %self.credentials.username, "authenticated");
                Ok(())
            }
            _ => {
                let reason = field(&body, "Reason")
                    .and_then(Value::as_str)
                    .unwrap_or("login rejected");
                Err(ClientError::Auth(reason.to_string()))
            }
        }
    }

    /// Sends an authenticated request, re-logging in once on `401`.
    ///
    /// Returns the parsed JSON body, or `None` for any non-auth failure.
    fn call(&mut self, method: Method, endpoint: &str, body: Option<Value>) -> Result<Option<Value>, ClientError> {
        if self.token.is_none() {
            self.login()?;
        }
        let mut request = HttpRequest {
            method,
            url: format!("{}{endpoint}", self.base_url),
            bearer: self.token.clone(),
            body,
        };

        let mut response = match self.transport.send(&request) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "request failed");
                return Ok(None);
            }
        };
        if response.status == 401 {
            tracing::info!(endpoint, "token rejected, re-authenticating");
            self.token = None;
            self.login()?;
            request.bearer = self.token.clone();
            response = match self.transport.send(&request) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(endpoint, error = %e, "request failed after re-login");
                    return Ok(None);
                }
            };
        }

        if !(200..300).contains(&response.status) {
            tracing::warn!(endpoint, status = response.status, body = %response.body, "request rejected");
            return Ok(None);
        }
        match serde_json::from_str(&response.body) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "response is not JSON");
                Ok(None)
            }
        }
    }

    /// Runs a `RequestData` query and decodes its content.
    ///
    /// # Errors
    ///
    /// Only authentication failures are errors; missing or undecodable
    /// content yields `Ok(None)`.
    pub fn request_data(&mut self, request: &DataRequest) -> Result<Option<Payload>, ClientError> {
        tracing::debug!(
            data_name = %request.data_name,
            segment = %request.segment,
            start = %request.start,
            end = %request.end,
            "requesting data"
        );
        let Some(body) = self.call(Method::Post, "/RequestData", Some(request.payload()))? else {
            return Ok(None);
        };

        let content = field(&body, "ContentResponse").and_then(Value::as_str);
        let Some(content) = content.filter(|c| !c.is_empty()) else {
            let result = field(&body, "ResultRequest").cloned().unwrap_or(Value::Null);
            tracing::warn!(data_name = %request.data_name, %result, "no content in response");
            return Ok(None);
        };

        match decode_content(content) {
            Ok(payload) => Ok(payload),
            Err(e) => {
                tracing::warn!(data_name = %request.data_name, error = %e, "failed to decode content");
                Ok(None)
            }
        }
    }

    /// Like [`request_data`](Self::request_data) but keeps only JSON content.
    ///
    /// # Errors
    ///
    /// Only authentication failures are errors.
    pub fn fetch_json(&mut self, request: &DataRequest) -> Result<Option<Value>, ClientError> {
        match self.request_data(request)? {
            Some(Payload::Json(v)) => Ok(Some(v)),
            Some(Payload::Raw(bytes)) => {
                tracing::warn!(
                    data_name = %request.data_name,
                    bytes = bytes.len(),
                    "content is not JSON"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Downloads a data set and writes it as `{dir}/{file_name}`.
    ///
    /// Returns the written path, or `None` if there was nothing to write.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] on authentication failure and
    /// [`ClientError::Output`] if the CSV cannot be written.
    pub fn fetch_and_save_csv(
        &mut self,
        request: &DataRequest,
        dir: &Path,
    ) -> Result<Option<PathBuf>, ClientError> {
        let Some(doc) = self.fetch_json(request)? else {
            return Ok(None);
        };
        let records = extract_records(&doc);
        if records.is_empty() {
            tracing::warn!(data_name = %request.data_name, "response held no records");
            return Ok(None);
        }

        let path = dir.join(request.file_name());
        fs::create_dir_all(dir)
            .and_then(|()| export_records_csv(&records, &path))
            .map_err(|source| ClientError::Output {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), rows = records.len(), "saved market data");
        Ok(Some(path))
    }

    /// Remaining service allowance.
    ///
    /// # Errors
    ///
    /// Only authentication failures are errors.
    pub fn quotas(&mut self) -> Result<Option<Value>, ClientError> {
        self.call(Method::Get, "/GetMyQuotas", None)
    }
}

/// Looks up `key`, also trying it with the case of its first letter
/// flipped (`ContentResponse` / `contentResponse`).
fn field<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key)
        .or_else(|| body.get(flip_first_case(key).as_str()))
}

fn flip_first_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_uppercase() => c.to_lowercase().chain(chars).collect(),
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
