//! HTTP client for the uHoo integration REST API.

use crate::error::{Error, Result};
use crate::models::{Device, SampleMode, SensorReading, Session};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

const API_BASE: &str = "https://api.uhooinc.com/integration";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_SAMPLE_LIMIT: u32 = 5;
const MAX_SAMPLE_LIMIT: u32 = 100;

/// `getdata` responses wrap the samples in a `data` array.
#[derive(Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Vec<SensorReading>,
}

/// Current session plus a generation counter. The counter lets a caller that
/// saw a rejected token tell whether another caller already replaced it.
#[derive(Default)]
struct SessionState {
    session: Option<Session>,
    generation: u64,
}

/// uHoo API client.
///
/// Owns the account API key and the derived session; all operations go
/// through it. Sharing one instance behind an `Arc` is the intended way to
/// issue concurrent requests.
///
/// ```no_run
/// use uhoo_api::Client;
///
/// # async fn run() -> Result<(), uhoo_api::Error> {
/// let client = Client::new("my-api-key")?;
/// for device in client.list_devices().await? {
///     println!("{}: {}", device.serial_number, device.device_name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    http: HttpClient,
    base_url: String,
    api_key: String,
    user_agent: String,
    sample_mode: SampleMode,
    sample_limit: u32,
    state: Mutex<SessionState>,
}

/// Builder for [`Client`] with the recognized configuration options.
pub struct ClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    sample_mode: SampleMode,
    sample_limit: u32,
}

impl ClientBuilder {
    /// Override the API root (e.g. for a staging endpoint or test server).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Per-request timeout. Elapsing surfaces as [`Error::Transport`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sampling granularity used for `getdata` requests.
    pub fn sample_mode(mut self, mode: SampleMode) -> Self {
        self.sample_mode = mode;
        self
    }

    /// How many samples to request per `getdata` call (clamped to 1..=100).
    pub fn sample_limit(mut self, limit: u32) -> Self {
        self.sample_limit = limit;
        self
    }

    pub fn build(self) -> Result<Client> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| Error::validation(format!("invalid base URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "unsupported base URL scheme: {}",
                parsed.scheme()
            )));
        }
        let http = HttpClient::builder().timeout(self.timeout).build()?;
        Ok(Client {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key,
            user_agent: format!("uhoo-api/{}", crate::VERSION),
            sample_mode: self.sample_mode,
            sample_limit: self.sample_limit.clamp(1, MAX_SAMPLE_LIMIT),
            state: Mutex::new(SessionState::default()),
        })
    }
}

impl Client {
    /// Create a client with default configuration.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Start configuring a client for the given account API key.
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            sample_mode: SampleMode::default(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    /// Exchange the API key for an access token and store it as the current
    /// session.
    ///
    /// Operations call this lazily, so invoking it up front is optional; it
    /// is mainly useful to validate credentials early.
    pub async fn login(&self) -> Result<Session> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state).await
    }

    /// Drop the current session. The next operation re-authenticates.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if state.session.take().is_some() {
            state.generation = state.generation.wrapping_add(1);
            debug!("session cleared");
        }
    }

    /// Copy of the current session, if one is held.
    pub async fn session(&self) -> Option<Session> {
        self.state.lock().await.session.clone()
    }

    /// List all devices registered on the account. An account with no
    /// devices yields an empty vec.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.request_json("getdeviceslist", &[]).await
    }

    /// Fetch the most recent reading for a device.
    pub async fn get_latest_reading(&self, serial_number: &str) -> Result<SensorReading> {
        if serial_number.is_empty() {
            return Err(Error::validation("serial_number must not be empty"));
        }
        let envelope: DataEnvelope = self
            .request_json(
                "getdata",
                &[
                    ("serialNumber", serial_number.to_string()),
                    ("mode", self.sample_mode.as_str().to_string()),
                    ("limit", self.sample_limit.to_string()),
                ],
            )
            .await?;
        let mut latest = envelope
            .data
            .into_iter()
            .max_by_key(|r| r.timestamp)
            .ok_or_else(|| Error::NotFound {
                message: format!("no readings for device {serial_number}"),
            })?;
        latest.serial_number = serial_number.to_string();
        Ok(latest)
    }

    /// Fetch readings for a device within `[start, end]`, sorted by
    /// non-decreasing timestamp. An empty window yields an empty vec.
    ///
    /// The vendor exposes sampled windows rather than a range query, so the
    /// client requests enough samples to cover the span at the configured
    /// granularity and clips the result to the window.
    pub async fn get_historical_readings(
        &self,
        serial_number: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        if serial_number.is_empty() {
            return Err(Error::validation("serial_number must not be empty"));
        }
        if start > end {
            return Err(Error::validation("start must not be after end"));
        }
        let span_secs = (end - start).num_seconds();
        let limit = (span_secs / self.sample_mode.bucket_secs() + 1)
            .clamp(1, i64::from(MAX_SAMPLE_LIMIT)) as u32;
        let envelope: DataEnvelope = self
            .request_json(
                "getdata",
                &[
                    ("serialNumber", serial_number.to_string()),
                    ("mode", self.sample_mode.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let mut readings: Vec<SensorReading> = envelope
            .data
            .into_iter()
            .filter(|r| r.timestamp >= start.timestamp() && r.timestamp <= end.timestamp())
            .map(|mut r| {
                r.serial_number = serial_number.to_string();
                r
            })
            .collect();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    // ---- session management -----------------------------------------------

    /// Authenticate while holding the session lock, so concurrent callers
    /// that hit a missing or stale session await this one request instead of
    /// issuing their own.
    async fn login_locked(&self, state: &mut SessionState) -> Result<Session> {
        debug!("requesting access token");
        let session = self.generate_token().await?;
        state.session = Some(session.clone());
        state.generation = state.generation.wrapping_add(1);
        Ok(session)
    }

    /// Token to use for the next request, logging in first if the session is
    /// missing or past its reported lifetime.
    async fn current_token(&self) -> Result<(String, u64)> {
        let mut state = self.state.lock().await;
        if let Some(ref session) = state.session {
            if !session.is_expired() {
                return Ok((session.access_token.clone(), state.generation));
            }
            debug!("session past its lifetime, refreshing before request");
        }
        let session = self.login_locked(&mut state).await?;
        Ok((session.access_token, state.generation))
    }

    /// Replace a token the API just rejected. If another caller already
    /// refreshed (the generation moved), reuse the stored session instead of
    /// issuing a duplicate `generatetoken` request.
    async fn refresh_token(&self, seen_generation: u64) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.generation != seen_generation {
            if let Some(ref session) = state.session {
                debug!("session already refreshed by a concurrent caller");
                return Ok(session.access_token.clone());
            }
        }
        warn!("session rejected by the API, re-authenticating");
        let session = self.login_locked(&mut state).await?;
        Ok(session.access_token)
    }

    // ---- request plumbing -------------------------------------------------

    async fn generate_token(&self) -> Result<Session> {
        let url = format!("{}/generatetoken", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.as_str())
            .form(&[("code", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        if is_session_rejection(status) {
            return Err(Error::Authentication {
                message: read_error_message(response).await,
            });
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(&str, String)],
        token: &str,
    ) -> Result<Response> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, "sending request");
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.as_str())
            .form(form)
            .send()
            .await?;
        Ok(response)
    }

    /// Send an authenticated request, transparently re-authenticating once
    /// if the API rejects the session, and map the response to `T`.
    async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        let (token, generation) = self.current_token().await?;
        let mut response = self.post_form(endpoint, form, &token).await?;
        if is_session_rejection(response.status()) {
            let token = self.refresh_token(generation).await?;
            response = self.post_form(endpoint, form, &token).await?;
            if is_session_rejection(response.status()) {
                return Err(Error::SessionExpired {
                    message: read_error_message(response).await,
                });
            }
        }
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }
}

/// The original integration treats both 401 and 403 as a lapsed session.
fn is_session_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Map a non-success, non-session response to the error taxonomy.
async fn status_error(response: Response) -> Error {
    let status = response.status();
    match status {
        StatusCode::NOT_FOUND => Error::NotFound {
            message: read_error_message(response).await,
        },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            retry_after: retry_after_hint(&response),
        },
        _ => Error::Api {
            status: status.as_u16(),
            message: read_error_message(response).await,
        },
    }
}

fn retry_after_hint(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Best-effort human-readable message from an error body.
async fn read_error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }
    if !body.trim().is_empty() {
        return body.trim().to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
