//! HTTP client for the Escavador v2 case endpoint.

use std::fmt;
use std::time::Duration;

use precatorio_core::CaseRecord;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.escavador.com/api/v2/processos";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("ESCAVADOR_API_KEY is not set")]
    MissingApiKey,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}")]
    Server { status: u16 },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// HTTP status behind the error, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Server { status } => Some(*status),
            SyncError::Http(e) => e.status().map(|s| s.as_u16()),
            SyncError::Json(_) => None,
        }
    }
}

/// A case number that could not be fetched within the retry budget.
#[derive(Error, Debug)]
#[error("fetching {numero} failed after {attempts} attempt(s): {source}")]
pub struct FetchFailure {
    pub numero: String,
    pub attempts: u32,
    pub status: Option<u16>,
    pub source: SyncError,
}

/// API credentials and endpoint, resolved once at startup.
#[derive(Clone)]
pub struct ApiConfig {
    api_key: String,
    base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Reject a missing or blank key.
    ///
    /// `base_url` should be like `https://api.escavador.com/api/v2/processos`;
    /// a trailing slash is dropped.
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Exponential backoff: `initial_delay`, doubling per retry, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(16);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// A fetched case plus what it took to get it.
#[derive(Debug)]
pub struct Fetched {
    /// The number that was requested.
    pub numero: String,
    pub record: CaseRecord,
    pub attempts: u32,
    /// Backoff waits actually slept, in order.
    pub waits: Vec<Duration>,
}

/// Fetch client. Stateless apart from config; the connection pool is the caller's.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A fresh connection pool with the configured request timeout.
    pub fn http_pool(&self) -> Result<reqwest::Client, SyncError> {
        Ok(reqwest::Client::builder().timeout(self.config.timeout).build()?)
    }

    pub fn case_url(&self, numero: &str) -> String {
        format!("{}/numero_cnj/{}", self.config.base_url, numero)
    }

    async fn fetch_once(&self, http: &reqwest::Client, numero: &str) -> Result<CaseRecord, SyncError> {
        let url = self.case_url(numero);
        debug!(url = %url, "requesting case");
        let resp = http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .timeout(self.config.timeout)
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(SyncError::Server {
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch one case, retrying any failure with backoff until the budget runs out.
    pub async fn fetch_case(&self, http: &reqwest::Client, numero: &str) -> Result<Fetched, FetchFailure> {
        let mut waits = Vec::new();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.fetch_once(http, numero).await {
                Ok(record) => {
                    info!(numero, attempts, "fetched case");
                    return Ok(Fetched {
                        numero: numero.to_string(),
                        record,
                        attempts,
                        waits,
                    });
                }
                Err(err) if attempts >= self.retry.max_attempts => {
                    return Err(FetchFailure {
                        numero: numero.to_string(),
                        attempts,
                        status: err.status(),
                        source: err,
                    });
                }
                Err(err) => {
                    let wait = self.retry.delay_for(attempts - 1);
                    warn!(
                        numero,
                        attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    waits.push(wait);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NUMERO: &str = "0001234-56.2020.8.26.0053";

    fn client(base: &str) -> ApiClient {
        let config = ApiConfig::new(Some("secret".into()), base)
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        ApiClient::new(config).with_retry(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(8),
        })
    }

    #[test]
    fn missing_or_blank_key_is_rejected() {
        assert!(matches!(
            ApiConfig::new(None, DEFAULT_BASE_URL),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            ApiConfig::new(Some("  ".into()), DEFAULT_BASE_URL),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn config_trims_trailing_slash_and_hides_key() {
        let config = ApiConfig::new(Some("k".into()), "http://localhost:4000/").unwrap();
        assert_eq!(config.base_url(), "http://localhost:4000");
        assert!(!format!("{config:?}").contains("\"k\""));
        assert_eq!(
            ApiClient::new(config).case_url("1"),
            "http://localhost:4000/numero_cnj/1"
        );
    }

    #[test]
    fn default_backoff_schedule() {
        let policy = RetryPolicy::default();
        let waits: Vec<u64> = (0..5).map(|r| policy.delay_for(r).as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8, 10, 10]);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/numero_cnj/{NUMERO}")))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/numero_cnj/{NUMERO}")))
            .and(header("Authorization", "Bearer secret"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .and(header("Accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"numero_cnj": NUMERO, "fontes": []})),
            )
            .mount(&server)
            .await;

        let api = client(&server.uri());
        let http = api.http_pool().unwrap();
        let fetched = api.fetch_case(&http, NUMERO).await.unwrap();

        assert_eq!(fetched.attempts, 3);
        assert_eq!(fetched.record.numero_cnj.as_deref(), Some(NUMERO));
        assert_eq!(
            fetched.waits,
            vec![Duration::from_millis(5), Duration::from_millis(8)]
        );
        assert!(fetched.waits.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = client(&server.uri());
        let http = api.http_pool().unwrap();
        let failure = api.fetch_case(&http, NUMERO).await.unwrap_err();

        assert_eq!(failure.numero, NUMERO);
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.status, Some(404));
        assert!(matches!(failure.source, SyncError::Server { status: 404 }));
    }

    #[tokio::test]
    async fn undecodable_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let api = client(&server.uri());
        let http = api.http_pool().unwrap();
        let failure = api.fetch_case(&http, NUMERO).await.unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.status, None);
        assert!(matches!(failure.source, SyncError::Json(_)));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"numero_cnj": NUMERO}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let api = client(&server.uri());
        let http = api.http_pool().unwrap();
        let failure = api.fetch_case(&http, NUMERO).await.unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(&failure.source, SyncError::Http(e) if e.is_timeout()));
    }
}
