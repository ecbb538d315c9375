//! Outbound request execution with bounded retries and exponential backoff.
//!
//! Every remote call goes through [`RequestExecutor::execute`]. Each attempt is
//! classified into an [`AttemptOutcome`]; only rate limiting, transient server
//! failures and transport errors are retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_JITTER: Duration = Duration::from_millis(500);
const RETRYABLE_STATUSES: [u16; 3] = [429, 500, 503];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single logical request: target endpoint, parameters and method.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub method: Method,
}

impl ApiRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            method: Method::Get,
        }
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(endpoint)
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Parameters rendered for logs, with the API key masked.
    pub fn redacted_params(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| {
                if key == "key" {
                    format!("{key}=***")
                } else {
                    format!("{key}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{endpoint} returned non-retryable status {status}: {body}")]
    NonRetryable {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("{endpoint} still failing after {attempts} attempts (last: {last_failure})")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        last_failure: String,
    },
}

/// Network seam between the executor and the outside world.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// reqwest-backed transport. GET sends parameters as a query string, POST as
/// a JSON object body.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.endpoint).query(&request.params),
            Method::Post => {
                let body: Map<String, Value> = request
                    .params
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect();
                self.client.post(&request.endpoint).json(&body)
            }
        };

        // reqwest errors carry the full URL, query string and key included
        let response = builder.send().await.map_err(reqwest::Error::without_url)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        Ok(RawResponse { status, body })
    }
}

/// Result of classifying one attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(RawResponse),
    Retry { delay: Duration, reason: String },
    Fatal(RequestError),
}

/// Retry state for one logical request: the delay doubles after every
/// retryable failure and each wait adds up to `max_jitter` of random jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    delay: Duration,
    max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(INITIAL_DELAY, MAX_JITTER)
    }
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            delay: initial_delay,
            max_jitter,
        }
    }

    pub fn assess(
        &mut self,
        endpoint: &str,
        result: Result<RawResponse, TransportError>,
    ) -> AttemptOutcome {
        let jitter = random_jitter(self.max_jitter);
        self.assess_with_jitter(endpoint, result, jitter)
    }

    pub fn assess_with_jitter(
        &mut self,
        endpoint: &str,
        result: Result<RawResponse, TransportError>,
        jitter: Duration,
    ) -> AttemptOutcome {
        let reason = match result {
            Ok(response) if response.status == 200 => return AttemptOutcome::Success(response),
            Ok(response) if RETRYABLE_STATUSES.contains(&response.status) => {
                format!("status {}", response.status)
            }
            Ok(response) => {
                return AttemptOutcome::Fatal(RequestError::NonRetryable {
                    endpoint: endpoint.to_string(),
                    status: response.status,
                    body: response.body,
                });
            }
            Err(err) => err.to_string(),
        };

        let delay = self.delay + jitter.min(self.max_jitter);
        self.delay = self.delay.saturating_mul(2);
        AttemptOutcome::Retry { delay, reason }
    }
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rand::rng().random_range(0.0..max.as_secs_f64()))
}

pub struct RequestExecutor<T> {
    transport: T,
    max_attempts: u32,
    initial_delay: Duration,
    max_jitter: Duration,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: INITIAL_DELAY,
            max_jitter: MAX_JITTER,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial_delay: Duration, max_jitter: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_jitter = max_jitter;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, RequestError> {
        let endpoint = request.endpoint.as_str();
        let mut policy = BackoffPolicy::new(self.initial_delay, self.max_jitter);
        let mut last_failure = String::new();

        for attempt in 1..=self.max_attempts {
            tracing::debug!(
                "Attempt {}/{}: {:?} {} with params: {}",
                attempt,
                self.max_attempts,
                request.method,
                endpoint,
                request.redacted_params()
            );

            let result = self.transport.send(request).await;
            match policy.assess(endpoint, result) {
                AttemptOutcome::Success(response) => return Ok(response),
                AttemptOutcome::Fatal(err) => {
                    tracing::error!("{}", err);
                    return Err(err);
                }
                AttemptOutcome::Retry { delay, reason } => {
                    if attempt == self.max_attempts {
                        last_failure = reason;
                        break;
                    }
                    tracing::warn!(
                        "Retry {}/{} for {}: {}, backing off for {:.2}s",
                        attempt,
                        self.max_attempts,
                        endpoint,
                        reason,
                        delay.as_secs_f64()
                    );
                    last_failure = reason;
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(RequestError::RetriesExhausted {
            endpoint: endpoint.to_string(),
            attempts: self.max_attempts,
            last_failure,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays scripted responses and records every request it receives.
    /// Routes are matched by endpoint suffix; each route pops its queue and
    /// keeps repeating the last entry once only one is left.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
        pub sent: Mutex<Vec<ApiRequest>>,
    }

    #[derive(Clone)]
    pub enum Scripted {
        Status(u16, String),
        Down(String),
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, suffix: &str, responses: Vec<Scripted>) -> Self {
            self.routes
                .lock()
                .unwrap()
                .push((suffix.to_string(), responses.into()));
            self
        }

        pub fn ok_json(self, suffix: &str, body: serde_json::Value) -> Self {
            self.on(suffix, vec![Scripted::Status(200, body.to_string())])
        }

        pub fn sent_to(&self, suffix: &str) -> Vec<ApiRequest> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|req| req.endpoint.ends_with(suffix))
                .cloned()
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let scripted = {
                let mut routes = self.routes.lock().unwrap();
                let (_, queue) = routes
                    .iter_mut()
                    .find(|(suffix, _)| request.endpoint.ends_with(suffix.as_str()))
                    .unwrap_or_else(|| panic!("no scripted route for {}", request.endpoint));
                if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap()
                }
            };
            match scripted {
                Scripted::Status(status, body) => Ok(RawResponse { status, body }),
                Scripted::Down(reason) => Err(TransportError::Connection(reason)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Scripted, ScriptedTransport};
    use super::*;
    use tokio::time::Instant;

    fn executor(transport: ScriptedTransport) -> RequestExecutor<ScriptedTransport> {
        RequestExecutor::new(transport)
    }

    fn ok(body: &str) -> Scripted {
        Scripted::Status(200, body.to_string())
    }

    #[test]
    fn policy_doubles_nominal_delay() {
        let mut policy = BackoffPolicy::default();
        let busy = || Ok(RawResponse { status: 503, body: String::new() });

        let mut delays = Vec::new();
        for _ in 0..3 {
            match policy.assess_with_jitter("elevation", busy(), Duration::ZERO) {
                AttemptOutcome::Retry { delay, .. } => delays.push(delay),
                other => panic!("expected retry, got {other:?}"),
            }
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn policy_caps_jitter() {
        let mut policy = BackoffPolicy::default();
        let outcome = policy.assess_with_jitter(
            "places",
            Ok(RawResponse { status: 429, body: String::new() }),
            Duration::from_secs(3),
        );
        match outcome {
            AttemptOutcome::Retry { delay, .. } => {
                assert_eq!(delay, Duration::from_millis(1500))
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn policy_classifies_statuses() {
        let mut policy = BackoffPolicy::default();
        let response = |status| Ok(RawResponse { status, body: "body".into() });

        assert!(matches!(
            policy.assess("x", response(200)),
            AttemptOutcome::Success(_)
        ));
        for status in [429, 500, 503] {
            assert!(matches!(
                policy.assess("x", response(status)),
                AttemptOutcome::Retry { .. }
            ));
        }
        for status in [400, 403, 404, 502] {
            assert!(matches!(
                policy.assess("x", response(status)),
                AttemptOutcome::Fatal(RequestError::NonRetryable { .. })
            ));
        }
        assert!(matches!(
            policy.assess("x", Err(TransportError::Connection("reset".into()))),
            AttemptOutcome::Retry { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_busy_responses() {
        let transport = ScriptedTransport::new().on(
            "/elevation/json",
            vec![
                Scripted::Status(503, "busy".into()),
                Scripted::Status(503, "busy".into()),
                ok("third"),
            ],
        );
        let executor = executor(transport);
        let request = ApiRequest::get("https://maps.test/elevation/json");

        let started = Instant::now();
        let response = executor.execute(&request).await.unwrap();
        let waited = started.elapsed();

        assert_eq!(response.body, "third");
        assert_eq!(executor.transport().sent_to("/elevation/json").len(), 3);
        // 1s + 2s nominal, each with at most 0.5s jitter
        assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(4), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let transport = ScriptedTransport::new()
            .on("/directions/json", vec![Scripted::Status(503, "busy".into())]);
        let executor = executor(transport);
        let request = ApiRequest::get("https://maps.test/directions/json");

        let err = executor.execute(&request).await.unwrap_err();

        match err {
            RequestError::RetriesExhausted {
                attempts,
                last_failure,
                ..
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(last_failure, "status 503");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(executor.transport().sent_to("/directions/json").len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_retried() {
        let transport = ScriptedTransport::new().on(
            "/place/nearbysearch/json",
            vec![Scripted::Down("timed out".into()), ok("{}")],
        );
        let executor = executor(transport);
        let request = ApiRequest::get("https://maps.test/place/nearbysearch/json");

        let response = executor.execute(&request).await.unwrap();
        assert_eq!(response.body, "{}");
        assert_eq!(
            executor.transport().sent_to("/place/nearbysearch/json").len(),
            2
        );
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let transport = ScriptedTransport::new()
            .on("/directions/json", vec![Scripted::Status(403, "denied".into())]);
        let executor = executor(transport);
        let request = ApiRequest::get("https://maps.test/directions/json");

        let err = executor.execute(&request).await.unwrap_err();

        assert!(matches!(
            err,
            RequestError::NonRetryable { status: 403, ref body, .. } if body == "denied"
        ));
        assert_eq!(executor.transport().sent_to("/directions/json").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let transport = ScriptedTransport::new()
            .on("/elevation/json", vec![Scripted::Status(500, String::new())]);
        let executor = executor(transport).with_max_attempts(1);
        let request = ApiRequest::get("https://maps.test/elevation/json");

        let started = Instant::now();
        let err = executor.execute(&request).await.unwrap_err();

        assert!(matches!(err, RequestError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn api_key_is_masked_in_logs() {
        let request = ApiRequest::get("https://maps.test/elevation/json")
            .param("samples", 50)
            .param("key", "secret");
        assert_eq!(request.redacted_params(), "samples=50&key=***");
        assert_eq!(request.param_value("key"), Some("secret"));
    }
}

#[cfg(test)]
mod http_tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;

    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    /// Local server answering `/echo` with the GET query or the POST JSON body.
    async fn echo_server() -> SocketAddr {
        let app = Router::new().route(
            "/echo",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                Json(json!({ "query": query }))
            })
            .post(|Json(body): Json<Value>| async move { Json(json!({ "body": body })) }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn get_sends_params_as_query_string() {
        let addr = echo_server().await;
        let request = ApiRequest::get(format!("http://{addr}/echo"))
            .param("origin", "Almodôvar, Portugal")
            .param("samples", 50);

        let response = transport().send(&request).await.unwrap();

        assert_eq!(response.status, 200);
        let echoed: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            echoed,
            json!({ "query": { "origin": "Almodôvar, Portugal", "samples": "50" } })
        );
    }

    #[tokio::test]
    async fn post_sends_params_as_json_object() {
        let addr = echo_server().await;
        let request = ApiRequest::post(format!("http://{addr}/echo"))
            .param("path", "enc:_p~iF~ps|U")
            .param("samples", 50);
        assert_eq!(request.method, Method::Post);

        let response = transport().send(&request).await.unwrap();

        assert_eq!(response.status, 200);
        let echoed: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            echoed,
            json!({ "body": { "path": "enc:_p~iF~ps|U", "samples": "50" } })
        );
    }

    #[tokio::test]
    async fn connection_errors_do_not_expose_api_key() {
        // Bind then drop to get a port nothing listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let executor = RequestExecutor::new(transport())
            .with_max_attempts(2)
            .with_backoff(Duration::ZERO, Duration::ZERO);
        let request = ApiRequest::get(format!("http://{addr}/directions/json"))
            .param("origin", "A")
            .param("key", "SUPERSECRET");

        let err = executor.execute(&request).await.unwrap_err();

        assert!(matches!(err, RequestError::RetriesExhausted { attempts: 2, .. }));
        let message = err.to_string();
        assert!(!message.contains("SUPERSECRET"), "{message}");
        assert!(!message.contains("key="), "{message}");
    }
}
