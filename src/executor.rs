use crate::error::{EngineError, TransportError};
use crate::types::{Outcome, RequestSample};
use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-request timeout while load testing.
pub const LOAD_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A request as the engine sends it: JSON content type, body only for
/// methods that carry one.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<String>,
}

impl OutboundRequest {
    pub fn new(method: &str, url: Url, body: Option<&str>) -> Result<Self, EngineError> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| EngineError::InvalidMethod(method.to_string()))?;

        let carries_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        let body = body
            .filter(|b| carries_body && !b.is_empty())
            .map(str::to_string);

        Ok(Self { method, url, body })
    }

    pub fn to_reqwest(&self, client: &Client) -> RequestBuilder {
        let builder = client
            .request(self.method.clone(), self.url.clone())
            .header(CONTENT_TYPE, "application/json");

        match &self.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        }
    }
}

/// Joins the server base URL and a route path.
pub fn target_url(base_url: &str, endpoint: &str) -> Result<Url, EngineError> {
    let raw = if endpoint.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), endpoint)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
    };

    Url::parse(&raw).map_err(|e| EngineError::InvalidUrl {
        url: raw,
        reason: e.to_string(),
    })
}

/// The HTTP capability behind [`RequestExecutor`]. Returns the status code
/// once a response is available.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<u16, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<u16, TransportError> {
        let response = request.to_reqwest(&self.client).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Runs one request and always turns it into a [`RequestSample`].
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_timeout(transport, LOAD_TEST_TIMEOUT)
    }

    pub fn with_timeout(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn execute(&self, request: &OutboundRequest) -> RequestSample {
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout),
        };

        sample(started, outcome)
    }

    /// Like [`execute`](Self::execute), but settles as a cancelled failure
    /// as soon as `cancel` fires.
    pub async fn execute_cancellable(
        &self,
        request: &OutboundRequest,
        cancel: &CancellationToken,
    ) -> RequestSample {
        let started = Instant::now();

        tokio::select! {
            sample = self.execute(request) => sample,
            _ = cancel.cancelled() => sample(started, Err(TransportError::Cancelled)),
        }
    }
}

fn sample(started: Instant, outcome: Result<u16, TransportError>) -> RequestSample {
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(status) => RequestSample {
            latency_ms,
            outcome: if (200..300).contains(&status) {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            status_code: Some(status),
            error: None,
        },
        Err(e) => {
            debug!("Request failed after {:.1}ms: {}", latency_ms, e);
            RequestSample {
                latency_ms,
                outcome: Outcome::Failure,
                status_code: None,
                error: Some(e.to_string()),
            }
        }
    }
}
