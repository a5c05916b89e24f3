use crate::error::EngineError;
use crate::executor::{target_url, OutboundRequest};
use crate::types::TestResponse;
use log::{error, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::collections::BTreeMap;
use std::time::Duration;

/// Timeout for a single test request.
pub const TEST_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one request to the target server and hands the response back
/// as data, failure included.
#[derive(Clone)]
pub struct TestRequestClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl TestRequestClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: TEST_REQUEST_TIMEOUT,
        }
    }

    pub async fn send(&self, method: &str, endpoint: &str, body: Option<&str>) -> TestResponse {
        info!("🔎 Test request: {} {}", method, endpoint);

        match self.try_send(method, endpoint, body).await {
            Ok(response) => {
                info!("Test response: {} {}", response.status, response.status_text);
                response
            }
            Err(message) => {
                error!("❌ Test request failed: {}", message);
                TestResponse::failed(message)
            }
        }
    }

    async fn try_send(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&str>,
    ) -> Result<TestResponse, String> {
        let request = self
            .build(method, endpoint, body)
            .map_err(|e| e.to_string())?;

        let response = request
            .to_reqwest(&self.client)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(read_response(response).await)
    }

    fn build(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&str>,
    ) -> Result<OutboundRequest, EngineError> {
        let url = target_url(&self.base_url, endpoint)?;
        OutboundRequest::new(method, url, body)
    }
}

/// Status and headers survive a failed body read; the body is then null
/// and the read error goes into `error`.
async fn read_response(response: Response) -> TestResponse {
    let status = response.status();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    let (body, error) = match response.text().await {
        Ok(text) if is_json => (
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
            None,
        ),
        Ok(text) => (serde_json::Value::String(text), None),
        Err(e) => {
            error!("❌ Failed to read test response body: {}", e);
            (serde_json::Value::Null, Some(e.to_string()))
        }
    };

    TestResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
        error,
    }
}
