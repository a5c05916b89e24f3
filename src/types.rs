use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Load test parameters as sent by the UI. Values are clamped before use,
/// so negative or oversized numbers are accepted here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadTestConfig {
    pub endpoint: String,
    pub method: String,
    pub concurrency: i64,
    #[serde(rename = "totalRequests")]
    pub total_requests: i64,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// One executed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSample {
    pub latency_ms: f64,
    pub outcome: Outcome,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl RequestSample {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    #[serde(rename = "progress")]
    pub percent: f64,
    pub completed: u32,
    pub total: u32,
    #[serde(rename = "successCount")]
    pub success_count: u32,
    #[serde(rename = "errorCount")]
    pub error_count: u32,
}

/// Values the engine changed while clamping a [`LoadTestConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClampNotice {
    #[serde(rename = "requestedConcurrency")]
    pub requested_concurrency: i64,
    #[serde(rename = "effectiveConcurrency")]
    pub effective_concurrency: u32,
    #[serde(rename = "requestedTotalRequests")]
    pub requested_total_requests: i64,
    #[serde(rename = "effectiveTotalRequests")]
    pub effective_total_requests: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadTestResult {
    #[serde(rename = "totalRequests")]
    pub total_requests: u32,
    #[serde(rename = "successCount")]
    pub success_count: u32,
    #[serde(rename = "errorCount")]
    pub error_count: u32,
    #[serde(rename = "durationMs")]
    pub duration_ms: f64,
    #[serde(rename = "avgLatencyMs")]
    pub avg_latency_ms: f64,
    #[serde(rename = "minLatencyMs")]
    pub min_latency_ms: f64,
    #[serde(rename = "maxLatencyMs")]
    pub max_latency_ms: f64,
    #[serde(rename = "p50LatencyMs")]
    pub p50_latency_ms: f64,
    #[serde(rename = "p95LatencyMs")]
    pub p95_latency_ms: f64,
    #[serde(rename = "p99LatencyMs")]
    pub p99_latency_ms: f64,
    #[serde(rename = "requestsPerSecond")]
    pub requests_per_second: f64,
    #[serde(rename = "successRatePercent")]
    pub success_rate_percent: f64,
    #[serde(rename = "statusCodeDistribution")]
    pub status_code_distribution: HashMap<u16, u32>,
    #[serde(rename = "errorDistribution")]
    pub error_distribution: HashMap<String, u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadTestResult {
    /// Degenerate result for a run that could not start.
    pub fn setup_failure(message: impl Into<String>) -> Self {
        Self {
            error_count: 1,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Response of a single test request, passed through to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResponse {
    pub status: u16,
    #[serde(rename = "statusText")]
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            status_text: "Error".to_string(),
            headers: BTreeMap::new(),
            body: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_accepts_camel_case_and_negative_values() {
        let config: LoadTestConfig = serde_json::from_value(json!({
            "endpoint": "/api/ping",
            "method": "GET",
            "concurrency": -3,
            "totalRequests": 12
        }))
        .unwrap();

        assert_eq!(config.concurrency, -3);
        assert_eq!(config.total_requests, 12);
        assert!(config.body.is_none());
    }

    #[test]
    fn setup_failure_is_zeroed_except_error_count() {
        let result = LoadTestResult::setup_failure("boom");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["errorCount"], 1);
        assert_eq!(value["totalRequests"], 0);
        assert_eq!(value["requestsPerSecond"], 0.0);
        assert_eq!(value["error"], "boom");
        assert!(value.get("cancelled").is_none());
    }

    #[test]
    fn progress_serializes_percent_as_progress() {
        let progress = BatchProgress {
            percent: 50.0,
            completed: 5,
            total: 10,
            success_count: 4,
            error_count: 1,
        };
        let value = serde_json::to_value(&progress).unwrap();

        assert_eq!(value["progress"], 50.0);
        assert_eq!(value["successCount"], 4);
        assert_eq!(value["errorCount"], 1);
    }

    #[test]
    fn failed_test_response_shape() {
        let value = serde_json::to_value(TestResponse::failed("refused")).unwrap();
        assert_eq!(
            value,
            json!({
                "status": 0,
                "statusText": "Error",
                "headers": {},
                "body": null,
                "error": "refused"
            })
        );
    }
}
