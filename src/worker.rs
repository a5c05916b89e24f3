use crate::grade::PerformanceGrade;
use crate::load_test::BatchScheduler;
use crate::plan::LoadTestPlan;
use crate::probe::TestRequestClient;
use crate::types::{BatchProgress, ClampNotice, LoadTestConfig, LoadTestResult, TestResponse};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use lapin::{options::BasicPublishOptions, BasicProperties, Channel};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "load-test")]
    LoadTest {
        #[serde(rename = "runId", default)]
        run_id: Option<Uuid>,
        config: LoadTestConfig,
    },
    #[serde(rename = "test-request")]
    TestRequest {
        #[serde(rename = "requestId", default)]
        request_id: Option<Uuid>,
        method: String,
        endpoint: String,
        #[serde(default)]
        body: Option<String>,
    },
    #[serde(rename = "cancel-load-test")]
    CancelLoadTest {
        #[serde(rename = "runId")]
        run_id: Uuid,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "config-clamped")]
    ConfigClamped {
        #[serde(rename = "runId")]
        run_id: Uuid,
        #[serde(flatten)]
        notice: ClampNotice,
    },
    #[serde(rename = "load-test-progress")]
    Progress {
        #[serde(rename = "runId")]
        run_id: Uuid,
        timestamp: String,
        #[serde(flatten)]
        progress: BatchProgress,
    },
    #[serde(rename = "load-test-result")]
    Finished {
        #[serde(rename = "runId")]
        run_id: Uuid,
        results: LoadTestResult,
        grade: PerformanceGrade,
    },
    #[serde(rename = "test-request-response")]
    TestRequestResponse {
        #[serde(rename = "requestId")]
        request_id: Uuid,
        response: TestResponse,
    },
}

/// Where the worker sends its events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<()>;
}

/// Publishes events as JSON to a RabbitMQ queue.
pub struct QueuePublisher {
    channel: Channel,
    queue: String,
}

impl QueuePublisher {
    pub fn new(channel: Channel, queue: String) -> Self {
        Self { channel, queue }
    }
}

#[async_trait]
impl EventPublisher for QueuePublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await?;
        Ok(())
    }
}

/// Turns commands into load tests and test requests, tracking active runs
/// so they can be cancelled.
#[derive(Clone)]
pub struct Worker {
    scheduler: BatchScheduler,
    probe: TestRequestClient,
    publisher: Arc<dyn EventPublisher>,
    active_runs: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl Worker {
    pub fn new(
        scheduler: BatchScheduler,
        probe: TestRequestClient,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            scheduler,
            probe,
            publisher,
            active_runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Parses and dispatches a raw message. Fails only when the payload is
    /// not a valid command.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<Option<JoinHandle<()>>> {
        let command: Command = serde_json::from_slice(payload)?;
        Ok(self.dispatch(command).await)
    }

    /// Returns the handle of the spawned task, if the command started one.
    pub async fn dispatch(&self, command: Command) -> Option<JoinHandle<()>> {
        match command {
            Command::LoadTest { run_id, config } => {
                let run_id = run_id.unwrap_or_else(Uuid::new_v4);
                self.start_load_test(run_id, config).await
            }
            Command::TestRequest {
                request_id,
                method,
                endpoint,
                body,
            } => {
                let request_id = request_id.unwrap_or_else(Uuid::new_v4);
                let worker = self.clone();
                Some(tokio::spawn(async move {
                    let response = worker.probe.send(&method, &endpoint, body.as_deref()).await;
                    worker
                        .emit(Event::TestRequestResponse {
                            request_id,
                            response,
                        })
                        .await;
                }))
            }
            Command::CancelLoadTest { run_id } => {
                match self.active_runs.lock().await.get(&run_id) {
                    Some(token) => {
                        info!("🛑 Cancelling load test {}", run_id);
                        token.cancel();
                    }
                    None => warn!("No active load test {} to cancel", run_id),
                }
                None
            }
        }
    }

    pub async fn active_run_count(&self) -> usize {
        self.active_runs.lock().await.len()
    }

    /// `None` when `run_id` already belongs to an active run; that command
    /// gets a setup-failure result and the active run is left untouched.
    async fn start_load_test(
        &self,
        run_id: Uuid,
        config: LoadTestConfig,
    ) -> Option<JoinHandle<()>> {
        let cancel = CancellationToken::new();
        {
            let mut active = self.active_runs.lock().await;
            if active.contains_key(&run_id) {
                drop(active);
                warn!("⚠️ Load test {} is already running, rejecting duplicate", run_id);
                let results =
                    LoadTestResult::setup_failure(format!("load test {} is already running", run_id));
                let grade = PerformanceGrade::for_result(&results);
                self.emit(Event::Finished {
                    run_id,
                    results,
                    grade,
                })
                .await;
                return None;
            }
            active.insert(run_id, cancel.clone());
        }

        info!("🧪 Starting load test {}", run_id);

        let plan = LoadTestPlan::from_config(&config);
        if let Some(notice) = plan.clamp_notice() {
            self.emit(Event::ConfigClamped { run_id, notice }).await;
        }

        let worker = self.clone();
        Some(tokio::spawn(async move {
            // Progress flows through a channel so publishing never blocks a batch
            let (tx, mut rx) = mpsc::unbounded_channel::<BatchProgress>();

            let run = async {
                let result = worker.scheduler.run_plan(&plan, &tx, &cancel).await;
                drop(tx);
                result
            };
            let forward = async {
                while let Some(progress) = rx.recv().await {
                    worker
                        .emit(Event::Progress {
                            run_id,
                            timestamp: Utc::now().to_rfc3339(),
                            progress,
                        })
                        .await;
                }
            };
            let (results, ()) = tokio::join!(run, forward);

            // Only this run registered `run_id`; duplicates are rejected above
            worker.active_runs.lock().await.remove(&run_id);

            let grade = PerformanceGrade::for_result(&results);
            worker
                .emit(Event::Finished {
                    run_id,
                    results,
                    grade,
                })
                .await;
            info!("📤 Load test {} result sent", run_id);
        }))
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.publisher.publish(&event).await {
            error!("❌ Failed to publish event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{HttpTransport, OutboundRequest, RequestExecutor};
    use crate::error::TransportError;
    use reqwest::Client;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[derive(Default)]
    struct Captured(Mutex<Vec<Value>>);

    #[async_trait]
    impl EventPublisher for Captured {
        async fn publish(&self, event: &Event) -> Result<()> {
            self.0.lock().await.push(serde_json::to_value(event)?);
            Ok(())
        }
    }

    impl Captured {
        async fn types(&self) -> Vec<String> {
            self.0
                .lock()
                .await
                .iter()
                .map(|e| e["type"].as_str().unwrap_or_default().to_string())
                .collect()
        }

        async fn last(&self) -> Value {
            self.0.lock().await.last().cloned().unwrap_or(Value::Null)
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl HttpTransport for Slow {
        async fn send(&self, _request: &OutboundRequest) -> Result<u16, TransportError> {
            tokio::time::sleep(self.0).await;
            Ok(200)
        }
    }

    fn worker(latency: Duration) -> (Worker, Arc<Captured>) {
        let captured = Arc::new(Captured::default());
        let scheduler = BatchScheduler::new(
            RequestExecutor::new(Arc::new(Slow(latency))),
            "http://localhost:3000",
        );
        let probe = TestRequestClient::new(Client::new(), "http://localhost:3000");
        (Worker::new(scheduler, probe, captured.clone()), captured)
    }

    #[tokio::test]
    async fn load_test_emits_progress_then_result() {
        let (worker, captured) = worker(Duration::from_millis(1));
        let run_id = Uuid::new_v4();
        let payload = json!({
            "type": "load-test",
            "runId": run_id,
            "config": {"endpoint": "/api/ping", "method": "GET", "concurrency": 5, "totalRequests": 12}
        });

        let handle = worker
            .handle_payload(payload.to_string().as_bytes())
            .await
            .unwrap()
            .unwrap();
        handle.await.unwrap();

        assert_eq!(
            captured.types().await,
            vec![
                "load-test-progress",
                "load-test-progress",
                "load-test-progress",
                "load-test-result"
            ]
        );
        let last = captured.last().await;
        assert_eq!(last["runId"], json!(run_id));
        assert_eq!(last["results"]["totalRequests"], 12);
        assert_eq!(last["results"]["successCount"], 12);
        assert_eq!(last["grade"]["grade"], "A");
        assert_eq!(worker.active_run_count().await, 0);

        let first = captured.0.lock().await[0].clone();
        assert_eq!(first["completed"], 5);
        assert_eq!(first["total"], 12);
        assert!(first["timestamp"].is_string());
    }

    #[tokio::test]
    async fn clamped_config_is_announced() {
        let (worker, captured) = worker(Duration::from_millis(1));
        let command = Command::LoadTest {
            run_id: None,
            config: LoadTestConfig {
                endpoint: "/api/ping".to_string(),
                method: "GET".to_string(),
                concurrency: 500,
                total_requests: 0,
                body: None,
            },
        };

        worker.dispatch(command).await.unwrap().await.unwrap();

        assert_eq!(
            captured.types().await,
            vec!["config-clamped", "load-test-result"]
        );
        let first = captured.0.lock().await[0].clone();
        assert_eq!(first["effectiveConcurrency"], 100);
        assert_eq!(first["requestedConcurrency"], 500);
        assert_eq!(captured.last().await["grade"]["grade"], "N/A");
    }

    #[tokio::test]
    async fn cancel_command_stops_active_run() {
        let (worker, captured) = worker(Duration::from_millis(50));
        let run_id = Uuid::new_v4();
        let command = Command::LoadTest {
            run_id: Some(run_id),
            config: LoadTestConfig {
                endpoint: "/api/slow".to_string(),
                method: "GET".to_string(),
                concurrency: 1,
                total_requests: 1000,
                body: None,
            },
        };

        let handle = worker.dispatch(command).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(worker
            .dispatch(Command::CancelLoadTest { run_id })
            .await
            .is_none());
        handle.await.unwrap();

        let last = captured.last().await;
        assert_eq!(last["type"], "load-test-result");
        assert_eq!(last["results"]["cancelled"], true);
        assert!(last["results"]["totalRequests"].as_u64().unwrap() < 1000);
        assert_eq!(worker.active_run_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_run_id_is_rejected_and_original_stays_cancellable() {
        let (worker, captured) = worker(Duration::from_millis(50));
        let run_id = Uuid::new_v4();
        let load_test = |total_requests| Command::LoadTest {
            run_id: Some(run_id),
            config: LoadTestConfig {
                endpoint: "/api/slow".to_string(),
                method: "GET".to_string(),
                concurrency: 1,
                total_requests,
                body: None,
            },
        };

        let long_run = worker.dispatch(load_test(1000)).await.unwrap();
        assert!(worker.dispatch(load_test(1)).await.is_none());
        assert_eq!(worker.active_run_count().await, 1);

        let rejected = captured.last().await;
        assert_eq!(rejected["type"], "load-test-result");
        assert_eq!(rejected["runId"], json!(run_id));
        assert_eq!(rejected["results"]["errorCount"], 1);
        assert!(rejected["results"]["error"]
            .as_str()
            .unwrap()
            .contains("already running"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        worker.dispatch(Command::CancelLoadTest { run_id }).await;
        tokio::time::timeout(Duration::from_secs(5), long_run)
            .await
            .expect("long run ignored cancellation")
            .unwrap();

        let last = captured.last().await;
        assert_eq!(last["results"]["cancelled"], true);
        assert!(last["results"]["totalRequests"].as_u64().unwrap() < 1000);
        assert_eq!(worker.active_run_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_cancel_is_ignored() {
        let (worker, captured) = worker(Duration::from_millis(1));

        let spawned = worker
            .dispatch(Command::CancelLoadTest {
                run_id: Uuid::new_v4(),
            })
            .await;

        assert!(spawned.is_none());
        assert!(captured.types().await.is_empty());
    }

    #[tokio::test]
    async fn test_request_failure_is_published() {
        let (worker, captured) = worker(Duration::from_millis(1));
        let request_id = Uuid::new_v4();
        let payload = json!({
            "type": "test-request",
            "requestId": request_id,
            "method": "BAD METHOD",
            "endpoint": "/api/ping"
        });

        worker
            .handle_payload(payload.to_string().as_bytes())
            .await
            .unwrap()
            .unwrap()
            .await
            .unwrap();

        let last = captured.last().await;
        assert_eq!(last["type"], "test-request-response");
        assert_eq!(last["requestId"], json!(request_id));
        assert_eq!(last["response"]["status"], 0);
        assert_eq!(last["response"]["statusText"], "Error");
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let (worker, _) = worker(Duration::from_millis(1));

        assert!(worker.handle_payload(b"{\"type\":\"explode\"}").await.is_err());
        assert!(worker.handle_payload(b"not json").await.is_err());
    }
}
