//! Load-test engine and message worker for inspecting API route handlers
//! on a local development server.
//!
//! A load test runs `totalRequests` calls against one endpoint in sequential
//! batches of `concurrency` concurrent requests, reporting progress after each
//! batch and a summary at the end. See [`load_test::BatchScheduler`].

pub mod config;
pub mod error;
pub mod executor;
pub mod grade;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod stats;
pub mod types;
pub mod worker;

pub use error::{EngineError, TransportError};
pub use executor::{HttpTransport, ReqwestTransport, RequestExecutor};
pub use load_test::BatchScheduler;
pub use progress::{NoopObserver, ProgressObserver};
pub use types::{BatchProgress, LoadTestConfig, LoadTestResult, RequestSample, TestResponse};
