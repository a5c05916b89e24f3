use crate::types::{ClampNotice, LoadTestConfig};
use log::warn;

/// Hard ceiling on requests in flight at once.
pub const MAX_CONCURRENCY: u32 = 100;
/// Hard ceiling on requests per run.
pub const MAX_TOTAL_REQUESTS: u32 = 1000;

/// A [`LoadTestConfig`] with its numbers clamped to the protective ceilings,
/// plus the batch arithmetic derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTestPlan {
    pub endpoint: String,
    pub method: String,
    pub body: Option<String>,
    pub concurrency: u32,
    pub total_requests: u32,
    requested_concurrency: i64,
    requested_total_requests: i64,
}

impl LoadTestPlan {
    pub fn from_config(config: &LoadTestConfig) -> Self {
        let concurrency = config.concurrency.clamp(1, MAX_CONCURRENCY as i64) as u32;
        let total_requests = config.total_requests.clamp(0, MAX_TOTAL_REQUESTS as i64) as u32;

        let plan = Self {
            endpoint: config.endpoint.clone(),
            method: config.method.clone(),
            body: config.body.clone(),
            concurrency,
            total_requests,
            requested_concurrency: config.concurrency,
            requested_total_requests: config.total_requests,
        };

        if let Some(notice) = plan.clamp_notice() {
            warn!(
                "⚠️ Load test config clamped: concurrency {} -> {}, total requests {} -> {}",
                notice.requested_concurrency,
                notice.effective_concurrency,
                notice.requested_total_requests,
                notice.effective_total_requests
            );
        }

        plan
    }

    pub fn batch_size(&self) -> u32 {
        self.concurrency
    }

    pub fn batch_count(&self) -> u32 {
        self.total_requests.div_ceil(self.batch_size())
    }

    /// Number of requests in batch `index`; the last batch takes the remainder.
    pub fn requests_in_batch(&self, index: u32) -> u32 {
        let dispatched = index.saturating_mul(self.batch_size());
        self.batch_size()
            .min(self.total_requests.saturating_sub(dispatched))
    }

    /// `Some` when clamping changed either requested value.
    pub fn clamp_notice(&self) -> Option<ClampNotice> {
        let changed = self.requested_concurrency != self.concurrency as i64
            || self.requested_total_requests != self.total_requests as i64;

        changed.then(|| ClampNotice {
            requested_concurrency: self.requested_concurrency,
            effective_concurrency: self.concurrency,
            requested_total_requests: self.requested_total_requests,
            effective_total_requests: self.total_requests,
        })
    }
}
