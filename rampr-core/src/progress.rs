use std::time::Duration;

use crate::schedule::StageSnapshot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMetrics {
    /// Requests/sec over the last progress interval.
    pub rps_now: Option<f64>,
    pub requests_total: u64,
    pub failed_total: u64,
    pub iterations_total: u64,
    pub bytes_received_total: u64,
    /// Latency of non-failed requests over the whole run so far.
    pub latency_p50_ms: Option<f64>,
    pub latency_p99_ms: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// 1-based emission counter.
    pub tick: u64,
    pub elapsed: Duration,
    pub total_duration: Duration,
    pub stage: Option<StageSnapshot>,
    pub target_vus: u64,
    pub active_vus: u64,
    /// VUs told to stop that are still finishing an iteration.
    pub stopping_vus: u64,
    pub metrics: LiveMetrics,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
