use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rampr_metrics::{MetricHandle, Registry};

use crate::metrics::BuiltinMetric;
use crate::progress::LiveMetrics;
use crate::record::{CheckResult, IterationOutcome, RequestRecord};
use crate::summary::{CheckSummary, RunSummary};

#[derive(Debug, Default, Clone, Copy)]
struct CheckCounts {
    passes: u64,
    fails: u64,
}

/// The run-wide sink every virtual user writes into.
#[derive(Debug)]
pub struct RunStats {
    registry: Registry,

    http_reqs: MetricHandle,
    http_req_duration: MetricHandle,
    http_req_failed: MetricHandle,
    iterations: MetricHandle,
    iteration_duration: MetricHandle,
    checks: MetricHandle,
    data_sent: MetricHandle,
    data_received: MetricHandle,
    vus: MetricHandle,

    checks_by_name: Mutex<BTreeMap<Arc<str>, CheckCounts>>,
    errors: Mutex<BTreeMap<String, u64>>,
}

impl RunStats {
    pub fn new(max_vus: u64) -> Self {
        let registry = Registry::default();
        let handle = |m: BuiltinMetric| registry.register(m.as_ref(), m.kind());

        let http_reqs = handle(BuiltinMetric::HttpReqs);
        let http_req_duration = handle(BuiltinMetric::HttpReqDuration);
        let http_req_failed = handle(BuiltinMetric::HttpReqFailed);
        let iterations = handle(BuiltinMetric::Iterations);
        let iteration_duration = handle(BuiltinMetric::IterationDuration);
        let checks = handle(BuiltinMetric::Checks);
        let data_sent = handle(BuiltinMetric::DataSent);
        let data_received = handle(BuiltinMetric::DataReceived);
        let vus = handle(BuiltinMetric::Vus);
        handle(BuiltinMetric::VusMax).set_gauge(i64::try_from(max_vus).unwrap_or(i64::MAX));

        Self {
            registry,
            http_reqs,
            http_req_duration,
            http_req_failed,
            iterations,
            iteration_duration,
            checks,
            data_sent,
            data_received,
            vus,
            checks_by_name: Mutex::new(BTreeMap::new()),
            errors: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_request(&self, record: &RequestRecord) {
        let failed = record.is_failed();

        self.http_reqs.increment(1);
        self.http_req_failed.add_rate(failed);
        self.data_sent.increment(record.bytes_sent);
        self.data_received.increment(record.bytes_received);

        if !failed {
            self.http_req_duration.record_duration(record.latency);
        } else if let Some(key) = record.error_key() {
            *self.errors.lock().entry(key).or_insert(0) += 1;
        }
    }

    pub fn record_check(&self, check: &CheckResult) {
        self.checks.add_rate(check.passed);

        let mut by_name = self.checks_by_name.lock();
        let counts = by_name.entry(check.name.clone()).or_default();
        if check.passed {
            counts.passes += 1;
        } else {
            counts.fails += 1;
        }
    }

    pub fn record_iteration(&self, outcome: &IterationOutcome, elapsed: Duration) {
        for record in &outcome.requests {
            self.record_request(record);
        }
        for check in &outcome.checks {
            self.record_check(check);
        }
        self.iterations.increment(1);
        self.iteration_duration.record_duration(elapsed);
    }

    pub fn observe_vus(&self, active: u64) {
        self.vus.set_gauge(i64::try_from(active).unwrap_or(i64::MAX));
    }

    pub fn live(&self) -> LiveMetrics {
        let (requests_total, failed_total) = self.http_req_failed.get_rate();
        let latency = self.http_req_duration.trend_summary();
        LiveMetrics {
            requests_total,
            failed_total,
            iterations_total: self.iterations.get_counter(),
            bytes_received_total: self.data_received.get_counter(),
            latency_p50_ms: latency.as_ref().and_then(|t| t.p50),
            latency_p99_ms: latency.as_ref().and_then(|t| t.p99),
            rps_now: None,
        }
    }

    pub fn summarize(&self, elapsed: Duration, aborted: bool) -> RunSummary {
        let checks = self
            .checks_by_name
            .lock()
            .iter()
            .map(|(name, c)| CheckSummary {
                name: name.to_string(),
                passes: c.passes,
                fails: c.fails,
            })
            .collect();

        let errors = self
            .errors
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        RunSummary {
            elapsed,
            aborted,
            metrics: self.registry.summarize(),
            checks,
            errors,
        }
    }
}
