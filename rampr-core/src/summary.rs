use std::time::Duration;

use rampr_metrics::{MetricSeriesSummary, MetricValue, TrendSummary};

use crate::metrics::BuiltinMetric;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Final aggregate of a run, produced even when the run was interrupted.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub aborted: bool,
    pub metrics: Vec<MetricSeriesSummary>,
    pub checks: Vec<CheckSummary>,
    /// Failed requests by cause (`timeout`, `request`, `status_503`, ...).
    pub errors: Vec<(String, u64)>,
}

impl RunSummary {
    pub fn metric(&self, metric: BuiltinMetric) -> Option<&MetricSeriesSummary> {
        self.metrics.iter().find(|m| m.name == metric.as_ref())
    }

    pub fn counter(&self, metric: BuiltinMetric) -> u64 {
        match self.metric(metric).map(|m| &m.value) {
            Some(MetricValue::Counter(v)) => *v,
            _ => 0,
        }
    }

    pub fn rate(&self, metric: BuiltinMetric) -> Option<f64> {
        match self.metric(metric).map(|m| &m.value) {
            Some(MetricValue::Rate { rate, .. }) => *rate,
            _ => None,
        }
    }

    pub fn trend(&self, metric: BuiltinMetric) -> Option<&TrendSummary> {
        match self.metric(metric).map(|m| &m.value) {
            Some(MetricValue::Trend(t)) => Some(t),
            _ => None,
        }
    }

    fn gauge_max(&self, metric: BuiltinMetric) -> u64 {
        match self.metric(metric).map(|m| &m.value) {
            Some(MetricValue::Gauge { max, .. }) => u64::try_from(*max).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn peak_vus(&self) -> u64 {
        self.gauge_max(BuiltinMetric::Vus)
    }

    pub fn max_vus(&self) -> u64 {
        self.gauge_max(BuiltinMetric::VusMax)
    }

    pub fn requests_total(&self) -> u64 {
        self.counter(BuiltinMetric::HttpReqs)
    }

    pub fn failed_requests_total(&self) -> u64 {
        match self.metric(BuiltinMetric::HttpReqFailed).map(|m| &m.value) {
            Some(MetricValue::Rate { hits, .. }) => *hits,
            _ => 0,
        }
    }
}
