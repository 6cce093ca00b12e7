use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use rampr_core::{MetricValue, ProgressUpdate, RunSummary, ThresholdVerdict};

use super::{OutputFormatter, Report};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _scenario_path: &Path, _plan: &rampr_core::ExecutionPlan) {}

    fn progress(&self) -> Option<rampr_core::ProgressFn> {
        Some(Arc::new(move |u: ProgressUpdate| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, report: &Report<'_>) -> anyhow::Result<()> {
        let line = build_summary_line(report);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub total_secs: f64,

    /// 1-based; absent once the profile has ended.
    pub stage: Option<usize>,
    pub stages: Option<usize>,

    pub target_vus: u64,
    pub active_vus: u64,
    pub stopping_vus: u64,

    pub requests_per_sec: Option<f64>,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub total_iterations: u64,
    pub total_bytes_received: u64,

    pub latency_p50_ms: Option<f64>,
    pub latency_p99_ms: Option<f64>,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        total_secs: u.total_duration.as_secs_f64(),
        stage: u.stage.as_ref().map(|s| s.index + 1),
        stages: u.stage.as_ref().map(|s| s.count),
        target_vus: u.target_vus,
        active_vus: u.active_vus,
        stopping_vus: u.stopping_vus,
        requests_per_sec: u.metrics.rps_now,
        total_requests: u.metrics.requests_total,
        failed_requests: u.metrics.failed_total,
        total_iterations: u.metrics.iterations_total,
        total_bytes_received: u.metrics.bytes_received_total,
        latency_p50_ms: u.metrics.latency_p50_ms,
        latency_p99_ms: u.metrics.latency_p99_ms,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub scenario: String,
    pub elapsed_secs: f64,
    pub aborted: bool,
    pub peak_vus: u64,
    pub max_vus: u64,

    pub metrics: BTreeMap<String, JsonMetric>,
    pub checks: Vec<JsonCheck>,
    /// Failed requests by cause.
    pub errors: BTreeMap<String, u64>,

    pub thresholds: Vec<JsonThreshold>,
    pub thresholds_passed: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum JsonMetric {
    Counter {
        count: u64,
        rate: f64,
    },
    Gauge {
        value: i64,
        max: i64,
    },
    Rate {
        rate: Option<f64>,
        hits: u64,
        total: u64,
    },
    Trend {
        count: u64,
        avg: Option<f64>,
        min: Option<f64>,
        med: Option<f64>,
        max: Option<f64>,
        stdev: Option<f64>,
        #[serde(rename = "p(90)")]
        p90: Option<f64>,
        #[serde(rename = "p(95)")]
        p95: Option<f64>,
        #[serde(rename = "p(99)")]
        p99: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonCheck {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonThreshold {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

fn json_metric(value: &MetricValue, elapsed_secs: f64) -> JsonMetric {
    match value {
        MetricValue::Counter(count) => JsonMetric::Counter {
            count: *count,
            rate: if elapsed_secs > 0.0 {
                *count as f64 / elapsed_secs
            } else {
                0.0
            },
        },
        MetricValue::Gauge { value, max } => JsonMetric::Gauge {
            value: *value,
            max: *max,
        },
        MetricValue::Rate { total, hits, rate } => JsonMetric::Rate {
            rate: *rate,
            hits: *hits,
            total: *total,
        },
        MetricValue::Trend(t) => JsonMetric::Trend {
            count: t.count,
            avg: t.mean,
            min: t.min,
            med: t.p50,
            max: t.max,
            stdev: t.stdev,
            p90: t.p90,
            p95: t.p95,
            p99: t.p99,
        },
    }
}

fn json_threshold(v: &ThresholdVerdict) -> JsonThreshold {
    JsonThreshold {
        metric: v.metric.to_string(),
        expression: v.expression.clone(),
        observed: v.observed,
        passed: v.passed,
    }
}

pub(crate) fn build_summary_line(report: &Report<'_>) -> JsonSummaryLine {
    let summary: &RunSummary = report.summary;
    let elapsed_secs = summary.elapsed.as_secs_f64();

    JsonSummaryLine {
        kind: "summary",
        scenario: report.scenario.to_string(),
        elapsed_secs,
        aborted: summary.aborted,
        peak_vus: summary.peak_vus(),
        max_vus: summary.max_vus(),
        metrics: summary
            .metrics
            .iter()
            .map(|m| (m.name.clone(), json_metric(&m.value, elapsed_secs)))
            .collect(),
        checks: summary
            .checks
            .iter()
            .map(|c| JsonCheck {
                name: c.name.clone(),
                passes: c.passes,
                fails: c.fails,
            })
            .collect(),
        errors: summary.errors.iter().cloned().collect(),
        thresholds: report.verdicts.iter().map(json_threshold).collect(),
        thresholds_passed: report.verdicts.iter().all(|v| v.passed),
    }
}

/// Writes the summary document for `--summary-export`.
pub(crate) async fn write_summary_file(path: &Path, report: &Report<'_>) -> anyhow::Result<()> {
    let doc = build_summary_line(report);
    let mut bytes = serde_json::to_vec_pretty(&doc).context("failed to serialize summary")?;
    bytes.push(b'\n');

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write summary: {}", path.display()))
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }
}
