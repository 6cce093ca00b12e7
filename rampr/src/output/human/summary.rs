use std::fmt::Write as _;

use rampr_core::{BuiltinMetric, MetricSeriesSummary, MetricValue};

use super::format::*;
use crate::output::Report;

const NAME_WIDTH: usize = 28;

pub(crate) fn render(report: &Report<'_>) -> String {
    let summary = report.summary;
    let mut out = String::new();

    let status = if summary.aborted { " (interrupted)" } else { "" };
    writeln!(&mut out, "summary: {}{status}", report.scenario).ok();
    writeln!(
        &mut out,
        "  elapsed: {}  vus: peak {} / max {}",
        format_elapsed(summary.elapsed),
        summary.peak_vus(),
        summary.max_vus()
    )
    .ok();
    out.push('\n');

    let elapsed_secs = summary.elapsed.as_secs_f64().max(1e-9);
    for m in &summary.metrics {
        writeln!(&mut out, "  {}", render_metric(m, elapsed_secs)).ok();
    }

    if !summary.checks.is_empty() {
        out.push_str("\nchecks\n");
        for c in &summary.checks {
            let mark = if c.fails == 0 { "✓" } else { "✗" };
            writeln!(
                &mut out,
                "  {mark} {}: passes={} fails={}",
                c.name, c.passes, c.fails
            )
            .ok();
        }
    }

    if !summary.errors.is_empty() {
        out.push_str("\nerrors\n");
        let mut errors: Vec<_> = summary.errors.iter().collect();
        errors.sort_by(|(a_name, a_count), (b_name, b_count)| {
            b_count.cmp(a_count).then_with(|| a_name.cmp(b_name))
        });
        for (cause, count) in errors {
            writeln!(&mut out, "  {cause}: {count}").ok();
        }
    }

    if !report.verdicts.is_empty() {
        out.push_str("\nthresholds\n");
        for v in report.verdicts {
            let mark = if v.passed { "✓" } else { "✗" };
            let observed = match v.observed {
                Some(obs) => format!("observed {obs:.3}"),
                None => "no samples".to_string(),
            };
            writeln!(&mut out, "  {mark} {}: {} ({observed})", v.metric, v.expression).ok();
        }
    }

    out
}

fn dotted(name: &str) -> String {
    let dots = NAME_WIDTH.saturating_sub(name.len()).max(2);
    format!("{name}{}:", ".".repeat(dots))
}

fn render_metric(m: &MetricSeriesSummary, elapsed_secs: f64) -> String {
    let bytes = m.name == BuiltinMetric::DataSent.as_ref()
        || m.name == BuiltinMetric::DataReceived.as_ref();

    let value = match &m.value {
        MetricValue::Counter(count) if bytes => format!(
            "{} {}/s",
            format_bytes(*count),
            format_bytes((*count as f64 / elapsed_secs).round() as u64)
        ),
        MetricValue::Counter(count) => format!(
            "{count} {}/s",
            format_rate(*count as f64 / elapsed_secs)
        ),
        MetricValue::Gauge { value, max } => format!("{value} max={max}"),
        MetricValue::Rate { total, hits, rate } => format!(
            "{} {hits} of {total}",
            format_percent(*rate)
        ),
        MetricValue::Trend(t) => format!(
            "avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={} (n={})",
            format_ms_opt(t.mean),
            format_ms_opt(t.min),
            format_ms_opt(t.p50),
            format_ms_opt(t.max),
            format_ms_opt(t.p90),
            format_ms_opt(t.p95),
            format_ms_opt(t.p99),
            t.count
        ),
    };

    format!("{} {value}", dotted(&m.name))
}
