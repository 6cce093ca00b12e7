use std::fmt;
use std::str::FromStr as _;

use rampr_metrics::{MetricKind, MetricValue};

use crate::error::ConfigError;
use crate::metrics::BuiltinMetric;
use crate::summary::RunSummary;

/// Threshold expressions as declared for one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    NotEq,
}

impl ThresholdOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    Value,
    /// Percentile in `(0, 100]`.
    P(f64),
}

impl ThresholdAgg {
    pub fn supported_by(self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Trend => matches!(
                self,
                Self::Avg | Self::Min | Self::Max | Self::Med | Self::Count | Self::P(_)
            ),
            MetricKind::Counter => matches!(self, Self::Count | Self::Rate),
            MetricKind::Rate => matches!(self, Self::Rate),
            MetricKind::Gauge => matches!(self, Self::Value | Self::Max),
        }
    }
}

impl fmt::Display for ThresholdAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avg => f.write_str("avg"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Med => f.write_str("med"),
            Self::Count => f.write_str("count"),
            Self::Rate => f.write_str("rate"),
            Self::Value => f.write_str("value"),
            Self::P(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.agg, self.op.symbol(), self.value)
    }
}

/// A validated threshold bound to a built-in metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: BuiltinMetric,
    /// The expression exactly as written.
    pub source: String,
    pub expr: ThresholdExpr,
}

impl Threshold {
    pub fn parse_set(set: &ThresholdSet) -> Result<Vec<Self>, ConfigError> {
        let metric = BuiltinMetric::from_str(set.metric.trim())
            .map_err(|_| ConfigError::UnknownMetric(set.metric.clone()))?;

        let invalid = |reason: String| ConfigError::InvalidThreshold {
            metric: set.metric.clone(),
            reason,
        };

        if set.expressions.is_empty() {
            return Err(invalid("at least one expression is required".to_string()));
        }

        set.expressions
            .iter()
            .map(|raw| {
                let expr = parse_threshold_expr(raw).map_err(invalid)?;
                if !expr.agg.supported_by(metric.kind()) {
                    return Err(invalid(format!(
                        "`{}` is not available on {} metrics",
                        expr.agg,
                        metric.kind()
                    )));
                }
                Ok(Self {
                    metric,
                    source: raw.trim().to_string(),
                    expr,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdVerdict {
    pub metric: BuiltinMetric,
    pub expression: String,
    /// `None` when the metric recorded no samples.
    pub observed: Option<f64>,
    pub passed: bool,
}

pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("!=", ThresholdOp::NotEq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("missing comparison operator in `{raw}`"))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(format!("expected `<aggregation> <op> <value>`, got `{raw}`"));
    }

    let agg = match left.to_ascii_lowercase().as_str() {
        "avg" => ThresholdAgg::Avg,
        "min" => ThresholdAgg::Min,
        "max" => ThresholdAgg::Max,
        "med" => ThresholdAgg::Med,
        "count" => ThresholdAgg::Count,
        "rate" => ThresholdAgg::Rate,
        "value" => ThresholdAgg::Value,
        other => {
            let inner = other
                .strip_prefix("p(")
                .and_then(|v| v.strip_suffix(')'))
                .ok_or_else(|| format!("unknown aggregation `{left}` in `{raw}`"))?;
            let p: f64 = inner
                .parse()
                .map_err(|_| format!("invalid percentile in `{raw}`"))?;
            if !(p > 0.0 && p <= 100.0) {
                return Err(format!("percentile out of range in `{raw}`"));
            }
            ThresholdAgg::P(p)
        }
    };

    let value: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric value in `{raw}`"))?;
    if !value.is_finite() {
        return Err(format!("invalid numeric value in `{raw}`"));
    }

    Ok(ThresholdExpr { agg, op, value })
}

/// One verdict per threshold, in declaration order.
///
/// A metric without samples has nothing to violate, so its thresholds pass
/// with `observed == None`. Trend percentiles are histogram estimates that may
/// read up to 0.1% above the true value, capped at the largest sample.
pub fn evaluate_thresholds(thresholds: &[Threshold], summary: &RunSummary) -> Vec<ThresholdVerdict> {
    thresholds
        .iter()
        .map(|t| {
            let observed = observed_value(summary, t.metric, t.expr.agg);
            let passed = observed.is_none_or(|v| compare(v, t.expr.op, t.expr.value));
            ThresholdVerdict {
                metric: t.metric,
                expression: t.source.clone(),
                observed,
                passed,
            }
        })
        .collect()
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
        ThresholdOp::Eq => left == right,
        ThresholdOp::NotEq => left != right,
    }
}

fn observed_value(summary: &RunSummary, metric: BuiltinMetric, agg: ThresholdAgg) -> Option<f64> {
    let series = summary.metric(metric)?;
    match (&series.value, agg) {
        (MetricValue::Trend(t), ThresholdAgg::Avg) => t.mean,
        (MetricValue::Trend(t), ThresholdAgg::Min) => t.min,
        (MetricValue::Trend(t), ThresholdAgg::Max) => t.max,
        (MetricValue::Trend(t), ThresholdAgg::Med) => t.p50,
        (MetricValue::Trend(t), ThresholdAgg::Count) => Some(t.count as f64),
        (MetricValue::Trend(t), ThresholdAgg::P(p)) => t.percentile(p),

        (MetricValue::Counter(v), ThresholdAgg::Count) => Some(*v as f64),
        (MetricValue::Counter(v), ThresholdAgg::Rate) => {
            let secs = summary.elapsed.as_secs_f64();
            (secs > 0.0).then(|| *v as f64 / secs)
        }

        (MetricValue::Rate { rate, .. }, ThresholdAgg::Rate) => *rate,

        (MetricValue::Gauge { value, .. }, ThresholdAgg::Value) => Some(*value as f64),
        (MetricValue::Gauge { max, .. }, ThresholdAgg::Max) => Some(*max as f64),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::RunStats;
    use crate::record::RequestRecord;
    use std::time::Duration;

    fn set(metric: &str, exprs: &[&str]) -> ThresholdSet {
        ThresholdSet {
            metric: metric.to_string(),
            expressions: exprs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn parse(metric: &str, exprs: &[&str]) -> Vec<Threshold> {
        Threshold::parse_set(&set(metric, exprs)).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  p(99)  <  2000 ").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(99.0));
        assert_eq!(expr.op, ThresholdOp::Lt);
        assert_eq!(expr.value, 2000.0);
    }

    #[test]
    fn parse_threshold_expr_accepts_fractional_percentiles() {
        let expr = parse_threshold_expr("p(99.9)<=150").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(99.9));
        assert_eq!(expr.op, ThresholdOp::Lte);
    }

    #[test]
    fn parse_threshold_expr_rejects_garbage() {
        for raw in ["", "p(101)<1", "p(0)<1", "avg", "avg<", "<5", "avg<abc", "median<1", "avg<inf"] {
            assert!(parse_threshold_expr(raw).is_err(), "accepted `{raw}`");
        }
    }

    #[test]
    fn parse_set_rejects_unknown_metric() {
        match Threshold::parse_set(&set("http_req_waiting", &["avg<1"])) {
            Err(ConfigError::UnknownMetric(m)) => assert_eq!(m, "http_req_waiting"),
            other => panic!("expected unknown metric, got {other:?}"),
        }
    }

    #[test]
    fn parse_set_rejects_aggregation_for_wrong_kind() {
        match Threshold::parse_set(&set("http_req_failed", &["p(95)<0.1"])) {
            Err(ConfigError::InvalidThreshold { metric, reason }) => {
                assert_eq!(metric, "http_req_failed");
                assert!(reason.contains("rate metrics"), "{reason}");
            }
            other => panic!("expected invalid threshold, got {other:?}"),
        }
    }

    #[test]
    fn p99_fails_iff_observed_is_at_or_above_bound() {
        let thresholds = parse("http_req_duration", &["p(99) < 2000"]);

        let fast = RunStats::new(1);
        for _ in 0..100 {
            fast.record_request(&RequestRecord::completed(200, Duration::from_millis(1990)));
        }
        let verdicts = evaluate_thresholds(&thresholds, &fast.summarize(Duration::from_secs(1), false));
        assert!(verdicts[0].passed, "{verdicts:?}");

        let slow = RunStats::new(1);
        for _ in 0..100 {
            slow.record_request(&RequestRecord::completed(200, Duration::from_millis(2000)));
        }
        let verdicts = evaluate_thresholds(&thresholds, &slow.summarize(Duration::from_secs(1), false));
        assert!(!verdicts[0].passed, "{verdicts:?}");
        let observed = verdicts[0].observed.unwrap_or_else(|| panic!("expected observed"));
        assert!(observed >= 2000.0, "observed={observed}");
    }

    #[test]
    fn p99_just_under_the_bound_passes() {
        let thresholds = parse("http_req_duration", &["p(99) < 2000"]);

        let stats = RunStats::new(1);
        for _ in 0..100 {
            stats.record_request(&RequestRecord::completed(200, Duration::from_micros(1_999_900)));
        }
        let verdicts = evaluate_thresholds(&thresholds, &stats.summarize(Duration::from_secs(1), false));
        assert!(verdicts[0].passed, "{verdicts:?}");
        assert_eq!(verdicts[0].observed, Some(1999.9));
    }

    #[test]
    fn failed_requests_do_not_feed_latency() {
        let thresholds = parse("http_req_duration", &["max < 100"]);
        let stats = RunStats::new(1);
        stats.record_request(&RequestRecord::completed(200, Duration::from_millis(10)));
        stats.record_request(&RequestRecord::completed(500, Duration::from_secs(5)));

        let verdicts = evaluate_thresholds(&thresholds, &stats.summarize(Duration::from_secs(1), false));
        assert!(verdicts[0].passed, "{verdicts:?}");
    }

    #[test]
    fn metric_without_samples_passes_with_no_observation() {
        let thresholds = parse("http_req_duration", &["p(99)<2000"]);
        let stats = RunStats::new(1);
        let verdicts = evaluate_thresholds(&thresholds, &stats.summarize(Duration::from_secs(1), false));
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts[0].passed);
        assert_eq!(verdicts[0].observed, None);
    }

    #[test]
    fn rate_and_counter_aggregations() {
        let stats = RunStats::new(1);
        for status in [200, 200, 200, 503] {
            stats.record_request(&RequestRecord::completed(status, Duration::from_millis(5)));
        }
        let summary = stats.summarize(Duration::from_secs(2), false);

        let mut thresholds = parse("http_req_failed", &["rate<0.3", "rate<0.2"]);
        thresholds.extend(parse("http_reqs", &["count==4", "rate>=2"]));
        let verdicts = evaluate_thresholds(&thresholds, &summary);

        let passed: Vec<bool> = verdicts.iter().map(|v| v.passed).collect();
        assert_eq!(passed, [true, false, true, true]);
        assert_eq!(verdicts[1].observed, Some(0.25));
        assert_eq!(verdicts[3].observed, Some(2.0));
    }

    #[test]
    fn expression_display_is_normalized() {
        let expr = parse_threshold_expr("p(95)<=250").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.to_string(), "p(95) <= 250");
    }
}
