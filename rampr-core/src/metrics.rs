use rampr_metrics::MetricKind;

/// Metrics every run records. Thresholds may only reference these.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinMetric {
    HttpReqs,
    HttpReqDuration,
    HttpReqFailed,
    Iterations,
    IterationDuration,
    Checks,
    DataSent,
    DataReceived,
    Vus,
    VusMax,
}

impl BuiltinMetric {
    pub fn kind(self) -> MetricKind {
        match self {
            Self::HttpReqs | Self::Iterations | Self::DataSent | Self::DataReceived => {
                MetricKind::Counter
            }
            Self::HttpReqDuration | Self::IterationDuration => MetricKind::Trend,
            Self::HttpReqFailed | Self::Checks => MetricKind::Rate,
            Self::Vus | Self::VusMax => MetricKind::Gauge,
        }
    }
}
