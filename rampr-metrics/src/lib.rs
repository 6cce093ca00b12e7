pub mod agg;
pub mod metrics;
pub mod registry;

pub use agg::{CounterSnapshot, RunningStats};
pub use metrics::{MetricHandle, MetricKind, MetricSeriesSummary, MetricValue, TrendSummary};
pub use registry::Registry;
