#![forbid(unsafe_code)]

mod checks;
mod config;
mod error;
mod executor;
mod loader;
mod metrics;
mod pool;
mod progress;
mod record;
mod run;
mod schedule;
mod scenario;
mod stats;
mod summary;
mod thresholds;
mod vu;

pub use checks::{Check, CheckRule};
pub use config::{
    CheckOptions, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TICK, RequestOptions, RunConfig,
    ScenarioDefinition, ScenarioOptions, Stage, StageOptions,
};
pub use error::{ConfigError, Error, Result};
pub use executor::{Executed, RequestExecutor, RequestSpec};
pub use loader::{ExecutionPlan, load_plan};
pub use metrics::BuiltinMetric;
pub use pool::VuPool;
pub use progress::{LiveMetrics, ProgressFn, ProgressUpdate};
pub use record::{CheckResult, FAILED_STATUS, IterationOutcome, RequestRecord};
pub use run::{RunHooks, run_plan};
pub use scenario::HttpScenario;
pub use schedule::{StageSchedule, StageSnapshot};
pub use stats::RunStats;
pub use summary::{CheckSummary, RunSummary};
pub use thresholds::{
    Threshold, ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdSet, ThresholdVerdict,
    evaluate_thresholds, parse_threshold_expr,
};
pub use vu::{StopSignal, VuInfo, VuState};

pub use rampr_http::HttpTransportErrorKind;
pub use rampr_metrics::{MetricKind, MetricSeriesSummary, MetricValue, TrendSummary};
