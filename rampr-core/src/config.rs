use std::time::Duration;

use bytes::Bytes;

use crate::thresholds::ThresholdSet;

/// Per-request timeout when neither the scenario nor the CLI sets one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the coordinator resizes the pool.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

/// A stage as written in a scenario file, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    pub duration: Duration,
    pub target: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioOptions {
    pub name: Option<String>,
    pub start_vus: Option<i64>,
    pub stages: Vec<StageOptions>,
    pub vus: Option<i64>,
    pub duration: Option<Duration>,
    pub think_time: Option<Duration>,
    pub thresholds: Vec<ThresholdSet>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Defaults to `GET`.
    pub method: Option<String>,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

/// One named assertion; exactly one rule field must be set.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub name: String,
    pub status: Option<u16>,
    pub status_in: Vec<u16>,
    pub body_contains: Option<String>,
    pub max_duration: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioDefinition {
    pub options: ScenarioOptions,
    pub request: RequestOptions,
    pub checks: Vec<CheckOptions>,
}

/// Command-line overrides. Anything set here wins over the scenario file.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
    pub stages: Vec<Stage>,
    pub tick: Option<Duration>,
    pub timeout: Option<Duration>,
}
