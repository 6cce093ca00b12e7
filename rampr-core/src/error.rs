pub type Result<T> = std::result::Result<T, Error>;

/// A malformed scenario or override; detected before any load is generated.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("stage {index}: `duration` must be a positive duration")]
    InvalidStageDuration { index: usize },

    #[error("stage {index}: `target` must be a non-negative integer (got {target})")]
    InvalidStageTarget { index: usize, target: i64 },

    #[error("`startVUs` must be a non-negative integer (got {0})")]
    InvalidStartVus(i64),

    #[error("`vus` must be a positive integer (got {0})")]
    InvalidVus(i64),

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("a constant load profile needs a `duration`")]
    MissingDuration,

    #[error("no load profile: set `stages`, or `vus` with `duration`")]
    MissingLoadProfile,

    #[error("the load profile never schedules a virtual user (every target is 0)")]
    NoVirtualUsers,

    #[error("`{0}` must be a positive duration")]
    NonPositiveInterval(&'static str),

    #[error("unknown metric `{0}` in thresholds")]
    UnknownMetric(String),

    #[error("invalid threshold for `{metric}`: {reason}")]
    InvalidThreshold { metric: String, reason: String },

    #[error("invalid request method `{0}`")]
    InvalidMethod(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    #[error("invalid request header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error(
        "check `{0}` must declare exactly one of `status`, `statusIn`, `bodyContains`, `maxDuration`"
    )]
    InvalidCheck(String),

    #[error("check names must be non-empty")]
    UnnamedCheck,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
