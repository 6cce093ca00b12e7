use std::time::Duration;

use bytes::Bytes;

use crate::checks::Check;
use crate::config::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_TICK, RequestOptions, RunConfig, ScenarioDefinition,
    ScenarioOptions, Stage,
};
use crate::error::ConfigError;
use crate::executor::RequestSpec;
use crate::schedule::StageSchedule;
use crate::thresholds::Threshold;

/// Immutable, validated description of a run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub name: Option<String>,
    pub start_vus: u64,
    pub stages: Vec<Stage>,
    pub max_vus: u64,
    pub total_duration: Duration,
    pub tick: Duration,
    pub think_time: Option<Duration>,
    pub thresholds: Vec<Threshold>,
    pub request: RequestSpec,
    pub timeout: Duration,
    pub checks: Vec<Check>,
}

impl ExecutionPlan {
    pub fn schedule(&self) -> StageSchedule {
        StageSchedule::new(self.start_vus, self.stages.clone())
    }
}

/// Validates a scenario and resolves its load profile against CLI overrides.
pub fn load_plan(def: &ScenarioDefinition, cfg: &RunConfig) -> Result<ExecutionPlan, ConfigError> {
    let (start_vus, stages) = resolve_profile(&def.options, cfg)?;

    let schedule = StageSchedule::new(start_vus, stages);
    let max_vus = schedule.max_target();
    if max_vus == 0 {
        return Err(ConfigError::NoVirtualUsers);
    }

    let tick = positive(cfg.tick, DEFAULT_TICK, "tick")?;
    let timeout = positive(
        cfg.timeout.or(def.request.timeout),
        DEFAULT_REQUEST_TIMEOUT,
        "timeout",
    )?;

    let thresholds = def
        .options
        .thresholds
        .iter()
        .map(Threshold::parse_set)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();

    let checks = def
        .checks
        .iter()
        .map(Check::from_options)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ExecutionPlan {
        name: def.options.name.clone(),
        start_vus,
        total_duration: schedule.total_duration(),
        stages: schedule.stages().to_vec(),
        max_vus,
        tick,
        think_time: def.options.think_time.filter(|d| !d.is_zero()),
        thresholds,
        request: request_spec(&def.request)?,
        timeout,
        checks,
    })
}

fn positive(
    value: Option<Duration>,
    default: Duration,
    what: &'static str,
) -> Result<Duration, ConfigError> {
    match value {
        Some(d) if d.is_zero() => Err(ConfigError::NonPositiveInterval(what)),
        Some(d) => Ok(d),
        None => Ok(default),
    }
}

fn resolve_profile(
    opts: &ScenarioOptions,
    cfg: &RunConfig,
) -> Result<(u64, Vec<Stage>), ConfigError> {
    if !cfg.stages.is_empty() {
        for (index, stage) in cfg.stages.iter().enumerate() {
            if stage.duration.is_zero() {
                return Err(ConfigError::InvalidStageDuration { index });
            }
        }
        return Ok((0, cfg.stages.clone()));
    }

    if cfg.vus.is_some() || cfg.duration.is_some() {
        let vus = match cfg.vus {
            Some(v) => v,
            None => validate_vus(opts.vus.unwrap_or(1))?,
        };
        let duration = cfg.duration.or(opts.duration);
        return constant_profile(vus, duration);
    }

    if !opts.stages.is_empty() {
        let start = match opts.start_vus {
            Some(v) if v < 0 => return Err(ConfigError::InvalidStartVus(v)),
            Some(v) => v as u64,
            None => 0,
        };
        let stages = opts
            .stages
            .iter()
            .enumerate()
            .map(|(index, s)| {
                if s.duration.is_zero() {
                    return Err(ConfigError::InvalidStageDuration { index });
                }
                let target = u64::try_from(s.target).map_err(|_| {
                    ConfigError::InvalidStageTarget {
                        index,
                        target: s.target,
                    }
                })?;
                Ok(Stage {
                    duration: s.duration,
                    target,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok((start, stages));
    }

    match (opts.vus, opts.duration) {
        (None, None) => Err(ConfigError::MissingLoadProfile),
        (vus, duration) => constant_profile(validate_vus(vus.unwrap_or(1))?, duration),
    }
}

fn validate_vus(vus: i64) -> Result<u64, ConfigError> {
    match u64::try_from(vus) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::InvalidVus(vus)),
    }
}

fn constant_profile(vus: u64, duration: Option<Duration>) -> Result<(u64, Vec<Stage>), ConfigError> {
    let duration = duration.ok_or(ConfigError::MissingDuration)?;
    if duration.is_zero() {
        return Err(ConfigError::InvalidDuration);
    }
    if vus == 0 {
        return Err(ConfigError::InvalidVus(0));
    }
    Ok((
        vus,
        vec![Stage {
            duration,
            target: vus,
        }],
    ))
}

fn request_spec(opts: &RequestOptions) -> Result<RequestSpec, ConfigError> {
    let method_raw = opts.method.as_deref().unwrap_or("GET").trim();
    let method = http::Method::from_bytes(method_raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(method_raw.to_string()))?;

    rampr_http::validate_target_url(&opts.url)
        .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

    for (name, value) in &opts.headers {
        http::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        http::header::HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(RequestSpec {
        method,
        url: opts.url.clone(),
        headers: opts.headers.clone(),
        body: opts.body.clone().unwrap_or_else(Bytes::new),
    })
}
