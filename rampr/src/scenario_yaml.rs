use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::env::{EnvVars, expand};

/// Load-profile and threshold keys; either top-level or under `options:`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct OptionsYaml {
    pub name: Option<String>,

    #[serde(rename = "startVUs")]
    pub start_vus: Option<i64>,

    #[serde(default)]
    pub stages: Vec<StageYaml>,

    pub vus: Option<i64>,
    pub duration: Option<YamlDuration>,
    pub think_time: Option<YamlDuration>,

    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdExprYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub target: i64,
    pub duration: YamlDuration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RequestYaml {
    pub method: Option<String>,
    pub url: String,

    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    pub headers: BTreeMap<String, String>,

    /// Serialized as the body; sets `Content-Type: application/json` unless given.
    pub json: Option<serde_json::Value>,
    /// Raw body, sent as-is.
    pub body: Option<String>,

    pub timeout: Option<YamlDuration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct CheckYaml {
    pub name: String,
    pub status: Option<u16>,
    #[serde(default)]
    pub status_in: Vec<u16>,
    pub body_contains: Option<String>,
    pub max_duration: Option<YamlDuration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ScenarioDocYamlNested {
    options: OptionsYaml,
    request: RequestYaml,
    #[serde(default)]
    checks: Vec<CheckYaml>,
}

/// Options inline next to `request`. Spelled out field by field because
/// `deny_unknown_fields` has no effect through `#[serde(flatten)]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ScenarioDocYamlFlat {
    name: Option<String>,
    #[serde(rename = "startVUs")]
    start_vus: Option<i64>,
    #[serde(default)]
    stages: Vec<StageYaml>,
    vus: Option<i64>,
    duration: Option<YamlDuration>,
    think_time: Option<YamlDuration>,
    #[serde(default)]
    thresholds: BTreeMap<String, ThresholdExprYaml>,

    request: RequestYaml,
    #[serde(default)]
    checks: Vec<CheckYaml>,
}

impl ScenarioDocYamlFlat {
    fn into_parts(self) -> (OptionsYaml, RequestYaml, Vec<CheckYaml>) {
        let options = OptionsYaml {
            name: self.name,
            start_vus: self.start_vus,
            stages: self.stages,
            vus: self.vus,
            duration: self.duration,
            think_time: self.think_time,
            thresholds: self.thresholds,
        };
        (options, self.request, self.checks)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    pub(crate) fn into_inner(self) -> Duration {
        self.0
    }
}

impl From<Duration> for YamlDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Serialize for YamlDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(self.0).to_string())
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Header values may be written as bare numbers or booleans.
fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();

    for (k, v) in raw {
        let s = match v {
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s,
            _ => return Err(D::Error::custom(format!("header `{k}` must be a scalar"))),
        };
        out.insert(k, s);
    }

    Ok(out)
}

pub(crate) async fn load_scenario(
    path: &Path,
    env: &EnvVars,
) -> anyhow::Result<rampr_core::ScenarioDefinition> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read scenario: {}", path.display()))?;

    parse_scenario(&bytes, env).with_context(|| format!("invalid scenario: {}", path.display()))
}

pub(crate) fn parse_scenario(
    bytes: &[u8],
    env: &EnvVars,
) -> anyhow::Result<rampr_core::ScenarioDefinition> {
    let value: serde_yaml::Value = serde_yaml::from_slice(bytes).context("failed to parse YAML")?;

    // Dispatch on the key instead of an untagged enum to keep serde's error messages.
    let nested = value
        .as_mapping()
        .is_some_and(|m| m.contains_key("options"));
    let (options, request, checks) = if nested {
        let doc: ScenarioDocYamlNested = serde_yaml::from_value(value)?;
        (doc.options, doc.request, doc.checks)
    } else {
        let doc: ScenarioDocYamlFlat = serde_yaml::from_value(value)?;
        doc.into_parts()
    };

    Ok(rampr_core::ScenarioDefinition {
        options: options_into_core(options)?,
        request: request_into_core(request, env)?,
        checks: checks.into_iter().map(check_into_core).collect(),
    })
}

fn options_into_core(opts: OptionsYaml) -> anyhow::Result<rampr_core::ScenarioOptions> {
    let OptionsYaml {
        name,
        start_vus,
        stages,
        vus,
        duration,
        think_time,
        thresholds,
    } = opts;

    Ok(rampr_core::ScenarioOptions {
        name,
        start_vus,
        stages: stages
            .into_iter()
            .map(|s| rampr_core::StageOptions {
                duration: s.duration.into_inner(),
                target: s.target,
            })
            .collect(),
        vus,
        duration: duration.map(YamlDuration::into_inner),
        think_time: think_time.map(YamlDuration::into_inner),
        thresholds: parse_thresholds_map(thresholds)?,
    })
}

fn request_into_core(
    req: RequestYaml,
    env: &EnvVars,
) -> anyhow::Result<rampr_core::RequestOptions> {
    let RequestYaml {
        method,
        url,
        headers,
        json,
        body,
        timeout,
    } = req;

    let mut headers = headers
        .into_iter()
        .map(|(k, v)| {
            let v = expand(&v, env).with_context(|| format!("in header `{k}`"))?;
            Ok((k, v))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let body = match (json, body) {
        (Some(_), Some(_)) => anyhow::bail!("`request.json` and `request.body` are mutually exclusive"),
        (Some(json), None) => {
            let json = expand_json(json, env).context("in `request.json`")?;
            if !headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            Some(Bytes::from(
                serde_json::to_vec(&json).context("failed to encode `request.json`")?,
            ))
        }
        (None, Some(raw)) => Some(Bytes::from(
            expand(&raw, env).context("in `request.body`")?,
        )),
        (None, None) => None,
    };

    Ok(rampr_core::RequestOptions {
        method,
        url: expand(&url, env).context("in `request.url`")?,
        headers,
        body,
        timeout: timeout.map(YamlDuration::into_inner),
    })
}

/// Expands placeholders in string leaves only, so substituted text cannot break the document.
fn expand_json(value: serde_json::Value, env: &EnvVars) -> anyhow::Result<serde_json::Value> {
    use serde_json::Value;

    Ok(match value {
        Value::String(s) => Value::String(expand(&s, env)?),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| expand_json(v, env))
                .collect::<anyhow::Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| Ok((k, expand_json(v, env)?)))
                .collect::<anyhow::Result<_>>()?,
        ),
        other => other,
    })
}

fn check_into_core(check: CheckYaml) -> rampr_core::CheckOptions {
    rampr_core::CheckOptions {
        name: check.name,
        status: check.status,
        status_in: check.status_in,
        body_contains: check.body_contains,
        max_duration: check.max_duration.map(YamlDuration::into_inner),
    }
}

fn parse_thresholds_map(
    raw: BTreeMap<String, ThresholdExprYaml>,
) -> anyhow::Result<Vec<rampr_core::ThresholdSet>> {
    let mut out = Vec::new();

    for (metric, v) in raw {
        let expressions: Vec<String> = match v {
            ThresholdExprYaml::One(s) => vec![s],
            ThresholdExprYaml::Many(v) => v,
        };

        if expressions.is_empty() {
            anyhow::bail!("invalid thresholds for `{metric}`: empty list");
        }

        out.push(rampr_core::ThresholdSet {
            metric,
            expressions,
        });
    }

    Ok(out)
}

pub(crate) fn render_thresholds(
    thresholds: &[rampr_core::Threshold],
) -> BTreeMap<String, ThresholdExprYaml> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for t in thresholds {
        grouped
            .entry(t.metric.to_string())
            .or_default()
            .push(t.expr.to_string());
    }

    grouped
        .into_iter()
        .map(|(metric, mut exprs)| {
            let v = if exprs.len() == 1 {
                ThresholdExprYaml::One(exprs.remove(0))
            } else {
                ThresholdExprYaml::Many(exprs)
            };
            (metric, v)
        })
        .collect()
}
