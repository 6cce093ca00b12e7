use std::collections::BTreeMap;

use anyhow::Context as _;
use rampr_core::{CheckRule, ExecutionPlan};
use serde::Serialize;

use crate::cli::ValidateArgs;
use crate::exit_codes::ExitCode;
use crate::run::resolve_plan;
use crate::run_error::RunError;
use crate::scenario_yaml::{ThresholdExprYaml, YamlDuration, render_thresholds};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "startVUs")]
    start_vus: u64,
    stages: Vec<StageDoc>,
    #[serde(rename = "maxVUs")]
    max_vus: u64,
    total_duration: YamlDuration,
    tick: YamlDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    think_time: Option<YamlDuration>,
    request: RequestDoc,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    checks: Vec<CheckDoc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    thresholds: BTreeMap<String, ThresholdExprYaml>,
}

#[derive(Debug, Serialize)]
struct StageDoc {
    duration: YamlDuration,
    target: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestDoc {
    method: String,
    url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    body_bytes: usize,
    timeout: YamlDuration,
}

#[derive(Debug, Serialize)]
struct CheckDoc {
    name: String,
    #[serde(flatten)]
    rule: RuleDoc,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RuleDoc {
    Status(u16),
    StatusIn(Vec<u16>),
    BodyContains(String),
    MaxDuration(YamlDuration),
}

fn plan_doc(plan: &ExecutionPlan) -> PlanDoc {
    PlanDoc {
        name: plan.name.clone(),
        start_vus: plan.start_vus,
        stages: plan
            .stages
            .iter()
            .map(|s| StageDoc {
                duration: s.duration.into(),
                target: s.target,
            })
            .collect(),
        max_vus: plan.max_vus,
        total_duration: plan.total_duration.into(),
        tick: plan.tick.into(),
        think_time: plan.think_time.map(YamlDuration::from),
        request: RequestDoc {
            method: plan.request.method.to_string(),
            url: plan.request.url.clone(),
            headers: plan.request.headers.iter().cloned().collect(),
            body_bytes: plan.request.body.len(),
            timeout: plan.timeout.into(),
        },
        checks: plan
            .checks
            .iter()
            .map(|c| CheckDoc {
                name: c.name.to_string(),
                rule: match &c.rule {
                    CheckRule::Status(s) => RuleDoc::Status(*s),
                    CheckRule::StatusIn(s) => RuleDoc::StatusIn(s.clone()),
                    CheckRule::BodyContains(s) => RuleDoc::BodyContains(s.clone()),
                    CheckRule::MaxDuration(d) => RuleDoc::MaxDuration((*d).into()),
                },
            })
            .collect(),
        thresholds: render_thresholds(&plan.thresholds),
    }
}

pub async fn validate(args: ValidateArgs) -> Result<ExitCode, RunError> {
    let plan = resolve_plan(&args.scenario, &args.profile).await?;
    let yaml = serde_yaml::to_string(&plan_doc(&plan))
        .context("failed to serialize plan")
        .map_err(RunError::RuntimeError)?;
    print!("{yaml}");
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvVars;
    use crate::scenario_yaml::parse_scenario;

    #[test]
    fn plan_doc_shows_the_resolved_profile() {
        let env: EnvVars = [("BASE_URL".to_string(), "http://127.0.0.1:9".to_string())]
            .into_iter()
            .collect();
        let def = parse_scenario(
            br#"
name: pull
thresholds:
  http_req_duration: "p(99)<2000"
stages:
  - { duration: 30s, target: 50 }
  - { duration: 20s, target: 0 }
request:
  url: ${BASE_URL}/api/pull
  json: { chat: "a:b" }
checks:
  - { name: ok, status: 200 }
"#,
            &env,
        )
        .unwrap_or_else(|e| panic!("{e:#}"));
        let plan = rampr_core::load_plan(&def, &rampr_core::RunConfig::default())
            .unwrap_or_else(|e| panic!("{e}"));

        let yaml = serde_yaml::to_string(&plan_doc(&plan)).unwrap_or_else(|e| panic!("{e}"));
        let v: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(v["maxVUs"].as_u64(), Some(50));
        assert_eq!(v["totalDuration"].as_str(), Some("50s"));
        assert_eq!(v["tick"].as_str(), Some("100ms"));
        assert_eq!(v["request"]["method"].as_str(), Some("GET"));
        assert_eq!(v["request"]["url"].as_str(), Some("http://127.0.0.1:9/api/pull"));
        assert_eq!(v["request"]["timeout"].as_str(), Some("1m"));
        assert_eq!(v["checks"][0]["status"].as_u64(), Some(200));
        assert_eq!(v["thresholds"]["http_req_duration"].as_str(), Some("p(99) < 2000"));
    }
}
