use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use rampr_core::{HttpScenario, RunHooks, StopSignal, VuInfo};

use crate::cli::RunArgs;
use crate::env::merged_env;
use crate::exit_codes::ExitCode;
use crate::output::{self, Report};
use crate::run_error::RunError;
use crate::scenario_yaml::load_scenario;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let plan = resolve_plan(&args.scenario, &args.profile).await?;
    out.print_header(&args.scenario, &plan);

    let cancel = Arc::new(StopSignal::new());
    let ctrl_c = tokio::spawn(watch_ctrl_c(cancel.clone()));
    let hooks = RunHooks {
        cancel,
        progress: out.progress(),
    };

    let scenario = Arc::new(HttpScenario::from_plan(&plan));
    let behavior = move |_vu: VuInfo| {
        let scenario = scenario.clone();
        async move { scenario.iterate().await }
    };

    let summary = rampr_core::run_plan(&plan, behavior, hooks).await;
    ctrl_c.abort();
    let summary = summary?;

    let verdicts = rampr_core::evaluate_thresholds(&plan.thresholds, &summary);
    let report = Report {
        scenario: plan.name.as_deref().unwrap_or("default"),
        summary: &summary,
        verdicts: &verdicts,
    };

    out.print_summary(&report).map_err(RunError::RuntimeError)?;

    if let Some(path) = &args.summary_export {
        output::json::write_summary_file(path, &report)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    let thresholds_failed = verdicts.iter().any(|v| !v.passed);
    Ok(ExitCode::from_outcome(thresholds_failed, summary.aborted))
}

/// Reads, expands and validates a scenario file against the CLI overrides.
pub(crate) async fn resolve_plan(
    path: &Path,
    profile: &crate::cli::ProfileArgs,
) -> Result<rampr_core::ExecutionPlan, RunError> {
    let env = merged_env(&profile.env).map_err(RunError::InvalidInput)?;
    let def = load_scenario(path, &env)
        .await
        .map_err(RunError::InvalidInput)?;

    rampr_core::load_plan(&def, &profile.run_config())
        .with_context(|| format!("invalid scenario: {}", path.display()))
        .map_err(RunError::InvalidInput)
}

/// The first Ctrl+C drains the pool gracefully; a second one exits immediately.
async fn watch_ctrl_c(cancel: Arc<StopSignal>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::warn!("interrupt received, stopping virtual users (Ctrl+C again to exit now)");
    eprintln!("\ninterrupted: waiting for in-flight requests (Ctrl+C again to exit now)");
    cancel.trigger();

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(ExitCode::Interrupted.as_i32());
    }
}
