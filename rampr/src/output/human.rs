use std::path::Path;
use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_elapsed, format_ms_opt, format_rate};
use progress::HumanProgress;
use summary::render;

use super::{OutputFormatter, Report};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, scenario_path: &Path, plan: &rampr_core::ExecutionPlan) {
        let name = plan.name.as_deref().unwrap_or("default");
        self.progress.set_prefix(name);

        println!("scenario: {} ({name})", scenario_path.display());
        println!(
            "request: {} {}  timeout={}",
            plan.request.method,
            plan.request.url,
            humantime::format_duration(plan.timeout)
        );
        let stages = plan
            .stages
            .iter()
            .map(|s| format!("{}→{}", humantime::format_duration(s.duration), s.target))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "profile: start={} stages=[{stages}] max_vus={} total={}",
            plan.start_vus,
            plan.max_vus,
            humantime::format_duration(plan.total_duration)
        );
        println!();
    }

    fn progress(&self) -> Option<rampr_core::ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u: rampr_core::ProgressUpdate| {
            let stage = match &u.stage {
                Some(s) => format!(
                    "stage={}/{} remaining={} ",
                    s.index + 1,
                    s.count,
                    format_elapsed(s.stage_remaining)
                ),
                None => String::new(),
            };
            let stopping = if u.stopping_vus > 0 {
                format!(" (+{} stopping)", u.stopping_vus)
            } else {
                String::new()
            };
            let message = format!(
                "{stage}vus={}/{}{stopping} rps={} reqs={} failed={} p99={} elapsed={}",
                u.active_vus,
                u.target_vus,
                format_rate(u.metrics.rps_now.unwrap_or(0.0)),
                u.metrics.requests_total,
                u.metrics.failed_total,
                format_ms_opt(u.metrics.latency_p99_ms),
                format_elapsed(u.elapsed)
            );

            progress.update(u.total_duration, u.elapsed, message);
        }))
    }

    fn print_summary(&self, report: &Report<'_>) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(report));

        let failed: Vec<_> = report.verdicts.iter().filter(|v| !v.passed).collect();
        if !failed.is_empty() {
            eprintln!("thresholds failed:");
            for v in failed {
                match v.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", v.metric, v.expression),
                    None => eprintln!("  {}: {} (no samples)", v.metric, v.expression),
                }
            }
        }

        Ok(())
    }
}
