use std::path::Path;

use crate::cli::OutputFormat;

mod human;
pub(crate) mod json;

/// Everything the final report shows.
pub(crate) struct Report<'a> {
    pub scenario: &'a str,
    pub summary: &'a rampr_core::RunSummary,
    pub verdicts: &'a [rampr_core::ThresholdVerdict],
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, scenario_path: &Path, plan: &rampr_core::ExecutionPlan);
    fn progress(&self) -> Option<rampr_core::ProgressFn>;
    fn print_summary(&self, report: &Report<'_>) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
