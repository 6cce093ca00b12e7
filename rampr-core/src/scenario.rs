use std::sync::Arc;

use crate::checks::Check;
use crate::executor::{RequestExecutor, RequestSpec};
use crate::loader::ExecutionPlan;
use crate::record::IterationOutcome;

/// The default behavior: one request per iteration, then the checks.
#[derive(Debug, Clone)]
pub struct HttpScenario {
    executor: RequestExecutor,
    request: Arc<RequestSpec>,
    checks: Arc<[Check]>,
}

impl HttpScenario {
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        Self {
            executor: RequestExecutor::new(plan.timeout),
            request: Arc::new(plan.request.clone()),
            checks: plan.checks.iter().cloned().collect(),
        }
    }

    pub async fn iterate(&self) -> IterationOutcome {
        let executed = self.executor.execute(&self.request).await;
        let checks = self
            .checks
            .iter()
            .map(|check| check.evaluate(&executed.record, &executed.body))
            .collect();

        IterationOutcome {
            requests: vec![executed.record],
            checks,
        }
    }
}
