use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rampr_metrics::{CounterSnapshot, RunningStats};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Result;
use crate::loader::ExecutionPlan;
use crate::pool::VuPool;
use crate::progress::{ProgressFn, ProgressUpdate};
use crate::record::IterationOutcome;
use crate::stats::RunStats;
use crate::summary::RunSummary;
use crate::vu::{StopSignal, VuInfo};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Caller-side controls for a run.
#[derive(Clone, Default)]
pub struct RunHooks {
    /// Ends the run early; VUs finish their in-flight iteration first.
    pub cancel: Arc<StopSignal>,
    pub progress: Option<ProgressFn>,
}

/// Drives `behavior` through the plan's load profile and returns the aggregate.
///
/// Every `plan.tick` the coordinator samples the schedule and resizes the pool.
/// When the profile ends or `hooks.cancel` fires, all VUs are stopped and joined.
pub async fn run_plan<F, Fut>(plan: &ExecutionPlan, behavior: F, hooks: RunHooks) -> Result<RunSummary>
where
    F: Fn(VuInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IterationOutcome> + Send + 'static,
{
    let schedule = plan.schedule();
    let stats = Arc::new(RunStats::new(plan.max_vus));
    let mut pool = VuPool::new(behavior, stats.clone(), plan.think_time);

    tracing::info!(
        scenario = plan.name.as_deref().unwrap_or("default"),
        stages = plan.stages.len(),
        max_vus = plan.max_vus,
        duration = ?plan.total_duration,
        "run started"
    );

    let started = Instant::now();
    let mut ticker = tokio::time::interval(plan.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut emitted = 0u64;
    let mut last_emit = started;
    let mut prev_requests: Option<CounterSnapshot> = None;
    let mut rps = RunningStats::default();

    let aborted = loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = hooks.cancel.wait() => break true,
        }

        let elapsed = started.elapsed();
        if schedule.is_done(elapsed) {
            break false;
        }

        let target = schedule.target_at(elapsed);
        pool.reconcile(target);
        let active = pool.active();
        stats.observe_vus(active);

        let Some(progress) = hooks.progress.as_ref() else {
            continue;
        };
        let now = Instant::now();
        let since_emit = now.duration_since(last_emit);
        if emitted > 0 && since_emit < PROGRESS_INTERVAL {
            continue;
        }

        let mut metrics = stats.live();
        let snapshot = CounterSnapshot::new(metrics.requests_total);
        if emitted > 0 {
            let now_rps = snapshot.per_sec_since(prev_requests, since_emit.as_secs_f64());
            rps.push(now_rps);
            metrics.rps_now = Some(now_rps);
        }
        prev_requests = Some(snapshot);
        last_emit = now;
        emitted += 1;

        progress(ProgressUpdate {
            tick: emitted,
            elapsed,
            total_duration: schedule.total_duration(),
            stage: schedule.stage_snapshot_at(elapsed),
            target_vus: target,
            active_vus: active,
            stopping_vus: pool.stopping(),
            metrics,
        });
    };

    if aborted {
        tracing::warn!(elapsed = ?started.elapsed(), "run interrupted, draining virtual users");
    }

    pool.shutdown().await?;
    stats.observe_vus(0);

    let summary = stats.summarize(started.elapsed(), aborted);
    tracing::info!(
        requests = summary.requests_total(),
        failed = summary.failed_requests_total(),
        peak_vus = summary.peak_vus(),
        avg_rps = rps.mean(),
        max_rps = rps.max(),
        aborted,
        "run finished"
    );
    Ok(summary)
}
