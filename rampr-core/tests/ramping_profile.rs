use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rampr_core::{
    BuiltinMetric, IterationOutcome, ProgressUpdate, RequestOptions, RequestRecord, RunConfig,
    RunHooks, ScenarioDefinition, ScenarioOptions, StageOptions, StopSignal, ThresholdSet, VuInfo,
    evaluate_thresholds, load_plan, run_plan,
};
use tokio::time::Instant;

fn stage(secs: u64, target: i64) -> StageOptions {
    StageOptions {
        duration: Duration::from_secs(secs),
        target,
    }
}

fn scenario(stages: Vec<StageOptions>) -> ScenarioDefinition {
    ScenarioDefinition {
        options: ScenarioOptions {
            name: Some("pull".to_string()),
            stages,
            thresholds: vec![ThresholdSet {
                metric: "http_req_duration".to_string(),
                expressions: vec!["p(99) < 2000".to_string()],
            }],
            ..ScenarioOptions::default()
        },
        request: RequestOptions {
            url: "http://localhost:8080/api/pull".to_string(),
            ..RequestOptions::default()
        },
        checks: Vec::new(),
    }
}

fn pull_profile() -> ScenarioDefinition {
    scenario(vec![stage(30, 50), stage(60, 200), stage(20, 0)])
}

/// A behavior whose "request" takes `latency` and answers `status`.
fn fixed_latency(
    latency: Duration,
    status: u16,
) -> impl Fn(VuInfo) -> std::pin::Pin<Box<dyn Future<Output = IterationOutcome> + Send>>
+ Send
+ Sync
+ 'static {
    move |_vu| {
        Box::pin(async move {
            let started = Instant::now();
            tokio::time::sleep(latency).await;
            IterationOutcome::single(RequestRecord::completed(status, started.elapsed()))
        })
    }
}

#[tokio::test(start_paused = true)]
async fn fast_endpoint_passes_and_peaks_near_200_vus() {
    let plan = load_plan(&pull_profile(), &RunConfig::default()).unwrap_or_else(|e| panic!("{e}"));

    let summary = run_plan(
        &plan,
        fixed_latency(Duration::from_millis(50), 200),
        RunHooks::default(),
    )
    .await
    .unwrap_or_else(|e| panic!("run failed: {e}"));

    let verdicts = evaluate_thresholds(&plan.thresholds, &summary);
    assert!(verdicts.iter().all(|v| v.passed), "{verdicts:?}");

    let peak = summary.peak_vus();
    assert!((195..=200).contains(&peak), "peak_vus={peak}");
    assert_eq!(summary.max_vus(), 200);
    assert!(!summary.aborted);
    assert!(summary.elapsed >= Duration::from_secs(110));
    assert_eq!(summary.failed_requests_total(), 0);
    assert!(summary.requests_total() > 100_000, "requests={}", summary.requests_total());
}

#[tokio::test(start_paused = true)]
async fn slow_endpoint_fails_p99_threshold() {
    let plan = load_plan(&pull_profile(), &RunConfig::default()).unwrap_or_else(|e| panic!("{e}"));

    let summary = run_plan(
        &plan,
        fixed_latency(Duration::from_millis(2500), 200),
        RunHooks::default(),
    )
    .await
    .unwrap_or_else(|e| panic!("run failed: {e}"));

    let verdicts = evaluate_thresholds(&plan.thresholds, &summary);
    assert_eq!(verdicts.len(), 1);
    assert!(!verdicts[0].passed, "{verdicts:?}");
    let observed = verdicts[0]
        .observed
        .unwrap_or_else(|| panic!("expected an observed p99"));
    assert!(observed >= 2500.0, "observed={observed}");
}

#[tokio::test(start_paused = true)]
async fn always_failing_endpoint_completes_with_full_failure_rate() {
    let def = scenario(vec![stage(2, 10), stage(1, 0)]);
    let plan = load_plan(&def, &RunConfig::default()).unwrap_or_else(|e| panic!("{e}"));

    let summary = run_plan(
        &plan,
        fixed_latency(Duration::from_millis(20), 500),
        RunHooks::default(),
    )
    .await
    .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(summary.requests_total() > 0);
    assert_eq!(summary.rate(BuiltinMetric::HttpReqFailed), Some(1.0));
    assert_eq!(summary.failed_requests_total(), summary.requests_total());
    assert_eq!(summary.errors, vec![("status_500".to_string(), summary.requests_total())]);
    // Latency only tracks successful requests.
    let latency = summary
        .trend(BuiltinMetric::HttpReqDuration)
        .unwrap_or_else(|| panic!("expected trend"));
    assert_eq!(latency.count, 0);
}

#[tokio::test(start_paused = true)]
async fn pool_matches_schedule_at_every_progress_update() {
    let plan = load_plan(&pull_profile(), &RunConfig::default()).unwrap_or_else(|e| panic!("{e}"));

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
    let hooks = RunHooks {
        progress: Some({
            let updates = updates.clone();
            Arc::new(move |u| updates.lock().push(u))
        }),
        ..RunHooks::default()
    };

    run_plan(&plan, fixed_latency(Duration::from_millis(200), 200), hooks)
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    let updates = updates.lock();
    assert!(updates.len() >= 100, "updates={}", updates.len());
    for u in updates.iter() {
        assert_eq!(
            u.active_vus, u.target_vus,
            "active VUs diverged from target at {:?}",
            u.elapsed
        );
    }

    let first = &updates[0];
    assert_eq!(first.tick, 1);
    assert_eq!(first.target_vus, 0);
    let stage_one = first.stage.as_ref().unwrap_or_else(|| panic!("expected stage"));
    assert_eq!(stage_one.index, 0);
    assert_eq!(stage_one.count, 3);

    let max_target = updates.iter().map(|u| u.target_vus).max().unwrap_or(0);
    assert!(max_target >= 195, "max target={max_target}");

    // Ticks are 1s apart, so later updates carry a request rate.
    assert!(updates.iter().skip(1).all(|u| u.metrics.rps_now.is_some()));
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_the_run_and_still_summarizes() {
    let mut def = scenario(vec![stage(600, 20)]);
    def.options.start_vus = Some(20);
    let plan = load_plan(&def, &RunConfig::default()).unwrap_or_else(|e| panic!("{e}"));

    let cancel = Arc::new(StopSignal::new());
    let hooks = RunHooks {
        cancel: cancel.clone(),
        ..RunHooks::default()
    };
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.trigger();
    });

    let started = Instant::now();
    let summary = run_plan(&plan, fixed_latency(Duration::from_secs(1), 200), hooks)
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    trigger.await.unwrap_or_else(|e| panic!("join: {e}"));

    assert!(summary.aborted);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(summary.requests_total() > 0);
}

#[tokio::test(start_paused = true)]
async fn think_time_paces_iterations() {
    let mut def = scenario(vec![stage(10, 1)]);
    def.options.start_vus = Some(1);
    def.options.think_time = Some(Duration::from_secs(1));
    let plan = load_plan(&def, &RunConfig::default()).unwrap_or_else(|e| panic!("{e}"));

    let summary = run_plan(
        &plan,
        fixed_latency(Duration::from_millis(10), 200),
        RunHooks::default(),
    )
    .await
    .unwrap_or_else(|e| panic!("run failed: {e}"));

    let iterations = summary.counter(BuiltinMetric::Iterations);
    assert!((9..=11).contains(&iterations), "iterations={iterations}");
}
