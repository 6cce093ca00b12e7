use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinError, JoinSet};

use crate::error::Result;
use crate::record::IterationOutcome;
use crate::stats::RunStats;
use crate::vu::{StopSignal, VuInfo, VuStateCell, VuTask};

struct VuHandle {
    id: u64,
    stop: Arc<StopSignal>,
    state: Arc<VuStateCell>,
    task: AbortHandle,
}

impl VuHandle {
    fn is_active(&self) -> bool {
        !self.stop.is_triggered() && self.state.get().is_active()
    }

    fn request_stop(&self) {
        self.stop.trigger();
        self.state.request_stop();
    }
}

/// Variable-size set of virtual users running one behavior.
///
/// Only the coordinator mutates the pool; VUs share nothing but the stats sink.
pub struct VuPool<F> {
    behavior: Arc<F>,
    stats: Arc<RunStats>,
    think_time: Option<Duration>,
    /// Spawn order; the newest VUs are stopped first.
    vus: Vec<VuHandle>,
    tasks: JoinSet<()>,
    /// First failed join among reaped VUs, reported at shutdown.
    first_err: Option<JoinError>,
    next_id: u64,
}

impl<F, Fut> VuPool<F>
where
    F: Fn(VuInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IterationOutcome> + Send + 'static,
{
    pub fn new(behavior: F, stats: Arc<RunStats>, think_time: Option<Duration>) -> Self {
        Self {
            behavior: Arc::new(behavior),
            stats,
            think_time,
            vus: Vec::new(),
            tasks: JoinSet::new(),
            first_err: None,
            next_id: 1,
        }
    }

    pub fn active(&self) -> u64 {
        self.vus.iter().filter(|vu| vu.is_active()).count() as u64
    }

    /// VUs told to stop that are still finishing their iteration.
    pub fn stopping(&self) -> u64 {
        self.vus
            .iter()
            .filter(|vu| !vu.is_active() && !vu.task.is_finished())
            .count() as u64
    }

    /// Spawns or stops VUs so that exactly `target` are active afterwards.
    pub fn reconcile(&mut self, target: u64) {
        self.reap();

        let active = self.active();
        if active < target {
            for _ in active..target {
                self.spawn_one();
            }
            tracing::debug!(target, spawned = target - active, "pool grew");
        } else if active > target {
            let excess = active - target;
            self.vus
                .iter()
                .rev()
                .filter(|vu| vu.is_active())
                .take(usize::try_from(excess).unwrap_or(usize::MAX))
                .for_each(VuHandle::request_stop);
            tracing::debug!(target, stopped = excess, "pool shrank");
        }
    }

    fn spawn_one(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let stop = Arc::new(StopSignal::new());
        let state = Arc::new(VuStateCell::new());
        let task = VuTask {
            id,
            behavior: self.behavior.clone(),
            stats: self.stats.clone(),
            think_time: self.think_time,
            stop: stop.clone(),
            state: state.clone(),
        };

        self.vus.push(VuHandle {
            id,
            stop,
            state,
            task: self.tasks.spawn(task.run()),
        });
    }

    /// Drops finished VUs and collects their join results.
    fn reap(&mut self) {
        self.vus.retain(|vu| !vu.task.is_finished());
        while let Some(res) = self.tasks.try_join_next() {
            self.record_join(res);
        }
    }

    fn record_join(&mut self, res: std::result::Result<(), JoinError>) {
        if let Err(err) = res {
            self.first_err.get_or_insert(err);
        }
    }

    /// Stops every VU, lets in-flight iterations finish and joins all tasks.
    pub async fn shutdown(mut self) -> Result<()> {
        for vu in &self.vus {
            vu.request_stop();
        }
        tracing::debug!(remaining = self.vus.len(), "draining pool");

        while let Some(res) = self.tasks.join_next().await {
            self.record_join(res);
        }
        self.vus.clear();
        match self.first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    fn ids(&self) -> Vec<u64> {
        self.vus
            .iter()
            .filter(|vu| vu.is_active())
            .map(|vu| vu.id)
            .collect()
    }
}
