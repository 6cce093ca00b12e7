use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::record::IterationOutcome;
use crate::stats::RunStats;

/// One-shot, multi-waiter stop flag.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            // Registered before the flag check so a concurrent trigger is not missed.
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum VuState {
    Idle = 0,
    Running = 1,
    Iterating = 2,
    Stopping = 3,
    Terminated = 4,
}

impl VuState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Iterating,
            3 => Self::Stopping,
            _ => Self::Terminated,
        }
    }

    /// Counts toward the pool's active size.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Idle | Self::Running | Self::Iterating)
    }
}

#[derive(Debug)]
pub(crate) struct VuStateCell(AtomicU8);

impl VuStateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(VuState::Idle as u8))
    }

    pub(crate) fn get(&self) -> VuState {
        VuState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: VuState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from -> to` only if the VU is still in `from`.
    fn transition(&self, from: VuState, to: VuState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks an active VU as stopping. Returns false if it already left the active set.
    pub(crate) fn request_stop(&self) -> bool {
        [VuState::Idle, VuState::Running, VuState::Iterating]
            .into_iter()
            .any(|from| self.transition(from, VuState::Stopping))
    }
}

/// What a behavior sees about the VU running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VuInfo {
    /// 1-based, never reused within a run.
    pub id: u64,
    /// 0-based iteration counter of this VU.
    pub iteration: u64,
}

pub(crate) struct VuTask<F> {
    pub(crate) id: u64,
    pub(crate) behavior: Arc<F>,
    pub(crate) stats: Arc<RunStats>,
    pub(crate) think_time: Option<Duration>,
    pub(crate) stop: Arc<StopSignal>,
    pub(crate) state: Arc<VuStateCell>,
}

impl<F, Fut> VuTask<F>
where
    F: Fn(VuInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IterationOutcome> + Send + 'static,
{
    /// Iterates until stopped. A stop never interrupts an iteration in flight.
    pub(crate) async fn run(self) {
        let mut iteration = 0u64;

        if self.state.transition(VuState::Idle, VuState::Running) {
            loop {
                if self.stop.is_triggered()
                    || !self.state.transition(VuState::Running, VuState::Iterating)
                {
                    break;
                }

                let started = Instant::now();
                let outcome = (self.behavior)(VuInfo {
                    id: self.id,
                    iteration,
                })
                .await;
                self.stats.record_iteration(&outcome, started.elapsed());
                iteration += 1;

                if !self.state.transition(VuState::Iterating, VuState::Running) {
                    break;
                }

                match self.think_time {
                    Some(pause) => tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = self.stop.wait() => break,
                    },
                    // An always-ready behavior must not starve the coordinator.
                    None => tokio::task::yield_now().await,
                }
            }
        }

        self.state.set(VuState::Stopping);
        tracing::debug!(vu = self.id, iterations = iteration, "vu stopped");
        self.state.set(VuState::Terminated);
    }
}
