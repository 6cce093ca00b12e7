use std::time::Duration;

use crate::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear VU target over elapsed run time.
///
/// Stage `i` ramps from the previous stage's target (or `start` for the first
/// stage) to its own target; cumulative stage durations are the switch points.
#[derive(Debug, Clone)]
pub struct StageSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

struct Located {
    index: usize,
    stage_start: Duration,
    stage_end: Duration,
}

impl StageSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let cumulative_ends = stages
            .iter()
            .scan(Duration::ZERO, |acc, s| {
                *acc = acc.saturating_add(s.duration);
                Some(*acc)
            })
            .collect();

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends.last().copied().unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    pub fn max_target(&self) -> u64 {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start, u64::max)
    }

    /// Stage containing `elapsed`; a boundary instant belongs to the stage it ends.
    fn locate(&self, elapsed: Duration) -> Option<Located> {
        if self.stages.is_empty() {
            return None;
        }
        let index = match self.cumulative_ends.binary_search(&elapsed) {
            Ok(i) | Err(i) => i.min(self.stages.len() - 1),
        };
        let stage_start = match index {
            0 => Duration::ZERO,
            i => self.cumulative_ends[i - 1],
        };
        Some(Located {
            index,
            stage_start,
            stage_end: self.cumulative_ends[index],
        })
    }

    fn start_target_of(&self, index: usize) -> u64 {
        match index {
            0 => self.start,
            i => self.stages[i - 1].target,
        }
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if elapsed.is_zero() {
            return self.start;
        }
        if self.is_done(elapsed) {
            return self.stages.last().map_or(self.start, |s| s.target);
        }
        let Some(loc) = self.locate(elapsed) else {
            return self.start;
        };

        let from = self.start_target_of(loc.index) as i128;
        let to = self.stages[loc.index].target as i128;
        let span = loc.stage_end.saturating_sub(loc.stage_start).as_nanos() as i128;
        if span == 0 {
            return to as u64;
        }
        let into = elapsed.saturating_sub(loc.stage_start).as_nanos() as i128;

        let cur = from + (to - from).saturating_mul(into) / span;
        cur.clamp(0, u64::MAX as i128) as u64
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        let clamped = elapsed.min(self.total_duration());
        let loc = self.locate(clamped)?;

        let span = loc.stage_end.saturating_sub(loc.stage_start);
        let stage_elapsed = clamped.saturating_sub(loc.stage_start);

        Some(StageSnapshot {
            index: loc.index,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: span.saturating_sub(stage_elapsed),
            start_target: self.start_target_of(loc.index),
            end_target: self.stages[loc.index].target,
            current_target: self.target_at(clamped),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(secs: u64, target: u64) -> Stage {
        Stage {
            duration: Duration::from_secs(secs),
            target,
        }
    }

    fn pull_profile() -> StageSchedule {
        StageSchedule::new(0, vec![s(30, 50), s(60, 200), s(20, 0)])
    }

    #[test]
    fn starts_at_start_and_ends_at_last_target() {
        let sched = pull_profile();
        assert_eq!(sched.target_at(Duration::ZERO), 0);
        assert_eq!(sched.total_duration(), Duration::from_secs(110));
        assert_eq!(sched.target_at(Duration::from_secs(110)), 0);
        assert_eq!(sched.target_at(Duration::from_secs(500)), 0);
        assert!(sched.is_done(Duration::from_secs(110)));
        assert!(!sched.is_done(Duration::from_millis(109_999)));
    }

    #[test]
    fn stage_boundaries_hit_targets_exactly() {
        let sched = pull_profile();
        assert_eq!(sched.target_at(Duration::from_secs(30)), 50);
        assert_eq!(sched.target_at(Duration::from_secs(90)), 200);
    }

    #[test]
    fn interpolates_linearly_inside_stages() {
        let sched = pull_profile();
        assert_eq!(sched.target_at(Duration::from_secs(15)), 25);
        assert_eq!(sched.target_at(Duration::from_secs(60)), 125);
        assert_eq!(sched.target_at(Duration::from_secs(100)), 100);
    }

    #[test]
    fn target_is_continuous_and_bounded() {
        let sched = pull_profile();
        let mut prev = sched.target_at(Duration::ZERO);
        let mut ms = 0u64;
        while ms <= 110_000 {
            let cur = sched.target_at(Duration::from_millis(ms));
            assert!(cur <= 200, "t={ms}ms target={cur}");
            assert!(cur.abs_diff(prev) <= 1, "jump at t={ms}ms: {prev} -> {cur}");
            prev = cur;
            ms += 100;
        }
    }

    #[test]
    fn nonzero_start_ramps_from_start() {
        let sched = StageSchedule::new(10, vec![s(10, 0)]);
        assert_eq!(sched.target_at(Duration::ZERO), 10);
        assert_eq!(sched.target_at(Duration::from_secs(5)), 5);
        assert_eq!(sched.max_target(), 10);
    }

    #[test]
    fn flat_stage_holds_target() {
        let sched = StageSchedule::new(5, vec![s(10, 5)]);
        for secs in [1, 5, 9, 10] {
            assert_eq!(sched.target_at(Duration::from_secs(secs)), 5);
        }
    }

    #[test]
    fn snapshot_reports_stage_position() {
        let sched = pull_profile();
        let snap = sched
            .stage_snapshot_at(Duration::from_secs(40))
            .unwrap_or_else(|| panic!("expected snapshot"));
        assert_eq!(snap.index, 1);
        assert_eq!(snap.count, 3);
        assert_eq!(snap.stage_elapsed, Duration::from_secs(10));
        assert_eq!(snap.stage_remaining, Duration::from_secs(50));
        assert_eq!(snap.start_target, 50);
        assert_eq!(snap.end_target, 200);
        assert_eq!(snap.current_target, 75);

        let end = sched
            .stage_snapshot_at(Duration::from_secs(999))
            .unwrap_or_else(|| panic!("expected snapshot"));
        assert_eq!(end.index, 2);
        assert_eq!(end.stage_remaining, Duration::ZERO);
        assert_eq!(end.current_target, 0);
    }

    #[test]
    fn empty_schedule_has_no_snapshot() {
        let sched = StageSchedule::new(3, Vec::new());
        assert_eq!(sched.target_at(Duration::from_secs(1)), 3);
        assert!(sched.stage_snapshot_at(Duration::ZERO).is_none());
        assert_eq!(sched.total_duration(), Duration::ZERO);
    }
}
