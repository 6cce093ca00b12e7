/// Running mean and peak of per-second request rate samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningStats {
    n: u64,
    mean: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, x: f64) {
        self.n = self.n.saturating_add(1);
        let n_f = self.n as f64;

        self.mean += (x - self.mean) / n_f;

        if x > self.max {
            self.max = x;
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub total: u64,
}

impl CounterSnapshot {
    pub fn new(total: u64) -> Self {
        Self { total }
    }

    pub fn delta_since(self, prev: Option<Self>) -> u64 {
        match prev {
            Some(prev) => self.total.saturating_sub(prev.total),
            None => self.total,
        }
    }

    pub fn per_sec_since(self, prev: Option<Self>, dt_secs: f64) -> f64 {
        per_sec(self.delta_since(prev), dt_secs)
    }
}

#[inline]
fn per_sec(delta: u64, dt_secs: f64) -> f64 {
    let dt = dt_secs.max(1e-9);
    delta as f64 / dt
}
