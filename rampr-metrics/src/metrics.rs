use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

#[derive(Debug, Clone)]
pub struct MetricSeriesSummary {
    pub name: String,
    pub kind: MetricKind,
    pub value: MetricValue,
}

#[derive(Debug, Clone)]
pub enum MetricValue {
    Counter(u64),
    Gauge {
        value: i64,
        max: i64,
    },
    Rate {
        total: u64,
        hits: u64,
        rate: Option<f64>,
    },
    Trend(TrendSummary),
}

/// Trend samples are recorded in microseconds and reported in milliseconds.
///
/// Percentiles come from the HDR histogram, which reports the top of the
/// bucket a sample lands in (up to 0.1% above the recorded value with three
/// significant digits). They are clamped to the exact observed min and max.
#[derive(Debug, Clone)]
pub struct TrendSummary {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    samples: TrendSamples,
}

const MICROS_PER_MILLI: f64 = 1_000.0;

impl TrendSummary {
    pub(crate) fn from_samples(samples: &TrendSamples) -> Self {
        let h = &samples.histogram;
        let count = h.len();
        let ms = |v: u64| v as f64 / MICROS_PER_MILLI;
        let q = |quantile: f64| (count > 0).then(|| ms(samples.value_at_quantile(quantile)));

        Self {
            count,
            min: (count > 0).then(|| ms(samples.min)),
            max: (count > 0).then(|| ms(samples.max)),
            mean: (count > 0).then(|| h.mean() / MICROS_PER_MILLI),
            stdev: (count > 0).then(|| h.stdev() / MICROS_PER_MILLI),
            p50: q(0.50),
            p90: q(0.90),
            p95: q(0.95),
            p99: q(0.99),
            samples: samples.clone(),
        }
    }

    /// Arbitrary percentile in milliseconds, `p` in `0..=100`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let quantile = (p / 100.0).clamp(0.0, 1.0);
        Some(self.samples.value_at_quantile(quantile) as f64 / MICROS_PER_MILLI)
    }
}

/// Histogram plus the exact extremes, in microseconds.
#[derive(Debug, Clone)]
pub(crate) struct TrendSamples {
    histogram: Histogram<u64>,
    min: u64,
    max: u64,
}

impl TrendSamples {
    pub(crate) fn new() -> Self {
        Self {
            histogram: new_default_histogram(),
            min: u64::MAX,
            max: 0,
        }
    }

    fn record(&mut self, micros: u64) {
        // Zero would fall below the histogram's lowest trackable value.
        let micros = micros.max(1);
        self.histogram.saturating_record(micros);
        self.min = self.min.min(micros);
        self.max = self.max.max(micros);
    }

    fn value_at_quantile(&self, quantile: f64) -> u64 {
        self.histogram
            .value_at_quantile(quantile)
            .clamp(self.min, self.max)
    }
}

pub(crate) fn new_default_histogram() -> Histogram<u64> {
    // 1µs .. 1h, three significant digits.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
    max: AtomicI64,
}

#[derive(Debug, Default)]
pub struct Rate {
    total: AtomicU64,
    hits: AtomicU64,
}

#[derive(Debug)]
pub(crate) enum MetricStorage {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<Gauge>),
    Rate(Arc<Rate>),
    Trend(Arc<Mutex<TrendSamples>>),
}

impl MetricStorage {
    pub(crate) fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(Arc::new(AtomicU64::new(0))),
            MetricKind::Gauge => Self::Gauge(Arc::new(Gauge::default())),
            MetricKind::Rate => Self::Rate(Arc::new(Rate::default())),
            MetricKind::Trend => Self::Trend(Arc::new(Mutex::new(TrendSamples::new()))),
        }
    }

    pub(crate) fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Rate(_) => MetricKind::Rate,
            Self::Trend(_) => MetricKind::Trend,
        }
    }

    pub(crate) fn handle(&self) -> MetricHandle {
        match self {
            Self::Counter(a) => MetricHandle::Counter(a.clone()),
            Self::Gauge(a) => MetricHandle::Gauge(a.clone()),
            Self::Rate(a) => MetricHandle::Rate(a.clone()),
            Self::Trend(a) => MetricHandle::Trend(a.clone()),
        }
    }

    pub(crate) fn value(&self) -> MetricValue {
        match self {
            Self::Counter(c) => MetricValue::Counter(c.load(Ordering::Relaxed)),
            Self::Gauge(g) => MetricValue::Gauge {
                value: g.value.load(Ordering::Relaxed),
                max: g.max.load(Ordering::Relaxed),
            },
            Self::Rate(r) => {
                let total = r.total.load(Ordering::Relaxed);
                let hits = r.hits.load(Ordering::Relaxed);
                let rate = (total > 0).then(|| hits as f64 / total as f64);
                MetricValue::Rate { total, hits, rate }
            }
            Self::Trend(h) => MetricValue::Trend(TrendSummary::from_samples(&h.lock())),
        }
    }
}

/// Cheap, cloneable write handle to a registered metric.
///
/// Writes that do not match the handle's kind are ignored.
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<Gauge>),
    Rate(Arc<Rate>),
    Trend(Arc<Mutex<TrendSamples>>),
}

impl MetricHandle {
    #[inline]
    pub fn increment(&self, value: u64) {
        if let Self::Counter(c) = self {
            c.fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Sets the gauge and raises its recorded peak if needed.
    #[inline]
    pub fn set_gauge(&self, value: i64) {
        if let Self::Gauge(g) = self {
            g.value.store(value, Ordering::Relaxed);
            g.max.fetch_max(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn add_rate(&self, hit: bool) {
        if let Self::Rate(r) = self {
            if hit {
                r.hits.fetch_add(1, Ordering::Relaxed);
            }
            r.total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_duration(&self, value: Duration) {
        let micros = u64::try_from(value.as_micros()).unwrap_or(u64::MAX);
        self.record_micros(micros);
    }

    #[inline]
    pub fn record_micros(&self, micros: u64) {
        if let Self::Trend(t) = self {
            t.lock().record(micros);
        }
    }

    pub fn get_counter(&self) -> u64 {
        match self {
            Self::Counter(c) => c.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// `(total, hits)`.
    pub fn get_rate(&self) -> (u64, u64) {
        match self {
            Self::Rate(r) => (
                r.total.load(Ordering::Relaxed),
                r.hits.load(Ordering::Relaxed),
            ),
            _ => (0, 0),
        }
    }

    pub fn trend_summary(&self) -> Option<TrendSummary> {
        match self {
            Self::Trend(h) => Some(TrendSummary::from_samples(&h.lock())),
            _ => None,
        }
    }
}
