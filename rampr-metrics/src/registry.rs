use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::metrics::{MetricHandle, MetricKind, MetricSeriesSummary, MetricStorage};

/// Name-keyed metric registry shared by all writers of a run.
#[derive(Debug, Default)]
pub struct Registry {
    order: RwLock<Vec<Arc<str>>>,
    storage: DashMap<Arc<str>, MetricStorage, ahash::RandomState>,
}

impl Registry {
    /// Returns a handle for `name`, registering it on first use.
    ///
    /// The first registration wins: asking for an existing name with another
    /// kind returns the existing series.
    pub fn register(&self, name: &str, kind: MetricKind) -> MetricHandle {
        if let Some(existing) = self.storage.get(name) {
            return existing.handle();
        }

        let mut order = self.order.write();
        if let Some(existing) = self.storage.get(name) {
            return existing.handle();
        }

        let key: Arc<str> = Arc::from(name);
        let storage = MetricStorage::new(kind);
        let handle = storage.handle();
        self.storage.insert(key.clone(), storage);
        order.push(key);
        handle
    }

    pub fn get(&self, name: &str) -> Option<MetricSeriesSummary> {
        let storage = self.storage.get(name)?;
        Some(MetricSeriesSummary {
            name: name.to_string(),
            kind: storage.kind(),
            value: MetricStorage::value(&storage),
        })
    }

    /// Snapshot of every series in registration order.
    pub fn summarize(&self) -> Vec<MetricSeriesSummary> {
        let order = self.order.read();
        order.iter().filter_map(|name| self.get(name)).collect()
    }
}
