//! Last-reading cache that supplies the "old" side of every delta.

use std::collections::HashMap;

use crate::reading::{MetricName, Reading};

/// Most recent successful reading per metric.
///
/// Entries are replaced wholesale on every store, never merged. A missing
/// entry means no delta can be computed for that metric yet.
#[derive(Debug, Default, Clone)]
pub struct DeltaCache {
    last: HashMap<MetricName, Reading>,
}

impl DeltaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: MetricName) -> Option<&Reading> {
        self.last.get(&name)
    }

    /// Replace the entry for `name`, returning the reading it displaced.
    pub fn store(&mut self, name: MetricName, reading: Reading) -> Option<Reading> {
        self.last.insert(name, reading)
    }

    pub fn contains(&self, name: MetricName) -> bool {
        self.last.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::net::NetStats;

    fn net(iface: &str) -> Reading {
        Reading::Net(NetStats([(iface.to_string(), Default::default())].into()))
    }

    #[test]
    fn empty_cache_has_nothing() {
        let cache = DeltaCache::new();
        assert!(cache.is_empty());
        assert!(cache.get(MetricName::Net).is_none());
    }

    #[test]
    fn store_overwrites_instead_of_merging() {
        let mut cache = DeltaCache::new();
        assert!(cache.store(MetricName::Net, net("eth0")).is_none());
        let displaced = cache.store(MetricName::Net, net("wlan0"));
        assert_eq!(displaced, Some(net("eth0")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(MetricName::Net), Some(&net("wlan0")));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = DeltaCache::new();
        cache.store(MetricName::Net, net("eth0"));
        cache.clear();
        assert!(!cache.contains(MetricName::Net));
    }
}
