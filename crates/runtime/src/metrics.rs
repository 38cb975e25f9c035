use std::collections::BTreeMap;

/// Deterministic activity counters.
///
/// Uses sorted maps so snapshots have stable ordering for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
    gauges: BTreeMap<&'static str, i64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, name: &'static str) {
        *self.counters.entry(name).or_insert(0) += 1;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: &'static str, value: i64) {
        self.gauges.insert(name, value);
    }

    /// Counters then gauges, each sorted by name.
    pub fn snapshot(&self) -> Vec<(&'static str, i64)> {
        self.counters
            .iter()
            .map(|(k, v)| (*k, *v as i64))
            .chain(self.gauges.iter().map(|(k, v)| (*k, *v)))
            .collect()
    }
}
