//! Metrics Cache
//!
//! Running counters primed from the store at startup and bumped on every
//! accepted insert. Retention sweeps do not shrink them, so after a cleanup
//! the cache can run ahead of the table.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ingest_store::MetricsSeed;
use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Default)]
struct MetricsState {
    total_messages: u64,
    connected_devices: HashSet<String>,
    last_message: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub connected_devices: usize,
    pub last_message: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MetricsCache {
    state: RwLock<MetricsState>,
}

impl MetricsCache {
    pub fn from_seed(seed: MetricsSeed) -> Self {
        Self {
            state: RwLock::new(MetricsState {
                total_messages: seed.total_records,
                connected_devices: seed.machine_ids.into_iter().collect(),
                last_message: seed.last_received_at,
            }),
        }
    }

    pub fn record_insert(&self, machine_id: Option<&str>, received_at: DateTime<Utc>) {
        let mut state = self.state.write();
        state.total_messages += 1;
        if let Some(id) = machine_id {
            if !state.connected_devices.contains(id) {
                state.connected_devices.insert(id.to_string());
            }
        }
        state.last_message = Some(received_at);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            total_messages: state.total_messages,
            connected_devices: state.connected_devices.len(),
            last_message: state.last_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_from_store_view() {
        let last = Utc::now();
        let cache = MetricsCache::from_seed(MetricsSeed {
            total_records: 12,
            machine_ids: vec!["a".into(), "b".into()],
            last_received_at: Some(last),
        });

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.total_messages, 12);
        assert_eq!(snapshot.connected_devices, 2);
        assert_eq!(snapshot.last_message, Some(last));
    }

    #[test]
    fn test_record_insert_updates_counters() {
        let cache = MetricsCache::default();
        let first = Utc::now();
        cache.record_insert(Some("a"), first);
        cache.record_insert(Some("a"), first);
        cache.record_insert(None, first);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.total_messages, 3);
        assert_eq!(snapshot.connected_devices, 1);
        assert_eq!(snapshot.last_message, Some(first));
    }
}
