//! Ingestion pipeline: policy, persistence and cache update

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ingest_core::{IngestMode, Result};
use ingest_store::{JsonObject, NewRecord, RecordStore};
use ingest_telemetry::Counter;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::extract::{self, Extraction};
use crate::metrics::MetricsCache;

/// Outcome of a successful ingest
#[derive(Debug, Clone)]
pub struct Accepted {
    pub id: i64,
    pub received_at: DateTime<Utc>,
    pub extraction: Extraction,
}

pub struct Ingestor {
    store: Arc<dyn RecordStore>,
    metrics: Arc<MetricsCache>,
    mode: IngestMode,
    /// Orders insert + cache update so no increment is lost
    write_order: Mutex<()>,
    accepted: Counter,
}

impl Ingestor {
    pub fn new(store: Arc<dyn RecordStore>, metrics: Arc<MetricsCache>, mode: IngestMode) -> Self {
        Self {
            store,
            metrics,
            mode,
            write_order: Mutex::new(()),
            accepted: Counter::default(),
        }
    }

    pub fn mode(&self) -> IngestMode {
        self.mode
    }

    pub async fn ingest(&self, payload: JsonObject, metadata: JsonObject) -> Result<Accepted> {
        let extraction = extract::apply(self.mode, &payload)?;

        let record = NewRecord {
            machine_id: extraction.machine_id.clone(),
            device_type: extraction.device_type.clone(),
            event_timestamp: extraction.event_timestamp.clone(),
            raw_payload: payload,
            extracted_data: extraction.extracted_data.clone(),
            metadata,
        };

        let _order = self.write_order.lock().await;
        let inserted = self.store.insert(record).await.map_err(|e| {
            error!(error = %e, "Failed to store machine data");
            e
        })?;
        self.metrics
            .record_insert(extraction.machine_id.as_deref(), inserted.received_at);
        self.accepted.inc();

        debug!(
            id = inserted.id,
            machine_id = ?extraction.machine_id,
            device_type = %extraction.device_type,
            "Machine data stored"
        );

        Ok(Accepted {
            id: inserted.id,
            received_at: inserted.received_at,
            extraction,
        })
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::IngestError;
    use ingest_store::SqliteRecordStore;
    use serde_json::{json, Value};

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    async fn ingestor(mode: IngestMode) -> (Ingestor, Arc<dyn RecordStore>, Arc<MetricsCache>) {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
        let metrics = Arc::new(MetricsCache::default());
        (Ingestor::new(store.clone(), metrics.clone(), mode), store, metrics)
    }

    #[tokio::test]
    async fn test_ingest_persists_and_counts() {
        let (ingestor, store, metrics) = ingestor(IngestMode::Flexible).await;
        let payload = object(json!({ "machineId": "m-1", "type": "drill", "rpm": 900 }));

        let accepted = ingestor
            .ingest(payload.clone(), object(json!({ "ip": "10.0.0.2" })))
            .await
            .unwrap();

        let stored = store.get(accepted.id).await.unwrap().unwrap();
        assert_eq!(stored.raw_payload, payload);
        assert_eq!(stored.extracted_data, object(json!({ "rpm": 900 })));
        assert_eq!(stored.device_type, "drill");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_messages, 1);
        assert_eq!(snapshot.connected_devices, 1);
        assert_eq!(snapshot.last_message, Some(accepted.received_at));
        assert_eq!(ingestor.accepted(), 1);
    }

    #[tokio::test]
    async fn test_strict_rejection_leaves_store_untouched() {
        let (ingestor, store, metrics) = ingestor(IngestMode::Strict).await;
        let err = ingestor
            .ingest(object(json!({ "machineId": "m-1" })), JsonObject::new())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MissingFields(_)));
        assert_eq!(store.metrics_seed().await.unwrap().total_records, 0);
        assert_eq!(metrics.snapshot().total_messages, 0);
    }

    #[tokio::test]
    async fn test_concurrent_ingests_are_all_counted() {
        let (ingestor, store, metrics) = ingestor(IngestMode::Flexible).await;
        let ingestor = Arc::new(ingestor);

        let mut handles = Vec::new();
        for i in 0..20 {
            let ingestor = ingestor.clone();
            handles.push(tokio::spawn(async move {
                ingestor
                    .ingest(object(json!({ "machineId": format!("m-{}", i % 4) })), JsonObject::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(metrics.snapshot().total_messages, 20);
        assert_eq!(metrics.snapshot().connected_devices, 4);
        assert_eq!(store.metrics_seed().await.unwrap().total_records, 20);
    }
}
