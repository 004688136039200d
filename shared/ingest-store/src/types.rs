//! Record, filter and statistics types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object with insertion-ordered keys
pub type JsonObject = Map<String, Value>;

/// A record as handed to the store, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub machine_id: Option<String>,
    pub device_type: String,
    pub event_timestamp: Option<String>,
    pub raw_payload: JsonObject,
    pub extracted_data: JsonObject,
    pub metadata: JsonObject,
}

/// A stored measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub machine_id: Option<String>,
    pub device_type: String,
    pub event_timestamp: Option<String>,
    pub received_at: DateTime<Utc>,
    pub raw_payload: JsonObject,
    pub extracted_data: JsonObject,
    pub metadata: JsonObject,
}

/// Identity assigned by the store on insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedRecord {
    pub id: i64,
    pub received_at: DateTime<Utc>,
}

/// Conjunctive query filters; `from`/`to` bound `received_at` inclusively
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub machine_id: Option<String>,
    pub device_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

/// One page of records plus the size of the full match set
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub records: Vec<Record>,
    pub total: u64,
}

impl QueryResult {
    pub fn has_more(&self, page: Page) -> bool {
        u64::from(page.offset) + u64::from(page.limit) < self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineCount {
    pub machine_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTypeCount {
    pub device_type: String,
    pub count: u64,
}

/// Aggregate statistics over the whole table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: u64,
    /// Distinct non-null machine ids
    pub unique_machine_count: u64,
    pub device_types_seen: Vec<String>,
    pub device_type_counts: Vec<DeviceTypeCount>,
    pub records_last_24h: u64,
    /// Busiest machines first, at most ten
    pub per_machine_counts: Vec<MachineCount>,
    pub oldest_record: Option<DateTime<Utc>>,
    pub newest_record: Option<DateTime<Utc>>,
}

/// Startup view of the table used to prime in-memory counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSeed {
    pub total_records: u64,
    pub machine_ids: Vec<String>,
    pub last_received_at: Option<DateTime<Utc>>,
}
