//! Record Store
//!
//! Every row is immutable once written; the only mutation besides insert is the
//! retention sweep.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::types::{
    DeviceTypeCount, InsertedRecord, JsonObject, MachineCount, MetricsSeed, NewRecord, Page,
    QueryResult, Record, RecordFilter, StoreStats,
};
use crate::{Result, SqlitePool, StoreConfig, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS machine_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id TEXT,
        device_type TEXT NOT NULL DEFAULT 'unknown',
        event_timestamp TEXT,
        received_at TEXT NOT NULL,
        raw_payload TEXT NOT NULL,
        extracted_data TEXT NOT NULL,
        metadata TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_machine_data_machine_id ON machine_data(machine_id);
    CREATE INDEX IF NOT EXISTS idx_machine_data_device_type ON machine_data(device_type);
    CREATE INDEX IF NOT EXISTS idx_machine_data_received_at ON machine_data(received_at);
";

const SELECT_COLUMNS: &str = "id, machine_id, device_type, event_timestamp, received_at, \
     raw_payload, extracted_data, metadata";

const TOP_MACHINES: u32 = 10;

/// Persistence contract for ingested records
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Append a record stamped with the current time. `received_at` never goes
    /// backwards relative to earlier inserts.
    async fn insert(&self, record: NewRecord) -> Result<InsertedRecord>;

    /// Append a record with an explicit `received_at`, for backfills and imports
    async fn insert_received_at(
        &self,
        record: NewRecord,
        received_at: DateTime<Utc>,
    ) -> Result<InsertedRecord>;

    async fn get(&self, id: i64) -> Result<Option<Record>>;

    async fn query(&self, filter: RecordFilter, page: Page) -> Result<QueryResult>;

    /// Most recent records for one machine; [`StoreError::MachineNotFound`] when there are none
    async fn query_by_machine(&self, machine_id: &str, limit: u32) -> Result<Vec<Record>>;

    async fn compute_stats(&self) -> Result<StoreStats>;

    /// Remove records received more than `retention_days` ago, returning how many went
    async fn delete_older_than(&self, retention_days: u32) -> Result<u64>;

    async fn metrics_seed(&self) -> Result<MetricsSeed>;

    async fn is_healthy(&self) -> bool;
}

/// [`RecordStore`] over a single SQLite table
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = SqlitePool::open(config)?;
        let store = Self { pool };
        store.pool.run(|conn| conn.execute_batch(SCHEMA).map_err(StoreError::from)).await?;
        info!("Record store schema initialized");
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::in_memory()).await
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, record), fields(machine_id = ?record.machine_id))]
    async fn insert(&self, record: NewRecord) -> Result<InsertedRecord> {
        self.pool
            .run(move |conn| {
                let latest: Option<String> = conn.query_row(
                    "SELECT MAX(received_at) FROM machine_data",
                    [],
                    |row| row.get(0),
                )?;
                let now = Utc::now();
                let received_at = match latest.as_deref().map(parse_timestamp) {
                    Some(Ok(last)) if last > now => last,
                    _ => now,
                };
                insert_row(conn, &record, received_at)
            })
            .await
    }

    #[instrument(skip(self, record))]
    async fn insert_received_at(
        &self,
        record: NewRecord,
        received_at: DateTime<Utc>,
    ) -> Result<InsertedRecord> {
        self.pool
            .run(move |conn| insert_row(conn, &record, received_at))
            .await
    }

    async fn get(&self, id: i64) -> Result<Option<Record>> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM machine_data WHERE id = ?1", SELECT_COLUMNS);
                let raw = conn.query_row(&sql, params![id], RawRow::from_row).optional()?;
                raw.map(RawRow::into_record).transpose()
            })
            .await
    }

    #[instrument(skip(self))]
    async fn query(&self, filter: RecordFilter, page: Page) -> Result<QueryResult> {
        self.pool
            .run(move |conn| {
                let (where_clause, mut args) = build_where(&filter);

                let count_sql = format!("SELECT COUNT(*) FROM machine_data{}", where_clause);
                let total: i64 =
                    conn.query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))?;

                let select_sql = format!(
                    "SELECT {} FROM machine_data{} ORDER BY received_at DESC, id DESC LIMIT ? OFFSET ?",
                    SELECT_COLUMNS, where_clause
                );
                args.push(SqlValue::Integer(i64::from(page.limit)));
                args.push(SqlValue::Integer(i64::from(page.offset)));

                let records = fetch_records(conn, &select_sql, args)?;
                debug!(total, returned = records.len(), "Query executed");

                Ok(QueryResult {
                    records,
                    total: total.max(0) as u64,
                })
            })
            .await
    }

    #[instrument(skip(self))]
    async fn query_by_machine(&self, machine_id: &str, limit: u32) -> Result<Vec<Record>> {
        let machine_id = machine_id.to_string();
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM machine_data WHERE machine_id = ? \
                     ORDER BY received_at DESC, id DESC LIMIT ?",
                    SELECT_COLUMNS
                );
                let args = vec![
                    SqlValue::Text(machine_id.clone()),
                    SqlValue::Integer(i64::from(limit)),
                ];
                let records = fetch_records(conn, &sql, args)?;
                if records.is_empty() {
                    return Err(StoreError::MachineNotFound(machine_id));
                }
                Ok(records)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn compute_stats(&self) -> Result<StoreStats> {
        self.pool
            .run(|conn| {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM machine_data", [], |row| row.get(0))?;

                let unique_machines: i64 = conn.query_row(
                    "SELECT COUNT(DISTINCT machine_id) FROM machine_data WHERE machine_id IS NOT NULL",
                    [],
                    |row| row.get(0),
                )?;

                let since = format_timestamp(Utc::now() - ChronoDuration::hours(24));
                let last_24h: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM machine_data WHERE received_at >= ?1",
                    params![since],
                    |row| row.get(0),
                )?;

                let device_type_counts = {
                    let mut stmt = conn.prepare(
                        "SELECT device_type, COUNT(*) AS n FROM machine_data \
                         GROUP BY device_type ORDER BY n DESC, device_type ASC",
                    )?;
                    let rows = stmt.query_map([], |row| {
                        Ok(DeviceTypeCount {
                            device_type: row.get(0)?,
                            count: row.get::<_, i64>(1)?.max(0) as u64,
                        })
                    })?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };

                let mut device_types_seen: Vec<String> = device_type_counts
                    .iter()
                    .map(|entry| entry.device_type.clone())
                    .collect();
                device_types_seen.sort();

                let per_machine_counts = {
                    let mut stmt = conn.prepare(
                        "SELECT machine_id, COUNT(*) AS n FROM machine_data \
                         WHERE machine_id IS NOT NULL \
                         GROUP BY machine_id ORDER BY n DESC, machine_id ASC LIMIT ?1",
                    )?;
                    let rows = stmt.query_map(params![TOP_MACHINES], |row| {
                        Ok(MachineCount {
                            machine_id: row.get(0)?,
                            count: row.get::<_, i64>(1)?.max(0) as u64,
                        })
                    })?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };

                let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
                    "SELECT MIN(received_at), MAX(received_at) FROM machine_data",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                Ok(StoreStats {
                    total: total.max(0) as u64,
                    unique_machine_count: unique_machines.max(0) as u64,
                    device_types_seen,
                    device_type_counts,
                    records_last_24h: last_24h.max(0) as u64,
                    per_machine_counts,
                    oldest_record: parse_optional_bound(oldest)?,
                    newest_record: parse_optional_bound(newest)?,
                })
            })
            .await
    }

    #[instrument(skip(self))]
    async fn delete_older_than(&self, retention_days: u32) -> Result<u64> {
        let cutoff = match ChronoDuration::try_days(i64::from(retention_days))
            .and_then(|age| Utc::now().checked_sub_signed(age))
        {
            Some(cutoff) => cutoff,
            None => {
                // Cutoff predates the representable calendar, so nothing can be older
                debug!(retention_days, "Retention cutoff out of range, nothing to delete");
                return Ok(0);
            }
        };
        let deleted = self
            .pool
            .run(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM machine_data WHERE received_at < ?1",
                    params![format_timestamp(cutoff)],
                )?;
                Ok(removed as u64)
            })
            .await?;

        info!(retention_days, deleted, "Retention sweep completed");
        Ok(deleted)
    }

    async fn metrics_seed(&self) -> Result<MetricsSeed> {
        self.pool
            .run(|conn| {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM machine_data", [], |row| row.get(0))?;

                let machine_ids = {
                    let mut stmt = conn.prepare(
                        "SELECT DISTINCT machine_id FROM machine_data WHERE machine_id IS NOT NULL",
                    )?;
                    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };

                let latest: Option<String> = conn.query_row(
                    "SELECT MAX(received_at) FROM machine_data",
                    [],
                    |row| row.get(0),
                )?;

                Ok(MetricsSeed {
                    total_records: total.max(0) as u64,
                    machine_ids,
                    last_received_at: parse_optional_bound(latest)?,
                })
            })
            .await
    }

    async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}

fn insert_row(
    conn: &mut Connection,
    record: &NewRecord,
    received_at: DateTime<Utc>,
) -> Result<InsertedRecord> {
    let received_at = received_at.trunc_subsecs(6);
    let raw_payload = serde_json::to_string(&record.raw_payload)?;
    let extracted_data = serde_json::to_string(&record.extracted_data)?;
    let metadata = serde_json::to_string(&record.metadata)?;

    conn.execute(
        "INSERT INTO machine_data \
         (machine_id, device_type, event_timestamp, received_at, raw_payload, extracted_data, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.machine_id,
            record.device_type,
            record.event_timestamp,
            format_timestamp(received_at),
            raw_payload,
            extracted_data,
            metadata,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, "Record inserted");

    Ok(InsertedRecord { id, received_at })
}

fn build_where(filter: &RecordFilter) -> (String, Vec<SqlValue>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if let Some(machine_id) = &filter.machine_id {
        clauses.push("machine_id = ?");
        args.push(SqlValue::Text(machine_id.clone()));
    }
    if let Some(device_type) = &filter.device_type {
        clauses.push("device_type = ?");
        args.push(SqlValue::Text(device_type.clone()));
    }
    if let Some(from) = filter.from {
        clauses.push("received_at >= ?");
        args.push(SqlValue::Text(format_timestamp(from)));
    }
    if let Some(to) = filter.to {
        clauses.push("received_at <= ?");
        args.push(SqlValue::Text(format_timestamp(to)));
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

fn fetch_records(conn: &Connection, sql: &str, args: Vec<SqlValue>) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(args), RawRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// Fixed-width UTC form so lexical order in SQLite matches chronological order
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn parse_optional_bound(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|value| {
        parse_timestamp(&value).map_err(|e| StoreError::Corrupt {
            id: 0,
            reason: format!("received_at {:?}: {}", value, e),
        })
    })
    .transpose()
}

/// Row exactly as stored, before JSON columns are decoded
struct RawRow {
    id: i64,
    machine_id: Option<String>,
    device_type: String,
    event_timestamp: Option<String>,
    received_at: String,
    raw_payload: String,
    extracted_data: String,
    metadata: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            machine_id: row.get(1)?,
            device_type: row.get(2)?,
            event_timestamp: row.get(3)?,
            received_at: row.get(4)?,
            raw_payload: row.get(5)?,
            extracted_data: row.get(6)?,
            metadata: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let id = self.id;
        let corrupt = |column: &str, reason: String| StoreError::Corrupt {
            id,
            reason: format!("{}: {}", column, reason),
        };

        let received_at = parse_timestamp(&self.received_at)
            .map_err(|e| corrupt("received_at", e.to_string()))?;
        let raw_payload: JsonObject = serde_json::from_str(&self.raw_payload)
            .map_err(|e| corrupt("raw_payload", e.to_string()))?;
        let extracted_data: JsonObject = serde_json::from_str(&self.extracted_data)
            .map_err(|e| corrupt("extracted_data", e.to_string()))?;
        let metadata: JsonObject = serde_json::from_str(&self.metadata)
            .map_err(|e| corrupt("metadata", e.to_string()))?;

        Ok(Record {
            id,
            machine_id: self.machine_id,
            device_type: self.device_type,
            event_timestamp: self.event_timestamp,
            received_at,
            raw_payload,
            extracted_data,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn new_record(machine_id: Option<&str>, device_type: &str) -> NewRecord {
        let mut payload = json!({ "temperature": 21.5, "deviceType": device_type });
        if let Some(id) = machine_id {
            payload["machineId"] = json!(id);
        }
        NewRecord {
            machine_id: machine_id.map(str::to_string),
            device_type: device_type.to_string(),
            event_timestamp: None,
            raw_payload: object(payload),
            extracted_data: object(json!({ "temperature": 21.5 })),
            metadata: object(json!({ "ip": "127.0.0.1" })),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let payload = object(json!({
            "zeta": 1,
            "machineId": "press-7",
            "nested": { "b": [1, 2, 3], "a": null },
            "alpha": "last"
        }));
        let record = NewRecord {
            raw_payload: payload.clone(),
            ..new_record(Some("press-7"), "press")
        };

        let inserted = store.insert(record).await.unwrap();
        let fetched = store.get(inserted.id).await.unwrap().unwrap();

        assert_eq!(fetched.raw_payload, payload);
        let keys: Vec<&String> = fetched.raw_payload.keys().collect();
        assert_eq!(keys, vec!["zeta", "machineId", "nested", "alpha"]);
        assert_eq!(fetched.machine_id.as_deref(), Some("press-7"));
        assert_eq!(fetched.received_at, inserted.received_at);
    }

    #[tokio::test]
    async fn test_ids_increase_and_received_at_never_decreases() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let mut previous: Option<InsertedRecord> = None;
        for _ in 0..5 {
            let inserted = store.insert(new_record(Some("m"), "sensor")).await.unwrap();
            if let Some(prev) = previous {
                assert!(inserted.id > prev.id);
                assert!(inserted.received_at >= prev.received_at);
            }
            previous = Some(inserted);
        }
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let old = store
            .insert_received_at(new_record(Some("m"), "sensor"), Utc::now() - ChronoDuration::days(90))
            .await
            .unwrap();
        assert_eq!(store.delete_older_than(30).await.unwrap(), 1);

        let fresh = store.insert(new_record(Some("m"), "sensor")).await.unwrap();
        assert!(fresh.id > old.id);
    }

    #[tokio::test]
    async fn test_query_filters_are_conjunctive() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.insert(new_record(Some("a"), "pump")).await.unwrap();
        store.insert(new_record(Some("a"), "valve")).await.unwrap();
        store.insert(new_record(Some("b"), "pump")).await.unwrap();
        store.insert(new_record(None, "pump")).await.unwrap();

        let filter = RecordFilter {
            machine_id: Some("a".to_string()),
            device_type: Some("pump".to_string()),
            ..RecordFilter::default()
        };
        let result = store.query(filter, Page::new(100, 0)).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.records[0].machine_id.as_deref(), Some("a"));
        assert_eq!(result.records[0].device_type, "pump");

        let pumps = RecordFilter {
            device_type: Some("pump".to_string()),
            ..RecordFilter::default()
        };
        assert_eq!(store.query(pumps, Page::new(100, 0)).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_query_time_bounds() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let now = Utc::now();
        let mut inserted = Vec::new();
        for days in [1, 5, 10] {
            inserted.push(
                store
                    .insert_received_at(new_record(Some("m"), "x"), now - ChronoDuration::days(days))
                    .await
                    .unwrap(),
            );
        }

        let filter = RecordFilter {
            from: Some(now - ChronoDuration::days(7)),
            to: Some(now - ChronoDuration::days(2)),
            ..RecordFilter::default()
        };
        let result = store.query(filter, Page::new(10, 0)).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.records[0].id, inserted[1].id);
        assert_eq!(result.records[0].received_at, inserted[1].received_at);
    }

    #[tokio::test]
    async fn test_pagination_is_disjoint_and_ordered() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let base = Utc::now() - ChronoDuration::hours(1);
        for i in 0..7 {
            store
                .insert_received_at(new_record(Some("m"), "x"), base + ChronoDuration::seconds(i))
                .await
                .unwrap();
        }
        // Tie on received_at falls back to insertion order
        store
            .insert_received_at(new_record(Some("m"), "x"), base + ChronoDuration::seconds(6))
            .await
            .unwrap();

        let first_page = Page::new(3, 0);
        let second_page = Page::new(3, 3);
        let first = store.query(RecordFilter::default(), first_page).await.unwrap();
        let second = store.query(RecordFilter::default(), second_page).await.unwrap();

        assert_eq!(first.total, 8);
        assert!(first.has_more(first_page));
        assert!(second.has_more(second_page));

        let combined: Vec<&Record> = first.records.iter().chain(second.records.iter()).collect();
        assert_eq!(combined.len(), 6);
        for pair in combined.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.id != b.id);
            assert!(
                a.received_at > b.received_at || (a.received_at == b.received_at && a.id > b.id)
            );
        }
        assert_eq!(first.records[0].id, 8);
        assert_eq!(first.records[1].id, 7);

        let last_page = Page::new(3, 6);
        let last = store.query(RecordFilter::default(), last_page).await.unwrap();
        assert_eq!(last.records.len(), 2);
        assert!(!last.has_more(last_page));
    }

    #[tokio::test]
    async fn test_query_by_machine_not_found() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.insert(new_record(Some("present"), "x")).await.unwrap();

        let err = store.query_by_machine("missing", 50).await.unwrap_err();
        assert!(matches!(err, StoreError::MachineNotFound(ref id) if id == "missing"));

        let found = store.query_by_machine("present", 50).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_query_by_machine_respects_limit() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        for _ in 0..4 {
            store.insert(new_record(Some("m"), "x")).await.unwrap();
        }
        let records = store.query_by_machine("m", 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].id > records[1].id);
    }

    #[tokio::test]
    async fn test_stats_exclude_null_machine_ids() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        for _ in 0..3 {
            store.insert(new_record(Some("a"), "pump")).await.unwrap();
        }
        store.insert(new_record(Some("b"), "valve")).await.unwrap();
        store.insert(new_record(None, "unknown")).await.unwrap();
        store
            .insert_received_at(new_record(None, "pump"), Utc::now() - ChronoDuration::days(3))
            .await
            .unwrap();

        let stats = store.compute_stats().await.unwrap();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.unique_machine_count, 2);
        assert_eq!(stats.records_last_24h, 5);
        assert_eq!(stats.device_types_seen, vec!["pump", "unknown", "valve"]);
        assert_eq!(
            stats.per_machine_counts,
            vec![
                MachineCount { machine_id: "a".into(), count: 3 },
                MachineCount { machine_id: "b".into(), count: 1 },
            ]
        );
        let non_null: u64 = stats.per_machine_counts.iter().map(|m| m.count).sum();
        assert_eq!(non_null, 4);
        assert!(stats.oldest_record < stats.newest_record);
    }

    #[tokio::test]
    async fn test_stats_top_machines_capped() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        for i in 0..12 {
            store.insert(new_record(Some(&format!("m-{:02}", i)), "x")).await.unwrap();
        }
        let stats = store.compute_stats().await.unwrap();
        assert_eq!(stats.unique_machine_count, 12);
        assert_eq!(stats.per_machine_counts.len(), 10);
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.insert(new_record(Some("fresh"), "x")).await.unwrap();
        store
            .insert_received_at(new_record(Some("stale"), "x"), Utc::now() - ChronoDuration::days(40))
            .await
            .unwrap();

        assert_eq!(store.delete_older_than(30).await.unwrap(), 1);
        assert_eq!(store.delete_older_than(30).await.unwrap(), 0);

        let remaining = store.query(RecordFilter::default(), Page::new(10, 0)).await.unwrap();
        assert_eq!(remaining.total, 1);
        assert_eq!(remaining.records[0].machine_id.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_delete_with_cutoff_before_calendar_range() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.insert(new_record(Some("kept"), "x")).await.unwrap();
        store
            .insert_received_at(new_record(Some("old"), "x"), Utc::now() - ChronoDuration::days(4000))
            .await
            .unwrap();

        assert_eq!(store.delete_older_than(100_000_000).await.unwrap(), 0);
        assert_eq!(store.delete_older_than(u32::MAX).await.unwrap(), 0);
        assert_eq!(store.metrics_seed().await.unwrap().total_records, 2);
    }

    #[tokio::test]
    async fn test_metrics_seed() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.insert(new_record(Some("a"), "x")).await.unwrap();
        store.insert(new_record(Some("a"), "x")).await.unwrap();
        let last = store.insert(new_record(None, "x")).await.unwrap();

        let seed = store.metrics_seed().await.unwrap();
        assert_eq!(seed.total_records, 3);
        assert_eq!(seed.machine_ids, vec!["a".to_string()]);
        assert_eq!(seed.last_received_at, Some(last.received_at));
    }

    #[tokio::test]
    async fn test_corrupt_json_is_storage_failure() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let inserted = store.insert(new_record(Some("m"), "x")).await.unwrap();
        store
            .pool
            .run(move |conn| {
                conn.execute(
                    "UPDATE machine_data SET raw_payload = '{broken' WHERE id = ?1",
                    params![inserted.id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get(inserted.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        let mapped: ingest_core::IngestError = err.into();
        assert_eq!(mapped.status_code(), 500);

        assert!(store.get(inserted.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            path: dir.path().join("machine_data.db").to_string_lossy().into_owned(),
            ..StoreConfig::default()
        };

        {
            let store = SqliteRecordStore::open(&config).await.unwrap();
            store.insert(new_record(Some("kept"), "x")).await.unwrap();
        }

        let reopened = SqliteRecordStore::open(&config).await.unwrap();
        let seed = reopened.metrics_seed().await.unwrap();
        assert_eq!(seed.total_records, 1);
        assert_eq!(seed.machine_ids, vec!["kept".to_string()]);
    }
}
