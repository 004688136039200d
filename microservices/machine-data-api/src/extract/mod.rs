//! Field Extraction
//!
//! Derives machine id, device type and event time from an arbitrary JSON
//! object. Flexible mode never fails; strict mode enforces the legacy
//! `{machineId, timestamp, data}` envelope.

pub mod timestamp;

use ingest_core::{IngestError, IngestMode, Result};
use ingest_store::JsonObject;
use serde::Serialize;
use serde_json::Value;

/// Candidate keys for the machine identifier, highest priority first
pub const MACHINE_ID_KEYS: [&str; 7] = [
    "machineId",
    "machine_id",
    "deviceId",
    "device_id",
    "id",
    "serial",
    "name",
];

pub const DEVICE_TYPE_KEYS: [&str; 4] = ["deviceType", "device_type", "type", "category"];

pub const TIMESTAMP_KEYS: [&str; 5] = ["timestamp", "time", "datetime", "created_at", "recorded_at"];

/// Keys stripped from the residual data. The timestamp key is left in place.
const CONSUMED_KEYS: [&str; 8] = [
    "machineId",
    "machine_id",
    "deviceId",
    "device_id",
    "deviceType",
    "device_type",
    "type",
    "category",
];

const STRICT_REQUIRED: [&str; 3] = ["machineId", "timestamp", "data"];

pub const UNKNOWN_DEVICE_TYPE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub machine_id: Option<String>,
    pub device_type: String,
    pub event_timestamp: Option<String>,
    #[serde(skip)]
    pub extracted_data: JsonObject,
}

/// Apply the configured ingestion policy
pub fn apply(mode: IngestMode, payload: &JsonObject) -> Result<Extraction> {
    match mode {
        IngestMode::Flexible => Ok(extract(payload)),
        IngestMode::Strict => extract_strict(payload),
    }
}

pub fn extract(payload: &JsonObject) -> Extraction {
    let extracted_data = payload
        .iter()
        .filter(|(key, _)| !CONSUMED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Extraction {
        machine_id: machine_id(payload),
        device_type: device_type(payload),
        event_timestamp: event_timestamp(payload),
        extracted_data,
    }
}

pub fn machine_id(payload: &JsonObject) -> Option<String> {
    first_present(payload, &MACHINE_ID_KEYS)
}

pub fn device_type(payload: &JsonObject) -> String {
    first_present(payload, &DEVICE_TYPE_KEYS).unwrap_or_else(|| UNKNOWN_DEVICE_TYPE.to_string())
}

/// First candidate that parses as a date wins; unparseable ones are skipped
pub fn event_timestamp(payload: &JsonObject) -> Option<String> {
    TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(timestamp::parse_timestamp)
        .map(timestamp::canonical)
}

pub fn validate_strict(payload: &JsonObject) -> Result<()> {
    let missing: Vec<String> = STRICT_REQUIRED
        .iter()
        .filter(|key| payload.get(**key).map_or(true, Value::is_null))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingFields(missing));
    }

    if !payload.get("data").is_some_and(Value::is_object) {
        return Err(IngestError::Validation("Field 'data' must be an object".to_string()));
    }

    if payload.get("timestamp").and_then(timestamp::parse_timestamp).is_none() {
        return Err(IngestError::Validation("Invalid timestamp format".to_string()));
    }

    Ok(())
}

/// Strict records take the measurement body from `data` verbatim
pub fn extract_strict(payload: &JsonObject) -> Result<Extraction> {
    validate_strict(payload)?;

    let extracted_data = match payload.get("data") {
        Some(Value::Object(data)) => data.clone(),
        _ => JsonObject::new(),
    };

    Ok(Extraction {
        machine_id: payload.get("machineId").and_then(value_as_text),
        device_type: device_type(payload),
        event_timestamp: payload
            .get("timestamp")
            .and_then(timestamp::parse_timestamp)
            .map(timestamp::canonical),
        extracted_data,
    })
}

fn first_present(payload: &JsonObject, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find_map(value_as_text)
}

/// Strings are taken as-is; other scalars use their JSON text
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_machine_id_priority() {
        let payload = object(json!({ "machine_id": "B", "machineId": "A" }));
        assert_eq!(extract(&payload).machine_id.as_deref(), Some("A"));

        let payload = object(json!({ "name": "lathe", "serial": "SN-1" }));
        assert_eq!(extract(&payload).machine_id.as_deref(), Some("SN-1"));
    }

    #[test]
    fn test_null_candidates_are_skipped() {
        let payload = object(json!({ "machineId": null, "deviceId": "dev-9", "deviceType": null, "type": "pump" }));
        let extraction = extract(&payload);
        assert_eq!(extraction.machine_id.as_deref(), Some("dev-9"));
        assert_eq!(extraction.device_type, "pump");
    }

    #[test]
    fn test_numeric_identifiers_become_text() {
        let payload = object(json!({ "id": 42 }));
        assert_eq!(extract(&payload).machine_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_fallbacks_when_nothing_matches() {
        let payload = object(json!({ "temperature": 20.1, "humidity": 40 }));
        let extraction = extract(&payload);
        assert_eq!(extraction.machine_id, None);
        assert_eq!(extraction.device_type, UNKNOWN_DEVICE_TYPE);
        assert_eq!(extraction.event_timestamp, None);
        assert_eq!(extraction.extracted_data, payload);
    }

    #[test]
    fn test_empty_object_never_fails() {
        let extraction = extract(&JsonObject::new());
        assert_eq!(extraction.machine_id, None);
        assert!(extraction.extracted_data.is_empty());
    }

    #[test]
    fn test_timestamp_skips_invalid_candidates() {
        let payload = object(json!({ "timestamp": "not-a-date", "time": "2025-01-01T00:00:00Z" }));
        assert_eq!(
            extract(&payload).event_timestamp.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );

        let payload = object(json!({ "timestamp": "bad", "recorded_at": "also bad" }));
        assert_eq!(extract(&payload).event_timestamp, None);
    }

    #[test]
    fn test_residual_drops_identity_keys_but_keeps_timestamp() {
        let payload = object(json!({
            "machineId": "m-1",
            "device_id": "d-1",
            "type": "compressor",
            "category": "hvac",
            "timestamp": "2025-03-01T10:00:00Z",
            "id": 7,
            "pressure": 3.2
        }));
        let extraction = extract(&payload);

        let keys: Vec<&str> = extraction.extracted_data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["timestamp", "id", "pressure"]);
        assert!(extraction
            .extracted_data
            .keys()
            .all(|key| payload.contains_key(key)));
    }

    #[test]
    fn test_strict_requires_envelope() {
        let err = extract_strict(&object(json!({ "machineId": "m-1" }))).unwrap_err();
        match err {
            IngestError::MissingFields(fields) => {
                assert_eq!(fields, vec!["timestamp".to_string(), "data".to_string()])
            }
            other => panic!("unexpected error {:?}", other),
        }

        let err = validate_strict(&object(json!({
            "machineId": "m-1",
            "timestamp": "2025-01-01T00:00:00Z",
            "data": [1, 2]
        })))
        .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));

        let err = validate_strict(&object(json!({
            "machineId": "m-1",
            "timestamp": "yesterday",
            "data": {}
        })))
        .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn test_strict_extraction_uses_data_object() {
        let payload = object(json!({
            "machineId": "m-1",
            "timestamp": "2025-01-01T00:00:00Z",
            "deviceType": "sensor",
            "data": { "rpm": 1200 }
        }));
        let extraction = apply(IngestMode::Strict, &payload).unwrap();
        assert_eq!(extraction.machine_id.as_deref(), Some("m-1"));
        assert_eq!(extraction.device_type, "sensor");
        assert_eq!(extraction.event_timestamp.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(extraction.extracted_data, object(json!({ "rpm": 1200 })));
    }

    #[test]
    fn test_flexible_mode_accepts_legacy_envelope_too() {
        let payload = object(json!({ "machineId": "m-1", "data": { "rpm": 1 } }));
        let extraction = apply(IngestMode::Flexible, &payload).unwrap();
        assert_eq!(extraction.extracted_data, object(json!({ "data": { "rpm": 1 } })));
    }
}
