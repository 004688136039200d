//! REST API
//!
//! Ingestion, query, statistics and retention endpoints. Everything under
//! `/api` sits behind the global limiter; probes do not.

use std::net::SocketAddr;

use axum::body::to_bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ingest_core::IngestError;
use ingest_store::{Page, RecordFilter};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::error::ApiError;
use super::state::{AppState, SERVICE_ID};
use crate::extract::timestamp::parse_timestamp_str;
use crate::middleware::global_rate_limit;

const DEFAULT_LIST_LIMIT: u32 = 100;
const DEFAULT_MACHINE_LIMIT: u32 = 50;
const DEFAULT_RETENTION_DAYS: u32 = 30;

const AVAILABLE_ENDPOINTS: [&str; 7] = [
    "GET /health",
    "GET /ready",
    "POST /api/machine-data",
    "GET /api/machine-data",
    "GET /api/machine-data/:machineId",
    "GET /api/stats",
    "DELETE /api/cleanup?days=N",
];

type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/machine-data",
            post(ingest_machine_data).get(list_machine_data),
        )
        .route("/api/machine-data/{machine_id}", get(machine_history))
        .route("/api/stats", get(statistics))
        .route("/api/cleanup", delete(cleanup))
        .route_layer(from_fn_with_state(state.clone(), global_rate_limit))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .fallback(not_found)
        // Payload size is enforced by the ingest handler so it can answer 413 itself
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

#[instrument(skip_all)]
async fn ingest_machine_data(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (parts, body) = request.into_parts();
    let ip = client_ip(
        &parts.headers,
        parts.extensions.get::<ConnectInfo<SocketAddr>>(),
    );
    let limit = state.limits.max_payload_bytes;

    if declared_length(&parts.headers).is_some_and(|len| len > limit) {
        return Err(IngestError::PayloadTooLarge { limit }.into());
    }
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|_| IngestError::PayloadTooLarge { limit })?;

    let text = std::str::from_utf8(&bytes)
        .map_err(|_| IngestError::Validation("Payload must be UTF-8 encoded JSON".to_string()))?;
    if text.trim().is_empty() {
        return Err(empty_payload().into());
    }

    let parsed = serde_json::from_str::<Value>(text);
    let key = state.admission.resolve_key(
        parsed.as_ref().ok().and_then(Value::as_object),
        text,
        &ip,
    );
    state.admission.admit(&key)?;

    let payload = match parsed {
        Ok(Value::Object(map)) if map.is_empty() => return Err(empty_payload().into()),
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(
                IngestError::Validation("Payload must be a JSON object".to_string()).into(),
            )
        }
        Err(e) => {
            debug!(error = %e, "Rejected malformed JSON");
            return Err(IngestError::Validation("Invalid JSON payload".to_string()).into());
        }
    };

    let mut metadata = Map::new();
    metadata.insert("requestId".into(), json!(Uuid::new_v4().to_string()));
    metadata.insert("ip".into(), json!(ip));
    metadata.insert(
        "userAgent".into(),
        json!(header_str(&parts.headers, header::USER_AGENT.as_str()).unwrap_or("unknown")),
    );
    metadata.insert("contentLength".into(), json!(bytes.len()));

    let accepted = state.ingestor.ingest(payload, metadata).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Machine data received successfully",
            "id": accepted.id,
            "timestamp": accepted.received_at,
            "extracted": accepted.extraction,
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    machine_id: Option<String>,
    device_type: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

async fn list_machine_data(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let filter = RecordFilter {
        machine_id: non_empty(params.machine_id),
        device_type: non_empty(params.device_type),
        from: date_bound("from", params.from)?,
        to: date_bound("to", params.to)?,
    };
    let page = Page::new(
        clamp_limit(params.limit.as_deref(), DEFAULT_LIST_LIMIT, state.limits.max_query_limit),
        params
            .offset
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(0),
    );

    let result = state.store.query(filter, page).await?;
    let has_more = result.has_more(page);

    Ok(Json(json!({
        "success": true,
        "data": result.records,
        "pagination": {
            "total": result.total,
            "limit": page.limit,
            "offset": page.offset,
            "hasMore": has_more,
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    limit: Option<String>,
}

async fn machine_history(
    State(state): State<AppState>,
    Path(machine_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(
        params.limit.as_deref(),
        DEFAULT_MACHINE_LIMIT,
        state.limits.max_query_limit,
    );
    let records = state.store.query_by_machine(&machine_id, limit).await?;

    Ok(Json(json!({
        "success": true,
        "machineId": machine_id,
        "recordCount": records.len(),
        "data": records,
    })))
}

async fn statistics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.store.compute_stats().await?;
    Ok(Json(json!({
        "success": true,
        "statistics": stats,
        "generatedAt": Utc::now(),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct CleanupParams {
    days: Option<String>,
}

async fn cleanup(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> ApiResult<Json<Value>> {
    let days = match params.days.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_RETENTION_DAYS,
        Some(raw) => match raw.parse::<u32>() {
            Ok(days) if days >= 1 => days,
            _ => {
                return Err(IngestError::Validation(
                    "Parameter 'days' must be a positive integer".to_string(),
                )
                .into())
            }
        },
    };

    let deleted = state.sweeper.sweep(days).await?;
    info!(days, deleted, "Manual cleanup completed");

    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {} records older than {} days", deleted, days),
        "deletedRecords": deleted,
        "retentionDays": days,
    })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database_up = state.store.is_healthy().await;

    Json(json!({
        "status": if database_up { "healthy" } else { "degraded" },
        "service": SERVICE_ID,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
        "uptimeSeconds": state.started.elapsed().as_secs(),
        "database": if database_up { "connected" } else { "unavailable" },
        "mode": state.ingestor.mode(),
        "metrics": state.metrics.snapshot(),
        "counters": {
            "accepted": state.ingestor.accepted(),
            "rateLimited": state.admission.rejected(),
        },
    }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let readiness = state.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Endpoint not found",
            "path": uri.path(),
            "availableEndpoints": AVAILABLE_ENDPOINTS,
        })),
    )
}

fn empty_payload() -> IngestError {
    IngestError::Validation("Empty payload".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    header_str(headers, header::CONTENT_LENGTH.as_str()).and_then(|raw| raw.parse().ok())
}

/// Proxy headers first, then the socket peer
fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn date_bound(name: &str, raw: Option<String>) -> ApiResult<Option<DateTime<Utc>>> {
    match non_empty(raw) {
        None => Ok(None),
        Some(raw) => parse_timestamp_str(&raw).map(Some).ok_or_else(|| {
            IngestError::Validation(format!("Invalid '{}' date: {}", name, raw)).into()
        }),
    }
}

fn clamp_limit(raw: Option<&str>, default: u32, max: u32) -> u32 {
    raw.and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(default)
        .clamp(1, max.max(1))
}
