//! Global request throttle applied in front of every `/api` route

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::{ApiError, AppState};

pub async fn global_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.admission.admit_global()?;
    Ok(next.run(request).await)
}
