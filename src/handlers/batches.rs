//! GET /api/v1/batches — non-expired batch listing.

use axum::extract::State;
use axum::Json;

use crate::models::Batch;
use crate::services::error::ServiceError;
use crate::AppState;

pub async fn list_batches(
    State(state): State<AppState>,
) -> Result<Json<Vec<Batch>>, ServiceError> {
    let batches = state.db.list_active_batches().await?;
    Ok(Json(batches))
}
