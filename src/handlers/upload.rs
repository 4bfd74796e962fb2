//! POST /api/v1/codes/upload — CSV inventory ingest.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::dtos::UploadResponse;
use crate::services::error::ServiceError;
use crate::services::ingest::IngestService;
use crate::AppState;

pub async fn upload_codes(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut batch_name: Option<String> = None;
    let mut rules_raw: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ServiceError::MalformedBody)?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ServiceError::MalformedBody)?;
                file = Some((file_name, data.to_vec()));
            }
            Some("batch_name") => {
                batch_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ServiceError::MalformedBody)?,
                );
            }
            Some("rules") => {
                rules_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ServiceError::MalformedBody)?,
                );
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or(ServiceError::MissingCsvFile)?;
    if !file_name.ends_with(".csv") {
        return Err(ServiceError::NotACsvFile);
    }
    IngestService::require_columns(&data)?;

    let batch_name = batch_name
        .filter(|name| !name.is_empty())
        .ok_or(ServiceError::MissingBatchName)?;

    // The rules form value is optional; when present it must at least be
    // valid JSON. It is stored verbatim.
    let rules = match rules_raw.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(serde_json::from_str::<serde_json::Value>(raw)?),
        None => None,
    };

    let records = IngestService::parse_codes(&data)?;
    let batch_id = state.ingest.create_batch(&batch_name, rules).await?;
    state.ingest.insert_codes(batch_id, &records).await?;

    tracing::info!(
        batch_id = %batch_id,
        batch_name = %batch_name,
        count = records.len(),
        "Codes uploaded"
    );

    Ok(Json(UploadResponse {
        message: "Codes uploaded successfully".to_string(),
    }))
}
