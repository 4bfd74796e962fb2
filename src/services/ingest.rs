//! Bulk code ingest: CSV-delivered inventories loaded under one transaction.

use std::time::Instant;

use sqlx::QueryBuilder;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::CodeRecord;
use crate::services::database::Database;
use crate::services::error::ServiceError;
use crate::services::metrics::{observe_db_query, record_codes_ingested};

pub const CODE_COLUMN: &str = "code";
pub const CLIENT_ID_COLUMN: &str = "client_id";

#[derive(Clone)]
pub struct IngestService {
    db: Database,
}

impl IngestService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Check that the CSV header row carries the required columns.
    pub fn require_columns(data: &[u8]) -> Result<(), ServiceError> {
        let mut reader = csv::Reader::from_reader(data);
        let headers = reader
            .headers()
            .map_err(|e| ServiceError::Ingest(anyhow::anyhow!("failed to read CSV headers: {e}")))?;

        let has = |name: &str| headers.iter().any(|h| h == name);
        if has(CODE_COLUMN) && has(CLIENT_ID_COLUMN) {
            Ok(())
        } else {
            Err(ServiceError::MissingCsvColumns)
        }
    }

    /// Parse the CSV payload into code records.
    ///
    /// Column positions come from the header row, never from fixed indices,
    /// and a `batch_id` column is ignored: the batch created for the upload
    /// is authoritative. Any malformed row fails the whole parse.
    pub fn parse_codes(data: &[u8]) -> Result<Vec<CodeRecord>, ServiceError> {
        let mut reader = csv::Reader::from_reader(data);
        let headers = reader
            .headers()
            .map_err(|e| ServiceError::Ingest(anyhow::anyhow!("failed to read CSV headers: {e}")))?
            .clone();

        let code_idx = headers
            .iter()
            .position(|h| h == CODE_COLUMN)
            .ok_or(ServiceError::MissingCsvColumns)?;
        let client_idx = headers
            .iter()
            .position(|h| h == CLIENT_ID_COLUMN)
            .ok_or(ServiceError::MissingCsvColumns)?;

        let mut records = Vec::new();
        for (index, record) in reader.records().enumerate() {
            // Header row is line 1, so data rows start at line 2.
            let line = index + 2;
            let record = record.map_err(|e| {
                ServiceError::Ingest(anyhow::anyhow!("invalid record at row {line}: {e}"))
            })?;

            let code = record
                .get(code_idx)
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .ok_or_else(|| {
                    ServiceError::Ingest(anyhow::anyhow!("missing code at row {line}"))
                })?;
            let client_id = record
                .get(client_idx)
                .map(str::trim)
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| {
                    ServiceError::Ingest(anyhow::anyhow!("invalid client_id at row {line}"))
                })?;

            records.push(CodeRecord {
                code: code.to_string(),
                client_id,
            });
        }

        Ok(records)
    }

    /// Create a new batch carrying the caller-supplied name and rules.
    ///
    /// The rules document is stored verbatim; only the recognized options
    /// are interpreted at redemption time.
    #[instrument(skip(self, rules), fields(name = %name))]
    pub async fn create_batch(
        &self,
        name: &str,
        rules: Option<serde_json::Value>,
    ) -> Result<Uuid, ServiceError> {
        let batch_id = Uuid::new_v4();

        let started = Instant::now();
        sqlx::query("INSERT INTO batches (id, name, rules, expired) VALUES ($1, $2, $3, false)")
            .bind(batch_id)
            .bind(name)
            .bind(rules)
            .execute(self.db.pool())
            .await?;
        observe_db_query("create_batch", started.elapsed());

        info!(batch_id = %batch_id, name, "Batch created");
        Ok(batch_id)
    }

    /// Insert all codes for a batch in a single multi-row statement under
    /// one transaction. A duplicate code anywhere (codes are globally
    /// unique) fails the whole ingest.
    #[instrument(skip(self, records), fields(batch_id = %batch_id, count = records.len()))]
    pub async fn insert_codes(
        &self,
        batch_id: Uuid,
        records: &[CodeRecord],
    ) -> Result<(), ServiceError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;

        let started = Instant::now();
        let mut builder = QueryBuilder::new("INSERT INTO codes (client_id, batch_id, code) ");
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.client_id)
                .push_bind(batch_id)
                .push_bind(&record.code);
        });
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| ServiceError::Ingest(anyhow::anyhow!("bulk insert failed: {e}")))?;
        observe_db_query("insert_codes", started.elapsed());

        tx.commit().await?;

        record_codes_ingested(records.len() as u64);
        info!(batch_id = %batch_id, count = records.len(), "Codes ingested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "217be7c8-679c-4e08-bffc-db3451bdcdbf";

    #[test]
    fn parses_codes_by_header_position() {
        let data = format!("client_id,batch_id,code\n{CLIENT_ID},ignored,CODE-1\n");
        let records = IngestService::parse_codes(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "CODE-1");
        assert_eq!(records[0].client_id, Uuid::parse_str(CLIENT_ID).unwrap());
    }

    #[test]
    fn header_order_does_not_matter() {
        let data = format!("code,client_id\nCODE-2,{CLIENT_ID}\n");
        let records = IngestService::parse_codes(data.as_bytes()).unwrap();

        assert_eq!(records[0].code, "CODE-2");
    }

    #[test]
    fn missing_required_columns_is_rejected() {
        let data = b"invalid,csv,format\na,b,c\n";
        assert!(matches!(
            IngestService::parse_codes(data),
            Err(ServiceError::MissingCsvColumns)
        ));
        assert!(matches!(
            IngestService::require_columns(data),
            Err(ServiceError::MissingCsvColumns)
        ));
    }

    #[test]
    fn wrong_field_count_fails_the_parse() {
        let data = format!("code,client_id\nCODE-3,{CLIENT_ID}\nonly-one-field\n");
        assert!(matches!(
            IngestService::parse_codes(data.as_bytes()),
            Err(ServiceError::Ingest(_))
        ));
    }

    #[test]
    fn malformed_client_id_fails_the_parse() {
        let data = b"code,client_id\nCODE-4,not-a-uuid\n";
        assert!(matches!(
            IngestService::parse_codes(data),
            Err(ServiceError::Ingest(_))
        ));
    }

    #[test]
    fn headers_only_yields_no_records() {
        let data = b"code,client_id\n";
        assert!(IngestService::parse_codes(data).unwrap().is_empty());
        assert!(IngestService::require_columns(data).is_ok());
    }
}
