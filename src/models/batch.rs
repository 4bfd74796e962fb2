//! Batch model.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A named, finite pool of pre-minted codes governed by one rules document.
///
/// The rules document is kept as raw JSON here so listings return it exactly
/// as it was uploaded; only the recognized options are interpreted, and that
/// happens at redemption time (see [`crate::models::Rules`]).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Batch {
    pub id: Uuid,
    pub name: String,
    pub rules: Option<serde_json::Value>,
    pub expired: bool,
}
