//! Code inventory input model.

use uuid::Uuid;

/// One code row parsed from an uploaded inventory, ready for insertion.
///
/// The owning batch id is not part of the record: uploads always bind codes
/// to the batch created for that upload, whatever the file claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRecord {
    pub code: String,
    pub client_id: Uuid,
}
