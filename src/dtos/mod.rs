//! Request and response bodies for the HTTP surface.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/code/redeem`.
///
/// `clientid` is the client the codes are tied to; `customerid` is the
/// external system's customer identifier, supplied with each request.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub batchid: String,
    pub clientid: String,
    pub customerid: String,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
