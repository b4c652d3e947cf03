//! Request DTOs for commercial API endpoints.

use serde::Deserialize;

use super::models::CommercialRecord;

/// Request to save the commercial record of a booking
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCommercialRequest {
    pub record: CommercialRecord,
    /// Version the editor loaded; absent for a record never loaded.
    #[serde(default, alias = "expected_version")]
    pub expected_version: Option<i32>,
}
