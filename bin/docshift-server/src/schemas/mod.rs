use serde::Serialize;
use utoipa::ToSchema;

pub mod convert;
pub mod health;
pub mod task;

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
