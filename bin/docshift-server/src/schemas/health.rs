use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Tasks currently held in the registry, finished ones included.
    pub tasks: usize,
    /// Conversions still running.
    pub in_flight: usize,
}
