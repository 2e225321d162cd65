use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart body accepted by `POST /convert`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ConvertForm {
    /// One or more files to convert, in processing order.
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
    /// Tool key, e.g. `merge-pdf`.
    pub tool: String,
    /// `screen`, `ebook` or `printer`; anything else means `ebook`.
    pub compress_level: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConvertResponse {
    pub task_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolsResponse {
    pub tools: Vec<String>,
}
