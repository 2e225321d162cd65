use axum::Json;
use utoipa::OpenApi;

use crate::routes::{convert, download, health, progress, tasks};

#[derive(OpenApi)]
#[openapi(info(
    title = "docshift-server",
    description = "Asynchronous document conversion API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(convert::ConvertApi::openapi());
    root.merge(progress::ProgressApi::openapi());
    root.merge(download::DownloadApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root
}

/// `GET /api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(get_docs())
}
