use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use docshift_core::{
    ConversionJob, Dispatcher, JobRuntime, OperationError, ProgressSink, Tool, WorkspaceManager,
};
use serde_json::Value;
use tower::ServiceExt;
use tracing_test::traced_test;
use uuid::Uuid;

use crate::config::Config;
use crate::middleware::trace::X_TRACE_ID;
use crate::routes;
use crate::state::AppState;

const BOUNDARY: &str = "docshift-test-boundary";

enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn convert_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::post("/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Concatenates every input into `merged.pdf`.
fn fake_merge(job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
    progress.report(10, format!("Merging {} files...", job.inputs.len()));
    let mut merged = Vec::new();
    for input in &job.inputs {
        merged.extend(std::fs::read(input)?);
    }
    let output = job.workspace.join("merged.pdf");
    std::fs::write(&output, merged)?;
    Ok(vec![output])
}

/// Pretends the single input has three pages.
fn fake_split(job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
    job.first_input()?;
    (1..=3)
        .map(|n| -> Result<PathBuf, OperationError> {
            progress.step(10, 85, n - 1, 3, format!("Page {n}/3..."));
            let page = job.workspace.join(format!("page_{n}.pdf"));
            std::fs::write(&page, format!("page {n}"))?;
            Ok(page)
        })
        .collect()
}

/// Writes the effective compression level so tests can observe it.
fn fake_compress(job: &ConversionJob, _: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
    let output = job.workspace.join("compressed.pdf");
    std::fs::write(&output, job.options.compress_level.to_string())?;
    Ok(vec![output])
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _scratch: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = Config {
            workspace_root: scratch.path().to_path_buf(),
            cleanup_delay: Duration::from_millis(50),
            ..Config::default()
        };
        tweak(&mut config);

        let dispatcher = Dispatcher::empty()
            .register(Tool::MergePdf, Arc::new(fake_merge))
            .register(Tool::SplitPdf, Arc::new(fake_split))
            .register(Tool::CompressPdf, Arc::new(fake_compress));
        let jobs = JobRuntime::new(dispatcher)
            .with_workspaces(WorkspaceManager::new(&config.workspace_root))
            .with_cleanup_delay(config.cleanup_delay);

        let state = Arc::new(AppState {
            config: Arc::new(config),
            jobs,
        });
        Self {
            router: routes::build(Arc::clone(&state)),
            state,
            _scratch: scratch,
        }
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn submit(&self, parts: &[Part<'_>]) -> Uuid {
        let response = self.send(convert_request(parts)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        body["task_id"].as_str().unwrap().parse().unwrap()
    }

    async fn progress(&self, task_id: &Uuid) -> (StatusCode, Value) {
        let response = self.send(get(&format!("/progress/{task_id}"))).await;
        let status = response.status();
        (status, json(response).await)
    }

    async fn wait_terminal(&self, task_id: &Uuid) -> Value {
        for _ in 0..500 {
            let (status, body) = self.progress(task_id).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] != "processing" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} never finished");
    }

    async fn wait_gone(&self, task_id: &Uuid) {
        for _ in 0..500 {
            if self.progress(task_id).await.0 == StatusCode::NOT_FOUND {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} was never retired");
    }
}

async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ── Lookups ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = TestApp::new();
    for uri in [
        format!("/progress/{}", Uuid::new_v4()),
        format!("/download/{}", Uuid::new_v4()),
        "/progress/not-a-uuid".to_owned(),
        "/download/not-a-uuid".to_owned(),
    ] {
        let response = app.send(get(&uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json(response).await["error"], "Task not found");
    }
}

// ── Submission ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn submitted_task_is_immediately_observable() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[Part::File("a.pdf", b"A"), Part::Text("tool", "merge-pdf")])
        .await;

    let (status, body) = app.progress(&task_id).await;
    assert_eq!(status, StatusCode::OK);
    let progress = body["progress"].as_u64().unwrap();
    assert!(progress <= 100);
    assert!(body["message"].is_string());
    assert!(body["created_at"].is_string());

    app.wait_terminal(&task_id).await;
}

#[tokio::test]
async fn submission_without_files_is_rejected() {
    let app = TestApp::new();
    let response = app.send(convert_request(&[Part::Text("tool", "merge-pdf")])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "No file uploaded");

    let response = app
        .send(convert_request(&[Part::File("", b""), Part::Text("tool", "merge-pdf")]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "No file selected");
    assert!(app.state.jobs.registry().is_empty());
}

#[tokio::test]
async fn disallowed_extension_creates_no_task() {
    let app = TestApp::new();
    let response = app
        .send(convert_request(&[
            Part::File("a.pdf", b"A"),
            Part::File("virus.exe", b"MZ"),
            Part::Text("tool", "merge-pdf"),
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json(response).await["error"].as_str().unwrap().contains("virus.exe"));
    assert!(app.state.jobs.registry().is_empty());
}

#[tokio::test]
async fn unknown_form_field_is_rejected() {
    let app = TestApp::new();
    let response = app
        .send(convert_request(&[
            Part::File("a.pdf", b"A"),
            Part::Text("tool", "merge-pdf"),
            Part::Text("quality", "max"),
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "unexpected field: quality");
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let app = TestApp::new();
    let request = Request::post("/convert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json(response).await["error"].is_string());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::with_config(|c| c.max_upload_bytes = 64);
    let big = vec![b'x'; 4096];
    let response = app
        .send(convert_request(&[Part::File("big.pdf", &big), Part::Text("tool", "merge-pdf")]))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.state.jobs.registry().is_empty());
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_returns_a_single_pdf() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[
            Part::File("first.pdf", b"%PDF-1 "),
            Part::File("second.pdf", b"%PDF-2"),
            Part::Text("tool", "merge-pdf"),
        ])
        .await;

    let body = app.wait_terminal(&task_id).await;
    assert_eq!(body["status"], "done");
    assert_eq!(body["progress"], 100);
    assert_eq!(body["message"], "Completed successfully!");

    let response = app.send(get(&format!("/download/{task_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"merged.pdf\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1 %PDF-2");
}

#[tokio::test]
#[traced_test]
async fn unsupported_tool_fails_asynchronously() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[Part::File("a.pdf", b"A"), Part::Text("tool", "unknown-tool")])
        .await;

    let body = app.wait_terminal(&task_id).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["progress"], 0);
    assert!(body["message"].as_str().unwrap().contains("unknown-tool"));

    let response = app.send(get(&format!("/download/{task_id}"))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json(response).await["error"], "File not ready");

    let (_, again) = app.progress(&task_id).await;
    assert_eq!(again["status"], "error");
    assert!(logs_contain("response finished"));
}

#[tokio::test]
async fn missing_tool_fails_like_an_unknown_one() {
    let app = TestApp::new();
    let task_id = app.submit(&[Part::File("a.pdf", b"A")]).await;
    let body = app.wait_terminal(&task_id).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "unsupported tool: ");
}

#[tokio::test]
async fn split_returns_an_archive_with_every_page() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[Part::File("three-pages.pdf", b"%PDF"), Part::Text("tool", "split-pdf")])
        .await;
    assert_eq!(app.wait_terminal(&task_id).await["status"], "done");

    let response = app.send(get(&format!("/download/{task_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"converted_files.zip\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 3);
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    assert_eq!(names, ["page_1.pdf", "page_2.pdf", "page_3.pdf"]);

    let mut page = String::new();
    archive.by_name("page_3.pdf").unwrap().read_to_string(&mut page).unwrap();
    assert_eq!(page, "page 3");
}

#[tokio::test]
async fn invalid_compress_level_is_coerced() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[
            Part::File("big.pdf", b"%PDF"),
            Part::Text("tool", "compress-pdf"),
            Part::Text("compress_level", "extreme"),
        ])
        .await;
    assert_eq!(app.wait_terminal(&task_id).await["status"], "done");

    let response = app.send(get(&format!("/download/{task_id}"))).await;
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ebook");
}

// ── Cleanup ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn download_retires_task_and_workspace() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[Part::File("a.pdf", b"A"), Part::Text("tool", "merge-pdf")])
        .await;
    app.wait_terminal(&task_id).await;
    let workspace = app.state.jobs.progress(&task_id).unwrap().workspace;
    assert!(workspace.is_dir());

    let response = app.send(get(&format!("/download/{task_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    app.wait_gone(&task_id).await;
    assert!(!workspace.exists());
    let response = app.send(get(&format!("/download/{task_id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_artifact_is_a_server_error() {
    let app = TestApp::new();
    let task_id = app
        .submit(&[Part::File("a.pdf", b"A"), Part::Text("tool", "merge-pdf")])
        .await;
    app.wait_terminal(&task_id).await;
    let task = app.state.jobs.progress(&task_id).unwrap();
    std::fs::remove_file(task.result_path().unwrap()).unwrap();

    let response = app.send(get(&format!("/download/{task_id}"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Result file not found");
}

// ── Auxiliary routes ────────────────────────────────────────────────────────

#[tokio::test]
async fn tools_and_tasks_are_listed() {
    let app = TestApp::new();
    let response = app.send(get("/tools")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json(response).await["tools"],
        serde_json::json!(["merge-pdf", "split-pdf", "compress-pdf"])
    );

    let task_id = app
        .submit(&[Part::File("a.pdf", b"A"), Part::Text("tool", "merge-pdf")])
        .await;
    let body = json(app.send(get("/tasks")).await).await;
    let tasks = body.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task_id.to_string());
    assert_eq!(tasks[0]["tool"], "merge-pdf");

    app.wait_terminal(&task_id).await;
}

#[tokio::test]
async fn openapi_document_can_be_disabled() {
    let app = TestApp::new();
    let response = app.send(get("/api-docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json(response).await;
    assert!(doc["paths"]["/convert"].is_object());
    assert!(doc["paths"]["/download/{task_id}"].is_object());

    let app = TestApp::with_config(|c| c.enable_openapi = false);
    let response = app.send(get("/api-docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trace_id_is_propagated() {
    let app = TestApp::new();
    let trace_id = Uuid::new_v4().to_string();
    let request = Request::get("/health")
        .header(X_TRACE_ID, &trace_id)
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[X_TRACE_ID], trace_id.as_str());

    let response = app.send(get("/health")).await;
    let generated = response.headers()[X_TRACE_ID].to_str().unwrap();
    assert!(Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn health_reports_task_counts() {
    let app = TestApp::new();
    let body = json(app.send(get("/health")).await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tasks"], 0);
    assert_eq!(body["in_flight"], 0);

    let task_id = app
        .submit(&[Part::File("a.pdf", b"A"), Part::Text("tool", "merge-pdf")])
        .await;
    app.wait_terminal(&task_id).await;
    let body = json(app.send(get("/health")).await).await;
    assert_eq!(body["tasks"], 1);
    assert!(body["in_flight"].as_u64().unwrap() <= 1);
}

// ── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_clients_see_consistent_tasks() {
    let app = Arc::new(TestApp::new());

    let clients: Vec<_> = (0..16)
        .map(|n| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                let tool = if n % 2 == 0 { "split-pdf" } else { "merge-pdf" };
                let task_id = app
                    .submit(&[Part::File("in.pdf", b"%PDF"), Part::Text("tool", tool)])
                    .await;

                let mut last_terminal: Option<Value> = None;
                for _ in 0..500 {
                    let (status, body) = app.progress(&task_id).await;
                    assert_eq!(status, StatusCode::OK, "task {task_id} lost before download");
                    assert!(body["progress"].as_u64().unwrap() <= 100);
                    if let Some(seen) = &last_terminal {
                        assert_eq!(seen["status"], body["status"]);
                        assert_eq!(seen["progress"], body["progress"]);
                        break;
                    }
                    if body["status"] != "processing" {
                        last_terminal = Some(body);
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                let terminal = last_terminal.unwrap_or_else(|| panic!("task {task_id} never finished"));
                assert_eq!(terminal["status"], "done");

                let response = app.send(get(&format!("/download/{task_id}"))).await;
                assert_eq!(response.status(), StatusCode::OK);
                task_id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for client in clients {
        ids.push(client.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}
