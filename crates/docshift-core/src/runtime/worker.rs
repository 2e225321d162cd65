//! The per-task background worker.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::progress::ProgressSink;
use crate::runtime::storage::TaskRegistry;
use crate::runtime::types::{DispatchError, TaskId};
use crate::services::ConversionJob;

/// Name of the archive produced when an operation yields several files.
pub const BUNDLE_NAME: &str = "converted_files.zip";

pub const STARTING_PROGRESS: u8 = 8;
pub const PACKAGING_PROGRESS: u8 = 95;

const STARTING_MESSAGE: &str = "Starting conversion...";
const PACKAGING_MESSAGE: &str = "Preparing file for download...";
const DONE_MESSAGE: &str = "Completed successfully!";

/// Run one task to a terminal state.
///
/// The conversion and the bundling step run on a blocking thread. Every
/// failure, including a panic inside the operation, ends as `error`; nothing
/// is retried.
pub async fn run_job(
    registry: TaskRegistry,
    dispatcher: Dispatcher,
    task_id: TaskId,
    tool: String,
    job: ConversionJob,
) {
    registry.update(&task_id, |t| {
        t.report(STARTING_PROGRESS, STARTING_MESSAGE);
    });

    let sink = ProgressSink::new(registry.clone(), task_id);
    let worker_tool = tool.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<PathBuf, DispatchError> {
        let outputs = dispatcher.dispatch(&worker_tool, &job, &sink)?;
        sink.report(PACKAGING_PROGRESS, PACKAGING_MESSAGE);
        build_result(outputs, &job.workspace)
    })
    .await
    .unwrap_or(Err(DispatchError::WorkerPanicked));

    match outcome {
        Ok(result_path) => {
            info!(task_id = %task_id, tool = %tool, result = %result_path.display(), "conversion finished");
            registry.update(&task_id, |t| {
                t.complete(result_path, DONE_MESSAGE);
            });
        }
        Err(e) => {
            warn!(task_id = %task_id, tool = %tool, error = %e, "conversion failed");
            registry.update(&task_id, |t| {
                t.fail(e.to_string());
            });
        }
    }
}

/// Normalize an operation's outputs into the single artifact to serve.
///
/// One output is served as is; several are zipped into [`BUNDLE_NAME`]
/// inside `workspace`, one entry per file name.
pub fn build_result(mut outputs: Vec<PathBuf>, workspace: &Path) -> Result<PathBuf, DispatchError> {
    match outputs.len() {
        0 => Err(DispatchError::NoOutput),
        1 => Ok(outputs.remove(0)),
        _ => {
            let bundle = workspace.join(BUNDLE_NAME);
            write_bundle(&outputs, &bundle)?;
            Ok(bundle)
        }
    }
}

fn write_bundle(outputs: &[PathBuf], bundle: &Path) -> zip::result::ZipResult<()> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(bundle)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in outputs {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        zip.start_file(name, options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?.flush()?;
    Ok(())
}
