//! qpdf-backed operations: `merge-pdf` and `split-pdf`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::progress::ProgressSink;
use crate::services::command::{expect_output, run_program};
use crate::services::{ConversionJob, ConversionOperation, OperationError};

const MERGED_NAME: &str = "merged.pdf";

/// Concatenate every input PDF, in upload order, into one document.
#[derive(Debug, Clone)]
pub struct MergePdf {
    program: PathBuf,
}

impl MergePdf {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for MergePdf {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        if job.inputs.is_empty() {
            return Err(OperationError::NoInput);
        }
        progress.report(10, format!("Merging {} files...", job.inputs.len()));
        let output = job.workspace.join(MERGED_NAME);
        merge(&self.program, &job.inputs, &output)?;
        Ok(vec![output])
    }
}

/// Write every page of one PDF to its own file (`page_1.pdf`, ...).
#[derive(Debug, Clone)]
pub struct SplitPdf {
    program: PathBuf,
}

impl SplitPdf {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for SplitPdf {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        let input = job.first_input()?;
        let total = page_count(&self.program, input)?;
        let mut outputs = Vec::with_capacity(total);

        for page in 1..=total {
            progress.step(
                10,
                80,
                page - 1,
                total,
                format!("Extracting page {page} of {total}..."),
            );
            let output = job.workspace.join(format!("page_{page}.pdf"));
            let mut args = vec![OsString::from("--empty"), OsString::from("--pages")];
            args.push(input.as_os_str().to_owned());
            args.push(OsString::from(page.to_string()));
            args.push(OsString::from("--"));
            args.push(output.as_os_str().to_owned());
            run_program(&self.program, args)?;
            expect_output(&self.program, &output)?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

/// Merge `inputs` into `output` with `qpdf --empty --pages ... --`.
pub fn merge(program: &Path, inputs: &[PathBuf], output: &Path) -> Result<(), OperationError> {
    run_program(program, merge_args(inputs, output))?;
    expect_output(program, output)
}

pub fn merge_args(inputs: &[PathBuf], output: &Path) -> Vec<OsString> {
    let mut args = vec![OsString::from("--empty"), OsString::from("--pages")];
    args.extend(inputs.iter().map(|p| p.as_os_str().to_owned()));
    args.push(OsString::from("--"));
    args.push(output.as_os_str().to_owned());
    args
}

/// Number of pages in `input`, via `qpdf --show-npages`.
pub fn page_count(program: &Path, input: &Path) -> Result<usize, OperationError> {
    let mut args = vec![OsString::from("--show-npages")];
    args.push(input.as_os_str().to_owned());
    let stdout = run_program(program, args)?;
    parse_page_count(&stdout).ok_or_else(|| OperationError::UnexpectedOutput {
        program: "qpdf".to_owned(),
        detail: format!("page count '{}'", stdout.trim()),
    })
}

fn parse_page_count(stdout: &str) -> Option<usize> {
    stdout.trim().parse().ok()
}
