//! LibreOffice-backed operations.
//!
//! `soffice` keeps a per-profile lock, so every invocation gets its own
//! profile directory inside the task workspace. That lets conversions for
//! different tasks run side by side.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::progress::ProgressSink;
use crate::services::command::{display_name, expect_output, file_stem, run_program};
use crate::services::qpdf;
use crate::services::{ConversionJob, ConversionOperation, OperationError};

const PROFILE_DIR: &str = ".lo-profile";
const OUTPUT_DIR: &str = "office-out";
const WORD_OUTPUT_NAME: &str = "word_to_pdf.pdf";

/// Convert `input` with `soffice --convert-to <target>` into `out_dir` and
/// return the path of the produced file (`<stem>.<extension>`).
pub fn soffice_convert(
    program: &Path,
    workspace: &Path,
    out_dir: &Path,
    input: &Path,
    target: &str,
    extension: &str,
    import_filter: Option<&str>,
) -> Result<PathBuf, OperationError> {
    std::fs::create_dir_all(out_dir)?;

    run_program(
        program,
        soffice_args(workspace, out_dir, input, target, import_filter),
    )?;

    let output = out_dir.join(format!("{}.{extension}", file_stem(input)));
    expect_output(program, &output)?;
    Ok(output)
}

pub fn soffice_args(
    workspace: &Path,
    out_dir: &Path,
    input: &Path,
    target: &str,
    import_filter: Option<&str>,
) -> Vec<OsString> {
    let mut profile = OsString::from("-env:UserInstallation=file://");
    profile.push(workspace.join(PROFILE_DIR).as_os_str());

    let mut args = vec![
        profile,
        OsString::from("--headless"),
        OsString::from("--norestore"),
    ];
    if let Some(filter) = import_filter {
        args.push(OsString::from(format!("--infilter={filter}")));
    }
    args.push(OsString::from("--convert-to"));
    args.push(OsString::from(target));
    args.push(OsString::from("--outdir"));
    args.push(out_dir.as_os_str().to_owned());
    args.push(input.as_os_str().to_owned());
    args
}

/// Single-input conversion to PDF (`excel-to-pdf`, `txt-to-pdf`).
#[derive(Debug, Clone)]
pub struct OfficeToPdf {
    program: PathBuf,
    reading: &'static str,
}

impl OfficeToPdf {
    pub fn spreadsheet(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            reading: "Reading spreadsheet...",
        }
    }

    pub fn text(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            reading: "Reading text file...",
        }
    }
}

impl ConversionOperation for OfficeToPdf {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        let input = job.first_input()?;
        progress.report(20, self.reading);
        let out_dir = job.workspace.join(OUTPUT_DIR);
        let output = soffice_convert(&self.program, &job.workspace, &out_dir, input, "pdf", "pdf", None)?;
        progress.report(90, "Finishing PDF...");
        Ok(vec![output])
    }
}

/// `word-to-pdf`: every document is converted, then the PDFs are merged in
/// upload order into one file.
///
/// Each input converts into its own `office-out/<n>/` directory, so
/// `a.docx` and `a.txt` never share an intermediate `a.pdf`.
#[derive(Debug, Clone)]
pub struct WordToPdf {
    soffice: PathBuf,
    qpdf: PathBuf,
}

impl WordToPdf {
    pub fn new(soffice: impl AsRef<Path>, qpdf: impl AsRef<Path>) -> Self {
        Self {
            soffice: soffice.as_ref().to_path_buf(),
            qpdf: qpdf.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for WordToPdf {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        if job.inputs.is_empty() {
            return Err(OperationError::NoInput);
        }
        let total = job.inputs.len();
        let mut pdfs = Vec::with_capacity(total);
        for (i, input) in job.inputs.iter().enumerate() {
            progress.step(
                10,
                80,
                i,
                total,
                format!("Converting {} ({}/{})...", display_name(input), i + 1, total),
            );
            let out_dir = job.workspace.join(OUTPUT_DIR).join(i.to_string());
            pdfs.push(soffice_convert(&self.soffice, &job.workspace, &out_dir, input, "pdf", "pdf", None)?);
        }

        let output = job.workspace.join(WORD_OUTPUT_NAME);
        if let [single] = pdfs.as_slice() {
            std::fs::rename(single, &output)?;
        } else {
            progress.report(90, "Combining documents...");
            qpdf::merge(&self.qpdf, &pdfs, &output)?;
        }
        Ok(vec![output])
    }
}

/// `pdf-to-word`: import the PDF with the Writer PDF filter and save DOCX.
#[derive(Debug, Clone)]
pub struct PdfToWord {
    program: PathBuf,
}

impl PdfToWord {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for PdfToWord {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        let input = job.first_input()?;
        progress.report(20, "Analysing PDF...");
        progress.report(40, "Converting to Word (this may take a while)...");
        let output = soffice_convert(
            &self.program,
            &job.workspace,
            &job.workspace.join(OUTPUT_DIR),
            input,
            "docx:MS Word 2007 XML",
            "docx",
            Some("writer_pdf_import"),
        )?;
        progress.report(85, "Finishing...");
        Ok(vec![output])
    }
}
