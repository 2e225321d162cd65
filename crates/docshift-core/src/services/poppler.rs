//! `pdf-to-images`: render each page to PNG with poppler's `pdftoppm`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::progress::ProgressSink;
use crate::services::command::{expect_output, run_program};
use crate::services::qpdf::page_count;
use crate::services::{ConversionJob, ConversionOperation, OperationError};

/// Render resolution; 144 dpi is twice the 72 dpi PDF user space.
pub const RENDER_DPI: u32 = 144;

#[derive(Debug, Clone)]
pub struct PdfToImages {
    pdftoppm: PathBuf,
    qpdf: PathBuf,
}

impl PdfToImages {
    pub fn new(pdftoppm: impl AsRef<Path>, qpdf: impl AsRef<Path>) -> Self {
        Self {
            pdftoppm: pdftoppm.as_ref().to_path_buf(),
            qpdf: qpdf.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for PdfToImages {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        let input = job.first_input()?;
        let total = page_count(&self.qpdf, input)?;
        let mut outputs = Vec::with_capacity(total);

        for page in 1..=total {
            progress.step(
                10,
                80,
                page - 1,
                total,
                format!("Rendering page {page} of {total}..."),
            );
            let prefix = job.workspace.join(format!("page_{page}"));
            run_program(&self.pdftoppm, render_args(input, page, &prefix))?;

            // `-singlefile` writes `<prefix>.png` with no page-number suffix.
            let output = prefix.with_extension("png");
            expect_output(&self.pdftoppm, &output)?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

pub fn render_args(input: &Path, page: usize, prefix: &Path) -> Vec<OsString> {
    let page = page.to_string();
    let dpi = RENDER_DPI.to_string();
    let mut args: Vec<OsString> = [
        "-png",
        "-r",
        dpi.as_str(),
        "-f",
        page.as_str(),
        "-l",
        page.as_str(),
        "-singlefile",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());
    args.push(prefix.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_args_select_a_single_page() {
        let args: Vec<String> = render_args(Path::new("/w/doc.pdf"), 3, Path::new("/w/page_3"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-png", "-r", "144", "-f", "3", "-l", "3", "-singlefile", "/w/doc.pdf", "/w/page_3"]
        );
    }

    #[test]
    fn missing_qpdf_fails_before_rendering() {
        let job = ConversionJob {
            inputs: vec![PathBuf::from("/w/doc.pdf")],
            workspace: std::env::temp_dir(),
            options: Default::default(),
        };
        let op = PdfToImages::new("/nonexistent/pdftoppm", "/nonexistent/qpdf");
        let err = op.run(&job, &ProgressSink::detached()).unwrap_err();
        assert!(matches!(err, OperationError::Spawn { ref program, .. } if program == "qpdf"));
    }
}
