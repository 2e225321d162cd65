//! `images-to-pdf`: one page per image, in upload order, via ImageMagick.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::progress::ProgressSink;
use crate::services::command::{expect_output, run_program};
use crate::services::{ConversionJob, ConversionOperation, OperationError};

const OUTPUT_NAME: &str = "images_to_pdf.pdf";

#[derive(Debug, Clone)]
pub struct ImagesToPdf {
    program: PathBuf,
}

impl ImagesToPdf {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for ImagesToPdf {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        if job.inputs.is_empty() {
            return Err(OperationError::NoInput);
        }
        progress.report(10, format!("Generating PDF from {} images...", job.inputs.len()));
        let output = job.workspace.join(OUTPUT_NAME);
        run_program(&self.program, convert_args(&job.inputs, &output))?;
        expect_output(&self.program, &output)?;
        Ok(vec![output])
    }
}

/// Alpha is flattened onto white and every page is forced to sRGB, so PNGs
/// with transparency and CMYK JPEGs land in the same colour space.
pub fn convert_args(inputs: &[PathBuf], output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = inputs.iter().map(|p| p.as_os_str().to_owned()).collect();
    for flag in ["-background", "white", "-alpha", "remove", "-colorspace", "sRGB"] {
        args.push(OsString::from(flag));
    }
    args.push(output.as_os_str().to_owned());
    args
}
