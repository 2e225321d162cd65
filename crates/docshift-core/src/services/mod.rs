//! Conversion operations.
//!
//! Each supported tool is a [`Tool`] variant backed by one
//! [`ConversionOperation`]. The default operations drive external programs
//! (Ghostscript, qpdf, poppler, LibreOffice, ImageMagick) through
//! [`command::run_program`].

pub mod command;
pub mod ghostscript;
pub mod imagemagick;
pub mod office;
pub mod poppler;
pub mod qpdf;

#[cfg(all(test, unix))]
mod testing;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

use crate::runtime::progress::ProgressSink;

/// Every tool the dispatcher knows about, keyed by its kebab-case name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Tool {
    PdfToImages,
    ImagesToPdf,
    MergePdf,
    SplitPdf,
    CompressPdf,
    PdfToPdfa,
    WordToPdf,
    ExcelToPdf,
    TxtToPdf,
    PdfToWord,
}

/// Ghostscript `-dPDFSETTINGS` preset used by `compress-pdf`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum CompressLevel {
    /// 72 dpi, strongest compression.
    Screen,
    /// 150 dpi.
    #[default]
    Ebook,
    /// 300 dpi, lightest compression.
    Printer,
}

impl CompressLevel {
    /// Parse a client-supplied level, falling back to the default for a
    /// missing or unknown value.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn dpi(self) -> u32 {
        match self {
            CompressLevel::Screen => 72,
            CompressLevel::Ebook => 150,
            CompressLevel::Printer => 300,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CompressLevel::Screen => "maximum (72 dpi)",
            CompressLevel::Ebook => "balanced (150 dpi)",
            CompressLevel::Printer => "light (300 dpi)",
        }
    }
}

/// Tool-specific options captured at submission time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    pub compress_level: CompressLevel,
}

/// Everything an operation gets to work with.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Input files, already persisted inside `workspace`.
    pub inputs: Vec<PathBuf>,
    /// Directory exclusively owned by the task; outputs go here.
    pub workspace: PathBuf,
    pub options: ConversionOptions,
}

impl ConversionJob {
    /// The first input, for tools that only consume one file.
    pub fn first_input(&self) -> Result<&PathBuf, OperationError> {
        self.inputs.first().ok_or(OperationError::NoInput)
    }
}

/// Failures raised inside a conversion operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("no input files were provided")]
    NoInput,

    #[error("{program} could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not produce {}", path.display())]
    MissingOutput { program: String, path: PathBuf },

    #[error("unexpected output from {program}: {detail}")]
    UnexpectedOutput { program: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A pluggable unit performing one specific transformation.
///
/// Implementations run on a blocking thread and may call `progress` any
/// number of times. They must only write inside `job.workspace`.
pub trait ConversionOperation: Send + Sync {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError>;
}

impl<F> ConversionOperation for F
where
    F: Fn(&ConversionJob, &ProgressSink) -> Result<Vec<PathBuf>, OperationError> + Send + Sync,
{
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        self(job, progress)
    }
}

/// Locations of the external programs the default operations invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programs {
    pub ghostscript: PathBuf,
    pub qpdf: PathBuf,
    pub pdftoppm: PathBuf,
    pub soffice: PathBuf,
    pub magick: PathBuf,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            ghostscript: PathBuf::from("gs"),
            qpdf: PathBuf::from("qpdf"),
            pdftoppm: PathBuf::from("pdftoppm"),
            soffice: PathBuf::from("soffice"),
            magick: PathBuf::from("magick"),
        }
    }
}

/// Build the default operation table.
pub fn default_operations(programs: &Programs) -> HashMap<Tool, Arc<dyn ConversionOperation>> {
    Tool::iter()
        .map(|tool| (tool, operation_for(tool, programs)))
        .collect()
}

fn operation_for(tool: Tool, programs: &Programs) -> Arc<dyn ConversionOperation> {
    match tool {
        Tool::PdfToImages => Arc::new(poppler::PdfToImages::new(&programs.pdftoppm, &programs.qpdf)),
        Tool::ImagesToPdf => Arc::new(imagemagick::ImagesToPdf::new(&programs.magick)),
        Tool::MergePdf => Arc::new(qpdf::MergePdf::new(&programs.qpdf)),
        Tool::SplitPdf => Arc::new(qpdf::SplitPdf::new(&programs.qpdf)),
        Tool::CompressPdf => Arc::new(ghostscript::CompressPdf::new(&programs.ghostscript)),
        Tool::PdfToPdfa => Arc::new(ghostscript::PdfToPdfa::new(&programs.ghostscript)),
        Tool::WordToPdf => Arc::new(office::WordToPdf::new(&programs.soffice, &programs.qpdf)),
        Tool::ExcelToPdf => Arc::new(office::OfficeToPdf::spreadsheet(&programs.soffice)),
        Tool::TxtToPdf => Arc::new(office::OfficeToPdf::text(&programs.soffice)),
        Tool::PdfToWord => Arc::new(office::PdfToWord::new(&programs.soffice)),
    }
}
