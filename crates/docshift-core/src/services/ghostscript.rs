//! Ghostscript-backed operations: `compress-pdf` and `pdf-to-pdfa`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::runtime::progress::ProgressSink;
use crate::services::command::{display_name, expect_output, file_stem, run_program, unique_output};
use crate::services::{CompressLevel, ConversionJob, ConversionOperation, OperationError};

const COMPRESSED_NAME: &str = "compressed.pdf";

/// Re-encode a PDF through `pdfwrite` at the requested level.
///
/// When the re-encoded file is not smaller than the input, the input itself
/// is returned as the result.
#[derive(Debug, Clone)]
pub struct CompressPdf {
    program: PathBuf,
}

impl CompressPdf {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for CompressPdf {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        let input = job.first_input()?;
        let output = job.workspace.join(COMPRESSED_NAME);
        let level = job.options.compress_level;

        progress.report(20, format!("Compression {} - analysing...", level.label()));
        progress.report(40, format!("Compressing with Ghostscript ({})...", level.label()));
        run_program(&self.program, compress_args(level, input, &output))?;
        expect_output(&self.program, &output)?;

        progress.report(85, "Checking result...");
        let original_size = std::fs::metadata(input)?.len();
        let compressed_size = std::fs::metadata(&output)?.len();
        info!(
            level = %level,
            original_size,
            compressed_size,
            "ghostscript compression finished"
        );
        if compressed_size >= original_size {
            return Ok(vec![input.clone()]);
        }
        Ok(vec![output])
    }
}

/// Convert each input PDF to PDF/A-1.
///
/// Inputs sharing a stem (`a.pdf`, `a.PDF`) get `a_pdfa.pdf`, `a_pdfa_1.pdf`.
#[derive(Debug, Clone)]
pub struct PdfToPdfa {
    program: PathBuf,
}

impl PdfToPdfa {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl ConversionOperation for PdfToPdfa {
    fn run(&self, job: &ConversionJob, progress: &ProgressSink) -> Result<Vec<PathBuf>, OperationError> {
        if job.inputs.is_empty() {
            return Err(OperationError::NoInput);
        }
        let total = job.inputs.len();
        let mut outputs = Vec::with_capacity(total);

        for (i, input) in job.inputs.iter().enumerate() {
            progress.step(
                10,
                80,
                i,
                total,
                format!("Converting {} to PDF/A ({}/{})...", display_name(input), i + 1, total),
            );
            let output = unique_output(&job.workspace, &format!("{}_pdfa", file_stem(input)), "pdf");
            run_program(&self.program, pdfa_args(input, &output))?;
            expect_output(&self.program, &output)?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

pub fn compress_args(level: CompressLevel, input: &Path, output: &Path) -> Vec<OsString> {
    let dpi = level.dpi();
    let mut args: Vec<OsString> = [
        "-dBATCH".to_owned(),
        "-dNOPAUSE".to_owned(),
        "-dQUIET".to_owned(),
        "-dSAFER".to_owned(),
        format!("-dPDFSETTINGS=/{level}"),
        format!("-dColorImageResolution={dpi}"),
        format!("-dGrayImageResolution={dpi}"),
        format!("-dMonoImageResolution={dpi}"),
        "-sDEVICE=pdfwrite".to_owned(),
        "-dCompatibilityLevel=1.4".to_owned(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(output_flag(output));
    args.push(input.as_os_str().to_owned());
    args
}

pub fn pdfa_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-dPDFA=1",
        "-dBATCH",
        "-dNOPAUSE",
        "-dNOOUTERSAVE",
        "-dSAFER",
        "-sProcessColorModel=DeviceRGB",
        "-sDEVICE=pdfwrite",
        "-sColorConversionStrategy=RGB",
        "-dPDFACompatibilityPolicy=1",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(output_flag(output));
    args.push(input.as_os_str().to_owned());
    args
}

fn output_flag(output: &Path) -> OsString {
    let mut flag = OsString::from("-sOutputFile=");
    flag.push(output.as_os_str());
    flag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn compress_args_follow_level() {
        let args = strings(&compress_args(
            CompressLevel::Screen,
            Path::new("/w/in.pdf"),
            Path::new("/w/compressed.pdf"),
        ));
        assert!(args.contains(&"-dPDFSETTINGS=/screen".to_owned()));
        assert!(args.contains(&"-dColorImageResolution=72".to_owned()));
        assert!(args.contains(&"-sOutputFile=/w/compressed.pdf".to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("/w/in.pdf"));
    }

    #[test]
    fn pdfa_args_name_output_and_input() {
        let args = strings(&pdfa_args(Path::new("/w/a.pdf"), Path::new("/w/a_pdfa.pdf")));
        assert_eq!(args[0], "-dPDFA=1");
        assert!(args.contains(&"-sOutputFile=/w/a_pdfa.pdf".to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("/w/a.pdf"));
    }

    #[cfg(unix)]
    mod with_fake_gs {
        use super::*;
        use crate::runtime::workspace::WorkspaceManager;
        use crate::runtime::worker::build_result;
        use crate::services::testing::fake_program;

        /// Records its arguments, then writes the input (or `small`) to the
        /// `-sOutputFile=` target.
        const GS: &str = r#"
echo "$@" >> "$(dirname "$0")/gs.log"
for a in "$@"; do
  case "$a" in -sOutputFile=*) out="${a#-sOutputFile=}" ;; esac
  last="$a"
done
case "$out" in
  */compressed.pdf) printf small > "$out" ;;
  *) cp "$last" "$out" ;;
esac
"#;

        #[tokio::test]
        async fn compress_never_writes_over_an_upload_of_the_same_name() {
            let bin = tempfile::tempdir().unwrap();
            let gs = fake_program(bin.path(), "gs", GS);
            let root = tempfile::tempdir().unwrap();
            let manager = WorkspaceManager::new(root.path());
            let workspace = manager.allocate().await.unwrap();
            let input = manager
                .persist(&workspace, "compressed.pdf", b"%PDF-original-and-large")
                .await
                .unwrap();

            let job = ConversionJob {
                inputs: vec![input.clone()],
                workspace: workspace.clone(),
                options: Default::default(),
            };
            let outputs = CompressPdf::new(&gs).run(&job, &ProgressSink::detached()).unwrap();

            assert_eq!(outputs, vec![workspace.join("compressed.pdf")]);
            assert_ne!(outputs[0], input);
            assert_eq!(std::fs::read(&input).unwrap(), b"%PDF-original-and-large");
            assert_eq!(std::fs::read(&outputs[0]).unwrap(), b"small");

            let log = std::fs::read_to_string(bin.path().join("gs.log")).unwrap();
            let output_flag = format!("-sOutputFile={}", outputs[0].display());
            assert!(log.contains(&output_flag));
            assert!(log.trim_end().ends_with(&input.display().to_string()));
        }

        #[test]
        fn pdfa_outputs_of_same_stem_inputs_stay_distinct() {
            let bin = tempfile::tempdir().unwrap();
            let gs = fake_program(bin.path(), "gs", GS);
            let workspace = tempfile::tempdir().unwrap();
            let inputs = workspace.path().join("inputs");
            std::fs::create_dir(&inputs).unwrap();
            std::fs::write(inputs.join("a.pdf"), "lower").unwrap();
            std::fs::write(inputs.join("a.PDF"), "upper").unwrap();

            let job = ConversionJob {
                inputs: vec![inputs.join("a.pdf"), inputs.join("a.PDF")],
                workspace: workspace.path().to_path_buf(),
                options: Default::default(),
            };
            let outputs = PdfToPdfa::new(&gs).run(&job, &ProgressSink::detached()).unwrap();

            assert_eq!(
                outputs,
                vec![
                    workspace.path().join("a_pdfa.pdf"),
                    workspace.path().join("a_pdfa_1.pdf"),
                ]
            );
            assert_eq!(std::fs::read_to_string(&outputs[0]).unwrap(), "lower");
            assert_eq!(std::fs::read_to_string(&outputs[1]).unwrap(), "upper");

            let bundle = build_result(outputs, workspace.path()).unwrap();
            let archive = zip::ZipArchive::new(std::fs::File::open(bundle).unwrap()).unwrap();
            assert_eq!(archive.len(), 2);
        }
    }

    #[test]
    fn pdfa_without_inputs_fails() {
        let job = ConversionJob {
            inputs: Vec::new(),
            workspace: std::env::temp_dir(),
            options: Default::default(),
        };
        let err = PdfToPdfa::new("gs").run(&job, &ProgressSink::detached()).unwrap_err();
        assert!(matches!(err, OperationError::NoInput));
    }
}
