//! Blocking helper for running external conversion programs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::services::OperationError;

/// Longest stderr excerpt carried into an error message.
const MAX_STDERR_CHARS: usize = 2000;

/// Run `program` with `args` to completion and return its stdout.
///
/// A program that cannot be spawned, or that exits non-zero, becomes an
/// [`OperationError`] carrying the (truncated) stderr.
pub fn run_program<I, S>(program: &Path, args: I) -> Result<String, OperationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program_name(program);
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(command = ?command, "running external program");

    let output = command.output().map_err(|source| OperationError::Spawn {
        program: name.clone(),
        source,
    })?;

    if !output.status.success() {
        let stderr = truncate(String::from_utf8_lossy(&output.stderr).trim());
        warn!(program = %name, status = %output.status, stderr = %stderr, "external program failed");
        return Err(OperationError::CommandFailed {
            program: name,
            status: output.status.to_string(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Fail with [`OperationError::MissingOutput`] unless `path` exists.
pub fn expect_output(program: &Path, path: &Path) -> Result<(), OperationError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(OperationError::MissingOutput {
            program: program_name(program),
            path: path.to_path_buf(),
        })
    }
}

pub(crate) fn program_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned())
}

/// `<dir>/<stem>.<extension>`, or the first free `<stem>_<n>.<extension>`
/// when an earlier output already took that name.
pub(crate) fn unique_output(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.{extension}"));
    let mut n = 1u32;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.{extension}"));
        n += 1;
    }
    path
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_STDERR_CHARS {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(MAX_STDERR_CHARS).collect();
    cut.push_str("...");
    cut
}
