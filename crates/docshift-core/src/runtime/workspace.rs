//! Per-task scratch directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::runtime::types::RuntimeError;

const WORKSPACE_PREFIX: &str = "docshift_";

/// Subdirectory of a workspace that holds the uploaded files.
pub const INPUTS_DIR: &str = "inputs";

/// Allocates and destroys the directories tasks run in.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a fresh directory no other task shares.
    ///
    /// `create_dir` fails on an existing path, so a directory is never
    /// handed out twice even if a name were to collide.
    pub async fn allocate(&self) -> Result<PathBuf, RuntimeError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RuntimeError::workspace(&self.root, e))?;

        let path = self
            .root
            .join(format!("{WORKSPACE_PREFIX}{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| RuntimeError::workspace(&path, e))?;

        debug!(workspace = %path.display(), "workspace allocated");
        Ok(path)
    }

    /// Write `bytes` into the `inputs/` directory of `workspace` under the
    /// sanitized form of `file_name`.
    ///
    /// Uploads never share a directory with operation outputs. A name
    /// already taken gets a numeric suffix (`report.pdf`, `report_1.pdf`, ...).
    pub async fn persist(
        &self,
        workspace: &Path,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, RuntimeError> {
        let inputs = workspace.join(INPUTS_DIR);
        tokio::fs::create_dir_all(&inputs)
            .await
            .map_err(|e| RuntimeError::workspace(&inputs, e))?;

        let safe = sanitize_filename(file_name);
        let (stem, ext) = split_extension(&safe);

        let mut attempt = 0u32;
        loop {
            let candidate = match (attempt, ext) {
                (0, _) => safe.clone(),
                (n, Some(ext)) => format!("{stem}_{n}.{ext}"),
                (n, None) => format!("{stem}_{n}"),
            };
            let path = inputs.join(candidate);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(RuntimeError::workspace(&path, e)),
            };

            file.write_all(bytes)
                .await
                .map_err(|e| RuntimeError::workspace(&path, e))?;
            file.flush()
                .await
                .map_err(|e| RuntimeError::workspace(&path, e))?;
            return Ok(path);
        }
    }

    /// Recursively delete a workspace. A path that is already gone is fine.
    pub async fn destroy(&self, path: &Path) -> Result<(), RuntimeError> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(workspace = %path.display(), "workspace destroyed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RuntimeError::workspace(path, e)),
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, every character outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading dots and underscores are trimmed so the result
/// can never be hidden or traverse upwards.
pub fn sanitize_filename(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "upload".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Lower-cased extension of a file name, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

pub(crate) fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}
