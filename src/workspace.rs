//! Scratch space for uploaded files.
//!
//! Uploads must exist on disk while they are read (pdfium and the OCR engine
//! want paths), but nothing should outlive the request. The workspace root
//! is opened once at startup; each request then gets its own
//! [`WorkspaceScope`], a uniquely named subdirectory that only that request
//! stages into and sweeps. Two requests uploading `scan.pdf` at the same
//! time therefore never see each other's files.

use crate::error::ClassifyError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const SCOPE_PREFIX: &str = "req-";
const FALLBACK_NAME: &str = "upload";

/// The process-wide workspace root.
#[derive(Debug, Clone)]
pub struct RequestWorkspace {
    root: PathBuf,
}

impl RequestWorkspace {
    /// Create `root` if needed and remove scopes a previous run left in it.
    ///
    /// Only `req-*` entries are touched; anything else under `root` belongs
    /// to someone else.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ClassifyError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| ClassifyError::Workspace {
            path: root.clone(),
            source: e,
        })?;
        let removed = sweep_dir(&root);
        if removed > 0 {
            debug!(root = %root.display(), removed, "Removed leftover workspace entries");
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a fresh, uniquely named scope for one request.
    pub fn scope(&self) -> Result<WorkspaceScope, ClassifyError> {
        let dir = tempfile::Builder::new()
            .prefix(SCOPE_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| ClassifyError::Workspace {
                path: self.root.clone(),
                source: e,
            })?;
        debug!(scope = %dir.path().display(), "Opened workspace scope");
        Ok(WorkspaceScope { dir: Some(dir) })
    }
}

/// One request's private staging directory.
///
/// Call [`WorkspaceScope::sweep`] when the request finishes. If the scope is
/// dropped without a sweep (early return, panic) the directory is removed
/// on drop instead.
#[derive(Debug)]
pub struct WorkspaceScope {
    dir: Option<TempDir>,
}

impl WorkspaceScope {
    /// Directory of this scope.
    pub fn path(&self) -> &Path {
        // `dir` is only taken by `sweep(self)` and `drop`.
        self.dir.as_ref().map(|d| d.path()).unwrap_or_else(|| Path::new(""))
    }

    /// Write `bytes` under `filename` inside this scope and return the path.
    ///
    /// Only the final component of `filename` is used, so a client-supplied
    /// name cannot escape the scope.
    pub async fn stage(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ClassifyError> {
        let path = self.path().join(safe_file_name(filename));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ClassifyError::Workspace {
                path: path.clone(),
                source: e,
            })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Staged upload");
        Ok(path)
    }

    /// Remove every file in this scope. Errors are logged, never returned.
    pub fn sweep(mut self) {
        if let Some(dir) = self.dir.take() {
            close(dir);
        }
    }
}

impl Drop for WorkspaceScope {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!(scope = %dir.path().display(), "Workspace scope dropped without sweep");
            close(dir);
        }
    }
}

fn close(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => debug!(scope = %path.display(), "Swept workspace scope"),
        Err(e) => warn!(scope = %path.display(), error = %e, "Failed to sweep workspace scope"),
    }
}

/// Remove leftover scopes directly under `root`; returns how many went away.
fn sweep_dir(root: &Path) -> usize {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Cannot list workspace");
            return 0;
        }
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(SCOPE_PREFIX) {
            continue;
        }
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove workspace entry"),
        }
    }
    removed
}

/// Final path component of `name`, treating both `/` and `\` as separators.
pub fn safe_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match last {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        s => s.to_string(),
    }
}
