//! Per-job file ownership.
//!
//! A [`JobWorkspace`] records every file a job creates, in creation order,
//! before anything is written to it. Dropping the workspace deletes them
//! all, so a job that fails, panics or is aborted leaves nothing behind.
//! The single surviving file is handed out as a [`ResultArtifact`].
//!
//! Directory setup and release use blocking `std::fs` calls, including on
//! async tasks, because release must also run from `Drop`. A job owns a
//! handful of files, so each call is a few unlinks; move release onto
//! `spawn_blocking` if jobs ever keep many more.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{StoreError, StoreResult};
use super::result::ResultArtifact;
use super::WorkspaceConfig;

/// Files owned by one job.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: String,
    dir: PathBuf,
    config: Arc<WorkspaceConfig>,
    /// Intermediates and the pending result, in creation order.
    artifacts: Vec<PathBuf>,
    /// Staged uploads for this job.
    uploads: Vec<PathBuf>,
    seq: u32,
    closed: bool,
}

impl JobWorkspace {
    pub(super) fn create(job_id: &str, config: Arc<WorkspaceConfig>) -> StoreResult<Self> {
        let dir = config.work_dir.join(job_id);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("creating {}", dir.display()), e))?;
        fs::create_dir_all(&config.outputs_dir)
            .map_err(|e| StoreError::io("creating outputs directory", e))?;

        Ok(Self {
            job_id: job_id.to_string(),
            dir,
            config,
            artifacts: Vec::new(),
            uploads: Vec::new(),
            seq: 0,
            closed: false,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Directory holding this job's intermediates.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Every artifact path allocated so far, oldest first.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Upload paths staged for this job.
    pub fn uploads(&self) -> &[PathBuf] {
        &self.uploads
    }

    /// Reserve a path for an intermediate produced by `stage`.
    ///
    /// Names are `NN-<stage>.<ext>` inside the job directory. The path is
    /// tracked immediately, so a partial file left by a failing engine
    /// call is still cleaned up.
    pub fn allocate(&mut self, stage: &str, ext: &str) -> PathBuf {
        self.seq += 1;
        let path = self
            .dir
            .join(format!("{:02}-{}.{}", self.seq, sanitize_component(stage), ext));
        self.artifacts.push(path.clone());
        path
    }

    /// Reserve the path of the final output (`<outputs>/<job_id>-mixed.<ext>`).
    pub fn allocate_result(&mut self, ext: &str) -> PathBuf {
        let path = self
            .config
            .outputs_dir
            .join(format!("{}-mixed.{}", self.job_id, ext));
        self.artifacts.push(path.clone());
        path
    }

    /// Allocate an intermediate and write `contents` to it.
    pub async fn write_artifact(
        &mut self,
        stage: &str,
        ext: &str,
        contents: &str,
    ) -> StoreResult<PathBuf> {
        let path = self.allocate(stage, ext);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StoreError::io(format!("writing {}", path.display()), e))?;
        Ok(path)
    }

    /// Reserve the path for an upload in `slot`.
    pub(super) fn allocate_upload(&mut self, slot: &str, ext: &str) -> PathBuf {
        let path = self
            .config
            .uploads_dir
            .join(format!("{}-{}.{}", self.job_id, slot, ext));
        self.uploads.push(path.clone());
        path
    }

    /// Close the job, keeping `path` as its result.
    ///
    /// Every other artifact is deleted now. `path` must have come from
    /// [`allocate_result`](Self::allocate_result) or [`allocate`](Self::allocate).
    pub fn into_result(mut self, path: &Path) -> ResultArtifact {
        self.artifacts.retain(|p| p != path);
        self.release();
        ResultArtifact::new(&self.job_id, path.to_path_buf(), self.config.result_grace)
    }

    /// Delete everything the job still owns. Safe to call more than once.
    ///
    /// Returns the number of files removed.
    pub fn release(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;

        let mut removed = 0;
        for path in self.artifacts.drain(..) {
            removed += remove_if_present(&path) as usize;
        }
        if self.config.remove_uploads {
            for path in self.uploads.drain(..) {
                removed += remove_if_present(&path) as usize;
            }
        }
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                tracing::warn!("Could not remove {}: {}", self.dir.display(), e);
            }
        }

        tracing::debug!("Job {} released {} file(s)", self.job_id, removed);
        removed
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        self.release();
    }
}

/// Remove a file, treating "already gone" as success.
pub(super) fn remove_if_present(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Could not delete {}: {}", path.display(), e);
            false
        }
    }
}

/// Keep names to `[A-Za-z0-9_-]`.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}
