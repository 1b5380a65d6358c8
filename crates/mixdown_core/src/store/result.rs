//! Download reference for a finished job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::workspace::remove_if_present;

/// The mixed output of a successful job.
///
/// The file is deleted when the caller confirms delivery. If the guard is
/// dropped unconfirmed, deletion is scheduled after the grace period on
/// the current tokio runtime. It happens immediately when there is no
/// runtime, and at shutdown if the runtime stops first.
/// [`persist`](Self::persist) hands the file over to the caller instead.
#[derive(Debug)]
pub struct ResultArtifact {
    job_id: String,
    path: PathBuf,
    grace: Duration,
    armed: bool,
}

impl ResultArtifact {
    pub(super) fn new(job_id: &str, path: PathBuf, grace: Duration) -> Self {
        Self {
            job_id: job_id.to_string(),
            path,
            grace,
            armed: true,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Location of the mixed output.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the output in bytes.
    pub async fn size_bytes(&self) -> StoreResult<u64> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .map_err(|e| StoreError::io("reading result metadata", e))
    }

    /// Read the whole output. May be called any number of times before
    /// delivery is confirmed.
    pub async fn read(&self) -> StoreResult<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::io(format!("reading {}", self.path.display()), e))
    }

    /// Copy the output to `dest`, returning the number of bytes copied.
    pub async fn copy_to(&self, dest: &Path) -> StoreResult<u64> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io("creating destination directory", e))?;
        }
        tokio::fs::copy(&self.path, dest)
            .await
            .map_err(|e| StoreError::io(format!("copying result to {}", dest.display()), e))
    }

    /// The caller has the bytes; delete the output now.
    pub fn confirm_delivery(mut self) {
        self.armed = false;
        remove_if_present(&self.path);
        tracing::debug!("Job {} result delivered and removed", self.job_id);
    }

    /// Keep the output on disk and give up ownership of it.
    pub fn persist(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ResultArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let path = std::mem::take(&mut self.path);
        if self.grace.is_zero() {
            remove_if_present(&path);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let grace = self.grace;
                let expiry = Expiry {
                    job_id: self.job_id.clone(),
                    path,
                };
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    drop(expiry);
                });
            }
            Err(_) => {
                remove_if_present(&path);
            }
        }
    }
}

/// Deletes an unclaimed result when dropped.
///
/// Owned by the grace task, so the file also goes when the runtime shuts
/// down and cancels the task before the grace period ends.
struct Expiry {
    job_id: String,
    path: PathBuf,
}

impl Drop for Expiry {
    fn drop(&mut self) {
        if remove_if_present(&self.path) {
            tracing::info!("Job {} result removed unclaimed", self.job_id);
        }
    }
}
