//! Artifact store: staged uploads, per-job intermediates and results.
//!
//! Layout, with every name derived from the job id:
//!
//! ```text
//! <uploads>/<job_id>-primary.mp3
//! <work>/<job_id>/01-gain.wav
//! <work>/<job_id>/02-concat-list.txt
//! <outputs>/<job_id>-mixed.aac
//! ```
//!
//! Jobs never share names, so the store needs no locking.

mod error;
mod result;
mod upload;
mod workspace;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::config::Settings;
use crate::models::{AudioStream, InputRole};

pub use error::{StoreError, StoreResult};
pub use result::ResultArtifact;
pub use upload::{is_acceptable_content_type, InputStream};
pub use workspace::JobWorkspace;

/// Storage locations and retention rules.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub uploads_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub work_dir: PathBuf,
    /// Delete staged uploads when their job closes.
    pub remove_uploads: bool,
    /// How long an unconfirmed result survives its dropped guard.
    pub result_grace: Duration,
}

impl WorkspaceConfig {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        outputs_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            outputs_dir: outputs_dir.into(),
            work_dir: work_dir.into(),
            remove_uploads: true,
            result_grace: Duration::from_secs(300),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            uploads_dir: settings.paths.uploads_dir(),
            outputs_dir: settings.paths.outputs_dir(),
            work_dir: settings.paths.work_dir(),
            remove_uploads: settings.cleanup.remove_uploads,
            result_grace: settings.cleanup.result_grace(),
        }
    }

    pub fn with_result_grace(mut self, grace: Duration) -> Self {
        self.result_grace = grace;
        self
    }

    pub fn with_remove_uploads(mut self, remove: bool) -> Self {
        self.remove_uploads = remove;
        self
    }
}

/// Entry point to job-scoped storage.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: Arc<WorkspaceConfig>,
}

impl ArtifactStore {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Create the three storage directories.
    pub fn ensure_dirs(&self) -> StoreResult<()> {
        for dir in [
            &self.config.uploads_dir,
            &self.config.outputs_dir,
            &self.config.work_dir,
        ] {
            fs::create_dir_all(dir)
                .map_err(|e| StoreError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }

    /// Open the workspace of a new job.
    pub fn open_job(&self, job_id: &str) -> StoreResult<JobWorkspace> {
        JobWorkspace::create(job_id, Arc::clone(&self.config))
    }

    /// Stage an upload for `slot` and return it as a source stream.
    ///
    /// The file is tracked by `job` before the first byte is written, so a
    /// rejected or interrupted upload is removed with the job.
    pub async fn ingest(
        &self,
        job: &mut JobWorkspace,
        slot: InputRole,
        mut upload: InputStream,
    ) -> StoreResult<AudioStream> {
        if let Some(content_type) = upload.content_type() {
            if !is_acceptable_content_type(content_type) {
                return Err(StoreError::UnsupportedType {
                    slot,
                    content_type: content_type.to_string(),
                });
            }
        }

        fs::create_dir_all(&self.config.uploads_dir)
            .map_err(|e| StoreError::io("creating uploads directory", e))?;

        let ext = upload.extension();
        let path = job.allocate_upload(slot.label(), &ext);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StoreError::io(format!("creating {}", path.display()), e))?;
        let written = tokio::io::copy(upload.reader_mut(), &mut file)
            .await
            .map_err(|e| StoreError::io(format!("staging {} upload", slot), e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::io(format!("staging {} upload", slot), e))?;

        if written == 0 {
            return Err(StoreError::EmptyUpload { slot });
        }

        tracing::debug!(
            "Staged {} upload '{}' ({} bytes) as {}",
            slot,
            upload.name(),
            written,
            path.display()
        );
        Ok(AudioStream::source(path))
    }

    /// Every file currently on disk that belongs to `job_id`.
    pub fn job_artifacts(&self, job_id: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(&self.config.work_dir.join(job_id), None, &mut found);
        collect_files(&self.config.outputs_dir, Some(job_id), &mut found);
        collect_files(&self.config.uploads_dir, Some(job_id), &mut found);
        found.sort();
        found
    }
}

fn collect_files(dir: &Path, prefix: Option<&str>, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = match prefix {
            Some(prefix) => entry.file_name().to_string_lossy().starts_with(prefix),
            None => true,
        };
        if matches {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreamOrigin;
    use tempfile::tempdir;

    fn store_in(root: &Path) -> ArtifactStore {
        ArtifactStore::new(WorkspaceConfig::new(
            root.join("up"),
            root.join("out"),
            root.join("work"),
        ))
    }

    #[tokio::test]
    async fn ingest_stages_under_job_name() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut job = store.open_job("job-1").unwrap();

        let upload = InputStream::from_bytes("My Song.mp3", b"ID3data".to_vec())
            .with_content_type("audio/mpeg");
        let stream = store.ingest(&mut job, InputRole::Primary, upload).await.unwrap();

        assert_eq!(stream.origin(), StreamOrigin::Source);
        assert_eq!(stream.path(), dir.path().join("up").join("job-1-primary.mp3"));
        assert_eq!(fs::read(stream.path()).unwrap(), b"ID3data");
    }

    #[tokio::test]
    async fn ingest_rejects_empty_and_mistyped() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut job = store.open_job("job-2").unwrap();

        let empty = InputStream::from_bytes("a.wav", Vec::new());
        let err = store.ingest(&mut job, InputRole::Primary, empty).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyUpload { .. }));

        let text =
            InputStream::from_bytes("b.txt", b"hello".to_vec()).with_content_type("text/plain");
        let err = store.ingest(&mut job, InputRole::Secondary, text).await.unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedType { .. }));

        drop(job);
        assert!(store.job_artifacts("job-2").is_empty());
    }

    #[tokio::test]
    async fn uploads_survive_when_configured() {
        let dir = tempdir().unwrap();
        let config = WorkspaceConfig::new(
            dir.path().join("up"),
            dir.path().join("out"),
            dir.path().join("work"),
        )
        .with_remove_uploads(false);
        let store = ArtifactStore::new(config);
        let mut job = store.open_job("job-3").unwrap();
        let upload = InputStream::from_bytes("a.wav", b"RIFF".to_vec());
        let stream = store.ingest(&mut job, InputRole::Primary, upload).await.unwrap();

        drop(job);
        assert!(stream.path().exists());
    }

    #[test]
    fn job_artifacts_ignores_other_jobs() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_dirs().unwrap();
        fs::write(dir.path().join("out").join("job-x-mixed.aac"), b"x").unwrap();
        fs::write(dir.path().join("out").join("job-y-mixed.aac"), b"y").unwrap();

        let found = store.job_artifacts("job-x");
        assert_eq!(found, vec![dir.path().join("out").join("job-x-mixed.aac")]);
    }

    #[test]
    fn config_from_settings() {
        let mut settings = Settings::default();
        settings.cleanup.result_grace_secs = 7;
        settings.cleanup.remove_uploads = false;
        let config = WorkspaceConfig::from_settings(&settings);
        assert_eq!(config.result_grace, Duration::from_secs(7));
        assert!(!config.remove_uploads);
        assert_eq!(config.outputs_dir, PathBuf::from("output"));
    }
}
