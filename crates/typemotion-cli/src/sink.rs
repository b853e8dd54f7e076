//! Download sink writing into a local directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use typemotion::{DownloadSink, MediaResource, TypeMotionError, TypeMotionResult};

/// Saves downloads as files under one directory, created on first use
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, resource: &MediaResource, file_name: &str) -> TypeMotionResult<PathBuf> {
        let failed = |e: std::io::Error| TypeMotionError::SinkFailed {
            file_name: file_name.to_string(),
            message: e.to_string(),
        };

        // only the final component of the suggested name is used
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| TypeMotionError::SinkFailed {
                file_name: file_name.to_string(),
                message: "not a file name".to_string(),
            })?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(failed)?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, resource.bytes())
            .await
            .map_err(failed)?;

        tracing::debug!(path = %path.display(), bytes = resource.len(), "download written");
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path().join("nested/out"));
        let resource = MediaResource::new(vec![1u8, 2, 3], "video/mp4");

        let path = sink.save(&resource, "typemotion-1.mp4").await.unwrap();
        assert_eq!(path, tmp.path().join("nested/out/typemotion-1.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_save_strips_directories_from_name() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path());
        let resource = MediaResource::new(vec![9u8], "image/gif");

        let path = sink.save(&resource, "../escape.gif").await.unwrap();
        assert_eq!(path, tmp.path().join("escape.gif"));
    }

    #[tokio::test]
    async fn test_unwritable_target_is_sink_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = DirectorySink::new(blocker.join("sub"));

        let result = sink
            .save(&MediaResource::new(vec![1u8], "video/mp4"), "a.mp4")
            .await;
        assert!(matches!(result, Err(TypeMotionError::SinkFailed { .. })));
    }
}
