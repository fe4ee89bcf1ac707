/// Deletion execution for finished scopes
///
/// The engine only decides what to delete; a `DeletionGateway` performs it.
/// A batch either succeeds as a whole or leaves every file in place.
use chrono::Utc;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task;
use tracing::{info, warn};

use super::scan::live_photo_companion;
use crate::state::data::{DeletionBatch, MediaId, MediaKind};

/// Errors raised while executing a deletion batch
#[derive(Debug, Error)]
pub enum DeletionError {
    /// The item has no file to remove.
    #[error("media {0} has no source path")]
    MissingPath(MediaId),

    /// A file could not be moved; the batch was rolled back.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deletion task failed: {0}")]
    Task(String),
}

impl DeletionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Performs the actual bulk removal of a batch.
///
/// Implementations are all-or-nothing: on error no requested item may be
/// gone, so the caller can retry the same batch verbatim.
pub trait DeletionGateway: Send + Sync {
    fn delete(&self, batch: &DeletionBatch) -> impl Future<Output = Result<(), DeletionError>> + Send;
}

/// Deletes files by first moving them into a staging directory.
///
/// Staging must live on the same file system as the media so every move
/// is a rename. If any move fails, earlier moves are undone.
#[derive(Debug, Clone)]
pub struct FileDeletionGateway {
    staging_root: PathBuf,
}

impl FileDeletionGateway {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }
}

impl DeletionGateway for FileDeletionGateway {
    fn delete(&self, batch: &DeletionBatch) -> impl Future<Output = Result<(), DeletionError>> + Send {
        let staging = self
            .staging_root
            .join(format!("batch-{}", Utc::now().format("%Y%m%d%H%M%S%f")));
        let files = files_to_remove(batch);
        let scope = batch.scope.clone();

        async move {
            let files = files?;
            let count = files.len();
            task::spawn_blocking(move || remove_all_or_nothing(&files, &staging))
                .await
                .map_err(|e| DeletionError::Task(e.to_string()))??;

            info!(scope = %scope, files = count, "deletion batch executed");
            Ok(())
        }
    }
}

/// Every file backing the batch, including live photo motion clips
fn files_to_remove(batch: &DeletionBatch) -> Result<Vec<PathBuf>, DeletionError> {
    let mut files = Vec::with_capacity(batch.len());
    for item in &batch.items {
        let path = item
            .path
            .clone()
            .ok_or_else(|| DeletionError::MissingPath(item.id.clone()))?;
        match &item.companion {
            Some(clip) => files.push(clip.clone()),
            None if item.kind == MediaKind::LivePhoto => files.extend(live_photo_companion(&path)),
            None => {}
        }
        files.push(path);
    }
    Ok(files)
}

fn remove_all_or_nothing(files: &[PathBuf], staging: &Path) -> Result<(), DeletionError> {
    fs::create_dir_all(staging).map_err(|e| DeletionError::io(staging, e))?;

    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for (i, source) in files.iter().enumerate() {
        let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let staged = staging.join(format!("{i:06}-{name}"));

        if let Err(e) = fs::rename(source, &staged) {
            rollback(&moved);
            let _ = fs::remove_dir(staging);
            return Err(DeletionError::io(source, e));
        }
        moved.push((source.clone(), staged));
    }

    // Everything is staged; from here the batch counts as removed
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!(path = %staging.display(), error = %e, "staged files could not be purged");
    }
    Ok(())
}

fn rollback(moved: &[(PathBuf, PathBuf)]) {
    for (original, staged) in moved.iter().rev() {
        if let Err(e) = fs::rename(staged, original) {
            warn!(
                original = %original.display(),
                staged = %staged.display(),
                error = %e,
                "failed to restore staged file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::scan::scan_folder;
    use crate::state::data::{MediaRef, ScopeId};

    fn batch_of(paths: &[PathBuf]) -> DeletionBatch {
        DeletionBatch {
            scope: ScopeId::new("2024-1"),
            items: paths
                .iter()
                .enumerate()
                .map(|(i, p)| MediaRef::new(format!("{i}"), i, 1, MediaKind::Photo).with_path(p))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_removes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let gateway = FileDeletionGateway::new(dir.path().join(".staging"));
        gateway.delete(&batch_of(&[a.clone(), b.clone()])).await.unwrap();

        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test]
    async fn test_failure_restores_moved_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        fs::write(&a, b"a").unwrap();
        let missing = dir.path().join("missing.jpg");

        let gateway = FileDeletionGateway::new(dir.path().join(".staging"));
        let err = gateway.delete(&batch_of(&[a.clone(), missing])).await.unwrap_err();

        assert!(matches!(err, DeletionError::Io { .. }));
        assert_eq!(fs::read(&a).unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_live_photo_takes_its_clip() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("IMG_7.heic");
        let clip = dir.path().join("IMG_7.mov");
        fs::write(&still, b"still").unwrap();
        fs::write(&clip, b"clip").unwrap();

        let batch = DeletionBatch {
            scope: ScopeId::new("2024-1"),
            items: vec![MediaRef::new("IMG_7", 0, 2, MediaKind::LivePhoto).with_path(&still)],
        };
        FileDeletionGateway::new(dir.path().join(".staging"))
            .delete(&batch)
            .await
            .unwrap();

        assert!(!still.exists());
        assert!(!clip.exists());
    }

    #[tokio::test]
    async fn test_scanned_live_photo_clip_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("img_1.jpg");
        let clip = dir.path().join("IMG_1.MOV");
        fs::write(&still, b"still").unwrap();
        fs::write(&clip, b"clip").unwrap();

        let scopes = scan_folder(dir.path());
        assert_eq!(scopes.len(), 1);
        let batch = DeletionBatch {
            scope: scopes[0].id().clone(),
            items: scopes[0].collection.items().to_vec(),
        };
        assert_eq!(batch.len(), 1);

        FileDeletionGateway::new(dir.path().join(".staging"))
            .delete(&batch)
            .await
            .unwrap();

        assert!(!still.exists());
        assert!(!clip.exists());
    }

    #[tokio::test]
    async fn test_item_without_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let batch = DeletionBatch {
            scope: ScopeId::new("2024-1"),
            items: vec![MediaRef::new("cloud-only", 0, 1, MediaKind::Photo)],
        };

        let err = FileDeletionGateway::new(dir.path())
            .delete(&batch)
            .await
            .unwrap_err();

        assert!(matches!(err, DeletionError::MissingPath(_)));
    }
}
