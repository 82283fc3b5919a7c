//! 기존 대상 폴더의 백업(회전) 및 복원 관리 모듈
//!
//! `target`이 이미 존재하면 `target_old`로 이름을 바꿔 두고, 복사가 실패하면
//! 다시 원래 이름으로 되돌립니다. 백업은 한 세대만 유지합니다.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{CopierError, CopierResult};

/// Suffix appended to the destination name for the retained generation.
pub const BACKUP_SUFFIX: &str = "_old";

/// Where the staging/finalize state machine currently stands.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupPhase {
    None,
    OldBackupRemoved,
    Rotated,
    Copying,
    Complete,
    Restored,
}

/// Per-operation staging state. Never persisted.
#[derive(Debug, Clone)]
pub struct BackupState {
    pub target: PathBuf,
    pub backup: PathBuf,
    pub phase: BackupPhase,
    rotated: bool,
}

/// `target` with `_old` appended to its final component.
pub fn backup_path_for(target: &Path) -> PathBuf {
    let mut name: OsString = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    target.with_file_name(name)
}

/// `symlink_metadata` based existence check; a dangling symlink still counts.
async fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Remove a file, symlink or directory tree.
async fn remove_any(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

impl BackupState {
    /// 대상 경로를 준비합니다.
    ///
    /// Deletes any previous `_old` generation, then renames an existing
    /// `target` to `_old`. A failure here aborts before any new data is
    /// written and leaves whatever the failing call produced.
    pub async fn stage(target: &Path) -> CopierResult<Self> {
        let backup = backup_path_for(target);
        let mut state = Self {
            target: target.to_path_buf(),
            backup,
            phase: BackupPhase::None,
            rotated: false,
        };

        if path_exists(&state.backup).await {
            remove_any(&state.backup)
                .await
                .map_err(|source| CopierError::Backup {
                    operation: "remove previous backup",
                    path: state.backup.clone(),
                    source,
                })?;
            info!(backup = %state.backup.display(), "deleted existing backup");
            state.phase = BackupPhase::OldBackupRemoved;
        }

        if path_exists(&state.target).await {
            fs::rename(&state.target, &state.backup)
                .await
                .map_err(|source| CopierError::Backup {
                    operation: "rename destination to backup",
                    path: state.target.clone(),
                    source,
                })?;
            info!(
                target = %state.target.display(),
                backup = %state.backup.display(),
                "rotated existing destination"
            );
            state.phase = BackupPhase::Rotated;
            state.rotated = true;
        } else {
            state.phase = BackupPhase::None;
        }

        Ok(state)
    }

    /// Whether staging moved an existing destination aside.
    pub fn rotated(&self) -> bool {
        self.rotated
    }

    /// The retained generation, if this operation produced one.
    pub fn retained_backup(&self) -> Option<&Path> {
        self.rotated.then_some(self.backup.as_path())
    }

    pub fn begin_copy(&mut self) {
        self.phase = BackupPhase::Copying;
    }

    /// Mark the copy as committed; the backup stays as the retained generation.
    pub fn complete(&mut self) {
        self.phase = BackupPhase::Complete;
    }

    /// 복사 결과에 따라 백업을 유지하거나 복원합니다.
    ///
    /// On success the backup is left in place. On failure the partial tree
    /// at `target` is removed and, when a rotation happened, the backup is
    /// renamed back. `cause` describes the failure for the compound error
    /// returned when the restore itself fails.
    pub async fn finalize(&mut self, copy_succeeded: bool, cause: &str) -> CopierResult<()> {
        if copy_succeeded {
            self.complete();
            return Ok(());
        }

        if matches!(self.phase, BackupPhase::Complete | BackupPhase::Restored) {
            return Ok(());
        }

        let restore_err = |source: io::Error, state: &Self| CopierError::Restore {
            cause: cause.to_string(),
            target: state.target.clone(),
            backup: state.backup.clone(),
            source,
        };

        if self.rotated && !path_exists(&self.backup).await {
            return Err(restore_err(
                io::Error::new(io::ErrorKind::NotFound, "backup folder is missing"),
                &*self,
            ));
        }

        // Anything at target now was written by this operation.
        if path_exists(&self.target).await {
            if let Err(source) = remove_any(&self.target).await {
                warn!(target = %self.target.display(), error = %source, "failed to discard partial copy");
                return Err(restore_err(source, &*self));
            }
        }

        if self.rotated {
            if let Err(source) = fs::rename(&self.backup, &self.target).await {
                warn!(
                    backup = %self.backup.display(),
                    target = %self.target.display(),
                    error = %source,
                    "restore rename failed"
                );
                return Err(restore_err(source, &*self));
            }
            info!(target = %self.target.display(), "restored previous destination from backup");
        } else {
            info!(target = %self.target.display(), "discarded partial copy");
        }

        self.phase = BackupPhase::Restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path_for(Path::new("/mnt/share/Reports")),
            PathBuf::from("/mnt/share/Reports_old")
        );
        assert_eq!(
            backup_path_for(Path::new("relative/dir")),
            PathBuf::from("relative/dir_old")
        );
    }

    #[tokio::test]
    async fn test_stage_without_existing_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");

        let state = BackupState::stage(&target).await.unwrap();
        assert_eq!(state.phase, BackupPhase::None);
        assert!(!state.rotated());
        assert!(state.retained_backup().is_none());
        assert!(!state.backup.exists());
    }

    #[tokio::test]
    async fn test_stage_rotates_and_drops_older_generation() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");
        let backup = temp.path().join("dst_old");
        std::fs::create_dir_all(target.join("sub")).unwrap();
        std::fs::write(target.join("sub/current.txt"), "current").unwrap();
        std::fs::create_dir_all(&backup).unwrap();
        std::fs::write(backup.join("ancient.txt"), "ancient").unwrap();

        let state = BackupState::stage(&target).await.unwrap();

        assert_eq!(state.phase, BackupPhase::Rotated);
        assert!(!target.exists());
        assert!(!backup.join("ancient.txt").exists());
        assert_eq!(
            std::fs::read_to_string(backup.join("sub/current.txt")).unwrap(),
            "current"
        );
    }

    #[tokio::test]
    async fn test_stage_removes_backup_that_is_a_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");
        std::fs::write(temp.path().join("dst_old"), "stray file").unwrap();

        let state = BackupState::stage(&target).await.unwrap();
        assert_eq!(state.phase, BackupPhase::None);
        assert!(!temp.path().join("dst_old").exists());
    }

    #[tokio::test]
    async fn test_finalize_success_keeps_backup() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");
        std::fs::create_dir(&target).unwrap();

        let mut state = BackupState::stage(&target).await.unwrap();
        state.begin_copy();
        std::fs::create_dir(&target).unwrap();
        state.complete();

        assert_eq!(state.phase, BackupPhase::Complete);
        // A late failure report after commit must not undo it.
        state.finalize(false, "late").await.unwrap();
        assert_eq!(state.phase, BackupPhase::Complete);
        assert!(target.exists());
        assert!(temp.path().join("dst_old").exists());
    }

    #[tokio::test]
    async fn test_finalize_failure_restores_previous_content() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.txt"), "previous").unwrap();

        let mut state = BackupState::stage(&target).await.unwrap();
        state.begin_copy();
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("partial.txt"), "half").unwrap();

        state.finalize(false, "copy failed").await.unwrap();

        assert_eq!(state.phase, BackupPhase::Restored);
        assert_eq!(
            std::fs::read_to_string(target.join("keep.txt")).unwrap(),
            "previous"
        );
        assert!(!target.join("partial.txt").exists());
        assert!(!temp.path().join("dst_old").exists());
    }

    #[tokio::test]
    async fn test_finalize_failure_without_rotation_discards_partial() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");

        let mut state = BackupState::stage(&target).await.unwrap();
        state.begin_copy();
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("partial.txt"), "half").unwrap();

        state.finalize(false, "copy failed").await.unwrap();
        assert_eq!(state.phase, BackupPhase::Restored);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_finalize_reports_fatal_when_backup_vanished() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("dst");
        std::fs::create_dir(&target).unwrap();

        let mut state = BackupState::stage(&target).await.unwrap();
        state.begin_copy();
        std::fs::remove_dir_all(&state.backup).unwrap();

        let err = state.finalize(false, "Failed to copy a.txt").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Failed to copy a.txt"));
        assert_eq!(state.phase, BackupPhase::Copying);
    }
}
