//! Error taxonomy for the copy pipeline.
//!
//! Every filesystem failure is translated into one of these variants at the
//! boundary of the phase that produced it (validate, stage, copy, finalize).
//! Cancellation is not an error and is reported through the operation outcome.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::error_codes;

/// Result type for copy pipeline operations.
pub type CopierResult<T> = Result<T, CopierError>;

/// Errors produced while validating, staging, copying or restoring.
#[derive(Debug, Error)]
pub enum CopierError {
    /// The source folder does not exist.
    #[error("Source folder does not exist: {}", path.display())]
    SourceNotFound {
        /// Source path as supplied by the caller.
        path: PathBuf,
    },
    /// The source exists but is not a directory.
    #[error("Source path is not a directory: {}", path.display())]
    SourceNotDirectory {
        /// Source path as supplied by the caller.
        path: PathBuf,
    },
    /// Source and destination resolve to the same folder.
    #[error("Source and destination cannot be the same folder: {}", path.display())]
    SameFolder {
        /// Resolved absolute path shared by both sides.
        path: PathBuf,
    },
    /// One path lies inside the other.
    #[error(
        "Source and destination cannot be nested: {} and {}",
        source_path.display(),
        destination.display()
    )]
    NestedPaths {
        /// Resolved source path.
        source_path: PathBuf,
        /// Resolved destination path.
        destination: PathBuf,
    },
    /// The source is (or lives inside) the backup slot that staging would delete.
    #[error(
        "Source {} overlaps the backup location {}",
        source_path.display(),
        backup.display()
    )]
    BackupOverlap {
        /// Resolved source path.
        source_path: PathBuf,
        /// Backup path derived from the destination.
        backup: PathBuf,
    },
    /// Network mode is enabled and the host did not answer.
    #[error("Cannot connect to network location: {host}")]
    NetworkUnreachable {
        /// Host that was probed.
        host: String,
    },
    /// Network mode is enabled but no host was configured.
    #[error("Network mode is enabled but no network host is configured")]
    MissingNetworkHost,
    /// A user-supplied value failed syntactic validation.
    #[error("Invalid {field}: {reason}")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Another copy operation is already in flight.
    #[error("A copy operation is already running")]
    AlreadyRunning,
    /// Rotating the existing destination out of the way failed.
    #[error("Error handling existing destination ({operation} {}): {source}", path.display())]
    Backup {
        /// Step that failed.
        operation: &'static str,
        /// Path the step was acting on.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A file or directory could not be copied.
    #[error("Failed to copy {}: {source}", path.display())]
    Copy {
        /// Source path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The rollback after a failed copy itself failed. Manual recovery is required.
    #[error(
        "{cause}; restoring {} from {} also failed: {source}. Your previous data is still at {}",
        target.display(),
        backup.display(),
        backup.display()
    )]
    Restore {
        /// Rendered description of the failure that triggered the restore.
        cause: String,
        /// Destination that should have been restored.
        target: PathBuf,
        /// Backup that still holds the previous generation.
        backup: PathBuf,
        /// Underlying IO error from the restore step.
        source: io::Error,
    },
}

impl CopierError {
    /// Stable machine-readable code for the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceNotFound { .. } => error_codes::ERR_SOURCE_NOT_FOUND,
            Self::SourceNotDirectory { .. } => error_codes::ERR_SOURCE_NOT_DIRECTORY,
            Self::SameFolder { .. } => error_codes::ERR_SAME_FOLDER,
            Self::NestedPaths { .. } => error_codes::ERR_NESTED_PATHS,
            Self::BackupOverlap { .. } => error_codes::ERR_BACKUP_OVERLAP,
            Self::NetworkUnreachable { .. } => error_codes::ERR_NETWORK_UNREACHABLE,
            Self::MissingNetworkHost => error_codes::ERR_NETWORK_HOST_MISSING,
            Self::InvalidInput { .. } => error_codes::ERR_INVALID_INPUT,
            Self::AlreadyRunning => error_codes::ERR_ALREADY_RUNNING,
            Self::Backup { .. } => error_codes::ERR_BACKUP_FAILED,
            Self::Copy { .. } => error_codes::ERR_COPY_FAILED,
            Self::Restore { .. } => error_codes::ERR_RESTORE_FAILED,
        }
    }

    /// True for failures detected before any filesystem mutation.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceNotDirectory { .. }
                | Self::SameFolder { .. }
                | Self::NestedPaths { .. }
                | Self::BackupOverlap { .. }
                | Self::NetworkUnreachable { .. }
                | Self::MissingNetworkHost
                | Self::InvalidInput { .. }
                | Self::AlreadyRunning
        )
    }

    /// Only a failed restore leaves the user's data under an unexpected name.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Restore { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_kind() {
        let same = CopierError::SameFolder {
            path: PathBuf::from("/data"),
        };
        let copy = CopierError::Copy {
            path: PathBuf::from("/data/a.txt"),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };

        assert_eq!(same.code(), "ERR_SAME_FOLDER");
        assert_eq!(copy.code(), "ERR_COPY_FAILED");
        assert!(same.is_precondition());
        assert!(!copy.is_precondition());
    }

    #[test]
    fn test_only_restore_is_fatal() {
        let restore = CopierError::Restore {
            cause: "Failed to copy b.txt".to_string(),
            target: PathBuf::from("/dst"),
            backup: PathBuf::from("/dst_old"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        let backup = CopierError::Backup {
            operation: "rename",
            path: PathBuf::from("/dst"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        assert!(restore.is_fatal());
        assert!(!backup.is_fatal());

        let message = restore.to_string();
        assert!(message.contains("Failed to copy b.txt"));
        assert!(message.contains("/dst_old"));
    }
}
