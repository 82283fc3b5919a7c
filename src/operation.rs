//! One backup-rotate-copy operation from validation to its terminal outcome.
//!
//! `IDLE → VALIDATING → STAGING → COPYING → {SUCCEEDED | FAILED_RESTORED |
//! FAILED_UNRESTORED | CANCELLED}`, plus `REJECTED` for precondition failures
//! where nothing was touched. Exactly one [`OperationResult`] is produced.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::backup::BackupState;
use crate::copy_engine::{
    CopyEngine, CopyOptions, CopyOutcome, FileCopier, OperationPhase, ProgressEvent,
};
use crate::error::{CopierError, CopierResult};
use crate::logging::{LogCategory, LogLevel, LogManager};
use crate::network_probe::NetworkProbe;
use crate::path_validation::{resolve_path, validate};

/// Where the new copy lands relative to the configured destination.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// The destination path is the copy itself.
    #[default]
    Exact,
    /// The copy goes to `destination/<source folder name>`.
    Nested,
}

/// What to do with the destination when the user cancels mid-copy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Leave the partial copy and the `_old` backup where they are.
    #[default]
    KeepPartial,
    /// Discard the partial copy and rename the backup back.
    Restore,
}

/// Immutable input to one operation, snapshotted at start.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub placement: Placement,
    pub network_mode: bool,
    pub network_host: Option<String>,
    pub cancel_policy: CancelPolicy,
    pub options: CopyOptions,
    pub cancel: CancellationToken,
}

impl CopyRequest {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            placement: Placement::default(),
            network_mode: false,
            network_host: None,
            cancel_policy: CancelPolicy::default(),
            options: CopyOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_network_host(mut self, host: impl Into<String>) -> Self {
        self.network_mode = true;
        self.network_host = Some(host.into());
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Final path the new copy is written to.
    pub fn target(&self) -> CopierResult<PathBuf> {
        match self.placement {
            Placement::Exact => Ok(self.destination.clone()),
            Placement::Nested => {
                let name = match self.source.file_name() {
                    Some(name) => name.to_os_string(),
                    None => resolve_path(&self.source)
                        .ok()
                        .and_then(|p| p.file_name().map(|n| n.to_os_string()))
                        .ok_or(CopierError::InvalidInput {
                            field: "source_path",
                            reason: "has no folder name to nest under the destination",
                        })?,
                };
                Ok(self.destination.join(name))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Succeeded,
    FailedRestored,
    FailedUnrestored,
    Cancelled,
    Rejected,
}

/// The single terminal value of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    pub state: TerminalState,
    /// Error code from [`crate::error_codes`] when the operation failed.
    pub code: Option<String>,
    pub target: Option<PathBuf>,
    /// The retained previous generation, when one exists after the operation.
    pub backup: Option<PathBuf>,
    pub files_copied: u64,
}

impl OperationResult {
    pub(crate) fn rejected(err: &CopierError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            state: TerminalState::Rejected,
            code: Some(err.code().to_string()),
            target: None,
            backup: None,
            files_copied: 0,
        }
    }

    fn failed(err: &CopierError, state: TerminalState, target: &Path, files_copied: u64) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            state,
            code: Some(err.code().to_string()),
            target: Some(target.to_path_buf()),
            backup: None,
            files_copied,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.code.as_deref() == Some(crate::error_codes::ERR_RESTORE_FAILED)
    }
}

/// Run the whole operation on the current task.
///
/// Never panics on filesystem errors and never returns early without a
/// result: every failure is mapped to a terminal state. `on_progress` is not
/// called again once this function returns.
pub async fn run_operation<P, C, F>(
    request: &CopyRequest,
    probe: &P,
    copier: &C,
    log: &LogManager,
    operation_id: &str,
    on_progress: F,
) -> OperationResult
where
    P: NetworkProbe,
    C: FileCopier,
    F: Fn(ProgressEvent) + Send + Sync,
{
    let journal = |level: LogLevel, category: LogCategory, message: String| {
        log.log(level, category, &message, Some(operation_id.to_string()));
    };

    on_progress(ProgressEvent::phase_only(
        OperationPhase::Validating,
        "Validating paths...",
    ));

    let requested = match request.target() {
        Ok(target) => target,
        Err(err) => {
            journal(LogLevel::Error, LogCategory::Validation, err.to_string());
            return OperationResult::rejected(&err);
        }
    };

    // Everything below works on the resolved path the checks were made against.
    let target = match validate(
        &request.source,
        &requested,
        request.network_host.as_deref(),
        request.network_mode,
        probe,
    )
    .await
    {
        Ok(target) => target,
        Err(err) => {
            journal(LogLevel::Error, LogCategory::Validation, err.to_string());
            return OperationResult::rejected(&err);
        }
    };

    if request.cancel.is_cancelled() {
        journal(
            LogLevel::Warning,
            LogCategory::Outcome,
            "Operation cancelled by user before any change".to_string(),
        );
        return OperationResult {
            success: false,
            message: "Operation cancelled by user".to_string(),
            state: TerminalState::Cancelled,
            code: None,
            target: Some(target),
            backup: None,
            files_copied: 0,
        };
    }

    on_progress(ProgressEvent::phase_only(
        OperationPhase::Staging,
        "Preparing destination...",
    ));

    let mut state = match BackupState::stage(&target).await {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "staging failed");
            journal(LogLevel::Error, LogCategory::Backup, err.to_string());
            return OperationResult::failed(&err, TerminalState::FailedUnrestored, &target, 0);
        }
    };
    if let Some(backup) = state.retained_backup() {
        journal(
            LogLevel::Info,
            LogCategory::Backup,
            format!("Renamed {} to {}", target.display(), backup.display()),
        );
    }

    state.begin_copy();
    let engine = CopyEngine::new(request.source.clone(), target.clone(), request.options.clone());
    let copied = engine.copy_tree(copier, &request.cancel, &on_progress).await;

    match copied {
        Ok(CopyOutcome::Completed { files_copied }) => {
            state.complete();
            let backup = state.retained_backup().map(Path::to_path_buf);

            let mut message = format!(
                "Folder copied successfully!\n\nFrom: {}\nTo: {}",
                request.source.display(),
                target.display()
            );
            if let Some(backup) = &backup {
                message.push_str(&format!("\nPrevious version kept at: {}", backup.display()));
            }

            info!(files_copied, target = %target.display(), "copy succeeded");
            journal(
                LogLevel::Success,
                LogCategory::Outcome,
                format!("Copied {files_copied} files to {}", target.display()),
            );

            OperationResult {
                success: true,
                message,
                state: TerminalState::Succeeded,
                code: None,
                target: Some(target),
                backup,
                files_copied,
            }
        }
        Ok(CopyOutcome::Cancelled { files_copied }) => {
            let mut backup = state.retained_backup().map(Path::to_path_buf);
            let mut message = "Operation cancelled by user".to_string();

            match request.cancel_policy {
                CancelPolicy::KeepPartial => {
                    if let Some(backup) = &backup {
                        message.push_str(&format!(
                            "\nPartial copy left at {}; previous version kept at {}",
                            target.display(),
                            backup.display()
                        ));
                    }
                }
                CancelPolicy::Restore => {
                    on_progress(
                        ProgressEvent::phase_only(
                            OperationPhase::Restoring,
                            "Restoring previous folder...",
                        )
                        .with_counts(files_copied, engine.files_total()),
                    );
                    if let Err(err) = state.finalize(false, "Operation cancelled by user").await {
                        error!(error = %err, "restore after cancel failed");
                        journal(LogLevel::Error, LogCategory::Restore, err.to_string());
                        let mut result = OperationResult::failed(
                            &err,
                            TerminalState::FailedUnrestored,
                            &target,
                            files_copied,
                        );
                        result.backup = backup;
                        return result;
                    }
                    journal(
                        LogLevel::Info,
                        LogCategory::Restore,
                        format!("Restored {} after cancellation", target.display()),
                    );
                    backup = None;
                    message.push_str("\nDestination restored to its previous state");
                }
            }

            warn!(files_copied, "operation cancelled");
            journal(LogLevel::Warning, LogCategory::Outcome, message.clone());

            OperationResult {
                success: false,
                message,
                state: TerminalState::Cancelled,
                code: None,
                target: Some(target),
                backup,
                files_copied,
            }
        }
        Err(err) => {
            let files_copied = engine.files_copied();
            journal(LogLevel::Error, LogCategory::Copy, err.to_string());
            on_progress(
                ProgressEvent::phase_only(
                    OperationPhase::Restoring,
                    "Copy failed, restoring previous folder...",
                )
                .with_counts(files_copied, engine.files_total()),
            );

            match state.finalize(false, &err.to_string()).await {
                Ok(()) => {
                    journal(
                        LogLevel::Info,
                        LogCategory::Restore,
                        format!("Restored {} after failed copy", target.display()),
                    );
                    let mut result = OperationResult::failed(
                        &err,
                        TerminalState::FailedRestored,
                        &target,
                        files_copied,
                    );
                    result.message.push_str("\nDestination restored to its previous state");
                    result
                }
                Err(restore_err) => {
                    error!(error = %restore_err, "restore after failed copy failed");
                    journal(LogLevel::Error, LogCategory::Restore, restore_err.to_string());
                    let mut result = OperationResult::failed(
                        &restore_err,
                        TerminalState::FailedUnrestored,
                        &target,
                        files_copied,
                    );
                    result.backup = state.retained_backup().map(Path::to_path_buf);
                    result
                }
            }
        }
    }
}
