pub mod backup;
pub mod copy_engine;
pub mod error;
pub mod error_codes;
pub mod input_validation;
pub mod logging;
pub mod network_probe;
pub mod operation;
pub mod path_validation;
pub mod settings;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use copy_engine::{FileCopier, PreservingCopier, ProgressEvent};
use logging::LogManager;
use network_probe::{NetworkProbe, TcpProbe};

pub use error::{CopierError, CopierResult};
pub use operation::{CancelPolicy, CopyRequest, OperationResult, Placement, TerminalState};
pub use settings::{CopierSettings, SettingsStore};

type InFlightSlot = Arc<Mutex<Option<CancellationToken>>>;

/// Clears the in-flight slot when the worker finishes, panics included.
struct SlotGuard(InFlightSlot);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Entry point for presentation layers. Runs at most one copy at a time.
pub struct FolderCopier<P = TcpProbe, C = PreservingCopier> {
    probe: Arc<P>,
    copier: Arc<C>,
    log_manager: Arc<LogManager>,
    in_flight: InFlightSlot,
    next_operation: AtomicU64,
}

impl FolderCopier {
    pub fn new() -> Self {
        Self::with_parts(
            TcpProbe::default(),
            PreservingCopier,
            Arc::new(LogManager::default()),
        )
    }
}

impl Default for FolderCopier {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> FolderCopier<P, C>
where
    P: NetworkProbe + 'static,
    C: FileCopier + 'static,
{
    pub fn with_parts(probe: P, copier: C, log_manager: Arc<LogManager>) -> Self {
        Self {
            probe: Arc::new(probe),
            copier: Arc::new(copier),
            log_manager,
            in_flight: Arc::new(Mutex::new(None)),
            next_operation: AtomicU64::new(1),
        }
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn is_running(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start an operation on a spawned tokio task.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`CopierError::AlreadyRunning`] while another operation is in flight.
    pub fn start_copy(&self, request: CopyRequest) -> CopierResult<CopyHandle> {
        {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(CopierError::AlreadyRunning);
            }
            *slot = Some(request.cancel.clone());
        }

        let seq = self.next_operation.fetch_add(1, Ordering::Relaxed);
        let operation_id = format!("op-{seq}");
        let cancel = request.cancel.clone();
        let (progress_tx, progress_rx) = watch::channel(ProgressEvent::default());

        let guard = SlotGuard(Arc::clone(&self.in_flight));
        let probe = Arc::clone(&self.probe);
        let copier = Arc::clone(&self.copier);
        let log_manager = Arc::clone(&self.log_manager);
        let id = operation_id.clone();
        let span = info_span!("copy_operation", operation_id = %operation_id);

        info!(
            operation_id = %operation_id,
            source = %request.source.display(),
            destination = %request.destination.display(),
            "starting copy"
        );

        let join = tokio::spawn(
            async move {
                let _guard = guard;
                operation::run_operation(
                    &request,
                    probe.as_ref(),
                    copier.as_ref(),
                    &log_manager,
                    &id,
                    |event| {
                        progress_tx.send_replace(event);
                    },
                )
                .await
            }
            .instrument(span),
        );

        Ok(CopyHandle {
            operation_id,
            cancel,
            progress: progress_rx,
            join,
        })
    }

    /// Request cooperative cancellation of the in-flight operation, if any.
    pub fn cancel(&self) {
        if let Some(token) = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            info!("cancellation requested");
            token.cancel();
        }
    }
}

/// Handle to a running operation.
pub struct CopyHandle {
    operation_id: String,
    cancel: CancellationToken,
    progress: watch::Receiver<ProgressEvent>,
    join: JoinHandle<OperationResult>,
}

impl CopyHandle {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to progress. Only the latest event is retained.
    pub fn progress(&self) -> watch::Receiver<ProgressEvent> {
        self.progress.clone()
    }

    pub fn latest_progress(&self) -> ProgressEvent {
        self.progress.borrow().clone()
    }

    /// Wait for the terminal result.
    pub async fn wait(self) -> OperationResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => OperationResult {
                success: false,
                message: format!("Copy worker stopped unexpectedly: {e}"),
                state: TerminalState::FailedUnrestored,
                code: Some(error_codes::ERR_COPY_FAILED.to_string()),
                target: None,
                backup: None,
                files_copied: 0,
            },
        }
    }
}
