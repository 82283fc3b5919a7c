use crate::copy_engine::types::{CopyOptions, CopyOutcome, OperationPhase, ProgressEvent};
use crate::error::{CopierError, CopierResult};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Copies a single regular file. The seam exists so tests can inject IO failures.
pub trait FileCopier: Send + Sync {
    fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        options: &CopyOptions,
    ) -> impl Future<Output = io::Result<u64>> + Send;
}

/// Byte copy followed by permission and timestamp preservation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreservingCopier;

impl FileCopier for PreservingCopier {
    fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        options: &CopyOptions,
    ) -> impl Future<Output = io::Result<u64>> + Send {
        let source = source.to_path_buf();
        let target = target.to_path_buf();
        let preserve_permissions = options.preserve_permissions;
        let preserve_times = options.preserve_times;

        async move {
            let bytes = fs::copy(&source, &target).await?;
            let meta = fs::metadata(&source).await?;

            if preserve_permissions {
                fs::set_permissions(&target, meta.permissions()).await?;
            }

            if preserve_times {
                let atime = filetime::FileTime::from_last_access_time(&meta);
                let mtime = filetime::FileTime::from_last_modification_time(&meta);
                filetime::set_file_times(&target, atime, mtime)?;
            }

            Ok(bytes)
        }
    }
}

pub struct CopyEngine {
    source: PathBuf,
    target: PathBuf,
    options: CopyOptions,
    files_copied: AtomicU64,
    files_total: AtomicU64,
}

impl CopyEngine {
    pub fn new(source: PathBuf, target: PathBuf, options: CopyOptions) -> Self {
        Self {
            source,
            target,
            options,
            files_copied: AtomicU64::new(0),
            files_total: AtomicU64::new(0),
        }
    }

    /// Files copied so far, including by a walk that ended in an error.
    pub fn files_copied(&self) -> u64 {
        self.files_copied.load(Ordering::Relaxed)
    }

    /// Pre-scan result of the last walk; zero when counting failed.
    pub fn files_total(&self) -> u64 {
        self.files_total.load(Ordering::Relaxed)
    }

    /// Count regular files under the source. `None` when the walk fails.
    pub fn count_files(&self) -> Option<u64> {
        let mut total = 0u64;

        for entry in WalkDir::new(&self.source).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => total += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(source = %self.source.display(), error = %e, "could not count files");
                    return None;
                }
            }
        }

        Some(total)
    }

    fn should_emit(&self, files_copied: u64, files_total: u64) -> bool {
        self.options.progress_interval <= 1
            || files_copied % self.options.progress_interval == 0
            || files_copied == files_total
    }

    fn progress(&self, files_copied: u64, files_total: u64, current_item: String) -> ProgressEvent {
        let mut event = ProgressEvent {
            phase: OperationPhase::Copying,
            files_copied,
            files_total,
            current_item,
            phase_message: String::new(),
        };
        event.phase_message = event.status_text();
        event
    }

    /// Replicate the source tree under the target.
    ///
    /// Directories are created before the files inside them, empty ones
    /// included. Cancellation is polled before every entry, never mid-file.
    /// The first IO error aborts the walk and leaves the partial tree as is.
    /// Entries that are neither directories nor regular files (sockets,
    /// FIFOs, devices) are skipped with a warning.
    pub async fn copy_tree<C, F>(
        &self,
        copier: &C,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> CopierResult<CopyOutcome>
    where
        C: FileCopier,
        F: Fn(ProgressEvent) + Send + Sync,
    {
        on_progress(ProgressEvent::phase_only(
            OperationPhase::Scanning,
            "Counting files...",
        ));
        let files_total = self.count_files().unwrap_or(0);
        self.files_total.store(files_total, Ordering::Relaxed);
        self.files_copied.store(0, Ordering::Relaxed);
        let mut files_copied = 0u64;
        let mut last_emitted = 0u64;

        on_progress(self.progress(0, files_total, String::new()));

        let walker = WalkDir::new(&self.source)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            if cancel.is_cancelled() {
                info!(files_copied, "copy cancelled");
                return Ok(CopyOutcome::Cancelled { files_copied });
            }

            let entry = entry.map_err(|e| CopierError::Copy {
                path: e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.source.clone()),
                source: e.into(),
            })?;

            let relative = entry
                .path()
                .strip_prefix(&self.source)
                .map_err(|e| CopierError::Copy {
                    path: entry.path().to_path_buf(),
                    source: io::Error::other(e),
                })?;
            let destination = self.target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)
                    .await
                    .map_err(|source| CopierError::Copy {
                        path: entry.path().to_path_buf(),
                        source,
                    })?;
                continue;
            }

            if !entry.file_type().is_file() {
                warn!(path = %entry.path().display(), "skipping special file");
                continue;
            }

            copier
                .copy_file(entry.path(), &destination, &self.options)
                .await
                .map_err(|source| {
                    warn!(path = %entry.path().display(), error = %source, "failed to copy file");
                    CopierError::Copy {
                        path: entry.path().to_path_buf(),
                        source,
                    }
                })?;
            files_copied += 1;
            self.files_copied.store(files_copied, Ordering::Relaxed);
            debug!(path = %relative.display(), "copied");

            if self.should_emit(files_copied, files_total) {
                on_progress(self.progress(
                    files_copied,
                    files_total,
                    relative.display().to_string(),
                ));
                last_emitted = files_copied;
            }
        }

        if last_emitted != files_copied {
            on_progress(self.progress(files_copied, files_total, String::new()));
        }

        Ok(CopyOutcome::Completed { files_copied })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Copies normally until the N-th file, which fails with an IO error.
    pub(crate) struct FailingCopier {
        fail_on: u64,
        calls: AtomicU64,
        inner: PreservingCopier,
    }

    impl FailingCopier {
        pub(crate) fn new(fail_on: u64) -> Self {
            Self {
                fail_on,
                calls: AtomicU64::new(0),
                inner: PreservingCopier,
            }
        }
    }

    impl FileCopier for FailingCopier {
        fn copy_file(
            &self,
            source: &Path,
            target: &Path,
            options: &CopyOptions,
        ) -> impl Future<Output = io::Result<u64>> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let fail = call == self.fail_on;
            let inner = self.inner.copy_file(source, target, options);
            async move {
                if fail {
                    return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
                }
                inner.await
            }
        }
    }

    /// Copies normally and trips a cancellation token after the N-th file.
    pub(crate) struct CancellingCopier {
        cancel_after: u64,
        calls: AtomicU64,
        token: CancellationToken,
        inner: PreservingCopier,
    }

    impl CancellingCopier {
        pub(crate) fn new(cancel_after: u64, token: CancellationToken) -> Self {
            Self {
                cancel_after,
                calls: AtomicU64::new(0),
                token,
                inner: PreservingCopier,
            }
        }
    }

    impl FileCopier for CancellingCopier {
        fn copy_file(
            &self,
            source: &Path,
            target: &Path,
            options: &CopyOptions,
        ) -> impl Future<Output = io::Result<u64>> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let trip = (call == self.cancel_after).then(|| self.token.clone());
            let inner = self.inner.copy_file(source, target, options);
            async move {
                let bytes = inner.await?;
                if let Some(token) = trip {
                    token.cancel();
                }
                Ok(bytes)
            }
        }
    }

    /// Three files and one subdirectory, as `a.txt`, `b.txt`, `sub/c.txt`.
    pub(crate) fn populate_source(root: &Path) {
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.txt"), "alpha").unwrap();
        std::fs::write(root.join("b.txt"), "bravo").unwrap();
        std::fs::write(root.join("sub").join("c.txt"), "charlie").unwrap();
    }
}
