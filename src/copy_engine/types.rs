use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    Idle,
    Validating,
    Staging,
    Scanning,
    Copying,
    Restoring,
}

/// Progress notification for the presentation layer. Only the most recent
/// event matters; consumers may drop intermediate ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub phase: OperationPhase,
    pub files_copied: u64,
    /// Zero when the pre-scan could not count the source tree.
    pub files_total: u64,
    pub current_item: String,
    pub phase_message: String,
}

impl ProgressEvent {
    pub fn phase_only(phase: OperationPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            files_copied: 0,
            files_total: 0,
            current_item: String::new(),
            phase_message: message.into(),
        }
    }

    /// Carry the counts reached so far into a non-copying phase event.
    pub fn with_counts(mut self, files_copied: u64, files_total: u64) -> Self {
        self.files_copied = files_copied;
        self.files_total = files_total;
        self
    }

    /// Completion ratio in `0.0..=1.0`, or `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        if self.files_total == 0 {
            return None;
        }
        Some((self.files_copied as f64 / self.files_total as f64).min(1.0))
    }

    /// "Copying files... (3/10)" or "Copying files... (3 files)" when uncounted.
    pub fn status_text(&self) -> String {
        if self.files_total > 0 {
            format!("Copying files... ({}/{})", self.files_copied, self.files_total)
        } else {
            format!("Copying files... ({} files)", self.files_copied)
        }
    }
}

impl Default for ProgressEvent {
    fn default() -> Self {
        Self::phase_only(OperationPhase::Idle, "Ready to copy")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyOptions {
    pub preserve_permissions: bool,
    pub preserve_times: bool,
    /// Emit a progress event every N files (the last file always reports).
    pub progress_interval: u64,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_times: true,
            progress_interval: 1,
        }
    }
}

/// How a tree copy ended when no IO error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Completed { files_copied: u64 },
    Cancelled { files_copied: u64 },
}

impl CopyOutcome {
    pub fn files_copied(&self) -> u64 {
        match self {
            Self::Completed { files_copied } | Self::Cancelled { files_copied } => *files_copied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_with_and_without_total() {
        let mut event = ProgressEvent::phase_only(OperationPhase::Copying, "");
        event.files_copied = 3;
        assert_eq!(event.status_text(), "Copying files... (3 files)");
        assert_eq!(event.fraction(), None);

        event.files_total = 12;
        assert_eq!(event.status_text(), "Copying files... (3/12)");
        assert_eq!(event.fraction(), Some(0.25));
    }
}
