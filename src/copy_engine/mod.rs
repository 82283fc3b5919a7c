pub mod engine;
pub mod types;

pub use engine::{CopyEngine, FileCopier, PreservingCopier};
pub use types::{CopyOptions, CopyOutcome, OperationPhase, ProgressEvent};
