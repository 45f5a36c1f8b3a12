//! Execution and request errors.

use rackflow_core::{ModeViolation, ShuttleId};
use rackflow_planning::{PathNotFound, PlanError};
use rackflow_storage::StorageError;

/// A command failed while a sequence was running. The rest of the sequence
/// is abandoned; commands already applied stay applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// A move changed the axis its mode forbids
    #[error(transparent)]
    ModeViolation(#[from] ModeViolation),

    /// Navigation could not be routed
    #[error(transparent)]
    PathNotFound(#[from] PathNotFound),

    /// A state update was refused
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

/// A request was refused before anything ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The owning shuttle already has a sequence in flight
    #[error("shuttle {0} is busy")]
    ShuttleBusy(ShuttleId),

    /// Planning failed
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Resource state could not be read
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}
