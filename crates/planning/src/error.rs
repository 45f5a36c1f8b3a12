//! Planning errors.

use rackflow_core::{Cell, ModeViolation};

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;

/// The pathfinder exhausted its open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no path from {from} to {to}")]
pub struct PathNotFound {
    /// Start cell
    pub from: Cell,
    /// Goal cell
    pub to: Cell,
}

/// Errors detected while planning, before any command runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// No route between two cells
    #[error(transparent)]
    PathNotFound(#[from] PathNotFound),

    /// The planner produced a move its own mode forbids
    #[error(transparent)]
    ModeViolation(#[from] ModeViolation),

    /// No accessible empty slot anywhere in the zone
    #[error("rail {row} level {level} is full and no other rail in the zone has room")]
    SlotSaturated {
        /// Requested rail
        row: i32,
        /// Requested level
        level: i32,
    },

    /// No accessible pallet anywhere in the zone
    #[error("rail {row} level {level} is empty and no other rail in the zone has a reachable pallet")]
    SlotEmpty {
        /// Requested rail
        row: i32,
        /// Requested level
        level: i32,
    },

    /// Rail is not inside any zone
    #[error("rail {0} is outside every zone")]
    RowOutsideZones(i32),

    /// Level does not exist
    #[error("level {0} is out of range")]
    LevelOutOfRange(i32),

    /// Transfers never leave their zone
    #[error("transfer from rail {from_row} to rail {to_row} crosses zones")]
    CrossZoneTransfer {
        /// Source rail
        from_row: i32,
        /// Destination rail
        to_row: i32,
    },
}
