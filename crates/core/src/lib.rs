//! rackflow core data models.
//!
//! This crate defines the geometry, resource state and command vocabulary
//! shared by the planner and the executor of the shuttle warehouse.

#![warn(missing_docs)]

// Identities
mod id;

// Geometry
mod grid;
mod layout;
mod topology;

// Live state and commands
mod state;
mod command;
mod log;

// Re-exports
pub use id::*;

// Geometry
pub use grid::{Cell, GridCoordinate, KinematicMode, ModeViolation, SlotKey};
pub use layout::{
    ConveyorSpec, GridDimensions, HorizontalHighway, LayoutDocument, LayoutStructure,
    LiftSpec, ProjectConfig, RowRule, ShuttleSpec, ShuttleTracks, StorageBlock,
    VerticalHighway, ZoneSpec, REFERENCE_LAYOUT,
};
pub use topology::{
    GridTopology, TopologyError, TrackKind, WorldPosition, Zone,
    CELL_DEPTH, CELL_HEIGHT, CELL_WIDTH,
};

// State & commands
pub use state::{
    ConveyorPallet, ConveyorStatus, LiftState, LiftStatus, MotionStatus, PalletRecord,
    ShuttleState,
};
pub use command::{Command, TaskKind, TaskSequence};
pub use log::{LogEntry, Severity};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
