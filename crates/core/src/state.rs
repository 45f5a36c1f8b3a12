//! Live resource state: pallets, shuttles, lifts and conveyor pallets.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, GridCoordinate, KinematicMode};
use crate::id::{LiftId, PalletId, ShuttleId};
use crate::topology::WorldPosition;

/// A pallet. Owned by exactly one container at a time: an inventory slot,
/// a shuttle's carry slot, or a conveyor entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalletRecord {
    /// Identifier
    pub id: PalletId,
    /// Display colour
    pub color: String,
}

impl PalletRecord {
    /// Default colour for pallets arriving from the conveyor.
    pub const INBOUND_COLOR: &'static str = "#10B981";

    /// Create a pallet with a display colour.
    pub fn new(color: impl Into<String>) -> Self {
        Self {
            id: PalletId::new(),
            color: color.into(),
        }
    }

    /// Create a pallet with a known id.
    pub fn with_id(id: PalletId, color: impl Into<String>) -> Self {
        Self {
            id,
            color: color.into(),
        }
    }
}

/// Whether a shuttle or conveyor pallet is in motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotionStatus {
    /// At rest
    Idle,
    /// Travelling
    Moving,
}

/// Live state of a shuttle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuttleState {
    /// Identifier
    pub id: ShuttleId,
    /// Logical grid position
    pub position: GridCoordinate,
    /// World position, kept in sync with `position`
    pub world: WorldPosition,
    /// Wheel configuration
    pub mode: KinematicMode,
    /// Motion status
    pub status: MotionStatus,
    /// Cell currently being driven to
    pub target: Option<Cell>,
    /// Remaining unit steps
    pub path: VecDeque<Cell>,
    /// Carried pallet
    pub carried: Option<PalletRecord>,
    /// Whether the lifting deck is raised
    pub deck_raised: bool,
    /// Lift the shuttle is standing on
    pub on_lift: Option<LiftId>,
}

impl ShuttleState {
    /// A shuttle parked at `position` in aisle mode.
    pub fn parked(id: ShuttleId, position: GridCoordinate, world: WorldPosition) -> Self {
        Self {
            id,
            position,
            world,
            mode: KinematicMode::Aisle,
            status: MotionStatus::Idle,
            target: None,
            path: VecDeque::new(),
            carried: None,
            deck_raised: false,
            on_lift: None,
        }
    }

    /// Whether the shuttle has nothing left to drive.
    pub fn is_idle(&self) -> bool {
        self.status == MotionStatus::Idle
    }
}

/// Whether a lift is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiftStatus {
    /// At rest
    Idle,
    /// Travelling between levels
    Moving,
}

/// Live state of a lift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftState {
    /// Identifier
    pub id: LiftId,
    /// Current level
    pub level: i32,
    /// Level being travelled to
    pub target_level: i32,
    /// Motion status
    pub status: LiftStatus,
}

impl LiftState {
    /// An idle lift at `level`.
    pub fn idle(id: LiftId, level: i32) -> Self {
        Self {
            id,
            level,
            target_level: level,
            status: LiftStatus::Idle,
        }
    }
}

/// Conveyor pallet status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConveyorStatus {
    /// Being carried along the belt
    Moving,
    /// Stopped, waiting for hand-off
    Waiting,
}

/// A pallet riding a conveyor. Exists only between spawn and hand-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConveyorPallet {
    /// The pallet itself
    pub pallet: PalletRecord,
    /// Conveyor cell
    pub cell: Cell,
    /// Level of the conveyor
    pub level: i32,
    /// World position
    pub position: WorldPosition,
    /// Motion status
    pub status: ConveyorStatus,
}

impl ConveyorPallet {
    /// Identifier of the carried pallet.
    pub fn id(&self) -> PalletId {
        self.pallet.id
    }
}
