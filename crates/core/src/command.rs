//! Commands and task sequences.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, KinematicMode, SlotKey};
use crate::id::{LiftId, PalletId, SequenceId, ShuttleId};
use crate::log::Severity;
use crate::state::PalletRecord;

/// One step of a task sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Route to a cell with the pathfinder and drive there.
    Navigate {
        /// Shuttle to drive
        shuttle: ShuttleId,
        /// Destination cell on the shuttle's level
        target: Cell,
    },
    /// Drive straight to a cell in the current kinematic mode.
    Move {
        /// Shuttle to drive
        shuttle: ShuttleId,
        /// Destination cell on the shuttle's level
        target: Cell,
    },
    /// Switch wheel configuration.
    SetMode {
        /// Shuttle
        shuttle: ShuttleId,
        /// New mode
        mode: KinematicMode,
    },
    /// Mark the shuttle as standing on a lift.
    BoardLift {
        /// Shuttle
        shuttle: ShuttleId,
        /// Lift
        lift: LiftId,
    },
    /// Clear the shuttle's lift occupancy.
    DisembarkLift {
        /// Shuttle
        shuttle: ShuttleId,
    },
    /// Send a lift to a level, carrying any shuttle on it.
    MoveLift {
        /// Lift
        lift: LiftId,
        /// Destination level
        level: i32,
    },
    /// Raise or lower the shuttle's lifting deck.
    SetDeck {
        /// Shuttle
        shuttle: ShuttleId,
        /// Raised when true
        raised: bool,
    },
    /// Take the pallet in an inventory slot onto the shuttle.
    PickFromSlot {
        /// Shuttle
        shuttle: ShuttleId,
        /// Source slot
        slot: SlotKey,
    },
    /// Put the carried pallet into an inventory slot.
    PlaceInSlot {
        /// Shuttle
        shuttle: ShuttleId,
        /// Destination slot
        slot: SlotKey,
    },
    /// Put a new pallet on a conveyor.
    SpawnConveyorPallet {
        /// The arriving pallet
        pallet: PalletRecord,
        /// Conveyor entry cell
        at: Cell,
        /// Conveyor level
        level: i32,
    },
    /// Advance a conveyor pallet by one conveyor cell.
    MoveConveyorPallet {
        /// Pallet
        pallet: PalletId,
        /// Next conveyor cell
        to: Cell,
    },
    /// Hand a conveyor pallet to an inventory slot.
    ConveyorToSlot {
        /// Pallet
        pallet: PalletId,
        /// Receiving slot
        slot: SlotKey,
    },
    /// Hand the shuttle's carried pallet to the conveyor.
    UnloadToConveyor {
        /// Shuttle
        shuttle: ShuttleId,
        /// Conveyor cell receiving the pallet
        at: Cell,
        /// Conveyor level
        level: i32,
    },
    /// Remove a pallet from the conveyor at the exit.
    DespawnConveyorPallet {
        /// Pallet
        pallet: PalletId,
    },
    /// Fixed pause.
    Wait {
        /// How long
        duration: Duration,
        /// Why
        reason: String,
    },
    /// Wait until an inventory slot holds a pallet, or the timeout elapses.
    WaitForPallet {
        /// Slot to watch
        slot: SlotKey,
        /// Upper bound on the wait
        timeout: Duration,
    },
    /// Append to the activity log.
    Log {
        /// Message
        message: String,
        /// Severity tag
        severity: Severity,
    },
}

impl Command {
    /// Shuttle this command drives, if any.
    pub fn shuttle(&self) -> Option<&ShuttleId> {
        match self {
            Command::Navigate { shuttle, .. }
            | Command::Move { shuttle, .. }
            | Command::SetMode { shuttle, .. }
            | Command::BoardLift { shuttle, .. }
            | Command::DisembarkLift { shuttle }
            | Command::SetDeck { shuttle, .. }
            | Command::PickFromSlot { shuttle, .. }
            | Command::PlaceInSlot { shuttle, .. }
            | Command::UnloadToConveyor { shuttle, .. } => Some(shuttle),
            _ => None,
        }
    }

    /// Short name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Navigate { .. } => "navigate",
            Command::Move { .. } => "move",
            Command::SetMode { .. } => "set_mode",
            Command::BoardLift { .. } => "board_lift",
            Command::DisembarkLift { .. } => "disembark_lift",
            Command::MoveLift { .. } => "move_lift",
            Command::SetDeck { .. } => "set_deck",
            Command::PickFromSlot { .. } => "pick_from_slot",
            Command::PlaceInSlot { .. } => "place_in_slot",
            Command::SpawnConveyorPallet { .. } => "spawn_conveyor_pallet",
            Command::MoveConveyorPallet { .. } => "move_conveyor_pallet",
            Command::ConveyorToSlot { .. } => "conveyor_to_slot",
            Command::UnloadToConveyor { .. } => "unload_to_conveyor",
            Command::DespawnConveyorPallet { .. } => "despawn_conveyor_pallet",
            Command::Wait { .. } => "wait",
            Command::WaitForPallet { .. } => "wait_for_pallet",
            Command::Log { .. } => "log",
        }
    }
}

/// What a sequence accomplishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Conveyor to rack
    Inbound {
        /// Placed slot
        slot: SlotKey,
    },
    /// Rack to conveyor
    Outbound {
        /// Emptied slot
        slot: SlotKey,
    },
    /// Rack to rack
    Transfer {
        /// Emptied slot
        from: SlotKey,
        /// Placed slot
        to: SlotKey,
    },
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Inbound { slot } => write!(f, "inbound to {slot}"),
            TaskKind::Outbound { slot } => write!(f, "outbound from {slot}"),
            TaskKind::Transfer { from, to } => write!(f, "transfer {from} -> {to}"),
        }
    }
}

/// An ordered command list for one shuttle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSequence {
    /// Identifier
    pub id: SequenceId,
    /// What the sequence does
    pub kind: TaskKind,
    /// Shuttle gated by this sequence
    pub shuttle: ShuttleId,
    /// Commands, in execution order
    pub commands: Vec<Command>,
}

impl TaskSequence {
    /// Create a new sequence.
    pub fn new(kind: TaskKind, shuttle: ShuttleId, commands: Vec<Command>) -> Self {
        Self {
            id: SequenceId::new(),
            kind,
            shuttle,
            commands,
        }
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the sequence has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
