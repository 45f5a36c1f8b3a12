//! Route and task planning for the shuttle warehouse.
//!
//! Planning is pure: it reads a [`GridTopology`](rackflow_core::GridTopology)
//! and a snapshot of resource state and produces a
//! [`TaskSequence`](rackflow_core::TaskSequence) or a [`PlanError`]. Nothing
//! here mutates shared state.

#![warn(missing_docs)]

mod error;

// Routing
mod movement;
mod pathfinder;

// Requests
mod locate;
mod sequencer;

pub use error::{PathNotFound, PlanError, Result};
pub use locate::{InventoryView, SlotLocator, SlotSearch};
pub use movement::{Leg, MovementPlanner, Phase};
pub use pathfinder::{Pathfinder, AISLE_MOUTH_COLUMNS, AISLE_MOUTH_COST, HIGHWAY_COST, RACK_COST};
pub use sequencer::{PlanTimings, PlanningView, TaskSequencer, CONVEYOR_LEVEL};
