//! Warehouse layout document.
//!
//! This is the static configuration read once at startup. It is plain
//! serde data; [`crate::GridTopology`] validates it and answers geometry
//! questions.

use serde::{Deserialize, Serialize};

use crate::grid::GridCoordinate;

/// Layout of the reference warehouse shipped with the crate.
pub const REFERENCE_LAYOUT: &str = include_str!("../layouts/warehouse_layout.json");

/// Root of a layout document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDocument {
    /// Project-level settings
    pub project_config: ProjectConfig,
    /// Racks and tracks
    pub layout_structure: LayoutStructure,
    /// Operational zones
    pub zones: Vec<ZoneSpec>,
}

impl LayoutDocument {
    /// Parse a JSON layout document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Grid size
    pub grid_dimensions: GridDimensions,
}

/// Grid size. All indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDimensions {
    /// Depth positions
    pub x_columns: i32,
    /// Rails
    pub y_rows: i32,
    /// Storage levels
    pub z_levels: i32,
}

/// Racks and tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutStructure {
    /// Rack blocks
    pub storage_blocks: Vec<StorageBlock>,
    /// Highways
    pub shuttle_tracks: ShuttleTracks,
}

/// A block of rack rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBlock {
    /// Block name
    pub id: String,
    /// Inclusive rail range
    pub y_range: [i32; 2],
    /// First storage depth for rows without a rule
    #[serde(default = "default_x_start")]
    pub default_x_start: i32,
    /// Per-row overrides
    #[serde(default)]
    pub row_rules: Vec<RowRule>,
}

fn default_x_start() -> i32 {
    1
}

/// Overrides the first storage depth for some rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRule {
    /// Rows this rule applies to
    pub rows: Vec<i32>,
    /// First storage depth
    pub x_start: i32,
}

/// Highway definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuttleTracks {
    /// Rails kept free for through-travel
    pub horizontal_highways: Vec<HorizontalHighway>,
    /// Depth columns kept free for through-travel
    pub vertical_highways: Vec<VerticalHighway>,
}

/// A horizontal highway (a whole rail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizontalHighway {
    /// Name
    #[serde(default)]
    pub id: String,
    /// Rail index
    pub y_index: i32,
}

/// A vertical highway (a depth column, optionally limited to some rails).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerticalHighway {
    /// Name
    #[serde(default)]
    pub id: String,
    /// Depth index
    pub x_index: i32,
    /// Inclusive rail range; whole column when absent
    #[serde(default)]
    pub y_range: Option<[i32; 2]>,
}

/// One operational zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSpec {
    /// Zone name
    pub id: String,
    /// Inclusive rail range owned by the zone
    pub rail_range: [i32; 2],
    /// The zone's horizontal highway
    pub highway_y: i32,
    /// Lift anchor
    pub lift: LiftSpec,
    /// Conveyor anchor
    pub conveyor: ConveyorSpec,
    /// Shuttle bound to the zone
    pub shuttle: ShuttleSpec,
}

/// Lift anchor cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftSpec {
    /// Lift name
    pub id: String,
    /// Depth of the lift cell
    pub x: i32,
    /// Rail of the lift cell
    pub y: i32,
}

/// Conveyor feeding the zone's lift. Pallets travel along `row` from
/// `entry_x` to the lift's depth, then along that column into the lift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConveyorSpec {
    /// Rail the conveyor runs along
    pub row: i32,
    /// Depth where pallets enter and leave the system
    pub entry_x: i32,
}

/// Shuttle bound to a zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuttleSpec {
    /// Shuttle name
    pub id: String,
    /// Start position
    pub home: GridCoordinate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_layout_parses() {
        let doc = LayoutDocument::from_json(REFERENCE_LAYOUT).unwrap();
        assert_eq!(doc.project_config.grid_dimensions.x_columns, 25);
        assert_eq!(doc.layout_structure.shuttle_tracks.horizontal_highways.len(), 3);
        assert_eq!(doc.zones.len(), 2);
        assert_eq!(doc.zones[0].lift.id, "LIFT_LOWER");
    }

    #[test]
    fn row_rules_default_to_empty() {
        let block: StorageBlock =
            serde_json::from_str(r#"{"id":"B","y_range":[1,3]}"#).unwrap();
        assert!(block.row_rules.is_empty());
        assert_eq!(block.default_x_start, 1);
    }
}
