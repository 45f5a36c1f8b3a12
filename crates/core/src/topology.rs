//! Immutable warehouse geometry.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, GridCoordinate};
use crate::id::{LiftId, ShuttleId, ZoneId};
use crate::layout::{GridDimensions, LayoutDocument, REFERENCE_LAYOUT};

/// Width of a cell along depth, in metres.
pub const CELL_WIDTH: f32 = 1.6;
/// Width of a cell along the rail, in metres.
pub const CELL_DEPTH: f32 = 1.4;
/// Height of one storage level, in metres.
pub const CELL_HEIGHT: f32 = 1.8;
/// Rail height offset of a shuttle above its level's beam.
pub const WHEEL_OFFSET: f32 = 0.11;

/// Errors raised while building a topology from a layout document.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The document is not valid JSON for the layout schema
    #[error("layout parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-positive grid dimensions
    #[error("invalid grid dimensions {0:?}")]
    Dimensions(GridDimensions),

    /// A highway index lies outside the grid
    #[error("highway {id} index {index} out of range")]
    HighwayOutOfRange {
        /// Highway name
        id: String,
        /// Offending index
        index: i32,
    },

    /// A range is reversed or outside the grid
    #[error("{what} range [{lo}, {hi}] is invalid")]
    BadRange {
        /// What the range belongs to
        what: String,
        /// Lower bound
        lo: i32,
        /// Upper bound
        hi: i32,
    },

    /// Two zones claim the same rail
    #[error("zones {a} and {b} overlap on rail {rail}")]
    OverlappingZones {
        /// First zone
        a: String,
        /// Second zone
        b: String,
        /// Shared rail
        rail: i32,
    },

    /// A zone's highway is not a configured horizontal highway inside the zone
    #[error("zone {zone} highway {highway_y} is not a horizontal highway in its rail range")]
    ZoneHighway {
        /// Zone name
        zone: String,
        /// Configured highway rail
        highway_y: i32,
    },

    /// An anchor cell lies outside the grid or outside its zone
    #[error("zone {zone} {what} anchor {cell} is out of range")]
    AnchorOutOfRange {
        /// Zone name
        zone: String,
        /// Which anchor
        what: &'static str,
        /// Offending cell
        cell: Cell,
    },

    /// Shuttle, lift or zone names are reused
    #[error("duplicate identifier {0}")]
    DuplicateId(String),

    /// No zones are configured
    #[error("layout defines no zones")]
    NoZones,
}

/// A 3D world position, centred on the grid (y is up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPosition {
    /// Along depth
    pub x: f32,
    /// Height
    pub y: f32,
    /// Along the rail axis
    pub z: f32,
}

/// Kind of shuttle track on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackKind {
    /// On a horizontal highway
    Horizontal,
    /// On a vertical highway
    Vertical,
    /// Where the two cross
    Intersection,
    /// Short spur linking a lift to the vertical highway
    LiftConnector,
}

/// One operational zone: a rail range with its own shuttle, lift and
/// conveyor. Zones never share any of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Zone name
    pub id: ZoneId,
    /// First rail
    pub rail_lo: i32,
    /// Last rail
    pub rail_hi: i32,
    /// The horizontal highway shuttles of this zone travel on
    pub highway_y: i32,
    /// Lift name
    pub lift: LiftId,
    /// Lift cell
    pub lift_cell: Cell,
    /// Conveyor rail
    pub conveyor_row: i32,
    /// Conveyor entry/exit depth
    pub conveyor_entry_x: i32,
    /// Shuttle name
    pub shuttle: ShuttleId,
    /// Shuttle start position
    pub shuttle_home: GridCoordinate,
}

impl Zone {
    /// Whether the rail belongs to this zone.
    pub fn contains_rail(&self, y: i32) -> bool {
        (self.rail_lo..=self.rail_hi).contains(&y)
    }

    /// Highway cell directly in front of the lift.
    pub fn lift_approach(&self) -> Cell {
        Cell::new(self.lift_cell.x, self.highway_y)
    }

    /// Lift cell on a level, which doubles as the hand-off inventory slot.
    pub fn lift_slot(&self, level: i32) -> GridCoordinate {
        self.lift_cell.at_level(level)
    }

    /// Conveyor cells from the entry point up to and including the lift cell.
    pub fn conveyor_inbound_path(&self) -> Vec<Cell> {
        let entry = Cell::new(self.conveyor_entry_x, self.conveyor_row);
        let elbow = Cell::new(self.lift_cell.x, self.conveyor_row);
        let mut path = vec![entry];
        path.extend(entry.steps_to(elbow));
        path.extend(elbow.steps_to(self.lift_cell));
        path
    }

    /// Conveyor cells from the lift cell out to the exit point.
    pub fn conveyor_outbound_path(&self) -> Vec<Cell> {
        let mut path = self.conveyor_inbound_path();
        path.reverse();
        path
    }
}

#[derive(Debug, Clone)]
struct VerticalSpan {
    x: i32,
    y_lo: i32,
    y_hi: i32,
}

/// Validated, immutable warehouse geometry.
#[derive(Debug, Clone)]
pub struct GridTopology {
    dims: GridDimensions,
    horizontal: BTreeSet<i32>,
    vertical: Vec<VerticalSpan>,
    /// First storage depth per rack row
    row_x_start: BTreeMap<i32, i32>,
    zones: Vec<Zone>,
}

impl GridTopology {
    /// Build from a parsed layout document, validating everything up front.
    pub fn from_document(doc: &LayoutDocument) -> Result<Self, TopologyError> {
        let dims = doc.project_config.grid_dimensions;
        if dims.x_columns < 1 || dims.y_rows < 1 || dims.z_levels < 1 {
            return Err(TopologyError::Dimensions(dims));
        }

        let tracks = &doc.layout_structure.shuttle_tracks;
        let mut horizontal = BTreeSet::new();
        for h in &tracks.horizontal_highways {
            if !(1..=dims.y_rows).contains(&h.y_index) {
                return Err(TopologyError::HighwayOutOfRange {
                    id: h.id.clone(),
                    index: h.y_index,
                });
            }
            horizontal.insert(h.y_index);
        }

        let mut vertical = Vec::new();
        for v in &tracks.vertical_highways {
            if !(1..=dims.x_columns).contains(&v.x_index) {
                return Err(TopologyError::HighwayOutOfRange {
                    id: v.id.clone(),
                    index: v.x_index,
                });
            }
            let [y_lo, y_hi] = v.y_range.unwrap_or([1, dims.y_rows]);
            check_range(&format!("vertical highway {}", v.id), y_lo, y_hi, dims.y_rows)?;
            vertical.push(VerticalSpan { x: v.x_index, y_lo, y_hi });
        }

        let mut row_x_start = BTreeMap::new();
        for block in &doc.layout_structure.storage_blocks {
            let [lo, hi] = block.y_range;
            check_range(&format!("storage block {}", block.id), lo, hi, dims.y_rows)?;
            for y in lo..=hi {
                if horizontal.contains(&y) {
                    continue;
                }
                let x_start = block
                    .row_rules
                    .iter()
                    .find(|r| r.rows.contains(&y))
                    .map(|r| r.x_start)
                    .unwrap_or(block.default_x_start);
                row_x_start.insert(y, x_start.max(1));
            }
        }

        let zones = build_zones(doc, dims, &horizontal)?;

        Ok(Self {
            dims,
            horizontal,
            vertical,
            row_x_start,
            zones,
        })
    }

    /// Parse and validate a JSON layout document.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let doc = LayoutDocument::from_json(json)?;
        Self::from_document(&doc)
    }

    /// The reference warehouse layout.
    pub fn reference() -> Result<Self, TopologyError> {
        Self::from_json(REFERENCE_LAYOUT)
    }

    /// Grid size.
    pub fn dimensions(&self) -> GridDimensions {
        self.dims
    }

    /// Whether the cell lies in the storage/lift/conveyor extent.
    pub fn in_bounds(&self, cell: Cell) -> bool {
        (1..=self.dims.x_columns).contains(&cell.x) && (1..=self.dims.y_rows).contains(&cell.y)
    }

    /// Whether the level exists.
    pub fn level_in_range(&self, z: i32) -> bool {
        (1..=self.dims.z_levels).contains(&z)
    }

    /// Whether rail `y` is a horizontal highway.
    pub fn is_horizontal_highway(&self, y: i32) -> bool {
        self.horizontal.contains(&y)
    }

    /// Whether `(x, y)` lies on a vertical highway.
    pub fn is_vertical_highway(&self, x: i32, y: i32) -> bool {
        self.vertical
            .iter()
            .any(|v| v.x == x && (v.y_lo..=v.y_hi).contains(&y))
    }

    /// Whether the cell is on any highway.
    pub fn is_highway(&self, cell: Cell) -> bool {
        self.in_bounds(cell)
            && (self.is_horizontal_highway(cell.y) || self.is_vertical_highway(cell.x, cell.y))
    }

    /// Depth index of the vertical highway closest to `x`, if any exists.
    pub fn nearest_vertical_highway(&self, x: i32) -> Option<i32> {
        self.vertical
            .iter()
            .map(|v| v.x)
            .min_by_key(|vx| (vx.abs_diff(x), *vx))
    }

    /// Horizontal highway closest to rail `y`; ties go to the lower rail.
    pub fn nearest_horizontal_highway(&self, y: i32) -> Option<i32> {
        self.horizontal
            .iter()
            .copied()
            .min_by_key(|hy| (hy.abs_diff(y), *hy))
    }

    /// All horizontal highway rails, ascending.
    pub fn horizontal_highways(&self) -> impl Iterator<Item = i32> + '_ {
        self.horizontal.iter().copied()
    }

    /// Track kind on a cell, if any.
    pub fn track_kind(&self, cell: Cell) -> Option<TrackKind> {
        if !self.in_bounds(cell) {
            return None;
        }
        let h = self.is_horizontal_highway(cell.y);
        let v = self.is_vertical_highway(cell.x, cell.y);
        match (h, v) {
            (true, true) => Some(TrackKind::Intersection),
            (true, false) => Some(TrackKind::Horizontal),
            (false, true) => Some(TrackKind::Vertical),
            (false, false) => {
                let connector = self.zones.iter().any(|z| {
                    z.lift_cell.y == cell.y
                        && cell.x > z.lift_cell.x
                        && self
                            .nearest_vertical_highway(cell.x)
                            .is_some_and(|vx| cell.x < vx)
                });
                connector.then_some(TrackKind::LiftConnector)
            }
        }
    }

    /// Whether pallets may be stored on this cell.
    pub fn is_storage_cell(&self, cell: Cell) -> bool {
        match self.row_x_start.get(&cell.y) {
            Some(&x_start) => {
                (x_start..=self.dims.x_columns).contains(&cell.x)
                    && !self.is_vertical_highway(cell.x, cell.y)
            }
            None => false,
        }
    }

    /// Storage depths of a row, from the far end toward the aisle.
    pub fn depths_far_to_near(&self, row: i32) -> Vec<i32> {
        (1..=self.dims.x_columns)
            .rev()
            .filter(|&x| self.is_storage_cell(Cell::new(x, row)))
            .collect()
    }

    /// Storage depths of a row, from the aisle toward the far end.
    pub fn depths_near_to_far(&self, row: i32) -> Vec<i32> {
        let mut depths = self.depths_far_to_near(row);
        depths.reverse();
        depths
    }

    /// Every storage slot in the warehouse.
    pub fn rack_cells(&self) -> Vec<GridCoordinate> {
        let mut cells = Vec::new();
        for &y in self.row_x_start.keys() {
            for x in self.depths_near_to_far(y) {
                for z in 1..=self.dims.z_levels {
                    cells.push(GridCoordinate::new(x, y, z));
                }
            }
        }
        cells
    }

    /// All zones.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Zone owning rail `y`.
    pub fn zone_for_rail(&self, y: i32) -> Option<&Zone> {
        self.zones.iter().find(|z| z.contains_rail(y))
    }

    /// Zone a shuttle is bound to.
    pub fn zone_for_shuttle(&self, shuttle: &ShuttleId) -> Option<&Zone> {
        self.zones.iter().find(|z| &z.shuttle == shuttle)
    }

    /// Zone a lift belongs to.
    pub fn zone_for_lift(&self, lift: &LiftId) -> Option<&Zone> {
        self.zones.iter().find(|z| &z.lift == lift)
    }

    /// Convert a grid position to a world position (centred grid).
    pub fn grid_to_world(&self, at: GridCoordinate) -> WorldPosition {
        WorldPosition {
            x: (at.x as f32 - self.dims.x_columns as f32 / 2.0) * CELL_WIDTH,
            y: (at.z - 1) as f32 * CELL_HEIGHT + WHEEL_OFFSET,
            z: (at.y as f32 - self.dims.y_rows as f32 / 2.0) * CELL_DEPTH,
        }
    }

    /// Convert a world position back to the nearest grid cell.
    pub fn world_to_grid(&self, pos: WorldPosition) -> Cell {
        Cell::new(
            (pos.x / CELL_WIDTH + self.dims.x_columns as f32 / 2.0).round() as i32,
            (pos.z / CELL_DEPTH + self.dims.y_rows as f32 / 2.0).round() as i32,
        )
    }
}

fn check_range(what: &str, lo: i32, hi: i32, max: i32) -> Result<(), TopologyError> {
    if lo < 1 || hi > max || lo > hi {
        return Err(TopologyError::BadRange {
            what: what.to_string(),
            lo,
            hi,
        });
    }
    Ok(())
}

fn build_zones(
    doc: &LayoutDocument,
    dims: GridDimensions,
    horizontal: &BTreeSet<i32>,
) -> Result<Vec<Zone>, TopologyError> {
    if doc.zones.is_empty() {
        return Err(TopologyError::NoZones);
    }

    let mut seen = HashSet::new();
    let mut zones: Vec<Zone> = Vec::with_capacity(doc.zones.len());
    let in_grid = |c: Cell| (1..=dims.x_columns).contains(&c.x) && (1..=dims.y_rows).contains(&c.y);

    for spec in &doc.zones {
        for name in [&spec.id, &spec.lift.id, &spec.shuttle.id] {
            if !seen.insert(name.clone()) {
                return Err(TopologyError::DuplicateId(name.clone()));
            }
        }

        let [lo, hi] = spec.rail_range;
        check_range(&format!("zone {}", spec.id), lo, hi, dims.y_rows)?;

        for other in &zones {
            let overlap_lo = lo.max(other.rail_lo);
            if overlap_lo <= hi.min(other.rail_hi) {
                return Err(TopologyError::OverlappingZones {
                    a: other.id.to_string(),
                    b: spec.id.clone(),
                    rail: overlap_lo,
                });
            }
        }

        if !horizontal.contains(&spec.highway_y) || !(lo..=hi).contains(&spec.highway_y) {
            return Err(TopologyError::ZoneHighway {
                zone: spec.id.clone(),
                highway_y: spec.highway_y,
            });
        }

        let lift_cell = Cell::new(spec.lift.x, spec.lift.y);
        if !in_grid(lift_cell) || !(lo..=hi).contains(&lift_cell.y) {
            return Err(TopologyError::AnchorOutOfRange {
                zone: spec.id.clone(),
                what: "lift",
                cell: lift_cell,
            });
        }

        let conveyor_entry = Cell::new(spec.conveyor.entry_x, spec.conveyor.row);
        if conveyor_entry.x < 0
            || conveyor_entry.x > lift_cell.x
            || !(lo..=hi).contains(&conveyor_entry.y)
        {
            return Err(TopologyError::AnchorOutOfRange {
                zone: spec.id.clone(),
                what: "conveyor",
                cell: conveyor_entry,
            });
        }

        let home = spec.shuttle.home;
        if !in_grid(home.cell()) || !(1..=dims.z_levels).contains(&home.z) {
            return Err(TopologyError::AnchorOutOfRange {
                zone: spec.id.clone(),
                what: "shuttle home",
                cell: home.cell(),
            });
        }

        zones.push(Zone {
            id: ZoneId::new(spec.id.clone()),
            rail_lo: lo,
            rail_hi: hi,
            highway_y: spec.highway_y,
            lift: LiftId::new(spec.lift.id.clone()),
            lift_cell,
            conveyor_row: spec.conveyor.row,
            conveyor_entry_x: spec.conveyor.entry_x,
            shuttle: ShuttleId::new(spec.shuttle.id.clone()),
            shuttle_home: home,
        });
    }

    Ok(zones)
}
