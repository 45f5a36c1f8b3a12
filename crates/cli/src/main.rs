//! rackflow CLI - run shuttle warehouse requests against the simulation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rackflow_core::{Cell, GridTopology, PalletRecord, Severity, SlotKey, TrackKind};
use rackflow_execution::{ExecutorConfig, RequestHandle, SimulatedWarehouse};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rackflow")]
#[command(about = "Shuttle warehouse planning and execution", long_about = None)]
struct Cli {
    /// Layout document (JSON). Defaults to the built-in reference layout.
    #[arg(long, global = true)]
    layout: Option<PathBuf>,

    /// Pre-fill the racks with a demo inventory
    #[arg(long, global = true)]
    seed: bool,

    /// Run the simulation 100x faster than real time
    #[arg(long, global = true)]
    fast: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring a pallet in from the conveyor
    Inbound {
        /// Target rail
        row: i32,
        /// Target level
        level: i32,
    },
    /// Send a pallet out to the conveyor
    Outbound {
        /// Source rail
        row: i32,
        /// Source level
        level: i32,
    },
    /// Move a pallet between two rails of one zone
    Transfer {
        /// Source rail
        from_row: i32,
        /// Source level
        from_level: i32,
        /// Destination rail
        to_row: i32,
        /// Destination level
        to_level: i32,
    },
    /// Run a short scripted session in both zones
    Demo,
    /// Describe the layout
    Layout,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let topology = load_topology(cli.layout.as_ref())?;
    let config = if cli.fast {
        ExecutorConfig::default().scaled(0.01)
    } else {
        ExecutorConfig::default()
    };
    let warehouse = SimulatedWarehouse::simulated(topology, config);
    if cli.seed {
        seed(&warehouse).await;
    }

    match cli.command {
        Commands::Inbound { row, level } => {
            finish(warehouse.request_inbound(row, level).await?).await?;
        }
        Commands::Outbound { row, level } => {
            finish(warehouse.request_outbound(row, level).await?).await?;
        }
        Commands::Transfer { from_row, from_level, to_row, to_level } => {
            let handle = warehouse
                .request_transfer(from_row, from_level, to_row, to_level)
                .await?;
            finish(handle).await?;
        }
        Commands::Demo => demo(&warehouse).await?,
        Commands::Layout => {
            describe(warehouse.topology());
            return Ok(());
        }
    }

    print_activity(&warehouse);
    let snapshot = warehouse.snapshot().await;
    println!("{}", snapshot.to_json_pretty()?);
    Ok(())
}

fn load_topology(path: Option<&PathBuf>) -> Result<GridTopology> {
    let Some(path) = path else {
        return Ok(GridTopology::reference()?);
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading layout {}", path.display()))?;
    GridTopology::from_json(&json).with_context(|| format!("invalid layout {}", path.display()))
}

async fn finish(handle: RequestHandle) -> Result<()> {
    handle.await.context("sequence task panicked")??;
    Ok(())
}

async fn seed(warehouse: &SimulatedWarehouse) {
    let colors = ["#3b82f6", "#f59e0b", "#ef4444", "#8b5cf6"];
    let mut pallets = Vec::new();
    for zone in warehouse.topology().zones() {
        let rails = (zone.rail_lo..=zone.rail_hi)
            .filter(|&y| !warehouse.topology().is_horizontal_highway(y) && y != zone.conveyor_row);
        for (i, y) in rails.enumerate() {
            for x in warehouse.topology().depths_far_to_near(y).into_iter().step_by(3).take(2) {
                pallets.push((SlotKey::new(x, y, 1), PalletRecord::new(colors[i % colors.len()])));
            }
        }
    }
    info!("Seeding {} pallets", pallets.len());
    warehouse.storage().seed_inventory(pallets).await;
}

async fn demo(warehouse: &SimulatedWarehouse) -> Result<()> {
    let (lower, upper) = match warehouse.topology().zones() {
        [lower, upper, ..] => (lower.clone(), upper.clone()),
        _ => anyhow::bail!("the demo needs a layout with two zones"),
    };
    let lower_rail = lower.conveyor_row;
    let upper_rail = upper.rail_hi;

    info!("Demo: inbound in both zones");
    let a = warehouse.request_inbound(lower_rail, 1).await?;
    let b = warehouse.request_inbound(upper_rail, 2).await?;
    finish(a).await?;
    finish(b).await?;

    info!("Demo: outbound in {}, transfer in {}", lower.id, upper.id);
    let a = warehouse.request_outbound(lower_rail, 1).await?;
    let b = warehouse
        .request_transfer(upper_rail, 2, upper.rail_hi - 1, 1)
        .await?;
    finish(a).await?;
    finish(b).await?;
    Ok(())
}

fn print_activity(warehouse: &SimulatedWarehouse) {
    println!("Activity:");
    for entry in warehouse.activity().iter().rev() {
        println!(
            "  {} [{}] {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            severity_tag(entry.severity),
            entry.message
        );
    }
}

fn describe(topology: &GridTopology) {
    let dims = topology.dimensions();
    println!("Grid: {} x {} x {}", dims.x_columns, dims.y_rows, dims.z_levels);
    println!(
        "Horizontal highways: {:?}",
        topology.horizontal_highways().collect::<Vec<_>>()
    );
    println!("Rack cells: {}", topology.rack_cells().len());

    let mut counts = [0usize; 4];
    for y in 1..=dims.y_rows {
        for x in 1..=dims.x_columns {
            let kind = topology.track_kind(Cell::new(x, y));
            match kind {
                Some(TrackKind::Horizontal) => counts[0] += 1,
                Some(TrackKind::Vertical) => counts[1] += 1,
                Some(TrackKind::Intersection) => counts[2] += 1,
                Some(TrackKind::LiftConnector) => counts[3] += 1,
                None => {}
            }
        }
    }
    println!(
        "Track cells: {} horizontal, {} vertical, {} intersections, {} lift connectors",
        counts[0], counts[1], counts[2], counts[3]
    );

    for zone in topology.zones() {
        println!("Zone {}:", zone.id);
        println!("  Rails: {}..={} (highway {})", zone.rail_lo, zone.rail_hi, zone.highway_y);
        println!("  Lift: {} at {}", zone.lift, zone.lift_cell);
        println!("  Conveyor: rail {} from depth {}", zone.conveyor_row, zone.conveyor_entry_x);
        println!("  Shuttle: {} home {}", zone.shuttle, zone.shuttle_home);
    }
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "INFO",
        Severity::Start => "START",
        Severity::Action => "ACTION",
        Severity::Move => "MOVE",
        Severity::Success => "SUCCESS",
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    }
}
