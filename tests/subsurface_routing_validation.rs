// ABOUTME: Integration test for saturated lateral subsurface flow between two neighboring cells
// ABOUTME: Validates that flow moves from the wetter/higher cell toward the drier/lower one

//! Saturated lateral subsurface flow validation.
//!
//! Builds a two-cell strip with a shallower water table (wetter, higher
//! transmissivity) upslope of a deeper water table (drier) cell, and checks
//! that the computed outflow moves downhill with nonzero magnitude, while a
//! flat water table produces no flow at all.

use basinflow::engine::core::grid::{FlowDirectionTable, FlowEdge, Grid};
use basinflow::engine::core::soil_column::SoilClass;
use basinflow::engine::physics::lateral_subsurface::{cell_lateral_outflow, CellSnapshot};

fn soil_class() -> SoilClass {
    SoilClass {
        id: 1,
        porosity: vec![0.45],
        field_capacity: vec![0.30],
        residual: 0.0,
        ks_vertical: vec![1e-5],
        pore_size_index: vec![0.3],
        ks_lateral: 2e-4,
        ks_lateral_exponent: 0.05,
        depth_threshold: 2.0,
        max_infiltration: 1e-5,
    }
}

#[test]
fn saturated_flow_moves_from_shallow_water_table_toward_deep_neighbor() {
    println!("Setting up a two-cell strip with a wetter upslope cell and a drier downslope cell...");

    let class = soil_class();
    let mut snapshot: Grid<CellSnapshot> = Grid::new(
        2,
        1,
        CellSnapshot {
            water_table_depth: 1.0,
            total_depth: 2.0,
            surface_elevation: 100.0,
            cell_size: 30.0,
        },
    );
    // Upslope cell: shallow water table (wetter, so saturated thickness is
    // larger), higher ground.
    snapshot.set(
        0,
        0,
        CellSnapshot {
            water_table_depth: 0.3,
            total_depth: 2.0,
            surface_elevation: 105.0,
            cell_size: 30.0,
        },
    );
    // Downslope cell: deep water table (drier, smaller saturated thickness),
    // lower ground.
    snapshot.set(
        1,
        0,
        CellSnapshot {
            water_table_depth: 1.8,
            total_depth: 2.0,
            surface_elevation: 95.0,
            cell_size: 30.0,
        },
    );

    let mut flow_table = FlowDirectionTable::new(2, 1);
    flow_table.set_edges(0, 0, vec![FlowEdge { dx: 1, dy: 0, weight: 255 }], false);
    flow_table.set_edges(1, 0, vec![], true);

    let outflow = cell_lateral_outflow(&class, &snapshot, &flow_table, 0, 0, 3600.0);
    println!("Computed outflow edges from upslope cell: {outflow:?}");

    assert_eq!(outflow.len(), 1);
    let (dx, dy, volume) = outflow[0];
    assert_eq!((dx, dy), (1, 0));
    assert!(volume > 0.0, "saturated flow must move downhill toward the drier neighbor");

    let reverse_outflow = cell_lateral_outflow(&class, &snapshot, &flow_table, 1, 0, 3600.0);
    println!("Downslope (drier, sink) cell outflow edges: {reverse_outflow:?}");
    assert!(
        reverse_outflow.is_empty(),
        "a sink cell with no outgoing flow-direction edges produces no outflow"
    );
}

#[test]
fn flat_water_table_between_neighbors_produces_zero_flow() {
    println!("Setting up a flat water table across two cells...");

    let class = soil_class();
    let snapshot: Grid<CellSnapshot> = Grid::new(
        2,
        1,
        CellSnapshot {
            water_table_depth: 1.0,
            total_depth: 2.0,
            surface_elevation: 100.0,
            cell_size: 30.0,
        },
    );
    let mut flow_table = FlowDirectionTable::new(2, 1);
    flow_table.set_edges(0, 0, vec![FlowEdge { dx: 1, dy: 0, weight: 255 }], false);
    flow_table.set_edges(1, 0, vec![], true);

    let outflow = cell_lateral_outflow(&class, &snapshot, &flow_table, 0, 0, 3600.0);
    println!("Outflow with a flat water table: {outflow:?}");

    assert_eq!(outflow.len(), 1);
    let (_, _, volume) = outflow[0];
    assert!(volume.abs() < 1e-4, "a flat water table must produce no lateral flow");
}
