// ABOUTME: Saturated lateral subsurface flow - transmissivity-weighted Darcy flux between neighbors
// ABOUTME: Uses a pre-step water-table snapshot so the sweep order never reads a neighbor's new state

use crate::engine::core::grid::{FlowDirectionTable, Grid};
use crate::engine::core::soil_column::SoilClass;

/// Saturated hydraulic transmissivity of the column integrated over the
/// given **saturated thickness** (`total_depth - water_table_depth`, the
/// column above bedrock that is below the water table): two-regime
/// exponential decay with thickness above the `depth_threshold`, and the
/// depth-integrated surface value once the saturated column exceeds it.
/// Maximal when the water table is at the surface (fully saturated column);
/// zero when the water table sits at bedrock (`saturated_thickness == 0`).
pub fn transmissivity(class: &SoilClass, saturated_thickness: f32) -> f32 {
    let d = saturated_thickness.max(0.0);
    if d >= class.depth_threshold {
        // Beyond threshold: flow is carried entirely by the shallow zone: the
        // transmissivity saturates at the threshold-depth value and decays
        // no further (DHSVM's "lateral conductivity below RootDepth is
        // negligible" assumption).
        class.ks_lateral * class.depth_threshold
            * (-class.ks_lateral_exponent * class.depth_threshold).exp()
    } else {
        class.ks_lateral * d * (-class.ks_lateral_exponent * d).exp()
    }
}

/// Per-cell snapshot of water-table depth and cell geometry taken before the
/// lateral sweep begins, so every cell's outflow is computed from the same
/// pre-step state regardless of sweep order (resolves the simultaneity of
/// lateral subsurface flow: all outflows are Darcy fluxes through the
/// *pre-step* gradient, then applied atomically
/// after the whole sweep completes).
#[derive(Clone, Copy, Debug)]
pub struct CellSnapshot {
    pub water_table_depth: f32,
    pub total_depth: f32,
    pub surface_elevation: f32,
    pub cell_size: f32,
}

impl CellSnapshot {
    /// Saturated column thickness above bedrock: zero when the water table
    /// sits at `total_depth` (dry column), `total_depth` when it is at the
    /// surface (fully saturated).
    pub fn saturated_thickness(&self) -> f32 {
        (self.total_depth - self.water_table_depth).max(0.0)
    }
}

/// Computes the saturated lateral outflow (m^3) from one cell to each of its
/// flow-direction neighbors for one step, using the pre-step snapshot grid.
/// Returns `(neighbor_dx, neighbor_dy, volume)` tuples; the caller
/// accumulates these into per-cell deltas before applying anything.
pub fn cell_lateral_outflow(
    class: &SoilClass,
    snapshot: &Grid<CellSnapshot>,
    flow_table: &FlowDirectionTable,
    x: usize,
    y: usize,
    dt_secs: f32,
) -> Vec<(i32, i32, f32)> {
    let here = snapshot.get(x, y);
    let t = transmissivity(class, here.saturated_thickness());
    if t <= 0.0 {
        return Vec::new();
    }

    let edges = flow_table.edges(x, y);
    let total_weight: u32 = edges.iter().map(|e| e.weight as u32).sum();
    if total_weight == 0 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(edges.len());
    for edge in edges {
        let nx = x as i32 + edge.dx;
        let ny = y as i32 + edge.dy;
        if nx < 0 || ny < 0 || nx as usize >= snapshot.width() || ny as usize >= snapshot.height() {
            continue;
        }
        let neighbor = snapshot.get(nx as usize, ny as usize);
        let here_head = here.surface_elevation - here.water_table_depth;
        let neighbor_head = neighbor.surface_elevation - neighbor.water_table_depth;
        let gradient = ((here_head - neighbor_head) / here.cell_size).max(0.0);
        let contact_width = here.cell_size * (edge.weight as f32 / total_weight as f32);
        // Darcy flux: Q = T * gradient * width * dt, split by the
        // flow-direction weight fraction toward this neighbor.
        let volume = t * gradient * contact_width * dt_secs;
        out.push((edge.dx, edge.dy, volume));
    }
    out
}

/// Zero gradient (flat water table between two cells) yields zero flux,
/// regardless of transmissivity.
pub fn is_zero_gradient(here: &CellSnapshot, neighbor: &CellSnapshot) -> bool {
    let here_head = here.surface_elevation - here.water_table_depth;
    let neighbor_head = neighbor.surface_elevation - neighbor.water_table_depth;
    (here_head - neighbor_head).abs() < 1e-6
}
