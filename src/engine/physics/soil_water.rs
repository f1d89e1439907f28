// ABOUTME: Vertical unsaturated soil-water drainage - Brooks-Corey conductivity, water-table depth
// ABOUTME: Crank-Nicolson-smoothed drainage cascades top-down, then lateral delta redistributes

use crate::engine::core::soil_column::{SoilClass, SoilColumn, SoilLayer};
use crate::engine::error::CoreResult;

/// Brooks-Corey unsaturated hydraulic conductivity `Ks * (theta/phi)^(2/p+3)`.
pub fn unsaturated_conductivity(ks: f32, moisture: f32, porosity: f32, pore_size_index: f32) -> f32 {
    if porosity <= 0.0 {
        return 0.0;
    }
    let rel_sat = (moisture / porosity).clamp(0.0, 1.0);
    let exponent = 2.0 / pore_size_index.max(1e-3) + 3.0;
    ks * rel_sat.powf(exponent)
}

/// Runs the top-down vertical-drainage pass for one cell's soil column.
/// `infiltration` is surface water entering the top layer this step;
/// `lateral_delta` is the saturated lateral-flow
/// contribution (may be negative). Returns surface runoff generated by
/// positive lateral residue that cannot fit, and updates `column` in place.
pub fn step_vertical_drainage(
    class: &SoilClass,
    column: &mut SoilColumn,
    infiltration: f32,
    lateral_delta: f32,
) -> CoreResult<f32> {
    let n = column.root_layers.len();
    let mut incoming = infiltration;

    for i in 0..n {
        let (fcap, por, ks, psi) = (
            class.field_capacity[i],
            class.porosity[i],
            class.ks_vertical[i],
            class.pore_size_index[i],
        );
        let layer = &mut column.root_layers[i];
        layer.moisture += incoming / layer.thickness.max(1e-6);

        let mut drainage = 0.0;
        if layer.moisture > fcap {
            let k = unsaturated_conductivity(ks, layer.moisture, por, psi);
            // Crank-Nicolson-like time-averaging with the prior step's drainage.
            drainage = 0.5 * (layer.prev_drainage + k) * layer.percolation_area_fraction;
            let max_available = (layer.moisture - fcap) * layer.thickness;
            drainage = drainage.min(max_available).max(0.0);
        }

        layer.moisture -= drainage / layer.thickness.max(1e-6);
        if layer.moisture < fcap - 1e-6 {
            // Truncate: never drain below field capacity.
            let deficit = (fcap - layer.moisture) * layer.thickness;
            drainage -= deficit;
            layer.moisture = fcap;
        }
        layer.prev_drainage = drainage;
        incoming = drainage;
    }

    // Final root-zone step deposits into the deep layer.
    column.deep_layer.moisture += incoming / column.deep_layer.thickness.max(1e-6);

    // Lateral saturated-flow delta: negative (outflow) extracted starting
    // from the water-table layer cascading downward to the deep layer;
    // positive (inflow) fills from the deep layer upward.
    let mut surface_runoff = 0.0;
    if lateral_delta < 0.0 {
        apply_lateral_outflow(class, column, -lateral_delta);
    } else if lateral_delta > 0.0 {
        surface_runoff = apply_lateral_inflow(class, column, lateral_delta);
    }

    column.check_bounds(class)?;
    Ok(surface_runoff.max(0.0))
}

fn apply_lateral_outflow(class: &SoilClass, column: &mut SoilColumn, mut remaining: f32) {
    // Extract starting from the shallowest layer whose moisture exceeds field
    // capacity (the water-table layer), cascading down to the deep layer.
    for i in 0..column.root_layers.len() {
        if remaining <= 0.0 {
            break;
        }
        let fcap = class.field_capacity[i];
        let layer = &mut column.root_layers[i];
        let available = (layer.moisture - fcap).max(0.0) * layer.thickness;
        let take = remaining.min(available);
        layer.moisture -= take / layer.thickness.max(1e-6);
        remaining -= take;
    }
    if remaining > 0.0 {
        let deep_fcap = *class.field_capacity.last().unwrap_or(&0.0);
        let available =
            (column.deep_layer.moisture - deep_fcap).max(0.0) * column.deep_layer.thickness;
        let take = remaining.min(available);
        column.deep_layer.moisture -= take / column.deep_layer.thickness.max(1e-6);
    }
}

fn apply_lateral_inflow(class: &SoilClass, column: &mut SoilColumn, mut remaining: f32) -> f32 {
    let deep_por = *class.porosity.last().unwrap_or(&1.0);
    let deep_capacity =
        (deep_por - column.deep_layer.moisture).max(0.0) * column.deep_layer.thickness;
    let fill = remaining.min(deep_capacity);
    column.deep_layer.moisture += fill / column.deep_layer.thickness.max(1e-6);
    remaining -= fill;

    for i in (0..column.root_layers.len()).rev() {
        if remaining <= 0.0 {
            break;
        }
        let por = class.porosity[i];
        let layer = &mut column.root_layers[i];
        let capacity = (por - layer.moisture).max(0.0) * layer.thickness * layer.percolation_area_fraction.clamp(0.0, 1.0);
        let fill = remaining.min(capacity);
        layer.moisture += fill / layer.thickness.max(1e-6);
        remaining -= fill;
    }
    remaining // positive residue that cannot fit becomes surface runoff
}

/// Recomputes water-table depth by the dual redistribute-up/search-down
/// algorithm. Returns `(water_table_depth, surface_ponding)`.
pub fn recompute_water_table(class: &SoilClass, column: &SoilColumn) -> (f32, f32) {
    let depth = column.water_table_depth(class);
    if depth < 0.0 {
        (0.0, -depth)
    } else {
        (depth.min(column.total_depth), 0.0)
    }
}

/// Dynamic (Parlange-Smith-style) infiltration capacity, dependent on
/// cumulative infiltration since the storm began.
pub fn dynamic_infiltration_capacity(
    ks: f32,
    porosity: f32,
    initial_moisture: f32,
    suction_head: f32,
    cumulative_infiltration: f32,
) -> f32 {
    let moisture_deficit = (porosity - initial_moisture).max(1e-4);
    let denom = (cumulative_infiltration / (moisture_deficit * suction_head)).exp() - 1.0;
    if denom.abs() < 1e-6 {
        ks * (1.0 + moisture_deficit * suction_head / (cumulative_infiltration.max(1e-6)))
    } else {
        ks * (moisture_deficit * suction_head) / (cumulative_infiltration.max(1e-6) * denom.max(1e-6))
            + ks
    }
}

/// Updates storm-boundary tracking for dynamic infiltration: a new storm begins the first step with positive surface water
/// following a dry step, and resets the step after surface water returns to
/// zero.
pub fn update_storm_state(column: &mut SoilColumn, surface_water_this_step: f32, infiltrated: f32) {
    if surface_water_this_step <= 0.0 {
        column.storm_cumulative_infiltration = 0.0;
    } else {
        column.storm_cumulative_infiltration += infiltrated;
    }
}

/// Fully-saturated top layer routes 100% of input to surface excess; no
/// division by zero.
pub fn infiltration_excess(
    input: f32,
    capacity: f32,
) -> (f32, f32) {
    if capacity <= 0.0 {
        return (0.0, input);
    }
    let infiltrated = input.min(capacity);
    (infiltrated, input - infiltrated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class() -> SoilClass {
        SoilClass {
            id: 1,
            porosity: vec![0.45, 0.45],
            field_capacity: vec![0.30, 0.30],
            residual: 0.0,
            ks_vertical: vec![1e-5, 1e-5],
            pore_size_index: vec![0.3, 0.3],
            ks_lateral: 1e-4,
            ks_lateral_exponent: 0.0,
            depth_threshold: 1.0,
            max_infiltration: 1e-5,
        }
    }

    fn column() -> SoilColumn {
        SoilColumn {
            soil_class_id: 1,
            total_depth: 2.0,
            root_layers: vec![
                SoilLayer {
                    moisture: 0.30,
                    thickness: 1.0,
                    percolation_area_fraction: 1.0,
                    ..Default::default()
                },
                SoilLayer {
                    moisture: 0.30,
                    thickness: 1.0,
                    percolation_area_fraction: 1.0,
                    ..Default::default()
                },
            ],
            deep_layer: SoilLayer {
                moisture: 0.30,
                thickness: 1.0,
                percolation_area_fraction: 1.0,
                ..Default::default()
            },
            storm_cumulative_infiltration: 0.0,
            surface_ponding: 0.0,
        }
    }

    #[test]
    fn drainage_never_drops_below_field_capacity() {
        let class = class();
        let mut col = column();
        let runoff = step_vertical_drainage(&class, &mut col, 0.0, 0.0).unwrap();
        assert_eq!(runoff, 0.0);
        for layer in &col.root_layers {
            assert!(layer.moisture >= class.field_capacity[0] - 1e-4);
        }
    }

    #[test]
    fn infiltration_increases_top_layer_moisture() {
        let class = class();
        let mut col = column();
        let before = col.root_layers[0].moisture;
        let _ = step_vertical_drainage(&class, &mut col, 0.01, 0.0).unwrap();
        assert!(col.root_layers[0].moisture >= before);
    }

    #[test]
    fn fully_saturated_top_layer_routes_all_to_surface_excess() {
        let (infiltrated, excess) = infiltration_excess(0.02, 0.0);
        assert_eq!(infiltrated, 0.0);
        assert_eq!(excess, 0.02);
    }

    #[test]
    fn water_table_at_total_depth_when_no_excess() {
        let class = class();
        let col = column();
        let (depth, ponding) = recompute_water_table(&class, &col);
        assert_eq!(depth, 2.0);
        assert_eq!(ponding, 0.0);
    }

    #[test]
    fn zero_water_table_gradient_produces_zero_transmissivity_boundary() {
        // depth - water_table == 0 => zero transmissivity is asserted in
        // lateral_subsurface; here we just confirm water_table can reach
        // total_depth exactly (the degenerate input for that boundary test).
        let class = class();
        let col = column();
        let (depth, _) = recompute_water_table(&class, &col);
        assert_eq!(col.total_depth - depth, 0.0);
    }
}
