// ABOUTME: Per-cell integrator - wires forcing, canopy/snow, ET, and vertical soil water in order
// ABOUTME: Order of operations: interception -> snow -> ET -> infiltration -> drainage

use crate::engine::config::{InfiltrationScheme, Options};
use crate::engine::core::canopy_state::{Canopy, CanopySnowBranch, VegetationClass};
use crate::engine::core::soil_column::{SoilClass, SoilColumn};
use crate::engine::error::CoreResult;
use crate::engine::physics::canopy_et::{
    aerodynamic_resistance, canopy_resistance, penman_potential_evaporation, soil_evaporation,
    split_wet_dry_demand, wet_leaf_fraction,
};
use crate::engine::physics::forcing::CellMeteorology;
use crate::engine::physics::snowpack::{canopy_interception, step_snowpack, SnowPack};
use crate::engine::physics::soil_water::{
    dynamic_infiltration_capacity, infiltration_excess, recompute_water_table, step_vertical_drainage,
    update_storm_state,
};
use crate::engine::physics::vapor_pressure::vapor_pressure_deficit;

/// Everything one cell's step needs beyond the shared class tables: its
/// meteorology (already lapsed/interpolated), net radiation terms, and the
/// lateral saturated-flow delta computed by the upstream subsurface sweep.
pub struct CellStepInputs<'a> {
    pub met: CellMeteorology,
    pub net_shortwave: f32,
    pub soil_class: &'a SoilClass,
    pub vegetation: &'a VegetationClass,
    pub month_index: usize,
    pub elevation: f32,
    pub lateral_delta: f32,
    pub reference_height: f32,
    pub air_pressure_pa: f32,
    pub specific_heat_moist_air: f32,
    pub latent_heat_vaporization: f32,
}

/// Mutable per-cell state carried step to step.
pub struct CellState {
    pub canopy: Canopy,
    pub snow: SnowPack,
    pub soil: SoilColumn,
}

/// Mass-accounted outputs of one cell's step, feeding the overland router
/// and the basin mass-balance ledger.
#[derive(Clone, Copy, Debug, Default)]
pub struct CellStepOutputs {
    pub surface_runoff: f32,
    pub evapotranspiration: f32,
    pub snowmelt_to_soil: f32,
    pub water_table_depth: f32,
    pub surface_ponding: f32,
}

/// Runs one time step of the full per-cell pipeline: canopy interception,
/// two-layer snowpack, canopy+soil ET, infiltration partition, vertical
/// drainage, water-table recompute.
pub fn step_cell(options: &Options, inputs: &CellStepInputs, state: &mut CellState) -> CoreResult<CellStepOutputs> {
    let physics = &options.physics;
    let veg = inputs.vegetation;
    let lai = veg.lai[inputs.month_index];

    let snow_already_present = state.snow.is_present();
    let branch = CanopySnowBranch::select(veg.has_overstory, snow_already_present || inputs.met.snow_m > 0.0);

    // 1. Canopy interception of rain and snow.
    let mut throughfall_rain = inputs.met.rain_m;
    let mut throughfall_snow = inputs.met.snow_m;
    let mut canopy_drip = 0.0f32;

    if let (true, Some(canopy)) = (veg.has_overstory, state.canopy.overstory.as_mut()) {
        let rain_capacity = (veg.max_interception_storage - canopy.intercepted_liquid).max(0.0);
        let rain_intercepted = throughfall_rain.min(rain_capacity);
        canopy.intercepted_liquid += rain_intercepted;
        throughfall_rain -= rain_intercepted;

        if matches!(branch, CanopySnowBranch::CanopyAndSnow) {
            let (_intercepted, through, drip) = canopy_interception(
                physics,
                canopy,
                lai,
                veg.max_interception_storage,
                inputs.met.snow_m,
                inputs.met.air_temp_c,
            );
            throughfall_snow = through;
            canopy_drip = drip;
        }
    }

    // 2. Two-layer snowpack (only meaningful once snow is on the ground or
    //    falling).
    let mut snowmelt_to_soil = 0.0;
    let incoming_longwave = inputs.met.incoming_longwave;
    if matches!(branch, CanopySnowBranch::CanopyAndSnow | CanopySnowBranch::NoCanopySnow)
        || snow_already_present
    {
        let wind = inputs.met.wind_ms;
        let aero_r = aerodynamic_resistance(wind, inputs.reference_height, physics.z0_snow, physics.von_karman);
        let result = step_snowpack(
            physics,
            &mut state.snow,
            throughfall_snow,
            throughfall_rain,
            inputs.met.air_temp_c,
            inputs.net_shortwave,
            incoming_longwave,
            wind,
            aero_r,
            inputs.met.relative_humidity_pct,
            &options.root_finder,
        )?;
        snowmelt_to_soil = result.outflow_to_soil + canopy_drip;
        // Rain is entirely absorbed into the snowpack energy balance when a
        // pack is present; it does not separately infiltrate this step.
        throughfall_rain = 0.0;
    }
    state.snow.check_invariants(physics)?;

    // 3. Evapotranspiration: Penman potential, then wet/dry split and soil
    //    evaporation, only when no snowpack masks the surface.
    let mut et_total = 0.0f32;
    if !state.snow.is_present() {
        let vpd = vapor_pressure_deficit(inputs.met.air_temp_c, inputs.met.relative_humidity_pct);
        let aero_r = aerodynamic_resistance(
            inputs.met.wind_ms,
            inputs.reference_height,
            physics.z0_ground,
            physics.von_karman,
        );
        let potential = penman_potential_evaporation(
            inputs.net_shortwave,
            inputs.met.air_temp_c,
            vpd,
            aero_r,
            inputs.air_pressure_pa,
            inputs.specific_heat_moist_air,
            physics.water_density,
            inputs.latent_heat_vaporization,
        );

        if veg.has_overstory && lai > 0.0 {
            let wilting_points: Vec<f32> = inputs.soil_class.field_capacity.iter().map(|f| f * 0.4).collect();
            let layer_moisture: Vec<f32> = state.soil.root_layers.iter().map(|l| l.moisture).collect();
            let r_c = canopy_resistance(
                lai,
                veg.min_stomatal_resistance,
                veg.max_stomatal_resistance,
                inputs.net_shortwave,
                200.0,
                vpd,
                1.0,
                state.soil.root_layers.first().map(|l| l.temperature).unwrap_or(10.0),
                &veg.root_fraction,
                &layer_moisture,
                &wilting_points,
                &inputs.soil_class.field_capacity,
            );
            let intercepted = state
                .canopy
                .overstory
                .map(|c| c.intercepted_liquid)
                .unwrap_or(0.0);
            let wet_frac = wet_leaf_fraction(intercepted, veg.max_interception_storage);
            let (wet_demand, dry_demand) = split_wet_dry_demand(potential, wet_frac, intercepted, r_c, aero_r);

            if let Some(canopy) = state.canopy.overstory.as_mut() {
                let wet_actual = wet_demand.min(canopy.intercepted_liquid);
                canopy.intercepted_liquid -= wet_actual;
                et_total += wet_actual + dry_demand;
            } else {
                et_total += dry_demand;
            }
        } else {
            let top = state.soil.root_layers.first();
            let (moisture, porosity, psi) = match top {
                Some(layer) => (
                    layer.moisture,
                    inputs.soil_class.porosity.first().copied().unwrap_or(0.45),
                    inputs.soil_class.pore_size_index.first().copied().unwrap_or(0.3),
                ),
                None => (0.0, 1.0, 0.3),
            };
            et_total += soil_evaporation(potential, porosity, moisture, psi);
        }

        // Draw ET from the shallowest root layer, bounded by field capacity.
        if let Some(layer) = state.soil.root_layers.first_mut() {
            let fcap = inputs.soil_class.field_capacity.first().copied().unwrap_or(0.0);
            let available = ((layer.moisture - fcap).max(0.0) * layer.thickness).max(0.0);
            let drawn = et_total.min(available);
            layer.moisture -= drawn / layer.thickness.max(1e-6);
            et_total = drawn;
        }
    }

    // 4. Surface-water input to the soil this step: unintercepted rain plus
    //    whatever the snowpack released.
    let surface_input = throughfall_rain + snowmelt_to_soil;

    // 5. Infiltration partition (static capacity, or dynamic Parlange-Smith
    //    driven by cumulative storm infiltration).
    let capacity = match options.infiltration {
        InfiltrationScheme::Static => inputs.soil_class.max_infiltration * options.step_seconds as f32,
        InfiltrationScheme::Dynamic => {
            let initial_moisture = state.soil.root_layers.first().map(|l| l.moisture).unwrap_or(0.0);
            let porosity = inputs.soil_class.porosity.first().copied().unwrap_or(0.45);
            let suction_head = 0.1; // nominal Brooks-Corey bubbling pressure head, meters
            dynamic_infiltration_capacity(
                inputs.soil_class.ks_vertical.first().copied().unwrap_or(1e-5),
                porosity,
                initial_moisture,
                suction_head,
                state.soil.storm_cumulative_infiltration,
            ) * options.step_seconds as f32
        }
    };
    let (infiltrated, surface_excess) = infiltration_excess(surface_input, capacity);
    update_storm_state(&mut state.soil, surface_input, infiltrated);

    // 6. Vertical drainage cascade and lateral-delta application.
    let runoff_from_lateral = step_vertical_drainage(
        inputs.soil_class,
        &mut state.soil,
        infiltrated,
        inputs.lateral_delta,
    )?;

    // 7. Water-table depth recompute.
    let (water_table_depth, ponding) = recompute_water_table(inputs.soil_class, &state.soil);
    state.soil.surface_ponding = ponding;

    Ok(CellStepOutputs {
        surface_runoff: surface_excess + runoff_from_lateral,
        evapotranspiration: et_total,
        snowmelt_to_soil,
        water_table_depth,
        surface_ponding: ponding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::canopy_state::CanopyLayer;
    use crate::engine::core::soil_column::SoilLayer;

    fn veg() -> VegetationClass {
        VegetationClass {
            id: 1,
            fractional_cover: 0.8,
            lai: [2.0; 12],
            height: 15.0,
            albedo: [0.15; 12],
            root_fraction: vec![0.7, 0.3],
            max_interception_storage: 0.002,
            min_stomatal_resistance: 150.0,
            max_stomatal_resistance: 5000.0,
            has_overstory: true,
            has_understory: false,
        }
    }

    fn soil_class() -> SoilClass {
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

    fn state() -> CellState {
        CellState {
            canopy: Canopy {
                overstory: Some(CanopyLayer::default()),
                understory: None,
            },
            snow: SnowPack::default(),
            soil: SoilColumn {
                soil_class_id: 1,
                total_depth: 2.0,
                root_layers: vec![
                    SoilLayer { moisture: 0.30, thickness: 1.0, percolation_area_fraction: 1.0, ..Default::default() },
                    SoilLayer { moisture: 0.30, thickness: 1.0, percolation_area_fraction: 1.0, ..Default::default() },
                ],
                deep_layer: SoilLayer { moisture: 0.30, thickness: 1.0, percolation_area_fraction: 1.0, ..Default::default() },
                storm_cumulative_infiltration: 0.0,
                surface_ponding: 0.0,
            },
        }
    }

    #[test]
    fn dry_step_with_no_forcing_leaves_mass_balanced() {
        let options = Options::default();
        let veg = veg();
        let class = soil_class();
        let mut st = state();
        let inputs = CellStepInputs {
            met: CellMeteorology {
                air_temp_c: 10.0,
                wind_ms: 1.0,
                relative_humidity_pct: 80.0,
                incoming_shortwave: 0.0,
                incoming_longwave: 300.0,
                rain_m: 0.0,
                snow_m: 0.0,
            },
            net_shortwave: 0.0,
            soil_class: &class,
            vegetation: &veg,
            month_index: 6,
            elevation: 500.0,
            lateral_delta: 0.0,
            reference_height: 2.0,
            air_pressure_pa: 101_325.0,
            specific_heat_moist_air: 1013.0,
            latent_heat_vaporization: 2_501_000.0,
        };
        let out = step_cell(&options, &inputs, &mut st).unwrap();
        assert_eq!(out.surface_runoff, 0.0);
        assert_eq!(out.snowmelt_to_soil, 0.0);
    }

    #[test]
    fn snowfall_step_routes_through_snowpack_not_et() {
        let options = Options::default();
        let veg = veg();
        let class = soil_class();
        let mut st = state();
        let inputs = CellStepInputs {
            met: CellMeteorology {
                air_temp_c: -5.0,
                wind_ms: 2.0,
                relative_humidity_pct: 70.0,
                incoming_shortwave: 0.0,
                incoming_longwave: 250.0,
                rain_m: 0.0,
                snow_m: 0.005,
            },
            net_shortwave: 0.0,
            soil_class: &class,
            vegetation: &veg,
            month_index: 0,
            elevation: 1200.0,
            lateral_delta: 0.0,
            reference_height: 2.0,
            air_pressure_pa: 90_000.0,
            specific_heat_moist_air: 1013.0,
            latent_heat_vaporization: 2_501_000.0,
        };
        let out = step_cell(&options, &inputs, &mut st).unwrap();
        assert!(st.snow.total_swe() > 0.0);
        assert_eq!(out.evapotranspiration, 0.0);
    }
}
