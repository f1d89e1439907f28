// ABOUTME: Top-level simulation driver - wires forcing, per-cell physics, routing, and mass balance
// ABOUTME: Per-cell loop runs over rayon's thread pool; lateral/channel sweeps stay sequential (order matters)

use rayon::prelude::*;
use std::collections::HashMap;

use crate::engine::config::Options;
use crate::engine::core::calendar::Calendar;
use crate::engine::core::canopy_state::VegetationClass;
use crate::engine::core::channel_graph::ChannelGraph;
use crate::engine::core::grid::{FlowDirectionTable, Grid};
use crate::engine::core::soil_column::SoilClass;
use crate::engine::diagnostics::mass_balance::BasinLedger;
use crate::engine::diagnostics::report::report_fatal;
use crate::engine::error::CoreResult;
use crate::engine::physics::cell_step::{step_cell, CellState, CellStepInputs};
use crate::engine::physics::channel_network::{sweep_network, RoutingOperator};
use crate::engine::physics::forcing::{CellMeteorology, Station, WeightGrid};
use crate::engine::physics::lateral_subsurface::{cell_lateral_outflow, CellSnapshot};
use crate::engine::physics::overland_router::route_kinematic_step;
use crate::engine::physics::radiation::{
    canopy_transmissivity, net_shortwave_layers, solar_altitude_sin_from_hour,
};

/// Static basin geometry and class tables, built once at init from the
/// (out-of-scope) raster/config readers.
pub struct BasinTopology {
    pub width: usize,
    pub height: usize,
    pub active_cells: Vec<(usize, usize)>,
    pub elevation: Grid<f32>,
    pub cell_size: f32,
    pub soil_class_of: Grid<u32>,
    pub vegetation_class_of: Grid<u32>,
    pub flow_table: FlowDirectionTable,
    pub topo_order: Vec<(usize, usize)>,
    pub soil_classes: HashMap<u32, SoilClass>,
    pub vegetation_classes: HashMap<u32, VegetationClass>,
}

/// Full mutable simulation state, owned by the top-level driver.
pub struct Simulation {
    pub options: Options,
    pub calendar: Calendar,
    pub topology: BasinTopology,
    pub cells: Vec<CellState>,
    pub stations: Vec<Station>,
    pub weights: WeightGrid,
    pub streams: ChannelGraph,
    pub roads: ChannelGraph,
    pub stream_storage_coeffs: HashMap<u32, f32>,
    pub road_storage_coeffs: HashMap<u32, f32>,
    pub surface_water: Grid<f32>,
    pub ledger: BasinLedger,
    /// Each active cell's water-table depth as of the end of its last step;
    /// the snapshot the lateral-subsurface sweep reads from, resolving the
    /// simultaneity Open Question.
    pub water_table_depth: Grid<f32>,
    /// Lateral saturated-flow deltas computed by the previous step's sweep,
    /// applied as this step's per-cell `lateral_delta` input.
    pub pending_lateral_delta: HashMap<(usize, usize), f32>,
}

impl Simulation {
    /// Runs one full time step: forcing, per-cell physics (parallel),
    /// lateral subsurface redistribution, overland routing, channel/road
    /// network sweep, and mass-balance closure.
    pub fn step(&mut self, station_records: &[crate::engine::physics::forcing::ForcingRecord]) -> CoreResult<()> {
        self.ledger.reset_step();
        let month_index = (self.calendar.current().month() as usize).saturating_sub(1).min(11);
        let hour = self.calendar.current().hour();

        // 1. Per-cell meteorology + physics, embarrassingly parallel across
        //    active cells.
        let width = self.topology.width;
        let dt = self.options.step_seconds as f32;
        let options = &self.options;
        let topology = &self.topology;
        let weights = &self.weights;
        let stations = &self.stations;
        let pending_lateral_delta = &self.pending_lateral_delta;

        let outputs: Vec<CoreResult<crate::engine::physics::cell_step::CellStepOutputs>> = self
            .cells
            .par_iter_mut()
            .zip(topology.active_cells.par_iter())
            .enumerate()
            .map(|(idx, (state, &(x, y)))| -> CoreResult<_> {
                let row = &weights.rows[idx];
                let met: CellMeteorology = crate::engine::physics::forcing::interpolate_cell(
                    row,
                    station_records,
                    stations,
                    topology.elevation.get(x, y),
                    options.physics.precip_lapse,
                    options.physics.temp_lapse,
                    options.physics.min_rain_temp,
                    options.physics.max_snow_temp,
                    true,
                )?;

                let soil_class_id = topology.soil_class_of.get(x, y);
                let veg_class_id = topology.vegetation_class_of.get(x, y);
                let soil_class = &topology.soil_classes[&soil_class_id];
                let veg = &topology.vegetation_classes[&veg_class_id];

                // Canopy-attenuated net shortwave reaching the ground/snow
                // surface: a single overstory layer (when present) absorbs
                // per its transmissivity and monthly albedo, then the
                // ground/snow layer absorbs the remainder.
                let solar_altitude_sin = solar_altitude_sin_from_hour(hour);
                let ground_albedo = veg.albedo[month_index];
                let snow_present_pre = state.snow.is_present();
                let snow_albedo = if snow_present_pre { Some(state.snow.albedo) } else { None };
                let lai = veg.lai[month_index];
                let (layer_tau, layer_albedo): (Vec<f32>, Vec<f32>) = if veg.has_overstory && lai > 0.0 {
                    let tau = canopy_transmissivity(
                        options.canopy_attenuation,
                        options.physics.canopy_extinction_coefficient,
                        lai,
                        solar_altitude_sin,
                        options.physics.leaf_angle_constant,
                    );
                    (vec![tau], vec![ground_albedo])
                } else {
                    (Vec::new(), Vec::new())
                };
                let (_layer_net, net_shortwave) =
                    net_shortwave_layers(met.incoming_shortwave, &layer_tau, &layer_albedo, ground_albedo, snow_albedo);

                let elevation = topology.elevation.get(x, y);
                let lateral_delta = pending_lateral_delta.get(&(x, y)).copied().unwrap_or(0.0);
                let inputs = CellStepInputs {
                    met,
                    net_shortwave,
                    soil_class,
                    vegetation: veg,
                    month_index,
                    elevation,
                    lateral_delta,
                    reference_height: 2.0,
                    air_pressure_pa: 101_325.0 * (1.0 - 2.25577e-5 * elevation).powf(5.2559),
                    specific_heat_moist_air: 1013.0,
                    latent_heat_vaporization: 2_501_000.0,
                };

                step_cell(options, &inputs, state)
            })
            .collect();

        let mut surface_runoff_total = 0.0f64;
        let mut et_total = 0.0f64;
        for (idx, result) in outputs.into_iter().enumerate() {
            match result {
                Ok(out) => {
                    let (x, y) = self.topology.active_cells[idx];
                    let v = self.surface_water.get_mut(x, y);
                    *v += out.surface_runoff;
                    surface_runoff_total += out.surface_runoff as f64;
                    et_total += out.evapotranspiration as f64;
                    self.water_table_depth.set(x, y, out.water_table_depth);
                }
                Err(err) => {
                    report_fatal(&err);
                    return Err(err);
                }
            }
        }
        self.ledger.evapotranspiration_out += et_total;

        // 2. Lateral subsurface sweep against this step's freshly closed
        //    water-table snapshot: every cell's outflow is computed from the same
        //    snapshot, then applied as next step's `lateral_delta` input so
        //    no cell ever reads a neighbor's mid-sweep state.
        let mut snapshot: Grid<CellSnapshot> = Grid::new(
            width,
            self.topology.height,
            CellSnapshot {
                water_table_depth: 0.0,
                total_depth: 0.0,
                surface_elevation: 0.0,
                cell_size: self.topology.cell_size,
            },
        );
        for (idx, &(x, y)) in self.topology.active_cells.iter().enumerate() {
            snapshot.set(
                x,
                y,
                CellSnapshot {
                    water_table_depth: self.water_table_depth.get(x, y),
                    total_depth: self.cells[idx].soil.total_depth,
                    surface_elevation: self.topology.elevation.get(x, y),
                    cell_size: self.topology.cell_size,
                },
            );
        }

        let mut deltas: HashMap<(usize, usize), f32> = HashMap::new();
        for &(x, y) in &self.topology.active_cells {
            let soil_class_id = self.topology.soil_class_of.get(x, y);
            let class = &self.topology.soil_classes[&soil_class_id];
            for (dx, dy, volume) in
                cell_lateral_outflow(class, &snapshot, &self.topology.flow_table, x, y, dt)
            {
                *deltas.entry((x, y)).or_insert(0.0) -= volume;
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx >= 0 && ny >= 0 {
                    *deltas.entry((nx as usize, ny as usize)).or_insert(0.0) += volume;
                }
            }
        }
        self.pending_lateral_delta = deltas;

        // 3. Overland routing over the surface-water grid.
        let outlet_volume = route_kinematic_step(
            &mut self.surface_water,
            &self.topology.flow_table,
            &self.topology.topo_order,
            1.0,
        );
        self.ledger.precipitation_in += surface_runoff_total; // surface excess is itself an output of rainfall input accounted upstream
        self.ledger.storage_change += (surface_runoff_total - outlet_volume as f64).max(0.0);

        // 4. Road network first, then the channel network consumes any
        //    confluence inflow left over (REDESIGN FLAG: explicit
        //    roads-before-channels precedence).
        self.roads.swap_step_buffers();
        sweep_network(&mut self.roads, RoutingOperator::LinearReservoir, &self.road_storage_coeffs, dt)?;

        self.streams.swap_step_buffers();
        let mouth_outflow = sweep_network(
            &mut self.streams,
            RoutingOperator::LinearReservoir,
            &self.stream_storage_coeffs,
            dt,
        )?;
        self.ledger.channel_outflow += mouth_outflow as f64;

        // 5. Close the mass balance for this step.
        self.ledger.close_step(
            self.options.mass_balance_step_tolerance,
            self.options.mass_balance_cumulative_tolerance,
        )?;

        self.calendar.advance();
        Ok(())
    }
}
